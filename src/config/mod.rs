pub mod parser;
pub mod resolve;
pub mod schema;
pub mod security;
pub mod types;

pub use types::*;
pub use parser::parse_config;
pub use resolve::{Overrides, SERVICE_URL_ENV};
