pub mod cli;
pub mod config;
pub mod errors;
pub mod pipeline;
pub mod probe;
pub mod process;
pub mod reporting;
pub mod scanner;
pub mod tools;
pub mod utils;
