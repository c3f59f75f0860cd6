pub mod types;
pub mod classification;

pub use types::FuzzchainError;
pub use classification::ErrorClassification;
