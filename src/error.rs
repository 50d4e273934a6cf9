use thiserror::Error;

use crate::construct::FactId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FactError {
    #[error("A fact can't be modified after declaration (f-{factid})")]
    MutationAfterDeclaration { factid: FactId },
    #[error("Unhashable value of type {type_name}")]
    UnhashableValue { type_name: String },
    #[error("Malformed compound key '{key}': {reason}")]
    MalformedCompoundKey { key: String, reason: String },
    #[error("Field '{field}' is given both as a plain value and through compound keys")]
    ConflictingField { field: String },
    #[error("Slot '{key}' is reserved and can only be set through its accessor")]
    ReservedSlot { key: String },
    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, FactError>;

// Helper conversions
impl From<config::ConfigError> for FactError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
