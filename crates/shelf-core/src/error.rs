//! Error types for Shelf

use thiserror::Error;

/// The main error type for Shelf operations
#[derive(Debug, Error)]
pub enum ShelfError {
    #[error("No configuration document found at {0}")]
    ConfigMissing(String),

    #[error("No resource folders configured")]
    EmptyFolderList,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Assignment of {resource} failed: {reason}")]
    Assignment { resource: String, reason: String },

    #[error("Packaging failed: {0}")]
    Build(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Preference store error: {0}")]
    Preference(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Load error: {0}")]
    Load(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("TOML serialization error: {0}")]
    TomlSerError(String),
}

/// Result type alias for Shelf operations
pub type Result<T> = std::result::Result<T, ShelfError>;

impl From<toml::de::Error> for ShelfError {
    fn from(err: toml::de::Error) -> Self {
        ShelfError::TomlParseError(err.to_string())
    }
}

impl From<toml::ser::Error> for ShelfError {
    fn from(err: toml::ser::Error) -> Self {
        ShelfError::TomlSerError(err.to_string())
    }
}
