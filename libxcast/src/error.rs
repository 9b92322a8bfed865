//! Error types for xcast

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, XcastError>;

#[derive(Error, Debug)]
pub enum XcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Credential vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("No items were imported ({} rejected)", errors.len())]
    BatchRejected { errors: Vec<ItemError> },
}

impl XcastError {
    /// Shorthand for a missing row or file
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        XcastError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            XcastError::InvalidInput(_)
            | XcastError::NotFound { .. }
            | XcastError::Conflict(_)
            | XcastError::BatchRejected { .. } => 3,
            XcastError::Config(_) => 2,
            XcastError::Database(_)
            | XcastError::Vault(_)
            | XcastError::Delivery(_)
            | XcastError::Io(_) => 1,
        }
    }
}

/// One rejected item of a batch operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemError {
    pub index: usize,
    pub reason: String,
}

impl std::fmt::Display for ItemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "item {}: {}", self.index, self.reason)
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt column {column}: {reason}")]
    Corrupt { column: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),
}

#[derive(Error, Debug, Clone)]
pub enum DeliveryError {
    #[error("Media upload failed: {0}")]
    Upload(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Posting failed: {0}")]
    Posting(String),
}

impl DeliveryError {
    /// Network trouble and rate limiting may clear up by the next tick;
    /// the rest usually needs operator attention.
    pub fn is_transient(&self) -> bool {
        matches!(self, DeliveryError::Network(_) | DeliveryError::RateLimit(_))
    }
}
