//! Error types for polyorm

use thiserror::Error;

/// Result type alias for polyorm operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for SQL generation and database operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// SQL could not be built (empty table name, malformed placeholders, ...)
    #[error("Statement preparation error: {0}")]
    StatementPreparation(String),

    /// Object <-> column value conversion failure
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// Invalid upsert or key configuration for the target dialect
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The driver or dialect lacks a required capability
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Error reported by the execution collaborator, passed through unchanged
    #[error("Execution error: {0}")]
    Execution(String),

    /// Query execution error from tokio-postgres
    #[cfg(feature = "postgres")]
    #[error("Query error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a statement preparation error
    pub fn statement(message: impl Into<String>) -> Self {
        Self::StatementPreparation(message.into())
    }

    /// Create a mapping error
    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping(message.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Create an unsupported feature error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedFeature(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Check if this is a statement preparation error
    pub fn is_statement_preparation(&self) -> bool {
        matches!(self, Self::StatementPreparation(_))
    }

    /// Check if this is a mapping error
    pub fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping(_))
    }

    /// Check if this is an invalid configuration error
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(self, Self::InvalidConfiguration(_))
    }

    /// Check if this is an unsupported feature error
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedFeature(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Mapping(err.to_string())
    }
}
