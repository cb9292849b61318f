use thiserror::Error;

/// Main error type for kgpath
#[derive(Error, Debug)]
pub enum KgpathError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Weight configuration could not be parsed
    #[error("Weights error: {0}")]
    Weights(#[from] serde_json::Error),

    /// Graph store failures that are not plain SQL errors
    #[error("Graph store error: {0}")]
    GraphStore(String),

    /// Evidence could not be assembled from scored chains
    #[error("Evidence error: {0}")]
    Evidence(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using KgpathError
pub type Result<T> = std::result::Result<T, KgpathError>;
