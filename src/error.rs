use thiserror::Error;

/// Main error type for Propmedia
#[derive(Error, Debug)]
pub enum PropmediaError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport errors talking to the storage function
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization errors, e.g. a malformed gallery column
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A directory or file under a dropped folder could not be read
    #[error("Scan error: {0}")]
    Scan(String),

    /// A folder has no property to upload into
    #[error("No property matched: {0}")]
    NoMatch(String),

    /// A single file failed to upload
    #[error("Upload error: {0}")]
    Upload(String),

    /// The property update after uploads failed
    #[error("Reconciliation error: {0}")]
    Reconciliation(String),

    /// Property not found
    #[error("Property not found: {0}")]
    PropertyNotFound(i64),

    /// An upload-all run is already in flight
    #[error("Upload already in progress")]
    Busy,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using PropmediaError
pub type Result<T> = std::result::Result<T, PropmediaError>;
