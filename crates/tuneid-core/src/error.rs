//! Error types for tuneid-core

use thiserror::Error;

/// Result type alias for recognition operations
pub type Result<T> = std::result::Result<T, Error>;

/// Recognition pipeline error types
#[derive(Error, Debug)]
pub enum Error {
    // Parameter errors
    /// Bad ratio, sample rate or FFT length
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration outside field widths or ranges
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Signal errors
    /// Audio bytes could not be decoded
    #[error("Failed to decode audio: {0}")]
    Decode(String),

    /// Decimation failed
    #[error("Failed to downsample audio: {0}")]
    Downsample(String),

    // Store errors
    /// Fingerprint or counter store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Persisted `song#ms` entry that does not parse
    #[error("Malformed couple entry: {0}")]
    MalformedCouple(String),

    /// File access
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Error::Store(msg.into())
    }

    /// Returns true if the caller may retry the failed operation
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Store(_) | Error::Io(_))
    }

    /// Returns a stable error code for logs and CLI output
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidParameter(_) => "INVALID_PARAMETER",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Decode(_) => "DECODE",
            Error::Downsample(_) => "DOWNSAMPLE",
            Error::Store(_) => "STORE",
            Error::MalformedCouple(_) => "MALFORMED_COUPLE",
            Error::Io(_) => "IO",
            Error::Json(_) => "JSON",
        }
    }
}
