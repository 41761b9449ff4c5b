//! Error types for Sankalan
//!
//! The taxonomy mirrors how failures are recovered from: transport failures
//! are fatal to one sensor link, framing and decode failures cost one byte or
//! one line, persistence and capture failures cost one record.

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Sankalan error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error (fatal to the sensor link)
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sensor used before connect() or after disconnect()
    #[error("Sensor not connected")]
    NotConnected,

    /// Operator interrupt observed mid-sequence
    #[error("Interrupted by operator")]
    Interrupted,

    /// Bad header or length at the current buffer position (recoverable,
    /// costs a single-byte advance)
    #[error("Framing error: {0}")]
    Framing(&'static str),

    /// Malformed JSON line from the IMU (recoverable, line is dropped)
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Database failure during a write (recoverable per record)
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Camera capture failed (that cycle's sample is skipped)
    #[error("Capture error: {0}")]
    Capture(String),

    /// Configuration file could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration value out of range or inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
