//! Error handling for csvscope
//!
//! Connection-level failures ([`ScopeError::Connection`],
//! [`ScopeError::Disconnected`]) cross the engine boundary. Row-level
//! failures ([`RowError`]) are absorbed by the ingestion loop and only
//! counted.

use thiserror::Error;

/// Main error type for csvscope operations
#[derive(Error, Debug)]
pub enum ScopeError {
    /// The transport could not be opened, or the engine is already connected
    #[error("Connection error: {0}")]
    Connection(String),

    /// The transport dropped in the middle of a session
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// A single data line failed field-count or numeric checks
    #[error("Malformed row: {0}")]
    MalformedRow(#[from] RowError),

    /// Values handed to the signal store do not match the schema arity
    #[error("Arity mismatch: expected {expected} values, got {actual}")]
    Arity { expected: usize, actual: usize },

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ScopeError>,
    },
}

impl ScopeError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ScopeError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error (or the error it wraps) is a transport drop
    pub fn is_disconnect(&self) -> bool {
        match self {
            ScopeError::Disconnected(_) => true,
            ScopeError::WithContext { source, .. } => source.is_disconnect(),
            _ => false,
        }
    }
}

/// Reasons a data line is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    /// Field count differs from the schema arity
    #[error("expected {expected} fields, got {actual}")]
    Arity { expected: usize, actual: usize },

    /// A field could not be coerced to a number
    #[error("column {column}: '{token}' is not numeric")]
    NotNumeric { column: usize, token: String },

    /// The line had no content
    #[error("empty line")]
    Empty,

    /// No line terminator arrived before the length limit
    #[error("line exceeds {len} bytes without a terminator")]
    TooLong { len: usize },
}

/// Result type alias for csvscope operations
pub type Result<T> = std::result::Result<T, ScopeError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ScopeError::Io(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| ScopeError::Io(e).with_context(f()))
    }
}
