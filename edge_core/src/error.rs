//! Unified error handling for the edge inference engine.
//!
//! One error type threads through every fallible API in this crate, so
//! callers at the orchestrator boundary can match on failure domain without
//! chasing down library-specific error types.

use thiserror::Error;

/// Main error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// I/O related errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parsing or validation errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Video source errors (fatal at startup, per the error taxonomy).
    #[error("Video source error: {0}")]
    Video(String),

    /// DLPU coordinator errors (fatal at startup).
    #[error("DLPU coordinator error: {0}")]
    Dlpu(String),

    /// Inference engine errors (model load or a single inference call).
    #[error("Inference error: {0}")]
    Inference(String),

    /// Module-level errors (never fatal to the pipeline; logged and skipped).
    #[error("Module '{module}' error: {message}")]
    Module { module: String, message: String },

    /// Bus publish/subscribe errors.
    #[error("Bus error: {0}")]
    Bus(String),

    /// JPEG encoding errors.
    #[error("JPEG encode error: {0}")]
    Jpeg(String),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Catch-all for other error types.
    #[error("{0}")]
    Other(String),
}

/// Convenience alias for Results using [`EngineError`].
pub type EngineResult<T> = Result<T, EngineError>;

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for EngineError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        EngineError::Other("lock poisoned".to_string())
    }
}

impl From<&str> for EngineError {
    fn from(msg: &str) -> Self {
        EngineError::Other(msg.to_string())
    }
}

impl From<String> for EngineError {
    fn from(msg: String) -> Self {
        EngineError::Other(msg)
    }
}

impl EngineError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        EngineError::Config(msg.into())
    }

    pub fn video<S: Into<String>>(msg: S) -> Self {
        EngineError::Video(msg.into())
    }

    pub fn dlpu<S: Into<String>>(msg: S) -> Self {
        EngineError::Dlpu(msg.into())
    }

    pub fn inference<S: Into<String>>(msg: S) -> Self {
        EngineError::Inference(msg.into())
    }

    pub fn module<S: Into<String>, T: Into<String>>(module: S, message: T) -> Self {
        EngineError::Module {
            module: module.into(),
            message: message.into(),
        }
    }

    pub fn bus<S: Into<String>>(msg: S) -> Self {
        EngineError::Bus(msg.into())
    }

    pub fn jpeg<S: Into<String>>(msg: S) -> Self {
        EngineError::Jpeg(msg.into())
    }
}
