//! Error types for the WorldView environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Context operation failed
    #[error("Context error: {0}")]
    ContextError(String),
    
    /// Runtime could not be created or driven
    #[error("Runtime error: {0}")]
    RuntimeError(String),
    
    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a context error.
    pub fn context(msg: impl Into<String>) -> Self {
        Self::ContextError(msg.into())
    }
    
    /// Creates a runtime error.
    pub fn runtime(msg: impl std::fmt::Display) -> Self {
        Self::RuntimeError(msg.to_string())
    }
}
