// ABOUTME: Error types for execution context access
// ABOUTME: Raised when a step configuration block is missing or inserted twice

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("configuration block '{kind}' is not set")]
    MissingBlock { kind: &'static str },

    #[error("configuration block '{kind}' is already set")]
    DuplicateBlock { kind: &'static str },
}

pub type Result<T> = std::result::Result<T, ContextError>;
