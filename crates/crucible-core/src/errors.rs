//! Error types for failure classification across the execution engine
//!
//! This module provides the error hierarchy that drives the engine's retry
//! policy. The central distinction is between user-attributable outcomes
//! (forbidden constructs, unresolvable entry points) which are terminal, and
//! infrastructure failures (container unreachable, workspace I/O, exec launch
//! errors) which are worth one retry against a freshly reset sandbox.

use thiserror::Error;

/// Entry-point resolution failures. These are user-attributable: the submitted
/// source either has no runnable entry point or an ambiguous one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("no main method found")]
    NoEntryPoint,
    #[error("exactly one main method is allowed")]
    AmbiguousEntryPoint,
    #[error("no class containing the main method was found")]
    NoOwningClass,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Security Error: forbidden keyword detected: {0}")]
    SecurityViolation(String),
    #[error("Compile Error: {0}")]
    Resolution(#[from] ResolutionError),
    #[error("Container init failed: {0}")]
    ContainerInit(String),
    #[error("Workspace error: {0}")]
    Workspace(String),
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
    #[error("Queue error: {0}")]
    Queue(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Whether the retry/recreate path applies. Security and resolution
    /// failures are properties of the submission and are never retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            EngineError::SecurityViolation(_) | EngineError::Resolution(_)
        )
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Infrastructure(err.to_string())
    }
}
