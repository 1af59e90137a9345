//! Engine error taxonomy.
//!
//! - [`ConfigurationError`]: malformed window, empty alert events, unknown
//!   severity, misuse of the task API. Fatal to the run.
//! - [`SearchBackendError`](crate::backend::SearchBackendError): backend
//!   failure or deadline exceeded. Fatal to the run.
//! - [`CallbackError`]: a rule callback failed for one group or event.
//!   Logged and counted; the walk continues.

use crate::backend::SearchBackendError;

/// A rule or engine configuration mistake.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("configuration error: {0}")]
pub struct ConfigurationError(pub String);

impl ConfigurationError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Errors that terminate a single rule execution.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("search backend error: {0}")]
    SearchBackend(#[from] SearchBackendError),
}

/// Failure inside a rule callback while materializing one alert.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("template rendering failed: {0}")]
    Template(String),

    #[error("event is missing field '{0}'")]
    MissingField(String),
}
