//! Error types for the connector pool

use std::time::Duration;
use thiserror::Error;

/// Failure reported by a [`ResourceFactory`](crate::ResourceFactory) operation.
///
/// # Examples
///
/// ```
/// use connector_pool::ResourceError;
///
/// let err = ResourceError::new("connection refused");
/// assert_eq!(err.to_string(), "connection refused");
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ResourceError {
    message: String,
}

impl ResourceError {
    /// Create a new resource error with the given message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Invalid pool configuration: {0}")]
    Configuration(String),

    #[error("Failed to create pooled resource: {0}")]
    CreationFailed(#[source] ResourceError),

    #[error("Pooled resource failed its health check: {0}")]
    Unhealthy(#[source] ResourceError),

    #[error("Pool exhausted - no resource became available within {0:?}")]
    PoolExhausted(Duration),

    #[error("Pool has been shut down")]
    PoolShutdown,

    #[error("Wait for a pooled resource was interrupted")]
    InterruptedWait,

    #[error("Illegal pool usage: {0}")]
    IllegalState(String),

    #[error("Metrics export failed: {0}")]
    Metrics(String),
}

impl PoolError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        PoolError::Configuration(message.into())
    }

    pub(crate) fn illegal_state(message: impl Into<String>) -> Self {
        PoolError::IllegalState(message.into())
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
