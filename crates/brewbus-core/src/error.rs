//! Error handling for Brewbus core
//!
//! Two families of errors exist:
//! - Bus errors are returned directly from the bus API when it is misused
//!   (invalid registration arguments, dispatch after shutdown).
//! - Dispatch errors are carried by a rejected [`Deferred`](crate::Deferred)
//!   and describe why a dispatched event produced no result.
//!
//! All error types use `thiserror` for ergonomic error handling.

use std::sync::Arc;
use thiserror::Error;

/// Bus error type
///
/// Returned synchronously by the bus and worker pool when they are misused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// A registration or configuration argument is invalid
    #[error("Invalid {field}: {reason}")]
    Validation {
        /// The name of the offending argument.
        field: &'static str,
        /// Why the argument was rejected.
        reason: String,
    },

    /// The bus has been stopped and refuses new work
    #[error("Event bus is stopped")]
    EmitterStopped,

    /// Workers can only be started from inside a tokio runtime
    #[error("No tokio runtime available to start workers")]
    NoRuntime,
}

impl BusError {
    /// Create a validation error for the named argument
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        BusError::Validation {
            field,
            reason: reason.into(),
        }
    }
}

/// Dispatch error type
///
/// The rejection reason of a [`Deferred`](crate::Deferred). Cloneable so that
/// every waiter observes the identical outcome.
#[derive(Error, Debug, Clone)]
pub enum DispatchError {
    /// No handler is registered and the dispatch required one
    #[error("No handler registered for event '{event_type}'")]
    NoHandler {
        /// The event type that had no handler.
        event_type: String,
    },

    /// The handler failed without settling its result
    #[error("Handler for '{event_type}' failed: {reason}")]
    HandlerFault {
        /// The event type whose handler failed.
        event_type: String,
        /// A description of the failure or panic payload.
        reason: String,
    },

    /// The caller stopped waiting before the result arrived
    #[error("Timed out after {timeout_ms}ms waiting for result")]
    TimedOut {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// The handler rejected the request with a domain error
    #[error("{0}")]
    Rejected(Arc<anyhow::Error>),
}

impl DispatchError {
    /// Wrap a domain error raised by a handler
    pub fn rejected(error: impl Into<anyhow::Error>) -> Self {
        DispatchError::Rejected(Arc::new(error.into()))
    }

    /// Attempt to view a handler-supplied rejection as a concrete error type
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        match self {
            DispatchError::Rejected(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, DispatchError::TimedOut { .. })
    }

    /// Check if the handler faulted
    pub fn is_fault(&self) -> bool {
        matches!(self, DispatchError::HandlerFault { .. })
    }
}

/// Main error type for Brewbus core
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Bus misuse
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Dispatched work produced no result
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
