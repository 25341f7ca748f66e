//! Actor Error Types
//!
//! Failures that can be observed on a [`Response`](crate::Response) or
//! returned by the context APIs. Every variant is cheap to clone so that a
//! single failure can be handed to every waiter of a response.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Main actor runtime error type
#[derive(Error, Debug, Clone)]
pub enum ActorError {
    /// The handler returned an error; `message` is its deepest cause
    #[error("Handler failed: {message}")]
    Payload {
        message: String,
        error: Arc<anyhow::Error>,
    },

    /// The handler panicked while running
    #[error("Handler panicked: {message}")]
    Panicked { message: String },

    /// No actor is registered under the receiver reference
    #[error("Unknown actor: {reference}")]
    UnknownActor { reference: String },

    /// A reference or object was registered twice
    #[error("Duplicate actor: {reference}")]
    DuplicateActor { reference: String },

    /// Await deadline or transport timeout
    #[error("Timeout error: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// The response was cancelled before a result was produced
    #[error("Envelope cancelled")]
    Cancelled,

    /// The message cannot be processed by the receiving side
    #[error("Invalid message: {message}")]
    InvalidMessage { message: String },

    /// Remote delivery failed
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// A completed value was requested as the wrong type
    #[error("Type mismatch: expected {expected}")]
    TypeMismatch { expected: &'static str },

    /// The receiver does not accept raw value messages
    #[error("Actor {reference} does not accept value messages")]
    UnsupportedMessage { reference: String },

    /// The owning context has been stopped
    #[error("Context stopped")]
    ContextStopped,

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },
}

/// Result type alias for actor operations
pub type Result<T> = std::result::Result<T, ActorError>;

impl ActorError {
    /// Wrap a handler error, keeping an `ActorError` raised by the handler as-is
    pub fn from_handler(error: anyhow::Error) -> Self {
        if let Some(actor_error) = error.downcast_ref::<ActorError>() {
            return actor_error.clone();
        }
        Self::Payload {
            message: error.root_cause().to_string(),
            error: Arc::new(error),
        }
    }

    /// Create a panic error from a caught unwind payload
    pub fn panicked(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked { message }
    }

    pub fn unknown_actor(reference: impl ToString) -> Self {
        Self::UnknownActor {
            reference: reference.to_string(),
        }
    }

    pub fn duplicate_actor(reference: impl ToString) -> Self {
        Self::DuplicateActor {
            reference: reference.to_string(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::InvalidMessage {
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn type_mismatch<T>() -> Self {
        Self::TypeMismatch {
            expected: std::any::type_name::<T>(),
        }
    }

    pub fn unsupported(reference: impl ToString) -> Self {
        Self::UnsupportedMessage {
            reference: reference.to_string(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.map(str::to_string),
        }
    }

    /// Full handler error chain, when this failure came from a handler
    pub fn handler_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Payload { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::ContextStopped)
    }
}
