//! Remote Transport Error Types

use actor_core::ActorError;
use std::net::SocketAddr;
use thiserror::Error;

/// Failures of the HTTP transport itself
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Endpoint could not be bound
    #[error("Bind error: {message} (address: {address:?})")]
    Bind {
        message: String,
        address: Option<SocketAddr>,
    },

    /// Async runtime or HTTP client could not be created
    #[error("Runtime error: {message}")]
    Runtime { message: String },

    /// Payload or reference could not be encoded or decoded
    #[error("Codec error: {message}")]
    Codec { message: String },

    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    #[error(transparent)]
    Actor(#[from] ActorError),
}

impl RemoteError {
    pub fn bind(message: impl Into<String>, address: Option<SocketAddr>) -> Self {
        Self::Bind {
            message: message.into(),
            address,
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.map(|s| s.to_string()),
        }
    }
}

impl From<bincode::Error> for RemoteError {
    fn from(error: bincode::Error) -> Self {
        Self::codec(error.to_string())
    }
}

impl From<RemoteError> for ActorError {
    fn from(error: RemoteError) -> Self {
        match error {
            RemoteError::Actor(error) => error,
            RemoteError::Codec { message } => ActorError::invalid_message(message),
            other => ActorError::transport(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;
