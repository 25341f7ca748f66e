//! The object bound to an actor reference
//!
//! Any `Send + Sync` type can be registered as an actor by implementing
//! [`ActorBehavior`]. Closure messages reach the object through
//! [`Frame::object`](crate::Frame::object); value messages (including every
//! message arriving over the remote transport) are dispatched to
//! [`ActorBehavior::on_message`].

use crate::error::ActorError;
use crate::message::Value;
use crate::runner::Frame;
use std::any::Any;
use std::sync::Arc;

/// Upcast helper so registered objects can be recovered with their concrete type
pub trait AsAny: Any + Send + Sync {
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Capability of an object registered with a context
pub trait ActorBehavior: AsAny {
    /// Handle a value message; the returned value completes the response.
    ///
    /// Actors that only receive closures keep the default, which rejects
    /// the message.
    fn on_message(&self, message: Value, frame: &Frame) -> anyhow::Result<Value> {
        let _ = message;
        Err(ActorError::unsupported(frame.receiver()).into())
    }
}
