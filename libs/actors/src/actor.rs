//! Actor capability handle
//!
//! An [`ActorRef`] pairs a reference with the context it is used from. All
//! sends made through it carry its reference as the sender, so replies and
//! await bookkeeping land in this actor's mailbox. Awaits made through it
//! from inside one of this actor's handlers release that handler's slot,
//! exactly like awaits made through the handler's [`Frame`](crate::Frame).

use crate::context::Context;
use crate::envelope::EnvelopeKind;
use crate::error::Result;
use crate::message::{Message, Value};
use crate::reference::Reference;
use crate::response::Response;
use crate::runner::running_sequence;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Reference of an actor bound to a context
#[derive(Clone)]
pub struct ActorRef {
    reference: Reference,
    context: Context,
}

impl ActorRef {
    pub fn new(reference: Reference, context: Context) -> Self {
        Self { reference, context }
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    pub fn name(&self) -> &str {
        self.reference.name()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// The registered object, if it is local and has type `T`
    pub fn object<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.context.object::<T>(&self.reference)
    }

    /// Send `message` to `to` with this actor as the sender
    pub fn send(&self, to: &Reference, message: Message) -> Response {
        self.context.post(
            self.reference.clone(),
            to.clone(),
            message,
            EnvelopeKind::Normal,
        )
    }

    /// Send a message to this actor from nobody
    pub fn tell(&self, message: Message) -> Response {
        self.context.send(&self.reference, message)
    }

    /// Send a value to this actor and block for the typed result
    pub fn ask<T: Any + Clone>(&self, message: Message) -> Result<T> {
        self.tell(message).get_as::<T>()
    }

    /// Send a value to this actor and block for the reply value
    pub fn ask_value(&self, value: impl Into<Value>) -> Result<Value> {
        self.ask::<Value>(Message::value(value))
    }

    /// Send an await envelope to `to` and wait for it to finish
    pub fn await_on(&self, to: &Reference, message: Message) -> Response {
        self.context
            .await_from(&self.reference, to, message, self.caller(), None)
    }

    /// Like [`await_on`](Self::await_on); the response fails with a timeout after `deadline`
    pub fn await_within(&self, to: &Reference, message: Message, deadline: Duration) -> Response {
        self.context
            .await_from(&self.reference, to, message, self.caller(), Some(deadline))
    }

    /// Wait until `condition` holds, evaluated on `to`'s mailbox
    pub fn await_until<F>(&self, to: &Reference, condition: F) -> Response
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.context.await_from(
            &self.reference,
            to,
            Message::condition(Arc::new(condition)),
            self.caller(),
            None,
        )
    }

    /// The handler of this actor running on the calling thread, if any
    fn caller(&self) -> Option<u64> {
        running_sequence(&self.reference)
    }
}

impl PartialEq for ActorRef {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

impl Eq for ActorRef {}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorRef({})", self.reference)
    }
}

impl fmt::Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.reference, f)
    }
}
