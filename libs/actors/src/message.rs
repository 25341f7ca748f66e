//! Envelope payloads
//!
//! A [`Message`] is the work an envelope carries. The variant is chosen at
//! send time:
//!
//! - **Computation**: a closure producing a typed result
//! - **Procedure**: a closure run for its effect, completing with `()`
//! - **Value**: serializable data handed to the receiver's
//!   [`ActorBehavior::on_message`](crate::ActorBehavior::on_message); the
//!   only variant that can cross a process boundary
//!
//! Closures run on the receiver's mailbox with a [`Frame`] describing the
//! envelope being processed.

use crate::runner::Frame;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Type-erased completed result
pub type Payload = Arc<dyn Any + Send + Sync>;

type ComputationFn = Box<dyn FnOnce(&Frame) -> anyhow::Result<Payload> + Send>;
type ProcedureFn = Box<dyn FnOnce(&Frame) -> anyhow::Result<()> + Send>;
pub(crate) type ConditionFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// Serializable message data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::UInt(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => f.write_str("()"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::UInt(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(text) => f.write_str(text),
            Value::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::UInt(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

/// Kind of payload, used for logging and message identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Computation,
    Procedure,
    Value,
    Condition,
}

impl MessageKind {
    pub fn label(self) -> &'static str {
        match self {
            MessageKind::Computation => "call",
            MessageKind::Procedure => "run",
            MessageKind::Value => "value",
            MessageKind::Condition => "until",
        }
    }
}

pub(crate) enum Body {
    Computation(ComputationFn),
    Procedure(ProcedureFn),
    Value(Value),
    Condition(ConditionFn),
}

/// Work carried by an envelope
pub struct Message {
    body: Body,
}

impl Message {
    /// Closure whose return value completes the response
    pub fn call<T, F>(f: F) -> Self
    where
        T: Any + Send + Sync,
        F: FnOnce(&Frame) -> anyhow::Result<T> + Send + 'static,
    {
        Self {
            body: Body::Computation(Box::new(move |frame| {
                f(frame).map(|value| Arc::new(value) as Payload)
            })),
        }
    }

    /// Closure run for its effect; the response completes with `()`
    pub fn run<F>(f: F) -> Self
    where
        F: FnOnce(&Frame) -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            body: Body::Procedure(Box::new(f)),
        }
    }

    /// Data for the receiver's behavior
    pub fn value(value: impl Into<Value>) -> Self {
        Self {
            body: Body::Value(value.into()),
        }
    }

    pub(crate) fn condition(condition: ConditionFn) -> Self {
        Self {
            body: Body::Condition(condition),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self.body {
            Body::Computation(_) => MessageKind::Computation,
            Body::Procedure(_) => MessageKind::Procedure,
            Body::Value(_) => MessageKind::Value,
            Body::Condition(_) => MessageKind::Condition,
        }
    }

    /// The data of a value message
    pub fn as_value(&self) -> Option<&Value> {
        match &self.body {
            Body::Value(value) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn into_body(self) -> Body {
        self.body
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            Body::Value(value) => write!(f, "Message::Value({:?})", value),
            _ => write!(f, "Message::{:?}", self.kind()),
        }
    }
}
