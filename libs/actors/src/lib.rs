//! Actor Runtime Core
//!
//! Named actors exchange messages through envelopes; every envelope yields
//! a [`Response`]. Each actor processes one normal message at a time
//! (run-to-completion) on a shared elastic worker pool, in the global order
//! the envelopes were stamped in.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐ post  ┌──────────────────────┐ route ┌──────────────┐
//! │  ActorRef /  │──────▶│       Context        │──────▶│    Router    │
//! │    Frame     │       │ executor · notary    │       │ local/remote │
//! └──────────────┘       └──────────────────────┘       └──────┬───────┘
//!                                                              │ post
//!        ┌────────────────────────────────────────────────────▼───────┐
//!        │ ContextInbox ── ObjectInbox (per actor, ordered, Busy slot) │
//!        └───────────────────────────────┬────────────────────────────┘
//!                                        │ sweep on a worker
//!                                        ▼
//!                      Opener ──▶ EnvelopeRunner ──▶ Response
//! ```
//!
//! # Awaiting
//!
//! A handler may wait on another actor with [`Frame::await_on`]. As soon as
//! the target starts processing the awaited envelope, the waiting actor's
//! mailbox is released to other messages; the handler takes its slot back
//! before it continues. [`Frame::await_until`] waits for a condition without
//! occupying a worker while it is false.
//!
//! # Examples
//!
//! ```rust,no_run
//! use actor_core::{ActorBehavior, Context, Frame, Message, Value};
//! use std::sync::Arc;
//!
//! struct Greeter;
//!
//! impl ActorBehavior for Greeter {
//!     fn on_message(&self, message: Value, _frame: &Frame) -> anyhow::Result<Value> {
//!         Ok(Value::from(format!("hello, {}", message)))
//!     }
//! }
//!
//! let context = Context::new().unwrap();
//! let greeter = context.new_actor("greeter", Arc::new(Greeter)).unwrap();
//! let reply = greeter.ask_value("world").unwrap();
//! assert_eq!(reply, Value::from("hello, world"));
//! context.stop();
//! ```

pub mod actor;
pub mod behavior;
pub mod context;
pub mod context_inbox;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod inbox;
pub mod logging_router;
pub mod message;
pub mod notary;
pub mod reference;
pub mod response;
pub mod router;
pub mod runner;
pub mod sequencer;
pub mod system;

pub use actor::ActorRef;
pub use behavior::{ActorBehavior, AsAny};
pub use context::{Context, ContextBuilder, ContextMetrics, MetricsSnapshot, WeakContext};
pub use context_inbox::ContextInbox;
pub use envelope::{Envelope, EnvelopeKind};
pub use error::{ActorError, Result};
pub use executor::ContextExecutor;
pub use inbox::ObjectInbox;
pub use logging_router::LoggingRouter;
pub use message::{Message, MessageKind, Payload, Value};
pub use notary::Notary;
pub use reference::{NamespaceReferenceFactory, Reference, ReferenceFactory};
pub use response::{Outcome, Response};
pub use router::{Binding, CompositeRouter, LocalRouter, Router, RouterCollection};
pub use runner::{DefaultOpener, EnvelopeListener, EnvelopeRunner, Frame, Opener};
pub use sequencer::Sequencer;

pub use actor_config::RuntimeConfig;
