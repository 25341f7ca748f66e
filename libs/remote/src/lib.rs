//! HTTP Transport for the Actor Runtime
//!
//! Connects contexts in different processes. An [`ActorServer`] binds an
//! HTTP endpoint, builds its context with a [`CompositeRouter`] and hands
//! out references of the form `actor://{name}@{uri}`. Envelopes addressed to
//! another origin are sent by the [`RemoteRouter`]; only
//! [`Value`](actor_core::Value) messages can cross the boundary.
//!
//! ```rust,no_run
//! use actor_core::{ContextBuilder, Message};
//! use actor_remote::ActorServer;
//!
//! let server = ActorServer::start(ContextBuilder::new()).unwrap();
//! let peer = server.remote_reference("echo", "http://10.0.0.2:7777");
//! let reply = server.context().send(&peer, Message::value("ping"));
//! println!("{:?}", reply.get());
//! ```
//!
//! [`CompositeRouter`]: actor_core::CompositeRouter

pub mod codec;
pub mod error;
pub mod reference;
pub mod router;
pub mod server;

pub use codec::{decode_reference, decode_value, encode_reference, encode_value};
pub use error::{RemoteError, Result};
pub use reference::RemoteReferenceFactory;
pub use router::RemoteRouter;
pub use server::ActorServer;
