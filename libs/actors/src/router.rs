//! Envelope routing
//!
//! A [`Router`] decides where an envelope goes. Routers are bound to their
//! context once, before the first envelope is routed.
//!
//! - **[`LocalRouter`]**: delivers to a mailbox of this context
//! - **[`CompositeRouter`]**: picks the local or the remote router by the
//!   origin of the receiver reference
//! - **[`RouterCollection`]**: offers every envelope to several routers
//!
//! Routing failures are returned to the caller, which fails the envelope's
//! response with them.

use crate::context::{Context, WeakContext};
use crate::envelope::Envelope;
use crate::error::{ActorError, Result};
use crate::reference::Reference;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::trace;

/// Delivery strategy for envelopes
pub trait Router: Send + Sync {
    fn route(&self, envelope: &Envelope) -> Result<()>;

    /// Attach the router to its context
    fn bind(&self, context: &Context) {
        let _ = context;
    }

    /// Release background resources; called once when the context stops
    fn stop(&self) {}
}

/// Holds the weak context handle a router is bound to
#[derive(Default)]
pub struct Binding {
    context: OnceCell<WeakContext>,
}

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    /// First bind wins; later binds are ignored
    pub fn bind(&self, context: &Context) {
        let _ = self.context.set(context.downgrade());
    }

    pub fn context(&self) -> Result<Context> {
        self.context
            .get()
            .and_then(WeakContext::upgrade)
            .ok_or(ActorError::ContextStopped)
    }
}

/// Delivers envelopes to mailboxes of the bound context
#[derive(Default)]
pub struct LocalRouter {
    binding: Binding,
}

impl LocalRouter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Router for LocalRouter {
    fn route(&self, envelope: &Envelope) -> Result<()> {
        let context = self.binding.context()?;
        let to = envelope.to();
        if !to.is_nobody() && !context.notary().contains(to) {
            return Err(ActorError::unknown_actor(to));
        }
        trace!(sequence = envelope.sequence(), actor = %to, "Routing locally");
        context.inbox().post(envelope.clone(), &context)
    }

    fn bind(&self, context: &Context) {
        self.binding.bind(context);
    }
}

/// Offers every envelope to each member, reporting the first failure
pub struct RouterCollection {
    routers: Vec<Arc<dyn Router>>,
}

impl RouterCollection {
    pub fn new(routers: Vec<Arc<dyn Router>>) -> Self {
        Self { routers }
    }

    pub fn routers(&self) -> &[Arc<dyn Router>] {
        &self.routers
    }
}

impl Router for RouterCollection {
    fn route(&self, envelope: &Envelope) -> Result<()> {
        let mut first_error = None;
        for router in &self.routers {
            if let Err(error) = router.route(envelope) {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn bind(&self, context: &Context) {
        for router in &self.routers {
            router.bind(context);
        }
    }

    fn stop(&self) {
        for router in &self.routers {
            router.stop();
        }
    }
}

/// Sends envelopes for actors of this origin to `local`, everything else to `remote`
pub struct CompositeRouter {
    origin: String,
    local: Arc<dyn Router>,
    remote: Arc<dyn Router>,
}

impl CompositeRouter {
    pub fn new(origin: impl Into<String>, local: Arc<dyn Router>, remote: Arc<dyn Router>) -> Self {
        Self {
            origin: origin.into(),
            local,
            remote,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// True for references without an origin or with this router's origin
    pub fn is_local(&self, reference: &Reference) -> bool {
        match reference.origin() {
            None => true,
            Some(origin) => origin == self.origin,
        }
    }
}

impl Router for CompositeRouter {
    fn route(&self, envelope: &Envelope) -> Result<()> {
        if self.is_local(envelope.to()) {
            self.local.route(envelope)
        } else {
            self.remote.route(envelope)
        }
    }

    fn bind(&self, context: &Context) {
        self.local.bind(context);
        self.remote.bind(context);
    }

    fn stop(&self) {
        self.local.stop();
        self.remote.stop();
    }
}
