//! Actor Context
//!
//! The [`Context`] composes everything an actor runtime needs: the shared
//! worker pool, the router, the notary, the mailbox arena, the reference
//! factory and the opener. It is cheap to clone and is handed explicitly to
//! every [`ActorRef`] and [`Frame`](crate::Frame).
//!
//! # Sending
//!
//! Every send is executed as a job on the worker pool and the caller blocks
//! until the envelope has been routed. Envelopes are stamped and routed
//! under one process-wide lock, so every mailbox receives its envelopes in
//! sequence order.
//!
//! # Shutdown
//!
//! [`Context::stop`] drops queued jobs, cancels the response of every
//! pending or running envelope and flushes the envelope log. It is
//! idempotent; dropping the last handle of a context stops it as well.

use crate::actor::ActorRef;
use crate::behavior::ActorBehavior;
use crate::context_inbox::ContextInbox;
use crate::envelope::{Envelope, EnvelopeKind};
use crate::error::{ActorError, Result};
use crate::executor::ContextExecutor;
use crate::logging_router::LoggingRouter;
use crate::message::Message;
use crate::notary::Notary;
use crate::reference::{NamespaceReferenceFactory, Reference, ReferenceFactory};
use crate::response::Response;
use crate::router::{LocalRouter, Router, RouterCollection};
use crate::runner::{DefaultOpener, Opener};
use actor_config::RuntimeConfig;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::any::Any;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info};

/// Serializes stamping and routing of envelopes across all contexts.
///
/// Sequence numbers come from the process-wide [`Sequencer`](crate::Sequencer),
/// so the lock is process-wide as well: an envelope must reach its mailbox
/// before any envelope stamped after it, whichever context routes it. Routing
/// enqueues and schedules a sweep, or hands a request to the transport
/// runtime; it never runs a handler while the lock is held.
static ROUTING_ORDER: Mutex<()> = parking_lot::const_mutex(());

/// Context-wide counters
#[derive(Debug, Default)]
pub struct ContextMetrics {
    pub envelopes_routed: AtomicU64,
    pub envelopes_processed: AtomicU64,
    pub envelopes_failed: AtomicU64,
    pub route_failures: AtomicU64,
    pub envelopes_cancelled: AtomicU64,
}

/// Point-in-time copy of [`ContextMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub envelopes_routed: u64,
    pub envelopes_processed: u64,
    pub envelopes_failed: u64,
    pub route_failures: u64,
    pub envelopes_cancelled: u64,
    pub workers_spawned: u64,
}

impl ContextMetrics {
    pub fn record_routed(&self) {
        self.envelopes_routed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processed(&self) {
        self.envelopes_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.envelopes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_route_failure(&self) {
        self.route_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self, count: usize) {
        self.envelopes_cancelled
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

struct ContextInner {
    config: RuntimeConfig,
    executor: ContextExecutor,
    router: Arc<dyn Router>,
    notary: Notary,
    inbox: ContextInbox,
    opener: Arc<dyn Opener>,
    references: Arc<dyn ReferenceFactory>,
    metrics: ContextMetrics,
    stopped: AtomicBool,
    started_at: SystemTime,
    started: Instant,
}

impl ContextInner {
    fn shutdown(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        let dropped = self.executor.shutdown();
        let cancelled = self.inbox.cancel_all();
        self.metrics.record_cancelled(cancelled);
        self.router.stop();
        info!(dropped, cancelled, "Context stopped");
        true
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Handle to a running actor context
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

/// Non-owning context handle held by scheduled jobs and routers
#[derive(Clone)]
pub struct WeakContext {
    inner: Weak<ContextInner>,
}

impl WeakContext {
    pub fn upgrade(&self) -> Option<Context> {
        self.inner.upgrade().map(|inner| Context { inner })
    }
}

impl Context {
    /// Context with default settings
    pub fn new() -> Result<Self> {
        ContextBuilder::new().build()
    }

    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    pub fn downgrade(&self) -> WeakContext {
        WeakContext {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn executor(&self) -> &ContextExecutor {
        &self.inner.executor
    }

    pub fn router(&self) -> &Arc<dyn Router> {
        &self.inner.router
    }

    pub fn notary(&self) -> &Notary {
        &self.inner.notary
    }

    pub fn inbox(&self) -> &ContextInbox {
        &self.inner.inbox
    }

    pub fn opener(&self) -> &Arc<dyn Opener> {
        &self.inner.opener
    }

    pub fn reference_factory(&self) -> &Arc<dyn ReferenceFactory> {
        &self.inner.references
    }

    pub fn metrics(&self) -> &ContextMetrics {
        &self.inner.metrics
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        let m = &self.inner.metrics;
        MetricsSnapshot {
            envelopes_routed: m.envelopes_routed.load(Ordering::Relaxed),
            envelopes_processed: m.envelopes_processed.load(Ordering::Relaxed),
            envelopes_failed: m.envelopes_failed.load(Ordering::Relaxed),
            route_failures: m.route_failures.load(Ordering::Relaxed),
            envelopes_cancelled: m.envelopes_cancelled.load(Ordering::Relaxed),
            workers_spawned: self.inner.executor.spawned_count(),
        }
    }

    /// Register `object` under a reference created from `name`
    pub fn new_actor<T: ActorBehavior>(&self, name: &str, object: Arc<T>) -> Result<ActorRef> {
        if self.is_stopped() {
            return Err(ActorError::ContextStopped);
        }
        let reference = self.inner.references.create(name);
        self.inner.notary.add(reference.clone(), object)?;
        Ok(self.actor(reference))
    }

    /// Capability handle for `reference`; the actor may live elsewhere
    pub fn actor(&self, reference: Reference) -> ActorRef {
        ActorRef::new(reference, self.clone())
    }

    /// Object registered under `reference`, if it has type `T`
    pub fn object<T: Any + Send + Sync>(&self, reference: &Reference) -> Option<Arc<T>> {
        self.inner
            .notary
            .get(reference)?
            .as_any_arc()
            .downcast::<T>()
            .ok()
    }

    pub fn reference_of<T: ?Sized>(&self, object: &Arc<T>) -> Option<Reference> {
        self.inner.notary.reference_of(object)
    }

    /// Run `command` on the worker pool and block until it has run
    pub fn execute<F>(&self, command: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_stopped() {
            return Err(ActorError::ContextStopped);
        }
        self.inner.executor.execute(command)
    }

    /// Stamp a new envelope and route it; the returned response is its result
    pub fn post(
        &self,
        from: Reference,
        to: Reference,
        message: Message,
        kind: EnvelopeKind,
    ) -> Response {
        self.post_settling(from, to, message, kind, None)
    }

    /// Like [`post`](Self::post), but the new envelope settles `response`
    pub(crate) fn repost(
        &self,
        from: Reference,
        to: Reference,
        message: Message,
        kind: EnvelopeKind,
        response: Response,
    ) -> Response {
        self.post_settling(from, to, message, kind, Some(response))
    }

    fn post_settling(
        &self,
        from: Reference,
        to: Reference,
        message: Message,
        kind: EnvelopeKind,
        existing: Option<Response>,
    ) -> Response {
        let routed = Arc::new(OnceCell::new());
        let slot = routed.clone();
        let context = self.clone();
        let fallback = existing.clone();
        let executed = self.execute(move || {
            slot.get_or_init(|| context.stamp_and_route(from, to, message, kind, existing));
        });

        match routed.get() {
            Some(response) => {
                if let Err(error) = executed {
                    debug!(%error, "Routing job did not finish");
                    response.cancel();
                }
                response.clone()
            }
            None => {
                let response = fallback
                    .unwrap_or_else(|| Response::new(matches!(kind, EnvelopeKind::Await { .. })));
                response.cancel();
                response
            }
        }
    }

    fn stamp_and_route(
        &self,
        from: Reference,
        to: Reference,
        message: Message,
        kind: EnvelopeKind,
        existing: Option<Response>,
    ) -> Response {
        let (envelope, routed) = {
            let _order = ROUTING_ORDER.lock();
            let envelope = match existing {
                Some(response) => Envelope::build_with_response(from, to, message, kind, response),
                None => Envelope::build(from, to, message, kind),
            };
            let routed = self.inner.router.route(&envelope);
            (envelope, routed)
        };
        self.settle_routing(&envelope, routed);
        envelope.response().clone()
    }

    fn settle_routing(&self, envelope: &Envelope, routed: Result<()>) {
        match routed {
            Ok(()) => self.inner.metrics.record_routed(),
            Err(error) => {
                debug!(
                    sequence = envelope.sequence(),
                    actor = %envelope.to(),
                    %error,
                    "Routing failed"
                );
                self.inner.metrics.record_route_failure();
                envelope.response().fail(error);
            }
        }
    }

    /// Route an envelope that was built elsewhere
    pub fn dispatch(&self, envelope: Envelope) -> Response {
        let response = envelope.response().clone();
        let context = self.clone();
        let routed = envelope.clone();
        let executed = self.execute(move || {
            let result = context.inner.router.route(&routed);
            context.settle_routing(&routed, result);
        });
        if let Err(error) = executed {
            debug!(sequence = envelope.sequence(), %error, "Dispatch did not run");
            response.cancel();
        }
        response
    }

    /// Send from no particular actor
    pub fn send(&self, to: &Reference, message: Message) -> Response {
        self.post(Reference::nobody(), to.clone(), message, EnvelopeKind::Normal)
    }

    pub fn await_on(&self, to: &Reference, message: Message) -> Response {
        self.await_from(&Reference::nobody(), to, message, None, None)
    }

    pub fn await_within(&self, to: &Reference, message: Message, deadline: Duration) -> Response {
        self.await_from(&Reference::nobody(), to, message, None, Some(deadline))
    }

    pub fn await_until<F>(&self, to: &Reference, condition: F) -> Response
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.await_from(
            &Reference::nobody(),
            to,
            Message::condition(Arc::new(condition)),
            None,
            None,
        )
    }

    /// Send an await envelope, wait for it, then re-take the caller's slot
    pub(crate) fn await_from(
        &self,
        from: &Reference,
        to: &Reference,
        message: Message,
        caller: Option<u64>,
        deadline: Option<Duration>,
    ) -> Response {
        let response = self.post(
            from.clone(),
            to.clone(),
            message,
            EnvelopeKind::Await { caller },
        );
        response.await_deadline(deadline);
        if let Some(caller) = caller {
            self.inner.inbox.reacquire(from, caller);
        }
        response
    }

    /// Stop the context; returns false if it was already stopped
    pub fn stop(&self) -> bool {
        self.inner.shutdown()
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    pub fn start_time(&self) -> SystemTime {
        self.inner.started_at
    }

    pub fn uptime(&self) -> Duration {
        self.inner.started.elapsed()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("actors", &self.inner.notary.size())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Programmatic configuration of a [`Context`]
pub struct ContextBuilder {
    config: RuntimeConfig,
    router: Option<Arc<dyn Router>>,
    opener: Option<Arc<dyn Opener>>,
    references: Option<Arc<dyn ReferenceFactory>>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::from_config(RuntimeConfig::default())
    }

    pub fn from_config(config: RuntimeConfig) -> Self {
        Self {
            config,
            router: None,
            opener: None,
            references: None,
        }
    }

    /// Primary router; defaults to [`LocalRouter`]
    pub fn with_router(mut self, router: Arc<dyn Router>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn with_opener(mut self, opener: Arc<dyn Opener>) -> Self {
        self.opener = Some(opener);
        self
    }

    pub fn with_reference_factory(mut self, references: Arc<dyn ReferenceFactory>) -> Self {
        self.references = Some(references);
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.config.logging.enabled = enabled;
        self
    }

    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.logging.path = path.into();
        self
    }

    pub fn core_threads(mut self, threads: usize) -> Self {
        self.config.executor.core_threads = threads;
        self
    }

    pub fn max_threads(mut self, threads: usize) -> Self {
        self.config.executor.max_threads = threads;
        self
    }

    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.config.executor.keep_alive_ms = keep_alive.as_millis() as u64;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn build(self) -> Result<Context> {
        self.config
            .validate()
            .map_err(|e| ActorError::configuration(e.to_string(), None))?;

        let logging = if self.config.logging.enabled {
            LoggingRouter::to_file(&self.config.logging.path)?
        } else {
            LoggingRouter::disabled()
        };
        let primary = self
            .router
            .unwrap_or_else(|| Arc::new(LocalRouter::new()));
        let router: Arc<dyn Router> =
            Arc::new(RouterCollection::new(vec![primary, Arc::new(logging)]));
        let references = self.references.unwrap_or_else(|| {
            Arc::new(NamespaceReferenceFactory::new(self.config.namespace.clone()))
        });

        let context = Context {
            inner: Arc::new(ContextInner {
                executor: ContextExecutor::new(self.config.executor.clone()),
                router: router.clone(),
                notary: Notary::new(),
                inbox: ContextInbox::new(),
                opener: self.opener.unwrap_or_else(|| Arc::new(DefaultOpener)),
                references,
                metrics: ContextMetrics::default(),
                stopped: AtomicBool::new(false),
                started_at: SystemTime::now(),
                started: Instant::now(),
                config: self.config,
            }),
        };
        router.bind(&context);

        info!(
            namespace = %context.config().namespace,
            max_threads = context.config().executor.max_threads,
            logging = context.config().logging.enabled,
            "Context started"
        );
        Ok(context)
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
