//! Envelope execution
//!
//! - **[`EnvelopeRunner`]**: opens an envelope, runs its payload guarded
//!   against errors and panics, completes the response and reports back to
//!   the receiving inbox
//! - **[`Opener`]**: the seam deciding *how* a dequeued envelope runs;
//!   [`DefaultOpener`] runs it inline on the sweeping worker
//! - **[`Frame`]**: what a handler sees of the envelope it is processing
//!
//! ```text
//!   ObjectInbox::run ──get()──▶ Opener::open ──▶ EnvelopeRunner::run
//!         ▲                                        │ on_open
//!         │                                        │ payload (guarded)
//!         └────────── on_complete ◀────────────────┘ response settled
//! ```

use crate::actor::ActorRef;
use crate::context::Context;
use crate::envelope::{Envelope, EnvelopeKind};
use crate::error::ActorError;
use crate::message::{Body, ConditionFn, Message, Payload, Value};
use crate::reference::Reference;
use crate::response::Response;
use std::any::Any;
use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Receives the lifecycle notifications of an envelope
pub trait EnvelopeListener: Send + Sync {
    fn on_open(&self, envelope: &Envelope, context: &Context);

    fn on_complete(&self, envelope: &Envelope, context: &Context);
}

/// Decides how a dequeued envelope is executed
pub trait Opener: Send + Sync {
    fn open(&self, runner: EnvelopeRunner, context: &Context);
}

/// Runs the envelope on the calling worker
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultOpener;

impl Opener for DefaultOpener {
    fn open(&self, runner: EnvelopeRunner, context: &Context) {
        runner.run(context);
    }
}

enum Execution {
    Done(Payload),
    /// The response will be settled by a follow-up envelope
    Deferred,
}

/// One envelope bound to the listener that must hear about it
pub struct EnvelopeRunner {
    envelope: Envelope,
    listener: Option<Arc<dyn EnvelopeListener>>,
}

impl EnvelopeRunner {
    pub fn new(envelope: Envelope, listener: Option<Arc<dyn EnvelopeListener>>) -> Self {
        Self { envelope, listener }
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Open, execute and complete the envelope
    pub fn run(self, context: &Context) {
        if let Some(listener) = &self.listener {
            listener.on_open(&self.envelope, context);
        }

        let response = self.envelope.response().clone();
        if response.is_done() {
            debug!(sequence = self.envelope.sequence(), "Skipping settled envelope");
        } else {
            match self.envelope.take_message() {
                Some(message) => self.execute(message, &response, context),
                None => {
                    response.fail(ActorError::invalid_message("message already consumed"));
                }
            }
        }

        if let Some(listener) = &self.listener {
            listener.on_complete(&self.envelope, context);
        }
    }

    fn execute(&self, message: Message, response: &Response, context: &Context) {
        let frame = Frame::new(self.envelope.clone(), context.clone());
        let _running = RunningHandler::enter(&self.envelope);
        let result = catch_unwind(AssertUnwindSafe(|| invoke(message, &frame)));

        match result {
            Ok(Ok(Execution::Done(payload))) => {
                context.metrics().record_processed();
                response.complete_payload(payload);
            }
            Ok(Ok(Execution::Deferred)) => {}
            Ok(Err(error)) => {
                debug!(
                    sequence = self.envelope.sequence(),
                    actor = %self.envelope.to(),
                    %error,
                    "Envelope failed"
                );
                context.metrics().record_failed();
                response.fail(error);
            }
            Err(panic) => {
                let error = ActorError::panicked(panic.as_ref());
                warn!(
                    sequence = self.envelope.sequence(),
                    actor = %self.envelope.to(),
                    %error,
                    "Handler panicked"
                );
                context.metrics().record_failed();
                response.fail(error);
            }
        }
    }
}

fn invoke(message: Message, frame: &Frame) -> Result<Execution, ActorError> {
    match message.into_body() {
        Body::Computation(f) => f(frame)
            .map(Execution::Done)
            .map_err(ActorError::from_handler),
        Body::Procedure(f) => f(frame)
            .map(|()| Execution::Done(Arc::new(())))
            .map_err(ActorError::from_handler),
        Body::Value(value) => {
            let behavior = frame
                .context()
                .notary()
                .get(frame.receiver())
                .ok_or_else(|| ActorError::unsupported(frame.receiver()))?;
            behavior
                .on_message(value, frame)
                .map(|reply| Execution::Done(Arc::new(reply)))
                .map_err(ActorError::from_handler)
        }
        Body::Condition(condition) => poll_condition(condition, frame),
    }
}

/// Check the condition; when false, re-send it as a fresh await settling the same response
fn poll_condition(condition: ConditionFn, frame: &Frame) -> Result<Execution, ActorError> {
    if condition() {
        return Ok(Execution::Done(Arc::new(true)));
    }

    let envelope = frame.envelope();
    frame.context().repost(
        envelope.from().clone(),
        envelope.to().clone(),
        Message::condition(condition),
        EnvelopeKind::Await {
            caller: envelope.caller(),
        },
        envelope.response().clone(),
    );
    Ok(Execution::Deferred)
}

thread_local! {
    /// Handlers running on this thread, innermost last
    static RUNNING: RefCell<Vec<(Reference, u64)>> = RefCell::new(Vec::new());
}

struct RunningHandler;

impl RunningHandler {
    fn enter(envelope: &Envelope) -> Self {
        RUNNING.with(|running| {
            running
                .borrow_mut()
                .push((envelope.to().clone(), envelope.sequence()))
        });
        RunningHandler
    }
}

impl Drop for RunningHandler {
    fn drop(&mut self) {
        RUNNING.with(|running| {
            running.borrow_mut().pop();
        });
    }
}

/// Sequence of the envelope `actor` is handling on the calling thread
pub(crate) fn running_sequence(actor: &Reference) -> Option<u64> {
    RUNNING.with(|running| {
        running
            .borrow()
            .iter()
            .rev()
            .find(|(reference, _)| reference == actor)
            .map(|(_, sequence)| *sequence)
    })
}

/// The envelope a handler is processing, together with its context
#[derive(Clone)]
pub struct Frame {
    envelope: Envelope,
    context: Context,
}

impl Frame {
    pub(crate) fn new(envelope: Envelope, context: Context) -> Self {
        Self { envelope, context }
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn sequence(&self) -> u64 {
        self.envelope.sequence()
    }

    pub fn sender(&self) -> &Reference {
        self.envelope.from()
    }

    /// The actor running this handler
    pub fn receiver(&self) -> &Reference {
        self.envelope.to()
    }

    /// Handle of the actor running this handler
    pub fn actor(&self) -> ActorRef {
        self.context.actor(self.receiver().clone())
    }

    /// Object registered under `reference`
    pub fn object<T: Any + Send + Sync>(&self, reference: &Reference) -> Option<Arc<T>> {
        self.context.object::<T>(reference)
    }

    /// Object of the actor running this handler
    pub fn this<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.object::<T>(self.receiver())
    }

    pub fn sender_object<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.object::<T>(self.sender())
    }

    /// Send from the running actor
    pub fn send(&self, to: &Reference, message: Message) -> Response {
        self.context.post(
            self.receiver().clone(),
            to.clone(),
            message,
            EnvelopeKind::Normal,
        )
    }

    /// Send back to the sender of the current envelope
    pub fn reply(&self, message: Message) -> Response {
        self.send(self.sender(), message)
    }

    /// Send a value back to the sender of the current envelope
    pub fn reply_value(&self, value: impl Into<Value>) -> Response {
        self.reply(Message::value(value))
    }

    /// Wait for `to` to process `message`, letting this actor's mailbox progress meanwhile
    pub fn await_on(&self, to: &Reference, message: Message) -> Response {
        self.await_within(to, message, None)
    }

    pub fn await_within(
        &self,
        to: &Reference,
        message: Message,
        deadline: Option<Duration>,
    ) -> Response {
        self.context.await_from(
            self.receiver(),
            to,
            message,
            Some(self.envelope.sequence()),
            deadline,
        )
    }

    /// Wait until `condition` holds, evaluated on `to`'s mailbox
    pub fn await_until<F>(&self, to: &Reference, condition: F) -> Response
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.context.await_from(
            self.receiver(),
            to,
            Message::condition(Arc::new(condition)),
            Some(self.envelope.sequence()),
            None,
        )
    }
}
