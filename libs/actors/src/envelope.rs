//! Envelopes: one message on its way from a sender to a receiver
//!
//! An envelope is stamped with a process-wide sequence number when it is
//! built and owns the [`Response`] its result is delivered through. Await
//! envelopes additionally remember the sequence of the envelope whose
//! handler is waiting on them, so the sender's mailbox can hand that
//! handler's slot to other work while the wait lasts.

use crate::message::{Message, MessageKind};
use crate::reference::Reference;
use crate::response::Response;
use crate::sequencer::Sequencer;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// How the receiver's inbox treats the envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    Normal,
    /// `caller` is the sequence of the awaiting handler's envelope, if any
    Await { caller: Option<u64> },
}

struct Inner {
    from: Reference,
    to: Reference,
    kind: EnvelopeKind,
    sequence: u64,
    message_kind: MessageKind,
    message: Mutex<Option<Message>>,
    response: Response,
}

/// Immutable routing record shared by router, inbox and runner
#[derive(Clone)]
pub struct Envelope {
    inner: Arc<Inner>,
}

impl Envelope {
    pub fn new(from: Reference, to: Reference, message: Message) -> Self {
        Self::build(from, to, message, EnvelopeKind::Normal)
    }

    /// Envelope whose sender is waiting on the response
    pub fn awaiting(from: Reference, to: Reference, message: Message, caller: Option<u64>) -> Self {
        Self::build(from, to, message, EnvelopeKind::Await { caller })
    }

    pub fn build(from: Reference, to: Reference, message: Message, kind: EnvelopeKind) -> Self {
        let awaitable = matches!(kind, EnvelopeKind::Await { .. });
        Self::build_with_response(from, to, message, kind, Response::new(awaitable))
    }

    /// Freshly stamped envelope that settles an existing response
    pub fn build_with_response(
        from: Reference,
        to: Reference,
        message: Message,
        kind: EnvelopeKind,
        response: Response,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                sequence: Sequencer::global().next(),
                message_kind: message.kind(),
                message: Mutex::new(Some(message)),
                response,
                from,
                to,
                kind,
            }),
        }
    }

    pub fn from(&self) -> &Reference {
        &self.inner.from
    }

    pub fn to(&self) -> &Reference {
        &self.inner.to
    }

    pub fn sequence(&self) -> u64 {
        self.inner.sequence
    }

    pub fn kind(&self) -> EnvelopeKind {
        self.inner.kind
    }

    pub fn message_kind(&self) -> MessageKind {
        self.inner.message_kind
    }

    pub fn response(&self) -> &Response {
        &self.inner.response
    }

    pub fn is_self_envelope(&self) -> bool {
        self.inner.from == self.inner.to
    }

    pub fn is_await(&self) -> bool {
        matches!(self.inner.kind, EnvelopeKind::Await { .. })
    }

    /// Sequence of the handler waiting on this envelope
    pub fn caller(&self) -> Option<u64> {
        match self.inner.kind {
            EnvelopeKind::Await { caller } => caller,
            EnvelopeKind::Normal => None,
        }
    }

    /// Inspect the message without consuming it
    pub fn with_message<R>(&self, f: impl FnOnce(Option<&Message>) -> R) -> R {
        let guard = self.inner.message.lock();
        f(guard.as_ref())
    }

    /// Hand the message to the runner; `None` once taken
    pub(crate) fn take_message(&self) -> Option<Message> {
        self.inner.message.lock().take()
    }

    /// Identifier used in the envelope log
    pub fn message_id(&self) -> String {
        format!("{}-{}", self.inner.message_kind.label(), self.inner.sequence)
    }
}

impl PartialEq for Envelope {
    fn eq(&self, other: &Self) -> bool {
        self.inner.sequence == other.inner.sequence
    }
}

impl Eq for Envelope {}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("sequence", &self.inner.sequence)
            .field("from", &self.inner.from)
            .field("to", &self.inner.to)
            .field("kind", &self.inner.kind)
            .field("message", &self.inner.message_kind)
            .finish()
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Envelope(id: {}, from: {}, to: {}, message: {})",
            self.inner.sequence,
            self.inner.from,
            self.inner.to,
            self.inner.message_kind.label()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(name: &str) -> Reference {
        Reference::new(format!("actor://{}", name), name)
    }

    #[test]
    fn test_sequence_assigned_at_construction() {
        let a = Envelope::new(reference("a"), reference("b"), Message::value(1i64));
        let b = Envelope::new(reference("a"), reference("b"), Message::value(2i64));
        assert!(b.sequence() > a.sequence());
        assert_ne!(a, b);
    }

    #[test]
    fn test_self_and_await_flags() {
        let normal = Envelope::new(reference("a"), reference("a"), Message::run(|_| Ok(())));
        assert!(normal.is_self_envelope());
        assert!(!normal.is_await());
        assert!(!normal.response().is_awaitable());

        let awaiting = Envelope::awaiting(reference("a"), reference("b"), Message::value(()), Some(7));
        assert!(!awaiting.is_self_envelope());
        assert!(awaiting.is_await());
        assert_eq!(awaiting.caller(), Some(7));
        assert!(awaiting.response().is_awaitable());
    }

    #[test]
    fn test_response_identity_is_stable() {
        let envelope = Envelope::new(reference("a"), reference("b"), Message::value(()));
        let first = envelope.response().clone();
        envelope.response().complete(3u8);
        assert_eq!(first.value::<u8>(), Some(3));
    }

    #[test]
    fn test_restamped_envelope_shares_response() {
        let first = Envelope::awaiting(reference("a"), reference("b"), Message::value(()), None);
        let again = Envelope::build_with_response(
            reference("a"),
            reference("b"),
            Message::value(()),
            first.kind(),
            first.response().clone(),
        );
        assert!(again.sequence() > first.sequence());
        again.response().complete(true);
        assert_eq!(first.response().value::<bool>(), Some(true));
    }

    #[test]
    fn test_message_taken_once() {
        let envelope = Envelope::new(reference("a"), reference("b"), Message::value("hi"));
        assert_eq!(
            envelope.with_message(|m| m.and_then(Message::as_value).cloned()),
            Some(crate::Value::from("hi"))
        );
        assert!(envelope.take_message().is_some());
        assert!(envelope.take_message().is_none());
        assert!(envelope.message_id().starts_with("value-"));
    }
}
