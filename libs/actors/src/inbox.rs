//! Per-actor mailbox
//!
//! The [`ObjectInbox`] decides *when* an envelope of its actor may run:
//!
//! - **Ordered**: pending envelopes are kept by sequence number and the
//!   lowest eligible one is dequeued next
//! - **Run-to-completion**: at most one normal envelope holds the Busy slot;
//!   while it does, only envelopes the actor sent to itself may run
//! - **Awaiting**: when an envelope this actor awaits is opened by its
//!   target, the awaiting handler's slot is released so the mailbox keeps
//!   moving; the handler re-takes the slot before it continues
//!
//! ```text
//!            get() picks lowest pending            on_complete()
//!   Idle ───────────────────────────────▶ Busy ─────────────────▶ Idle
//!                                          │  ▲
//!             awaited envelope opened      │  │ reacquire() after the wait
//!                                          ▼  │
//!                                  slot released (Awaiting)
//! ```
//!
//! Several workers may sweep the same inbox at once; every state change
//! happens under the inbox lock, so exclusivity never depends on who sweeps.

use crate::context::Context;
use crate::envelope::Envelope;
use crate::error::{ActorError, Result};
use crate::reference::Reference;
use crate::runner::{EnvelopeListener, EnvelopeRunner};
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Default)]
struct InboxState {
    pending: BTreeMap<u64, Envelope>,
    /// Pending envelopes sent by the owner to itself
    self_pending: BTreeSet<u64>,
    /// Sequence of the normal envelope holding the Busy slot
    processing: Option<u64>,
    /// Envelopes sent by the owner that are being awaited right now
    awaiting: HashSet<u64>,
    /// Handlers whose slot was handed over during an await
    released: HashSet<u64>,
    /// Released handlers currently waiting to take the slot back
    resuming: usize,
    in_flight: HashMap<u64, Envelope>,
    closed: bool,
}

/// Mailbox of one actor
pub struct ObjectInbox {
    owner: Reference,
    state: Mutex<InboxState>,
    slot_free: Condvar,
    scheduled: AtomicBool,
}

impl ObjectInbox {
    pub fn new(owner: Reference) -> Self {
        Self {
            owner,
            state: Mutex::new(InboxState::default()),
            slot_free: Condvar::new(),
            scheduled: AtomicBool::new(false),
        }
    }

    pub fn owner(&self) -> &Reference {
        &self.owner
    }

    /// Enqueue without triggering execution
    pub fn post(&self, envelope: Envelope) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(ActorError::ContextStopped);
        }
        let sequence = envelope.sequence();
        if envelope.is_self_envelope() {
            state.self_pending.insert(sequence);
        }
        state.pending.insert(sequence, envelope);
        trace!(actor = %self.owner, sequence, "Envelope posted");
        Ok(())
    }

    /// Dequeue the next envelope allowed to run, if any
    pub fn get(&self) -> Option<Envelope> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }

        let sequence = if state.processing.is_none() && state.resuming == 0 {
            let sequence = *state.pending.keys().next()?;
            state.processing = Some(sequence);
            sequence
        } else {
            *state.self_pending.iter().next()?
        };

        state.self_pending.remove(&sequence);
        let envelope = state.pending.remove(&sequence)?;
        state.in_flight.insert(sequence, envelope.clone());
        Some(envelope)
    }

    /// Drain every runnable envelope on the calling worker
    pub fn run(self: &Arc<Self>, context: &Context) {
        self.scheduled.store(false, Ordering::Release);
        let listener: Arc<dyn EnvelopeListener> = self.clone();
        while let Some(envelope) = self.get() {
            let runner = EnvelopeRunner::new(envelope, Some(listener.clone()));
            context.opener().open(runner, context);
        }
        std::thread::yield_now();
    }

    /// Claim the right to submit a sweep; false when one is already queued
    pub(crate) fn mark_scheduled(&self) -> bool {
        !self.scheduled.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn clear_scheduled(&self) {
        self.scheduled.store(false, Ordering::Release);
    }

    /// An envelope sent by this actor and awaited by handler `caller` was opened
    pub(crate) fn on_await_start(&self, envelope: &Envelope) {
        let mut state = self.state.lock();
        state.awaiting.insert(envelope.sequence());
        if let Some(caller) = envelope.caller() {
            if state.processing == Some(caller) && !envelope.response().is_done() {
                state.processing = None;
                state.released.insert(caller);
                debug!(actor = %self.owner, caller, "Slot released while awaiting");
                self.slot_free.notify_all();
            }
        }
    }

    pub(crate) fn on_await_end(&self, envelope: &Envelope) {
        self.state.lock().awaiting.remove(&envelope.sequence());
    }

    /// Block until handler `caller` holds the slot again, if it gave it up
    pub fn reacquire(&self, caller: u64) {
        let mut state = self.state.lock();
        if !state.released.remove(&caller) {
            return;
        }
        state.resuming += 1;
        while state.processing.is_some() && !state.closed {
            self.slot_free.wait(&mut state);
        }
        state.resuming -= 1;
        if !state.closed {
            state.processing = Some(caller);
            debug!(actor = %self.owner, caller, "Slot reacquired");
        }
    }

    pub fn is_busy(&self) -> bool {
        self.state.lock().processing.is_some()
    }

    pub fn is_awaiting(&self) -> bool {
        !self.state.lock().awaiting.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.state.lock().pending.is_empty()
    }

    /// Close the inbox and cancel every pending and in-flight envelope
    pub fn cancel_all(&self) -> usize {
        let envelopes: Vec<Envelope> = {
            let mut state = self.state.lock();
            state.closed = true;
            state.self_pending.clear();
            state.processing = None;
            let pending = std::mem::take(&mut state.pending);
            let in_flight = std::mem::take(&mut state.in_flight);
            pending.into_values().chain(in_flight.into_values()).collect()
        };
        self.slot_free.notify_all();

        envelopes
            .iter()
            .filter(|envelope| envelope.response().cancel())
            .count()
    }
}

impl EnvelopeListener for ObjectInbox {
    fn on_open(&self, envelope: &Envelope, context: &Context) {
        trace!(actor = %self.owner, sequence = envelope.sequence(), "Envelope opened");
        if envelope.is_await() {
            let sender = context.inbox().inbox(envelope.from());
            sender.on_await_start(envelope);
            context.inbox().schedule(&sender, context);
        }
    }

    fn on_complete(&self, envelope: &Envelope, context: &Context) {
        let sequence = envelope.sequence();
        let more = {
            let mut state = self.state.lock();
            if state.processing == Some(sequence) {
                state.processing = None;
            }
            state.in_flight.remove(&sequence);
            !state.pending.is_empty()
        };
        self.slot_free.notify_all();

        if envelope.is_await() {
            let sender = context.inbox().inbox(envelope.from());
            sender.on_await_end(envelope);
            context.inbox().schedule(&sender, context);
        }
        if more {
            if let Some(this) = context.inbox().find(&self.owner) {
                context.inbox().schedule(&this, context);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    fn reference(name: &str) -> Reference {
        Reference::new(format!("actor://{}", name), name)
    }

    fn envelope(from: &str, to: &str) -> Envelope {
        Envelope::new(reference(from), reference(to), Message::run(|_| Ok(())))
    }

    fn finish(inbox: &ObjectInbox, envelope: &Envelope) {
        let mut state = inbox.state.lock();
        if state.processing == Some(envelope.sequence()) {
            state.processing = None;
        }
        state.in_flight.remove(&envelope.sequence());
    }

    #[test]
    fn test_dequeues_in_sequence_order() {
        let inbox = ObjectInbox::new(reference("r"));
        let first = envelope("a", "r");
        let second = envelope("b", "r");
        inbox.post(second.clone()).unwrap();
        inbox.post(first.clone()).unwrap();

        let got = inbox.get().unwrap();
        assert_eq!(got, first);
        assert!(inbox.is_busy());
        assert!(inbox.get().is_none());

        finish(&inbox, &got);
        assert_eq!(inbox.get().unwrap(), second);
    }

    #[test]
    fn test_self_envelope_skips_ahead_while_busy() {
        let inbox = ObjectInbox::new(reference("r"));
        let normal = envelope("a", "r");
        let other = envelope("b", "r");
        let own = envelope("r", "r");
        inbox.post(normal.clone()).unwrap();
        inbox.post(other.clone()).unwrap();
        inbox.post(own.clone()).unwrap();

        assert_eq!(inbox.get().unwrap(), normal);
        assert_eq!(inbox.get().unwrap(), own);
        assert!(inbox.get().is_none());
        assert_eq!(inbox.pending_len(), 1);
    }

    #[test]
    fn test_await_start_releases_callers_slot() {
        let inbox = ObjectInbox::new(reference("r"));
        let handler = envelope("a", "r");
        let queued = envelope("b", "r");
        inbox.post(handler.clone()).unwrap();
        inbox.post(queued.clone()).unwrap();
        assert_eq!(inbox.get().unwrap(), handler);

        let awaited = Envelope::awaiting(
            reference("r"),
            reference("x"),
            Message::value(()),
            Some(handler.sequence()),
        );
        inbox.on_await_start(&awaited);
        assert!(inbox.is_awaiting());
        assert!(!inbox.is_busy());

        assert_eq!(inbox.get().unwrap(), queued);
        finish(&inbox, &queued);

        inbox.reacquire(handler.sequence());
        assert!(inbox.is_busy());
        inbox.on_await_end(&awaited);
        assert!(!inbox.is_awaiting());
    }

    #[test]
    fn test_settled_await_does_not_release() {
        let inbox = ObjectInbox::new(reference("r"));
        let handler = envelope("a", "r");
        inbox.post(handler.clone()).unwrap();
        inbox.get().unwrap();

        let awaited = Envelope::awaiting(
            reference("r"),
            reference("x"),
            Message::value(()),
            Some(handler.sequence()),
        );
        awaited.response().cancel();
        inbox.on_await_start(&awaited);
        assert!(inbox.is_busy());

        // nothing was released, so this returns immediately
        inbox.reacquire(handler.sequence());
        assert!(inbox.is_busy());
    }

    #[test]
    fn test_cancel_all_closes_inbox() {
        let inbox = ObjectInbox::new(reference("r"));
        let envelopes: Vec<_> = (0..5).map(|_| envelope("a", "r")).collect();
        for e in &envelopes {
            inbox.post(e.clone()).unwrap();
        }
        inbox.get().unwrap();

        assert_eq!(inbox.cancel_all(), 5);
        assert!(envelopes.iter().all(|e| e.response().is_cancelled()));
        assert!(inbox.get().is_none());
        assert!(matches!(
            inbox.post(envelope("a", "r")),
            Err(ActorError::ContextStopped)
        ));
    }

    #[test]
    fn test_schedule_flag_deduplicates() {
        let inbox = ObjectInbox::new(reference("r"));
        assert!(inbox.mark_scheduled());
        assert!(!inbox.mark_scheduled());
        inbox.clear_scheduled();
        assert!(inbox.mark_scheduled());
    }
}
