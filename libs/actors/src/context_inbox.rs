//! Arena of mailboxes keyed by reference
//!
//! Inboxes are created lazily on first delivery. Envelopes addressed to
//! [`Reference::nobody`] land in a sentinel inbox so that replies to
//! anonymous senders still run and complete their responses.

use crate::context::Context;
use crate::envelope::Envelope;
use crate::error::Result;
use crate::inbox::ObjectInbox;
use crate::reference::Reference;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::warn;

/// Every [`ObjectInbox`] of a context
pub struct ContextInbox {
    inboxes: DashMap<Reference, Arc<ObjectInbox>>,
    nobody: Arc<ObjectInbox>,
}

impl ContextInbox {
    pub fn new() -> Self {
        Self {
            inboxes: DashMap::new(),
            nobody: Arc::new(ObjectInbox::new(Reference::nobody())),
        }
    }

    /// Inbox of `owner`, created on first use
    pub fn inbox(&self, owner: &Reference) -> Arc<ObjectInbox> {
        if owner.is_nobody() {
            return self.nobody.clone();
        }
        if let Some(inbox) = self.inboxes.get(owner) {
            return inbox.clone();
        }
        self.inboxes
            .entry(owner.clone())
            .or_insert_with(|| Arc::new(ObjectInbox::new(owner.clone())))
            .clone()
    }

    /// Inbox of `owner` if one exists
    pub fn find(&self, owner: &Reference) -> Option<Arc<ObjectInbox>> {
        if owner.is_nobody() {
            return Some(self.nobody.clone());
        }
        self.inboxes.get(owner).map(|inbox| inbox.clone())
    }

    /// Deliver to the receiver's inbox and make sure it gets swept
    pub fn post(&self, envelope: Envelope, context: &Context) -> Result<()> {
        let inbox = self.inbox(envelope.to());
        inbox.post(envelope)?;
        self.schedule(&inbox, context);
        Ok(())
    }

    /// Submit a sweep of `inbox` unless one is already queued
    pub fn schedule(&self, inbox: &Arc<ObjectInbox>, context: &Context) {
        if !inbox.mark_scheduled() {
            return;
        }
        let target = inbox.clone();
        let weak = context.downgrade();
        let submitted = context.executor().submit(move || {
            if let Some(context) = weak.upgrade() {
                target.run(&context);
            }
        });
        if let Err(error) = submitted {
            inbox.clear_scheduled();
            if !context.is_stopped() {
                warn!(actor = %inbox.owner(), %error, "Failed to schedule inbox");
            }
            inbox.cancel_all();
        }
    }

    /// Re-take handler `caller`'s slot in `owner`'s inbox after an await
    pub fn reacquire(&self, owner: &Reference, caller: u64) {
        if let Some(inbox) = self.find(owner) {
            inbox.reacquire(caller);
        }
    }

    /// Cancel everything queued or running in every inbox
    pub fn cancel_all(&self) -> usize {
        let mut cancelled = self.nobody.cancel_all();
        for entry in self.inboxes.iter() {
            cancelled += entry.value().cancel_all();
        }
        cancelled
    }

    /// Number of actor inboxes created so far
    pub fn len(&self) -> usize {
        self.inboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inboxes.is_empty()
    }
}

impl Default for ContextInbox {
    fn default() -> Self {
        Self::new()
    }
}
