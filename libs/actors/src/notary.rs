//! Actor Notary
//!
//! Two-way registry between references and the objects bound to them. A
//! reference maps to at most one object and an object is registered under
//! at most one reference; attempts to register either twice are rejected.

use crate::behavior::ActorBehavior;
use crate::error::{ActorError, Result};
use crate::reference::Reference;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Identity of a bound object: the address of its allocation
fn object_key<T: ?Sized>(object: &Arc<T>) -> usize {
    Arc::as_ptr(object) as *const () as usize
}

#[derive(Default)]
struct Entries {
    by_reference: HashMap<Reference, Arc<dyn ActorBehavior>>,
    by_object: HashMap<usize, Reference>,
}

/// Registry of the actors living in one context
#[derive(Default)]
pub struct Notary {
    entries: RwLock<Entries>,
}

impl Notary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `object` to `reference`
    pub fn add(&self, reference: Reference, object: Arc<dyn ActorBehavior>) -> Result<()> {
        let key = object_key(&object);
        let mut entries = self.entries.write();
        if entries.by_reference.contains_key(&reference) {
            return Err(ActorError::duplicate_actor(&reference));
        }
        if let Some(existing) = entries.by_object.get(&key) {
            return Err(ActorError::duplicate_actor(existing));
        }
        debug!(actor = %reference, "Registering actor");
        entries.by_object.insert(key, reference.clone());
        entries.by_reference.insert(reference, object);
        Ok(())
    }

    pub fn get(&self, reference: &Reference) -> Option<Arc<dyn ActorBehavior>> {
        self.entries.read().by_reference.get(reference).cloned()
    }

    /// Reference an object is registered under
    pub fn reference_of<T: ?Sized>(&self, object: &Arc<T>) -> Option<Reference> {
        self.entries.read().by_object.get(&object_key(object)).cloned()
    }

    /// Find a reference by its full or simple name
    pub fn identify(&self, name: &str) -> Option<Reference> {
        let entries = self.entries.read();
        entries
            .by_reference
            .keys()
            .find(|reference| reference.name() == name)
            .or_else(|| {
                entries
                    .by_reference
                    .keys()
                    .find(|reference| reference.simple_name() == name)
            })
            .cloned()
    }

    pub fn contains(&self, reference: &Reference) -> bool {
        self.entries.read().by_reference.contains_key(reference)
    }

    /// Unbind a reference, returning its object
    pub fn remove(&self, reference: &Reference) -> Option<Arc<dyn ActorBehavior>> {
        let mut entries = self.entries.write();
        let object = entries.by_reference.remove(reference)?;
        entries.by_object.remove(&object_key(&object));
        debug!(actor = %reference, "Actor removed");
        Some(object)
    }

    pub fn size(&self) -> usize {
        self.entries.read().by_reference.len()
    }

    pub fn references(&self) -> Vec<Reference> {
        self.entries.read().by_reference.keys().cloned().collect()
    }
}
