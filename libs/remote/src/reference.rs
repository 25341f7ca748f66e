//! References addressable from other processes

use actor_core::{Reference, ReferenceFactory};

/// Creates `"{namespace}{name}@{origin}"` references, where origin is the
/// base URI of the endpoint hosting the actor
#[derive(Debug, Clone)]
pub struct RemoteReferenceFactory {
    namespace: String,
    origin: String,
}

impl RemoteReferenceFactory {
    pub fn new(namespace: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            origin: origin.into(),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

impl ReferenceFactory for RemoteReferenceFactory {
    fn create(&self, name: &str) -> Reference {
        Reference::new(format!("{}{}@{}", self.namespace, name, self.origin), name)
    }
}
