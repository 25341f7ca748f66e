//! Actor references
//!
//! A [`Reference`] is the address of an actor: a URI-like `name`
//! (`actor://counter`, or `actor://counter@http://10.0.0.2:7777` for an
//! actor living behind a remote endpoint) plus the short `simple_name` it
//! was created from. References compare, hash and order by `name` only.

use actor_config::defaults::naming;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Immutable actor address
#[derive(Clone)]
pub struct Reference {
    name: Arc<str>,
    simple_name: Arc<str>,
}

impl Reference {
    pub fn new(name: impl Into<String>, simple_name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            simple_name: Arc::from(simple_name.into()),
        }
    }

    /// Rebuild a reference from its full name, deriving the simple name
    pub fn parse(name: &str) -> Self {
        let without_scheme = name.split_once("://").map_or(name, |(_, rest)| rest);
        let simple = without_scheme
            .split_once('@')
            .map_or(without_scheme, |(simple, _)| simple);
        Self::new(name, simple)
    }

    /// The absent sender or receiver
    pub fn nobody() -> Self {
        Self::new(format!("{}{}", naming::NAMESPACE, naming::NOBODY), naming::NOBODY)
    }

    pub fn is_nobody(&self) -> bool {
        self.simple_name.as_ref() == naming::NOBODY && !self.name.contains('@')
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn simple_name(&self) -> &str {
        &self.simple_name
    }

    /// Base URI of the endpoint hosting this actor, if it is addressed remotely
    pub fn origin(&self) -> Option<&str> {
        self.name.split_once('@').map(|(_, origin)| origin)
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Reference {}

impl Hash for Reference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for Reference {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Reference {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reference({})", self.name)
    }
}

/// Produces the reference an actor is registered under
pub trait ReferenceFactory: Send + Sync {
    fn create(&self, name: &str) -> Reference;
}

/// Default factory: `"{namespace}{name}"`
#[derive(Debug, Clone)]
pub struct NamespaceReferenceFactory {
    namespace: String,
}

impl NamespaceReferenceFactory {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl Default for NamespaceReferenceFactory {
    fn default() -> Self {
        Self::new(naming::NAMESPACE)
    }
}

impl ReferenceFactory for NamespaceReferenceFactory {
    fn create(&self, name: &str) -> Reference {
        Reference::new(format!("{}{}", self.namespace, name), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_reference_equality_by_name() {
        let a = Reference::new("actor://alpha", "alpha");
        let b = Reference::new("actor://alpha", "other");
        let c = Reference::new("actor://beta", "beta");

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_factory_prefixes_namespace() {
        let factory = NamespaceReferenceFactory::default();
        let reference = factory.create("gateway");
        assert_eq!(reference.name(), "actor://gateway");
        assert_eq!(reference.simple_name(), "gateway");
        assert_eq!(reference, factory.create("gateway"));
    }

    #[test]
    fn test_parse_remote_reference() {
        let reference = Reference::parse("actor://echo-1@http://127.0.0.1:7777");
        assert_eq!(reference.simple_name(), "echo-1");
        assert_eq!(reference.origin(), Some("http://127.0.0.1:7777"));

        let local = Reference::parse("actor://echo-2");
        assert_eq!(local.simple_name(), "echo-2");
        assert_eq!(local.origin(), None);
    }

    #[test]
    fn test_nobody() {
        let nobody = Reference::nobody();
        assert!(nobody.is_nobody());
        assert_eq!(nobody.name(), "actor://NOBODY");
        assert!(!Reference::parse("actor://NOBODY@http://h:1").is_nobody());
    }
}
