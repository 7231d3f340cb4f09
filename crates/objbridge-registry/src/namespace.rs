//! Namespace table - wrapped native namespaces by name.
//!
//! The table does not own its namespaces: it holds weak references. A dead
//! entry counts as absent and is pruned the next time a namespace is added;
//! owners that want it gone sooner call [`NamespaceRegistry::remove`] when
//! they drop a namespace.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;
use tracing::debug;

use objbridge_core::Value;

/// Shared handle to a namespace.
pub type NamespaceRef = Rc<Namespace>;

/// A wrapped native namespace: a name and its members.
pub struct Namespace {
    name: String,
    members: RefCell<FxHashMap<String, Value>>,
}

impl Namespace {
    /// Create an empty namespace.
    pub fn new(name: impl Into<String>) -> NamespaceRef {
        Rc::new(Self {
            name: name.into(),
            members: RefCell::new(FxHashMap::default()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add or replace a member.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.members.borrow_mut().insert(key.into(), value);
    }

    /// Copy of a member value.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.members.borrow().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.members.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.borrow().is_empty()
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name)
            .field("members", &self.len())
            .finish()
    }
}

/// Name to namespace table.
#[derive(Debug, Default)]
pub struct NamespaceRegistry {
    namespaces: FxHashMap<String, Weak<Namespace>>,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a namespace unless a live one with the same name exists.
    /// Entries of dropped namespaces are pruned first.
    ///
    /// Returns the namespace now registered under the name.
    pub fn add(&mut self, namespace: &NamespaceRef) -> NamespaceRef {
        self.namespaces.retain(|_, weak| weak.strong_count() > 0);
        if let Some(existing) = self.find(namespace.name()) {
            return existing;
        }
        debug!(namespace = %namespace.name(), "namespace added");
        self.namespaces
            .insert(namespace.name().to_string(), Rc::downgrade(namespace));
        Rc::clone(namespace)
    }

    /// Remove the entry for `namespace`, only if it is the one registered.
    pub fn remove(&mut self, namespace: &Namespace) -> bool {
        let registered = self
            .namespaces
            .get(namespace.name())
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), namespace));
        if registered {
            self.namespaces.remove(namespace.name());
        }
        registered
    }

    /// Live namespace registered under `name`.
    pub fn find(&self, name: &str) -> Option<NamespaceRef> {
        self.namespaces.get(name).and_then(Weak::upgrade)
    }

    /// Number of entries, dead ones included.
    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    pub fn clear(&mut self) {
        self.namespaces.clear();
    }
}
