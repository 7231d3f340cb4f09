//! ObjectMap - native identity to wrapper bindings.
//!
//! Each binding holds one durable (strong) reference to its native object
//! per bind call. Unbinding never drops a reference itself: it hands it back
//! as a [`Released`] token so the caller can finish every table mutation and
//! release its borrows first. Dropping the token may run native destructors,
//! and those may call back into the bridge.

use std::fmt;

use rustc_hash::FxHashMap;
use tracing::debug;

use objbridge_core::{NativeRef, ObjectId, Wrapper};

/// Durable references taken out of the map, released when dropped.
#[must_use = "dropping the token releases native references; hold it until borrows are released"]
#[derive(Default)]
pub struct Released(Vec<NativeRef>);

impl Released {
    /// Number of references held.
    pub fn count(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Released {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Released").field(&self.0.len()).finish()
    }
}

struct Binding {
    wrapper: Wrapper,
    /// One strong reference per bind; the length is the reference count.
    refs: Vec<NativeRef>,
}

/// Table of live bindings, keyed by native identity.
#[derive(Default)]
pub struct ObjectMap {
    bindings: FxHashMap<ObjectId, Binding>,
}

impl ObjectMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `native` to `wrapper` and take one durable reference.
    ///
    /// Binding an already bound native increments its count and makes
    /// `wrapper` the one returned by [`find`](Self::find). Returns the new
    /// count.
    pub fn bind(&mut self, native: &NativeRef, wrapper: &Wrapper) -> usize {
        let id = ObjectId::of(native);
        wrapper.set_native(native);

        let binding = self.bindings.entry(id).or_insert_with(|| Binding {
            wrapper: wrapper.clone(),
            refs: Vec::with_capacity(1),
        });
        binding.wrapper = wrapper.clone();
        binding.refs.push(NativeRef::clone(native));

        let count = binding.refs.len();
        debug!(object = %id, class = %native.class_name(), count, "bind");
        count
    }

    /// Drop one count of the binding for `id`; the entry is removed at zero.
    ///
    /// The reference is returned, not released. `None` if `id` is not bound.
    pub fn unbind(&mut self, id: ObjectId) -> Option<Released> {
        let binding = self.bindings.get_mut(&id)?;
        let released = binding.refs.pop();
        let remaining = binding.refs.len();
        if remaining == 0 {
            self.bindings.remove(&id);
        }
        debug!(object = %id, remaining, "unbind");
        Some(Released(released.into_iter().collect()))
    }

    /// Wrapper currently bound to `id`.
    pub fn find(&self, id: ObjectId) -> Option<Wrapper> {
        self.bindings.get(&id).map(|b| b.wrapper.clone())
    }

    /// Strong reference to a bound native object.
    pub fn native(&self, id: ObjectId) -> Option<NativeRef> {
        self.bindings
            .get(&id)
            .and_then(|b| b.refs.first())
            .map(NativeRef::clone)
    }

    /// Reference count of the binding, 0 if unbound.
    pub fn ref_count(&self, id: ObjectId) -> usize {
        self.bindings.get(&id).map_or(0, |b| b.refs.len())
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.bindings.contains_key(&id)
    }

    /// Number of bound native objects.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bound identities, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.bindings.keys().copied()
    }

    /// Empty the table and hand back every remaining reference, one per
    /// count.
    pub fn clear(&mut self) -> Released {
        let refs = self
            .bindings
            .drain()
            .flat_map(|(_, binding)| binding.refs)
            .collect();
        Released(refs)
    }
}

impl Drop for ObjectMap {
    fn drop(&mut self) {
        let released = self.clear();
        if !released.is_empty() {
            debug!(references = released.count(), "releasing bindings on drop");
        }
    }
}

impl fmt::Debug for ObjectMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectMap")
            .field("bindings", &self.bindings.len())
            .finish()
    }
}
