//! Native object model.
//!
//! Native objects are owned outside the bridge. They are reference counted
//! through [`Rc`], polymorphic through [`NativeObject`], and identified by the
//! address of their allocation ([`ObjectId`]).
//!
//! The bridge never creates or destroys a native object on its own: it only
//! clones and drops [`NativeRef`]s (durable references) and keeps
//! [`NativeWeak`]s where it must observe liveness without extending it.

use std::fmt;
use std::rc::{Rc, Weak};

/// A polymorphic native object as seen by the bridge.
///
/// Implementors describe their run-time class and answer "is-a" queries
/// against the native class hierarchy. The wrapper hierarchy is tracked
/// separately, see [`WrapperType`](crate::WrapperType).
pub trait NativeObject {
    /// The run-time class name of this object.
    ///
    /// For templated native classes this may not be a legal identifier.
    fn class_name(&self) -> &str;

    /// Whether this object is an instance of `class_name` or one of its
    /// subclasses.
    fn is_a(&self, class_name: &str) -> bool;
}

impl fmt::Debug for dyn NativeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeObject")
            .field("class_name", &self.class_name())
            .finish()
    }
}

/// Strong (durable) reference to a native object.
pub type NativeRef = Rc<dyn NativeObject>;

/// Weak reference to a native object. Never keeps the object alive.
pub type NativeWeak = Weak<dyn NativeObject>;

/// Stable identity of a native object.
///
/// This is the address of the shared allocation. It stays unique for as long
/// as any strong or weak reference to the object exists, so identities held
/// next to a [`NativeWeak`] can never be reused by another object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ObjectId(usize);

impl ObjectId {
    /// Identity of the object behind a strong reference.
    #[inline]
    pub fn of(native: &NativeRef) -> Self {
        ObjectId(Rc::as_ptr(native) as *const () as usize)
    }

    /// Identity of the object behind a weak reference.
    #[inline]
    pub fn of_weak(native: &NativeWeak) -> Self {
        ObjectId(Weak::as_ptr(native) as *const () as usize)
    }

    /// Build an identity from a raw address, e.g. one decoded from text.
    #[inline]
    pub const fn from_addr(addr: usize) -> Self {
        ObjectId(addr)
    }

    /// The raw address.
    #[inline]
    pub const fn addr(self) -> usize {
        self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({:#x})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<&NativeRef> for ObjectId {
    fn from(native: &NativeRef) -> Self {
        ObjectId::of(native)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leaf;

    impl NativeObject for Leaf {
        fn class_name(&self) -> &str {
            "Leaf"
        }

        fn is_a(&self, class_name: &str) -> bool {
            class_name == "Leaf"
        }
    }

    #[test]
    fn identity_is_stable_across_clones() {
        let a: NativeRef = Rc::new(Leaf);
        let b = Rc::clone(&a);
        assert_eq!(ObjectId::of(&a), ObjectId::of(&b));
    }

    #[test]
    fn weak_identity_matches_strong() {
        let a: NativeRef = Rc::new(Leaf);
        let w = Rc::downgrade(&a);
        assert_eq!(ObjectId::of(&a), ObjectId::of_weak(&w));
        drop(a);
        // The allocation outlives the value while a weak exists.
        assert_ne!(ObjectId::of_weak(&w).addr(), 0);
    }

    #[test]
    fn distinct_objects_have_distinct_ids() {
        let a: NativeRef = Rc::new(Leaf);
        let b: NativeRef = Rc::new(Leaf);
        assert_ne!(ObjectId::of(&a), ObjectId::of(&b));
    }

    #[test]
    fn debug_format() {
        let id = ObjectId::from_addr(0x10);
        assert_eq!(format!("{:?}", id), "ObjectId(0x10)");
        assert_eq!(id.to_string(), "0x10");
    }
}
