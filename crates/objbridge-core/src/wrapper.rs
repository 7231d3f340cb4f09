//! Wrapper handles.
//!
//! A [`Wrapper`] is the scripting-side proxy of a native object. It owns an
//! attribute dictionary and refers to at most one native object. The
//! reference it keeps is weak: durable references are held by the bridge's
//! object map, one per binding.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::native::{NativeRef, NativeWeak, ObjectId};
use crate::value::Value;
use crate::wrapper_type::WrapperTypeRef;

/// Attribute dictionary of a wrapper.
///
/// Cloning shares the dictionary. Ghosts keep a clone so that a resurrected
/// wrapper gets the very same dictionary back.
#[derive(Clone, Default)]
pub struct AttrDict(Rc<RefCell<FxHashMap<String, Value>>>);

impl AttrDict {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of an attribute value.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().get(key).cloned()
    }

    /// Set an attribute, returning the previous value.
    pub fn set(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.borrow_mut().insert(key.into(), value)
    }

    /// Remove an attribute.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.borrow_mut().remove(key)
    }

    /// Whether the attribute exists.
    pub fn contains(&self, key: &str) -> bool {
        self.0.borrow().contains_key(key)
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Borrow the underlying map.
    pub fn entries(&self) -> Ref<'_, FxHashMap<String, Value>> {
        self.0.borrow()
    }

    /// Whether both handles share the same dictionary.
    pub fn ptr_eq(&self, other: &AttrDict) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for AttrDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.borrow().iter()).finish()
    }
}

struct WrapperInner {
    /// Actual type of the wrapper, possibly a scripting subclass.
    ty: WrapperTypeRef,
    /// Type registered for the wrapped native class.
    class_type: WrapperTypeRef,
    dict: AttrDict,
    native: RefCell<Option<NativeWeak>>,
}

/// Scripting-side handle for a native object.
///
/// Cloning produces another reference to the same wrapper.
#[derive(Clone)]
pub struct Wrapper(Rc<WrapperInner>);

impl Wrapper {
    /// Create a plain wrapper of a registered class type.
    pub fn new(class_type: &WrapperTypeRef) -> Self {
        Self::with_state(class_type, class_type, AttrDict::new())
    }

    /// Create a wrapper whose actual type is a subclass of the registered
    /// class type.
    pub fn subclassed(ty: &WrapperTypeRef, class_type: &WrapperTypeRef) -> Self {
        Self::with_state(ty, class_type, AttrDict::new())
    }

    /// Create a wrapper with an explicit type and dictionary, as done when a
    /// ghost is resurrected.
    pub fn with_state(ty: &WrapperTypeRef, class_type: &WrapperTypeRef, dict: AttrDict) -> Self {
        Wrapper(Rc::new(WrapperInner {
            ty: Rc::clone(ty),
            class_type: Rc::clone(class_type),
            dict,
            native: RefCell::new(None),
        }))
    }

    /// Actual wrapper type.
    pub fn ty(&self) -> &WrapperTypeRef {
        &self.0.ty
    }

    /// Registered class type for the wrapped native class.
    pub fn class_type(&self) -> &WrapperTypeRef {
        &self.0.class_type
    }

    /// Attribute dictionary.
    pub fn dict(&self) -> &AttrDict {
        &self.0.dict
    }

    /// Whether the wrapper carries state that must survive its collection:
    /// a scripting subclass or a non-empty dictionary.
    pub fn has_custom_state(&self) -> bool {
        !Rc::ptr_eq(&self.0.ty, &self.0.class_type) || !self.0.dict.is_empty()
    }

    /// Point this wrapper at a native object.
    pub fn set_native(&self, native: &NativeRef) {
        *self.0.native.borrow_mut() = Some(Rc::downgrade(native));
    }

    /// Detach this wrapper from its native object.
    pub fn clear_native(&self) {
        *self.0.native.borrow_mut() = None;
    }

    /// The wrapped native object, if set and still alive.
    pub fn native(&self) -> Option<NativeRef> {
        self.0.native.borrow().as_ref().and_then(|w| w.upgrade())
    }

    /// Weak reference to the wrapped native object, without upgrading it.
    pub fn native_weak(&self) -> Option<NativeWeak> {
        self.0.native.borrow().clone()
    }

    /// Identity of the wrapped native object, if set.
    pub fn native_id(&self) -> Option<ObjectId> {
        self.0.native.borrow().as_ref().map(ObjectId::of_weak)
    }

    /// Whether both handles are the same wrapper.
    pub fn ptr_eq(&self, other: &Wrapper) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the wrapper itself, used for display and hashing.
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl fmt::Debug for Wrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wrapper")
            .field("type", &self.0.ty.name())
            .field("native", &self.native_id())
            .field("dict_len", &self.0.dict.len())
            .finish()
    }
}
