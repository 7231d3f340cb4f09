//! Wrapper type descriptors.
//!
//! A [`WrapperType`] is the scripting-side type of a wrapper object. Types
//! form a single-inheritance hierarchy through [`WrapperType::base`]; the
//! depth in that hierarchy (not the native one) drives nearest-ancestor
//! resolution in the class registry.

use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use rustc_hash::FxHashMap;

use crate::names::strip_module;

/// Shared handle to a wrapper type.
pub type WrapperTypeRef = Rc<WrapperType>;

bitflags! {
    /// Properties of a wrapper type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeFlags: u32 {
        /// Wraps a by-value special type.
        const SPECIAL = 1 << 0;
        /// Wraps a native enumeration.
        const ENUM = 1 << 1;
        /// Created by scripting code by subclassing a wrapped class.
        const USER_SUBCLASS = 1 << 2;
        /// Replaces a wrapped class in the registry (override type).
        const OVERRIDE = 1 << 3;
    }
}

/// An attribute descriptor attached to a wrapper type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetSetDef {
    /// Attribute name.
    pub name: String,
    /// Documentation string.
    pub doc: String,
}

impl GetSetDef {
    pub fn new(name: impl Into<String>, doc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: doc.into(),
        }
    }
}

/// Scripting-side type of a wrapper object.
pub struct WrapperType {
    /// Possibly module-qualified name, e.g. `"pkg.core.Object"`.
    name: String,
    base: Option<WrapperTypeRef>,
    flags: TypeFlags,
    getsets: FxHashMap<String, GetSetDef>,
}

impl WrapperType {
    /// Start describing a new wrapper type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
            flags: TypeFlags::empty(),
            getsets: FxHashMap::default(),
        }
    }

    // === Builder Methods ===

    /// Set the base type.
    pub fn with_base(mut self, base: &WrapperTypeRef) -> Self {
        self.base = Some(Rc::clone(base));
        self
    }

    /// Add flags.
    pub fn with_flags(mut self, flags: TypeFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Add an attribute descriptor.
    pub fn with_getset(mut self, def: GetSetDef) -> Self {
        self.getsets.insert(def.name.clone(), def);
        self
    }

    /// Finish the description.
    pub fn into_ref(self) -> WrapperTypeRef {
        Rc::new(self)
    }

    // === Query Methods ===

    /// Full (possibly module-qualified) type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type name without its module prefix.
    pub fn stripped_name(&self) -> &str {
        strip_module(&self.name)
    }

    /// Direct base type, if any.
    pub fn base(&self) -> Option<&WrapperTypeRef> {
        self.base.as_ref()
    }

    /// Type flags.
    pub fn flags(&self) -> TypeFlags {
        self.flags
    }

    /// Whether this type stands in for a wrapped class rather than being
    /// its own type: an override type or a scripting subclass.
    pub fn is_stand_in(&self) -> bool {
        self.flags
            .intersects(TypeFlags::OVERRIDE | TypeFlags::USER_SUBCLASS)
    }

    /// Number of base links between this type and the root of its hierarchy.
    ///
    /// A type without a base has depth 0.
    pub fn depth(&self) -> usize {
        self.ancestors().count()
    }

    /// Iterate over base types, from the direct base up to the root.
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors {
            next: self.base.as_deref(),
        }
    }

    /// Whether `self` is `other` or derives from it.
    pub fn is_subtype_of(&self, other: &WrapperType) -> bool {
        std::ptr::eq(self, other) || self.ancestors().any(|t| std::ptr::eq(t, other))
    }

    /// Attribute descriptor declared directly on this type.
    pub fn own_getset(&self, name: &str) -> Option<&GetSetDef> {
        self.getsets.get(name)
    }

    /// Find an attribute descriptor on this type or the nearest base that
    /// declares it.
    pub fn find_getset(&self, name: &str) -> Option<&GetSetDef> {
        self.own_getset(name)
            .or_else(|| self.ancestors().find_map(|t| t.own_getset(name)))
    }
}

impl fmt::Debug for WrapperType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapperType")
            .field("name", &self.name)
            .field("base", &self.base.as_ref().map(|b| b.name()))
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

/// Iterator over the bases of a wrapper type.
pub struct Ancestors<'a> {
    next: Option<&'a WrapperType>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a WrapperType;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.base.as_deref();
        Some(current)
    }
}
