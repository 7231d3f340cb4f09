//! ClassRegistry - native class name to wrapper class resolution.
//!
//! Every wrapped native class is registered once with its wrapper type,
//! method table and (for concrete classes) a native constructor. Native
//! objects whose exact run-time class was never registered, such as internal
//! subclasses, are resolved to the most-derived registered ancestor they
//! satisfy. That answer is cached under the exact class name.
//!
//! # Depth and tie-break
//!
//! "Most-derived" is measured on the *wrapper* type hierarchy
//! ([`objbridge_core::WrapperType::depth`]). When several matching
//! ancestors share the maximum depth, the one registered first wins.
//!
//! # Pythonic names
//!
//! Templated native classes report run-time names that are not legal
//! identifiers. Their wrapper types carry a legal name instead, and the
//! registry keeps a secondary table between the two. It is used for display
//! and error text only, never for identity.

use std::fmt;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use objbridge_core::{
    BridgeError, BridgeResult, NativeObject, NativeRef, Value, Wrapper, WrapperTypeRef,
    is_identifier,
};

/// Callable behind a wrapped method.
pub type MethodFn = Rc<dyn Fn(&Wrapper, &[Value]) -> BridgeResult<Value>>;

/// Creates a new native instance of a concrete class.
pub type NativeConstructor = Rc<dyn Fn() -> NativeRef>;

/// One entry of a method table.
#[derive(Clone)]
pub struct MethodDef {
    /// Method name.
    pub name: String,
    /// Documentation string.
    pub doc: String,
    func: MethodFn,
}

impl MethodDef {
    /// Create a method entry.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Wrapper, &[Value]) -> BridgeResult<Value> + 'static,
    {
        Self {
            name: name.into(),
            doc: String::new(),
            func: Rc::new(func),
        }
    }

    /// Set the documentation string.
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Invoke the method.
    pub fn call(&self, this: &Wrapper, args: &[Value]) -> BridgeResult<Value> {
        (self.func)(this, args)
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Registry entry for a wrapped native class.
pub struct ClassDescriptor {
    native_name: String,
    wrapper_type: WrapperTypeRef,
    methods: Vec<MethodDef>,
    constructor: Option<NativeConstructor>,
}

impl ClassDescriptor {
    /// Describe the wrapper for native class `native_name`.
    pub fn new(native_name: impl Into<String>, wrapper_type: &WrapperTypeRef) -> Self {
        Self {
            native_name: native_name.into(),
            wrapper_type: Rc::clone(wrapper_type),
            methods: Vec::new(),
            constructor: None,
        }
    }

    // === Builder Methods ===

    /// Add a method.
    pub fn with_method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    /// Add several methods.
    pub fn with_methods(mut self, methods: impl IntoIterator<Item = MethodDef>) -> Self {
        self.methods.extend(methods);
        self
    }

    /// Set the native constructor (concrete classes only).
    pub fn with_constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn() -> NativeRef + 'static,
    {
        self.constructor = Some(Rc::new(constructor));
        self
    }

    // === Query Methods ===

    /// Native class name this descriptor was registered for.
    pub fn native_name(&self) -> &str {
        &self.native_name
    }

    /// Wrapper type for instances of the class.
    pub fn wrapper_type(&self) -> &WrapperTypeRef {
        &self.wrapper_type
    }

    /// Method table.
    pub fn methods(&self) -> &[MethodDef] {
        &self.methods
    }

    /// Find a method by name.
    pub fn find_method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Whether native instances can be created from the scripting side.
    pub fn is_constructible(&self) -> bool {
        self.constructor.is_some()
    }

    /// Create a new native instance, if the class is concrete.
    pub fn construct(&self) -> Option<NativeRef> {
        self.constructor.as_ref().map(|ctor| ctor())
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("native_name", &self.native_name)
            .field("wrapper_type", &self.wrapper_type.name())
            .field("methods", &self.methods.len())
            .field("constructible", &self.is_constructible())
            .finish()
    }
}

/// Registry of wrapped native classes.
#[derive(Default)]
pub struct ClassRegistry {
    /// Lookup by exact native class name, including cached resolutions.
    classes: FxHashMap<String, Rc<ClassDescriptor>>,

    /// Registered descriptors in registration order (no cached entries).
    registered: Vec<Rc<ClassDescriptor>>,

    /// Names whose entry in `classes` is a cached nearest-ancestor answer.
    cached: FxHashSet<String>,

    /// Pythonic wrapper name -> native class name, where they differ.
    pythonic_names: FxHashMap<String, String>,
}

impl ClassRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    /// Register a wrapped class and return the wrapper type now associated
    /// with its native name.
    ///
    /// The first registration of a name wins; later ones return the existing
    /// type. A cached nearest-ancestor answer is not a registration: it is
    /// replaced, and every other cached answer is dropped so that subclasses
    /// get resolved again against the enlarged registry.
    pub fn register(&mut self, descriptor: ClassDescriptor) -> WrapperTypeRef {
        let name = descriptor.native_name.clone();

        if let Some(existing) = self.classes.get(&name)
            && !self.cached.contains(&name)
        {
            return Rc::clone(&existing.wrapper_type);
        }

        if !self.cached.is_empty() {
            debug!(
                class = %name,
                dropped = self.cached.len(),
                "invalidating cached ancestor resolutions"
            );
            for cached in self.cached.drain() {
                self.classes.remove(&cached);
            }
        }

        let pyname = own_type(&descriptor.wrapper_type).stripped_name();
        if pyname != name {
            self.pythonic_names.insert(pyname.to_string(), name.clone());
        }

        let descriptor = Rc::new(descriptor);
        let ty = Rc::clone(&descriptor.wrapper_type);
        debug!(class = %name, wrapper = %ty.name(), "class registered");
        self.registered.push(Rc::clone(&descriptor));
        self.classes.insert(name, descriptor);
        ty
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    /// Exact lookup by native class name.
    pub fn get(&self, class_name: &str) -> Option<&Rc<ClassDescriptor>> {
        self.classes.get(class_name)
    }

    /// Check if a native class name resolves without a scan.
    pub fn contains(&self, class_name: &str) -> bool {
        self.classes.contains_key(class_name)
    }

    /// Whether the entry for `class_name` is a cached ancestor resolution.
    pub fn is_cached_resolution(&self, class_name: &str) -> bool {
        self.cached.contains(class_name)
    }

    /// Number of registered classes (cached resolutions excluded).
    pub fn len(&self) -> usize {
        self.registered.len()
    }

    /// Whether no class has been registered.
    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    /// Iterate over registered descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Rc<ClassDescriptor>> {
        self.registered.iter()
    }

    /// Wrapper type registered for a native class name.
    pub fn class_type_object(&self, class_name: &str) -> Option<WrapperTypeRef> {
        self.get(class_name).map(|d| Rc::clone(&d.wrapper_type))
    }

    /// The wrapped class's own wrapper type.
    ///
    /// A class registered with an override type (or a scripting subclass)
    /// derives from the type the wrapped class was generated with; that is
    /// the one other wrapped classes use as their base. Stand-in types are
    /// skipped down to it.
    pub fn base_type_object(&self, class_name: &str) -> Option<WrapperTypeRef> {
        let descriptor = self.get(class_name)?;
        Some(Rc::clone(own_type(&descriptor.wrapper_type)))
    }

    // ==========================================================================
    // Resolution
    // ==========================================================================

    /// Descriptor for a native object: exact class first, otherwise the
    /// nearest registered ancestor, cached under the exact class name.
    pub fn resolve(&mut self, native: &dyn NativeObject) -> BridgeResult<Rc<ClassDescriptor>> {
        if let Some(descriptor) = self.classes.get(native.class_name()) {
            return Ok(Rc::clone(descriptor));
        }
        let nearest = self.resolve_nearest_ancestor(native)?;
        Ok(self.cache_resolution(native.class_name(), nearest, self.registered.len()))
    }

    /// Scan the registered classes for the most-derived one `native` is an
    /// instance of. Does not touch the cache.
    pub fn resolve_nearest_ancestor(
        &self,
        native: &dyn NativeObject,
    ) -> BridgeResult<Rc<ClassDescriptor>> {
        nearest_ancestor(&self.registered, native)
    }

    /// Registered descriptors in registration order, detached from the
    /// registry so a scan can run while the registry is in use elsewhere.
    pub fn snapshot(&self) -> Vec<Rc<ClassDescriptor>> {
        self.registered.clone()
    }

    /// Remember `nearest` as the resolution of `class_name`.
    ///
    /// `scanned` is the number of registered classes the answer was computed
    /// from. If classes were registered since, the answer is returned but not
    /// cached. An entry that appeared in the meantime wins over `nearest`.
    pub fn cache_resolution(
        &mut self,
        class_name: &str,
        nearest: Rc<ClassDescriptor>,
        scanned: usize,
    ) -> Rc<ClassDescriptor> {
        if let Some(existing) = self.classes.get(class_name) {
            return Rc::clone(existing);
        }
        if scanned != self.registered.len() {
            return nearest;
        }
        debug!(
            class = %class_name,
            ancestor = %nearest.native_name,
            "caching nearest registered ancestor"
        );
        self.classes
            .insert(class_name.to_string(), Rc::clone(&nearest));
        self.cached.insert(class_name.to_string());
        nearest
    }

    // ==========================================================================
    // Display Names
    // ==========================================================================

    /// Native class name for a pythonic wrapper name (identity if unmapped).
    pub fn native_class_name<'a>(&'a self, pyname: &'a str) -> &'a str {
        self.pythonic_names
            .get(pyname)
            .map(String::as_str)
            .unwrap_or(pyname)
    }

    /// Display name for a native class name.
    ///
    /// Legal identifiers are returned unchanged; otherwise the wrapper name
    /// of the class is used when it is known.
    pub fn pythonic_class_name<'a>(&'a self, class_name: &'a str) -> &'a str {
        if is_identifier(class_name) {
            return class_name;
        }
        match self.get(class_name) {
            Some(descriptor) => pythonic_name_of(descriptor),
            None => class_name,
        }
    }
}

/// Most-derived descriptor among `candidates` that `native` is an instance
/// of. Ties in wrapper depth go to the earliest candidate.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn nearest_ancestor(
    candidates: &[Rc<ClassDescriptor>],
    native: &dyn NativeObject,
) -> BridgeResult<Rc<ClassDescriptor>> {
    let mut nearest: Option<(usize, &Rc<ClassDescriptor>)> = None;

    for descriptor in candidates {
        if !native.is_a(&descriptor.native_name) {
            continue;
        }
        let depth = descriptor.wrapper_type.depth();
        if nearest.is_none_or(|(best, _)| depth > best) {
            nearest = Some((depth, descriptor));
        }
    }

    nearest
        .map(|(_, descriptor)| Rc::clone(descriptor))
        .ok_or_else(|| BridgeError::NoRegisteredAncestor(native.class_name().to_string()))
}

/// First type in the base chain of `ty` that is not a stand-in.
fn own_type(ty: &WrapperTypeRef) -> &WrapperTypeRef {
    let mut current = ty;
    while current.is_stand_in()
        && let Some(base) = current.base()
    {
        current = base;
    }
    current
}

/// Stripped name of the base type object of `descriptor`.
fn pythonic_name_of(descriptor: &ClassDescriptor) -> &str {
    own_type(&descriptor.wrapper_type).stripped_name()
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("registered", &self.registered.len())
            .field("cached", &self.cached.len())
            .field("pythonic_names", &self.pythonic_names.len())
            .finish()
    }
}
