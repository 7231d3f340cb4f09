//! The bridge facade.
//!
//! A [`Bridge`] owns every table of the identity bridge and is the single
//! entry point used by generated wrapper code. It is an explicit context
//! object: create one with [`BridgeConfig`](crate::BridgeConfig), pass it
//! around, and [`finalize`](Bridge::finalize) it once (dropping it does the
//! same).
//!
//! # Re-entrancy
//!
//! Releasing a durable native reference may run a native destructor, and
//! that destructor may call back into the bridge (typically
//! [`remove_object_from_map`](Bridge::remove_object_from_map) for objects it
//! owned). Every method therefore finishes its table mutation and ends its
//! `RefCell` borrow before any reference is released, and user callbacks
//! (module loaders, conversion constructors) are never invoked under a
//! borrow of the table they might touch.
//!
//! # Lifecycle
//!
//! The bridge initializes lazily on first use. After `finalize`:
//! registrations fail with [`BridgeError::Finalized`], lookups find nothing
//! and removals do nothing.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use objbridge_core::{
    BridgeError, BridgeResult, GetSetDef, NativeRef, ObjectId, PointerError, SpecialObject,
    TypeFlags, Unmangled, Value, Wrapper, WrapperType, WrapperTypeRef, mangle_pointer_with_width,
    parse_address, unmangle_pointer, value_hash,
};
use objbridge_registry::{
    ClassDescriptor, ClassRegistry, Coerced, EnumRegistry, ImportRequest, ModuleLoader,
    ModuleRegistry, Namespace, NamespaceRef, NamespaceRegistry, SpecialTypeDescriptor,
    SpecialTypeRegistry, nearest_ancestor,
};

use crate::command::{Command, CommandList};
use crate::config::{BridgeConfig, BridgeSettings};
use crate::ghost_map::GhostMap;
use crate::object_map::ObjectMap;

/// Lifecycle state of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Created, not used yet.
    Uninitialized,
    /// In use.
    Active,
    /// Torn down; cannot be reinitialized.
    Finalized,
}

/// What [`Bridge::finalize`] released.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TeardownReport {
    /// Native objects still bound at teardown.
    pub live_bindings: usize,
    /// Durable references released (one per binding count).
    pub released_references: usize,
    /// Ghosts discarded.
    pub ghosts: usize,
    /// Live commands detached.
    pub detached_commands: usize,
}

/// Identity bridge between native objects and scripting wrappers.
pub struct Bridge {
    settings: BridgeSettings,
    loader: Option<Rc<dyn ModuleLoader>>,
    state: Cell<BridgeState>,

    objects: RefCell<ObjectMap>,
    ghosts: RefCell<GhostMap>,
    classes: RefCell<ClassRegistry>,
    special_types: RefCell<SpecialTypeRegistry>,
    namespaces: RefCell<NamespaceRegistry>,
    enums: RefCell<EnumRegistry>,
    modules: RefCell<ModuleRegistry>,
    commands: RefCell<CommandList>,
}

impl Bridge {
    /// Create a bridge with default settings and no module loader.
    pub fn new() -> Self {
        BridgeConfig::new().build()
    }

    pub(crate) fn with_parts(settings: BridgeSettings, loader: Option<Rc<dyn ModuleLoader>>) -> Self {
        Self {
            settings,
            loader,
            state: Cell::new(BridgeState::Uninitialized),
            objects: RefCell::default(),
            ghosts: RefCell::default(),
            classes: RefCell::default(),
            special_types: RefCell::default(),
            namespaces: RefCell::default(),
            enums: RefCell::default(),
            modules: RefCell::default(),
            commands: RefCell::default(),
        }
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    // ==========================================================================
    // Lifecycle
    // ==========================================================================

    /// Initialize the bridge. Idempotent; fails once finalized.
    pub fn initialize(&self) -> BridgeResult<()> {
        match self.state.get() {
            BridgeState::Uninitialized => {
                self.state.set(BridgeState::Active);
                debug!(settings = ?self.settings, "bridge initialized");
                Ok(())
            }
            BridgeState::Active => Ok(()),
            BridgeState::Finalized => Err(BridgeError::Finalized),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state.get() == BridgeState::Active
    }

    pub fn state(&self) -> BridgeState {
        self.state.get()
    }

    fn is_finalized(&self) -> bool {
        self.state.get() == BridgeState::Finalized
    }

    /// Tear the bridge down.
    ///
    /// Live commands are detached first, then every binding releases one
    /// reference per count, then ghosts and registries are discarded. Native
    /// destructors that run during the release see a finalized bridge.
    /// Calling this again does nothing and returns an empty report.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn finalize(&self) -> TeardownReport {
        if self.is_finalized() {
            return TeardownReport::default();
        }
        self.state.set(BridgeState::Finalized);

        let callbacks = self.commands.borrow_mut().detach_all();
        let live_bindings = self.objects.borrow().len();
        if live_bindings > 0 && self.settings.report_leaks {
            warn!(live_bindings, "native objects still bound at teardown");
        }
        let released = self.objects.borrow_mut().clear();
        let ghosts = self.ghosts.borrow_mut().clear();

        let report = TeardownReport {
            live_bindings,
            released_references: released.count(),
            ghosts: ghosts.len(),
            detached_commands: callbacks.len(),
        };

        drop(callbacks);
        drop(released);
        drop(ghosts);

        let classes = std::mem::take(&mut *self.classes.borrow_mut());
        let special_types = std::mem::take(&mut *self.special_types.borrow_mut());
        drop(classes);
        drop(special_types);
        self.namespaces.borrow_mut().clear();
        self.enums.borrow_mut().clear();
        self.modules.borrow_mut().clear();

        debug!(?report, "bridge finalized");
        report
    }

    // ==========================================================================
    // Object Bindings
    // ==========================================================================

    /// Bind `wrapper` to `native`, taking one durable reference.
    pub fn add_object_to_map(&self, wrapper: &Wrapper, native: &NativeRef) -> BridgeResult<()> {
        self.initialize()?;
        self.objects.borrow_mut().bind(native, wrapper);
        Ok(())
    }

    /// Release the binding of a wrapper that is going away.
    ///
    /// One durable reference is released. When that was the last count and
    /// the wrapper carried custom state, a ghost is kept if the native
    /// object is still alive after the release. The wrapper is detached
    /// from its native object either way. Returns false if the wrapper was
    /// not bound.
    pub fn remove_object_from_map(&self, wrapper: &Wrapper) -> bool {
        if self.is_finalized() {
            return false;
        }
        let Some(weak) = wrapper.native_weak() else {
            return false;
        };
        let id = ObjectId::of_weak(&weak);
        let keep_state = self.settings.preserve_ghosts && wrapper.has_custom_state();

        let Some(released) = self.objects.borrow_mut().unbind(id) else {
            return false;
        };
        wrapper.clear_native();
        // May run native destructors, which may re-enter.
        drop(released);

        if keep_state
            && !self.is_finalized()
            && !self.objects.borrow().contains(id)
            && let Some(native) = weak.upgrade()
        {
            let discarded = self
                .ghosts
                .borrow_mut()
                .capture(&native, wrapper.ty(), wrapper.dict());
            drop(discarded);
        }
        true
    }

    /// Wrapper bound to `native`, resurrecting a ghost if there is one.
    ///
    /// A resurrected wrapper gets the ghost's type and the very same
    /// attribute dictionary, and is bound again.
    pub fn find_object(&self, native: &NativeRef) -> Option<Wrapper> {
        if self.is_finalized() {
            return None;
        }
        let id = ObjectId::of(native);
        if let Some(wrapper) = self.objects.borrow().find(id) {
            return Some(wrapper);
        }

        let (ty, dict) = self.ghosts.borrow_mut().resurrect(id)?;
        let class_type = self
            .resolve_class(native)
            .map(|descriptor| Rc::clone(descriptor.wrapper_type()))
            .unwrap_or_else(|_| Rc::clone(&ty));

        let wrapper = Wrapper::with_state(&ty, &class_type, dict);
        self.objects.borrow_mut().bind(native, &wrapper);
        Some(wrapper)
    }

    /// Wrapper for `native`, creating and binding one if needed.
    ///
    /// New wrappers use the class registered for the exact run-time class,
    /// or for its nearest registered ancestor.
    pub fn get_object_from_pointer(&self, native: &NativeRef) -> BridgeResult<Wrapper> {
        self.initialize()?;
        if let Some(wrapper) = self.find_object(native) {
            return Ok(wrapper);
        }

        let descriptor = self.resolve_class(native)?;
        let wrapper = Wrapper::new(descriptor.wrapper_type());
        debug!(
            class = %native.class_name(),
            wrapper = %descriptor.wrapper_type().name(),
            "new wrapper"
        );
        self.objects.borrow_mut().bind(native, &wrapper);
        Ok(wrapper)
    }

    /// Class descriptor for `native`, scanning for the nearest registered
    /// ancestor when its exact class is unknown.
    ///
    /// `is_a` is native code and may call back into the bridge, so the scan
    /// runs over a snapshot with no borrow of the class table held.
    fn resolve_class(&self, native: &NativeRef) -> BridgeResult<Rc<ClassDescriptor>> {
        let candidates = {
            let classes = self.classes.borrow();
            if let Some(descriptor) = classes.get(native.class_name()) {
                return Ok(Rc::clone(descriptor));
            }
            classes.snapshot()
        };
        let nearest = nearest_ancestor(&candidates, &**native)?;
        Ok(self
            .classes
            .borrow_mut()
            .cache_resolution(native.class_name(), nearest, candidates.len()))
    }

    /// Native object behind a scripting value, checked against `required`.
    ///
    /// `None` maps to `Ok(None)`. Adapter objects are asked for their
    /// wrapper first.
    pub fn get_pointer_from_object(
        &self,
        value: &Value,
        required: &str,
    ) -> BridgeResult<Option<NativeRef>> {
        let adapted;
        let wrapper = match value {
            Value::None => return Ok(None),
            Value::Object(wrapper) => wrapper,
            Value::Adapter(adapter) => {
                adapted = adapter.to_wrapper()?;
                adapted
                    .as_wrapper()
                    .ok_or(BridgeError::AdapterReturnedNonWrapper)?
            }
            other => {
                return Err(BridgeError::type_mismatch(
                    self.pythonic_class_name(required),
                    other.type_name(),
                ));
            }
        };

        let native = wrapper.native().ok_or(BridgeError::Unbound)?;
        if native.is_a(required) {
            Ok(Some(native))
        } else {
            Err(BridgeError::type_mismatch(
                self.pythonic_class_name(required),
                self.pythonic_class_name(native.class_name()),
            ))
        }
    }

    /// Wrapper for an object given by its address in text form.
    ///
    /// Only objects the bridge knows (bound, or remembered by a ghost) can
    /// be reached this way.
    pub fn get_object_from_text(&self, value: &Value, required: &str) -> BridgeResult<Wrapper> {
        self.initialize()?;
        let Value::Str(text) = value else {
            return Err(BridgeError::ExpectedString);
        };

        let parsed = parse_address(text)?;
        let native = self
            .lookup_address(ObjectId::from_addr(parsed.addr))
            .ok_or(BridgeError::UnknownAddress(parsed.addr))?;

        if !native.is_a(required) {
            return Err(BridgeError::AddressTypeMismatch {
                expected: self.pythonic_class_name(required),
                actual: self.pythonic_class_name(native.class_name()),
            });
        }
        self.get_object_from_pointer(&native)
    }

    fn lookup_address(&self, id: ObjectId) -> Option<NativeRef> {
        let bound = self.objects.borrow().native(id);
        bound.or_else(|| self.ghosts.borrow().native(id))
    }

    /// Mangled address text of the native object behind `wrapper`.
    pub fn mangled_address(&self, wrapper: &Wrapper) -> Option<String> {
        let native = wrapper.native()?;
        let class_name = self.pythonic_class_name(native.class_name());
        Some(self.mangle_pointer(ObjectId::of(&native).addr(), &class_name))
    }

    /// Create a new native instance of `class_name` and bind it.
    ///
    /// With `subclass`, the wrapper gets that type instead of the registered
    /// one (a scripting subclass of it).
    pub fn new_object(
        &self,
        class_name: &str,
        subclass: Option<&WrapperTypeRef>,
    ) -> BridgeResult<Wrapper> {
        self.initialize()?;
        let descriptor = self
            .find_class(class_name)
            .ok_or_else(|| BridgeError::NoRegisteredAncestor(class_name.to_string()))?;
        let native = descriptor
            .construct()
            .ok_or_else(|| BridgeError::Abstract(self.pythonic_class_name(class_name)))?;

        let class_type = descriptor.wrapper_type();
        let wrapper = match subclass {
            Some(ty) => Wrapper::subclassed(ty, class_type),
            None => Wrapper::new(class_type),
        };
        self.objects.borrow_mut().bind(&native, &wrapper);
        Ok(wrapper)
    }

    /// Drop ghosts of dead native objects. Returns how many were dropped.
    pub fn sweep_ghosts(&self) -> usize {
        let swept = self.ghosts.borrow_mut().sweep();
        swept.len()
    }

    /// Reference count of the binding for `native` (0 if unbound).
    pub fn ref_count(&self, native: &NativeRef) -> usize {
        self.objects.borrow().ref_count(ObjectId::of(native))
    }

    /// Number of bound native objects.
    pub fn bound_count(&self) -> usize {
        self.objects.borrow().len()
    }

    /// Number of ghosts, including dead ones not swept yet.
    pub fn ghost_count(&self) -> usize {
        self.ghosts.borrow().len()
    }

    pub fn has_ghost(&self, native: &NativeRef) -> bool {
        self.ghosts.borrow().contains(ObjectId::of(native))
    }

    // ==========================================================================
    // Classes
    // ==========================================================================

    /// Register a wrapped class. Returns the type registered for its name.
    pub fn add_class_to_map(&self, descriptor: ClassDescriptor) -> BridgeResult<WrapperTypeRef> {
        self.initialize()?;
        let ty = descriptor.wrapper_type();
        if ty.flags().intersects(TypeFlags::SPECIAL | TypeFlags::ENUM) {
            return Err(wrong_kind(ty, "a class"));
        }
        Ok(self.classes.borrow_mut().register(descriptor))
    }

    /// Exact class lookup (cached ancestor resolutions included).
    pub fn find_class(&self, class_name: &str) -> Option<Rc<ClassDescriptor>> {
        if self.is_finalized() {
            return None;
        }
        self.classes.borrow().get(class_name).cloned()
    }

    /// Wrapper type registered for a class, override included.
    pub fn find_class_type_object(&self, class_name: &str) -> Option<WrapperTypeRef> {
        self.classes.borrow().class_type_object(class_name)
    }

    /// Original wrapper type for a class, skipping overrides.
    pub fn find_base_type_object(&self, class_name: &str) -> Option<WrapperTypeRef> {
        self.classes.borrow().base_type_object(class_name)
    }

    /// Display name for a native class name.
    pub fn pythonic_class_name(&self, class_name: &str) -> String {
        self.classes
            .borrow()
            .pythonic_class_name(class_name)
            .to_string()
    }

    /// Native class name for a display name.
    pub fn native_class_name(&self, pyname: &str) -> String {
        self.classes.borrow().native_class_name(pyname).to_string()
    }

    // ==========================================================================
    // Special Types
    // ==========================================================================

    pub fn add_special_type_to_map(
        &self,
        descriptor: SpecialTypeDescriptor,
    ) -> BridgeResult<WrapperTypeRef> {
        self.initialize()?;
        if !descriptor.wrapper_type().flags().contains(TypeFlags::SPECIAL) {
            return Err(wrong_kind(descriptor.wrapper_type(), "a special"));
        }
        Ok(self.special_types.borrow_mut().register(descriptor))
    }

    pub fn find_special_type(&self, name: &str) -> Option<Rc<SpecialTypeDescriptor>> {
        self.special_types.borrow().get(name).cloned()
    }

    pub fn find_special_type_object(&self, name: &str) -> Option<WrapperTypeRef> {
        self.special_types.borrow().type_object(name)
    }

    /// Coerce a value to the special type `required`.
    ///
    /// See [`SpecialTypeDescriptor::coerce`]. Conversion constructors run
    /// without any bridge borrow held.
    pub fn get_pointer_from_special_object<'v>(
        &self,
        value: &'v Value,
        required: &str,
        allow_temporary: bool,
    ) -> BridgeResult<Coerced<'v>> {
        match self.find_special_type(required) {
            Some(descriptor) => descriptor.coerce(value, allow_temporary),
            None => Err(BridgeError::type_mismatch(required, value.type_name())),
        }
    }

    /// Independent copy of a special object, using its type's copy
    /// function when one is registered.
    pub fn copy_special_object(&self, obj: &SpecialObject) -> SpecialObject {
        match self.find_special_type(obj.ty().stripped_name()) {
            Some(descriptor) => descriptor.copy(obj),
            None => obj.clone(),
        }
    }

    // ==========================================================================
    // Enums and Namespaces
    // ==========================================================================

    pub fn add_enum_to_map(&self, name: &str, ty: &WrapperTypeRef) -> BridgeResult<WrapperTypeRef> {
        self.initialize()?;
        if !ty.flags().contains(TypeFlags::ENUM) {
            return Err(wrong_kind(ty, "an enum"));
        }
        Ok(self.enums.borrow_mut().add(name, ty))
    }

    pub fn find_enum(&self, name: &str) -> Option<WrapperTypeRef> {
        self.enums.borrow().find(name)
    }

    /// Add a namespace unless one with the same name is registered.
    /// Returns the namespace now registered under the name.
    pub fn add_namespace_to_map(&self, namespace: &NamespaceRef) -> BridgeResult<NamespaceRef> {
        self.initialize()?;
        Ok(self.namespaces.borrow_mut().add(namespace))
    }

    /// Remove a namespace that is going away, if it is the registered one.
    pub fn remove_namespace_from_map(&self, namespace: &Namespace) -> bool {
        if self.is_finalized() {
            return false;
        }
        self.namespaces.borrow_mut().remove(namespace)
    }

    pub fn find_namespace(&self, name: &str) -> Option<NamespaceRef> {
        self.namespaces.borrow().find(name)
    }

    // ==========================================================================
    // Modules
    // ==========================================================================

    /// Import an extension module through the module loader.
    ///
    /// Returns true if the module is already loaded or the import
    /// succeeded. Import failures are not errors.
    pub fn import_module(&self, full_name: &str, package: Option<&str>) -> bool {
        if self.is_finalized() {
            return false;
        }
        let request = ImportRequest::new(full_name);
        if self.is_module_loaded(request.name) {
            return true;
        }
        let Some(loader) = self.loader.clone() else {
            debug!(module = %full_name, "no module loader, import skipped");
            return false;
        };

        if request.relative_first
            && let Some(package) = package
        {
            match loader.import(request.name, Some(package)) {
                Ok(()) => return true,
                Err(err) => {
                    debug!(module = %request.name, %package, error = %err, "relative import failed");
                }
            }
        }

        match loader.import(request.full_name, None) {
            Ok(()) => true,
            Err(err) => {
                debug!(module = %full_name, error = %err, "import failed");
                false
            }
        }
    }

    /// Record a loaded extension module and notify the module loader.
    ///
    /// The notification is best-effort: a failure is logged, not returned.
    pub fn add_module(&self, name: &str) -> BridgeResult<()> {
        self.initialize()?;
        let added = self.modules.borrow_mut().add(name);
        if added
            && let Some(loader) = self.loader.clone()
            && let Err(err) = loader.on_module_init(name)
        {
            warn!(module = %name, error = %err, "module init notification failed");
        }
        Ok(())
    }

    pub fn is_module_loaded(&self, name: &str) -> bool {
        self.modules.borrow().contains(name)
    }

    /// Loaded module names in load order.
    pub fn loaded_modules(&self) -> Vec<String> {
        self.modules.borrow().iter().map(str::to_string).collect()
    }

    // ==========================================================================
    // Commands
    // ==========================================================================

    /// Track a command so it is detached at teardown.
    pub fn register_command(&self, command: &Rc<Command>) -> BridgeResult<()> {
        self.initialize()?;
        self.commands.borrow_mut().register(command);
        Ok(())
    }

    pub fn unregister_command(&self, command: &Command) -> bool {
        self.commands.borrow_mut().unregister(command)
    }

    // ==========================================================================
    // Pointer Text and Helpers
    // ==========================================================================

    /// Mangle an address using the configured digit count.
    pub fn mangle_pointer(&self, addr: usize, type_name: &str) -> String {
        mangle_pointer_with_width(addr, type_name, self.settings.pointer_digits)
    }

    /// Decode a mangled pointer buffer; see [`unmangle_pointer`].
    pub fn unmangle_pointer<'a>(
        &self,
        bytes: &'a [u8],
        expected_type: &str,
    ) -> Result<Unmangled<'a>, PointerError> {
        unmangle_pointer(bytes, expected_type)
    }

    /// Attribute descriptor for `key` on `ty` or one of its bases.
    pub fn find_getset_descriptor<'t>(ty: &'t WrapperType, key: &str) -> Option<&'t GetSetDef> {
        ty.find_getset(key)
    }

    /// Hash of a value: identity for wrapped objects, string form otherwise.
    pub fn value_hash(value: &Value) -> u64 {
        value_hash(value)
    }
}

fn wrong_kind(ty: &WrapperType, kind: &'static str) -> BridgeError {
    BridgeError::WrongKind {
        name: ty.stripped_name().to_string(),
        kind,
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.finalize();
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("state", &self.state.get())
            .field("settings", &self.settings)
            .field("bindings", &self.objects.borrow().len())
            .field("ghosts", &self.ghosts.borrow().len())
            .field("classes", &self.classes.borrow().len())
            .field("modules", &self.modules.borrow().len())
            .finish_non_exhaustive()
    }
}
