//! SpecialTypeRegistry - by-value native types and conversion dispatch.
//!
//! Special types (vectors, variants, matrices) are copied across the bridge
//! rather than shared by identity. When a function needs one and receives
//! some other value, the type's conversion constructors are tried to build a
//! temporary.
//!
//! ## Overload selection
//!
//! Each constructor declares the argument kind it accepts. A value matches a
//! kind either exactly or through a promotion (bool to int, int to float, a
//! subclass to its base). Exact matches beat promotions; among equally good
//! candidates the one registered first is used.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use objbridge_core::{BridgeError, BridgeResult, SpecialObject, Value, WrapperTypeRef};

use crate::class_registry::MethodDef;

/// Builds a special object from a scripting value.
pub type ConversionFn = Rc<dyn Fn(&Value) -> BridgeResult<SpecialObject>>;

/// Produces an independent copy of a special object.
pub type CopyFn = Rc<dyn Fn(&SpecialObject) -> SpecialObject>;

/// How well a value fits a constructor argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchLevel {
    /// The value has exactly the declared kind.
    Exact,
    /// The value converts implicitly to the declared kind.
    Promoted,
}

/// Argument kind accepted by a conversion constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgKind {
    Bool,
    /// Integers; booleans promote.
    Int,
    /// Floats; integers and booleans promote.
    Float,
    Str,
    /// Tuple of exactly this many items.
    Tuple(usize),
    /// Any tuple (promotion only).
    Sequence,
    /// Wrapped native object of this class or a subclass.
    Object(String),
    /// Special object of this type or a subtype.
    Special(String),
}

impl ArgKind {
    /// Match `value` against this kind.
    pub fn match_level(&self, value: &Value) -> Option<MatchLevel> {
        use MatchLevel::*;

        match (self, value) {
            (ArgKind::Bool, Value::Bool(_)) => Some(Exact),
            (ArgKind::Int, Value::Int(_)) => Some(Exact),
            (ArgKind::Int, Value::Bool(_)) => Some(Promoted),
            (ArgKind::Float, Value::Float(_)) => Some(Exact),
            (ArgKind::Float, Value::Int(_) | Value::Bool(_)) => Some(Promoted),
            (ArgKind::Str, Value::Str(_)) => Some(Exact),
            (ArgKind::Tuple(n), Value::Tuple(items)) if items.len() == *n => Some(Exact),
            (ArgKind::Sequence, Value::Tuple(_)) => Some(Promoted),
            (ArgKind::Object(class), Value::Object(w)) => {
                let native = w.native()?;
                if native.class_name() == class {
                    Some(Exact)
                } else if native.is_a(class) {
                    Some(Promoted)
                } else {
                    None
                }
            }
            (ArgKind::Special(name), Value::Special(s)) => {
                let ty = s.ty();
                if ty.stripped_name() == name {
                    Some(Exact)
                } else if ty.ancestors().any(|t| t.stripped_name() == name) {
                    Some(Promoted)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

/// A conversion constructor of a special type.
#[derive(Clone)]
pub struct ConversionCtor {
    accepts: ArgKind,
    func: ConversionFn,
}

impl ConversionCtor {
    /// Create a constructor accepting one argument of `accepts`.
    pub fn new<F>(accepts: ArgKind, func: F) -> Self
    where
        F: Fn(&Value) -> BridgeResult<SpecialObject> + 'static,
    {
        Self {
            accepts,
            func: Rc::new(func),
        }
    }

    /// Accepted argument kind.
    pub fn accepts(&self) -> &ArgKind {
        &self.accepts
    }

    /// Run the constructor.
    pub fn call(&self, value: &Value) -> BridgeResult<SpecialObject> {
        (self.func)(value)
    }
}

impl fmt::Debug for ConversionCtor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionCtor")
            .field("accepts", &self.accepts)
            .finish_non_exhaustive()
    }
}

/// Pick the best constructor for `value`, or `None` if nothing accepts it.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn find_conversion<'a>(
    candidates: &'a [ConversionCtor],
    value: &Value,
) -> Option<&'a ConversionCtor> {
    candidates
        .iter()
        .filter_map(|ctor| ctor.accepts.match_level(value).map(|level| (level, ctor)))
        .min_by_key(|(level, _)| *level)
        .map(|(_, ctor)| ctor)
}

/// Registry entry for a special type.
pub struct SpecialTypeDescriptor {
    wrapper_type: WrapperTypeRef,
    methods: Vec<MethodDef>,
    constructors: Vec<ConversionCtor>,
    copy: Option<CopyFn>,
}

impl SpecialTypeDescriptor {
    /// Describe a special type.
    pub fn new(wrapper_type: &WrapperTypeRef) -> Self {
        Self {
            wrapper_type: Rc::clone(wrapper_type),
            methods: Vec::new(),
            constructors: Vec::new(),
            copy: None,
        }
    }

    /// Add a method.
    pub fn with_method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    /// Add a conversion constructor. Order matters for tie-breaks.
    pub fn with_constructor(mut self, ctor: ConversionCtor) -> Self {
        self.constructors.push(ctor);
        self
    }

    /// Set the copy function.
    pub fn with_copy<F>(mut self, copy: F) -> Self
    where
        F: Fn(&SpecialObject) -> SpecialObject + 'static,
    {
        self.copy = Some(Rc::new(copy));
        self
    }

    /// Registry key: the wrapper type name without module prefix.
    pub fn name(&self) -> &str {
        self.wrapper_type.stripped_name()
    }

    pub fn wrapper_type(&self) -> &WrapperTypeRef {
        &self.wrapper_type
    }

    pub fn methods(&self) -> &[MethodDef] {
        &self.methods
    }

    pub fn constructors(&self) -> &[ConversionCtor] {
        &self.constructors
    }

    /// Copy a special object. Without a copy function the payload is shared.
    pub fn copy(&self, obj: &SpecialObject) -> SpecialObject {
        match &self.copy {
            Some(copy) => copy(obj),
            None => obj.clone(),
        }
    }

    /// Coerce `value` to this type.
    ///
    /// A value already of this type (or a subtype) is returned as is.
    /// Otherwise the best conversion constructor builds a temporary; this
    /// is refused when the caller cannot take ownership of one
    /// (`allow_temporary == false`). Type errors raised by the constructor
    /// mean "not convertible"; any other error is returned.
    pub fn coerce<'v>(&self, value: &'v Value, allow_temporary: bool) -> BridgeResult<Coerced<'v>> {
        let target = self.name();

        if let Value::Special(obj) = value
            && obj.ty().is_subtype_of(&self.wrapper_type)
        {
            return Ok(Coerced::Direct(obj));
        }

        if let Some(ctor) = find_conversion(&self.constructors, value) {
            match ctor.call(value) {
                Ok(obj) if allow_temporary => return Ok(Coerced::Temporary(obj)),
                Ok(_) => {
                    return Err(BridgeError::NonConstReference {
                        expected: target.to_string(),
                        actual: value.type_name().to_string(),
                    });
                }
                Err(err) if err.is_type_error() => {
                    debug!(special = %target, error = %err, "conversion rejected");
                }
                Err(err) => return Err(err),
            }
        }

        Err(BridgeError::type_mismatch(target, value.type_name()))
    }
}

impl fmt::Debug for SpecialTypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecialTypeDescriptor")
            .field("name", &self.name())
            .field("methods", &self.methods.len())
            .field("constructors", &self.constructors)
            .finish()
    }
}

/// A value coerced to a special type.
#[derive(Debug)]
pub enum Coerced<'a> {
    /// The value already had the requested type.
    Direct(&'a SpecialObject),
    /// A temporary built by a conversion constructor, owned by the caller.
    Temporary(SpecialObject),
}

impl Coerced<'_> {
    /// The special object, borrowed or owned.
    pub fn object(&self) -> &SpecialObject {
        match self {
            Coerced::Direct(obj) => obj,
            Coerced::Temporary(obj) => obj,
        }
    }

    /// Whether a temporary was created.
    pub fn is_temporary(&self) -> bool {
        matches!(self, Coerced::Temporary(_))
    }

    /// Typed access to the payload.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.object().downcast_ref::<T>()
    }
}

/// Registry of special types, keyed by stripped wrapper name.
#[derive(Default)]
pub struct SpecialTypeRegistry {
    types: FxHashMap<String, Rc<SpecialTypeDescriptor>>,
}

impl SpecialTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a special type, returning the type now registered under its
    /// name. The first registration wins.
    pub fn register(&mut self, descriptor: SpecialTypeDescriptor) -> WrapperTypeRef {
        let name = descriptor.name().to_string();
        if let Some(existing) = self.types.get(&name) {
            return Rc::clone(&existing.wrapper_type);
        }
        debug!(
            special = %name,
            constructors = descriptor.constructors.len(),
            "special type registered"
        );
        let ty = Rc::clone(&descriptor.wrapper_type);
        self.types.insert(name, Rc::new(descriptor));
        ty
    }

    pub fn get(&self, name: &str) -> Option<&Rc<SpecialTypeDescriptor>> {
        self.types.get(name)
    }

    /// Wrapper type registered under `name`.
    pub fn type_object(&self, name: &str) -> Option<WrapperTypeRef> {
        self.types.get(name).map(|d| Rc::clone(&d.wrapper_type))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Coerce `value` to the special type `target`.
    ///
    /// Unknown targets fail with a type mismatch; see
    /// [`SpecialTypeDescriptor::coerce`] for the rest.
    pub fn coerce<'v>(
        &self,
        value: &'v Value,
        target: &str,
        allow_temporary: bool,
    ) -> BridgeResult<Coerced<'v>> {
        match self.types.get(target) {
            Some(descriptor) => descriptor.coerce(value, allow_temporary),
            None => Err(BridgeError::type_mismatch(target, value.type_name())),
        }
    }
}

impl fmt::Debug for SpecialTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecialTypeRegistry")
            .field("types", &self.types.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use objbridge_core::{TypeFlags, WrapperType};

    use super::*;

    fn vector3() -> WrapperTypeRef {
        WrapperType::new("mod.Vector3")
            .with_flags(TypeFlags::SPECIAL)
            .into_ref()
    }

    fn vector_registry(ty: &WrapperTypeRef, calls: Rc<Cell<usize>>) -> SpecialTypeRegistry {
        let from_tuple = {
            let ty = Rc::clone(ty);
            let calls = Rc::clone(&calls);
            move |value: &Value| {
                calls.set(calls.get() + 1);
                let Value::Tuple(items) = value else {
                    return Err(BridgeError::Conversion("expected a tuple".into()));
                };
                let mut out = [0.0f64; 3];
                for (slot, item) in out.iter_mut().zip(items) {
                    *slot = match item {
                        Value::Float(x) => x.0,
                        Value::Int(i) => *i as f64,
                        other => {
                            return Err(BridgeError::Conversion(format!(
                                "a {} is not a number",
                                other.type_name()
                            )));
                        }
                    };
                }
                Ok(SpecialObject::new(&ty, out))
            }
        };
        let from_scalar = {
            let ty = Rc::clone(ty);
            move |value: &Value| {
                calls.set(calls.get() + 1);
                match value {
                    Value::Float(x) => Ok(SpecialObject::new(&ty, [x.0; 3])),
                    Value::Int(i) => Ok(SpecialObject::new(&ty, [*i as f64; 3])),
                    _ => Err(BridgeError::Conversion("expected a number".into())),
                }
            }
        };

        let mut registry = SpecialTypeRegistry::new();
        registry.register(
            SpecialTypeDescriptor::new(ty)
                .with_constructor(ConversionCtor::new(ArgKind::Tuple(3), from_tuple))
                .with_constructor(ConversionCtor::new(ArgKind::Float, from_scalar)),
        );
        registry
    }

    #[test]
    fn keyed_by_stripped_name() {
        let ty = vector3();
        let registry = vector_registry(&ty, Rc::default());
        assert!(registry.get("Vector3").is_some());
        assert!(registry.get("mod.Vector3").is_none());
        assert!(Rc::ptr_eq(&registry.type_object("Vector3").unwrap(), &ty));
    }

    #[test]
    fn first_registration_wins() {
        let ty = vector3();
        let mut registry = vector_registry(&ty, Rc::default());
        let other = vector3();
        let got = registry.register(SpecialTypeDescriptor::new(&other));
        assert!(Rc::ptr_eq(&got, &ty));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn same_type_is_direct_without_constructor_call() {
        let ty = vector3();
        let calls = Rc::new(Cell::new(0));
        let registry = vector_registry(&ty, Rc::clone(&calls));
        let value = Value::Special(SpecialObject::new(&ty, [1.0f64, 2.0, 3.0]));

        let coerced = registry.coerce(&value, "Vector3", false).unwrap();
        assert!(!coerced.is_temporary());
        assert!(coerced.object().ptr_eq(value.as_special().unwrap()));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn conversion_builds_temporary() {
        let ty = vector3();
        let registry = vector_registry(&ty, Rc::default());
        let value = Value::Tuple(vec![Value::Int(1), Value::float(2.0), Value::Int(3)]);

        let coerced = registry.coerce(&value, "Vector3", true).unwrap();
        assert!(coerced.is_temporary());
        assert_eq!(coerced.downcast_ref::<[f64; 3]>(), Some(&[1.0, 2.0, 3.0]));
    }

    #[test]
    fn promotion_reaches_float_constructor() {
        let ty = vector3();
        let registry = vector_registry(&ty, Rc::default());
        let coerced = registry.coerce(&Value::Int(2), "Vector3", true).unwrap();
        assert_eq!(coerced.downcast_ref::<[f64; 3]>(), Some(&[2.0, 2.0, 2.0]));
    }

    #[test]
    fn temporary_refused_for_non_const_reference() {
        let ty = vector3();
        let registry = vector_registry(&ty, Rc::default());
        let err = registry
            .coerce(&Value::float(1.0), "Vector3", false)
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot pass float as a non-const Vector3 reference");
    }

    #[test]
    fn constructor_type_error_becomes_mismatch() {
        let ty = vector3();
        let registry = vector_registry(&ty, Rc::default());
        let value = Value::Tuple(vec![Value::str("a"), Value::Int(2), Value::Int(3)]);
        let err = registry.coerce(&value, "Vector3", true).unwrap_err();
        assert_eq!(err, BridgeError::type_mismatch("Vector3", "tuple"));
    }

    #[test]
    fn constructor_hard_error_propagates() {
        let ty = vector3();
        let mut registry = SpecialTypeRegistry::new();
        registry.register(SpecialTypeDescriptor::new(&ty).with_constructor(ConversionCtor::new(
            ArgKind::Str,
            |_| Err(BridgeError::Callback("parser crashed".into())),
        )));
        let err = registry
            .coerce(&Value::str("1 2 3"), "Vector3", true)
            .unwrap_err();
        assert_eq!(err, BridgeError::Callback("parser crashed".into()));
    }

    #[test]
    fn unknown_target_or_no_candidate_is_mismatch() {
        let ty = vector3();
        let registry = vector_registry(&ty, Rc::default());
        assert_eq!(
            registry.coerce(&Value::Int(1), "Matrix3", true).unwrap_err(),
            BridgeError::type_mismatch("Matrix3", "int")
        );
        assert_eq!(
            registry.coerce(&Value::str("x"), "Vector3", true).unwrap_err(),
            BridgeError::type_mismatch("Vector3", "str")
        );
    }

    #[test]
    fn exact_match_beats_earlier_promotion() {
        let ctors = [
            ConversionCtor::new(ArgKind::Float, |_| Err(BridgeError::Conversion("float".into()))),
            ConversionCtor::new(ArgKind::Int, |_| Err(BridgeError::Conversion("int".into()))),
        ];
        let best = find_conversion(&ctors, &Value::Int(1)).unwrap();
        assert_eq!(best.accepts(), &ArgKind::Int);

        let best = find_conversion(&ctors, &Value::Bool(true)).unwrap();
        assert_eq!(best.accepts(), &ArgKind::Float);
        assert!(find_conversion(&ctors, &Value::None).is_none());
    }

    #[test]
    fn special_subtype_promotes() {
        let base = vector3();
        let derived = WrapperType::new("mod.Point3")
            .with_base(&base)
            .with_flags(TypeFlags::SPECIAL)
            .into_ref();
        let value = Value::Special(SpecialObject::new(&derived, 0u8));
        assert_eq!(
            ArgKind::Special("Vector3".into()).match_level(&value),
            Some(MatchLevel::Promoted)
        );
        assert_eq!(
            ArgKind::Special("Point3".into()).match_level(&value),
            Some(MatchLevel::Exact)
        );
        assert_eq!(ArgKind::Special("Other".into()).match_level(&value), None);
    }

    #[test]
    fn copy_function() {
        let ty = vector3();
        let descriptor = SpecialTypeDescriptor::new(&ty).with_copy({
            let ty = Rc::clone(&ty);
            move |obj| {
                let data = obj.downcast_ref::<[f64; 3]>().copied().unwrap_or_default();
                SpecialObject::new(&ty, data)
            }
        });
        let original = SpecialObject::new(&ty, [1.0f64, 2.0, 3.0]);
        let copy = descriptor.copy(&original);
        assert!(!copy.ptr_eq(&original));
        assert_eq!(copy.downcast_ref::<[f64; 3]>(), Some(&[1.0, 2.0, 3.0]));

        let shared = SpecialTypeDescriptor::new(&ty).copy(&original);
        assert!(shared.ptr_eq(&original));
    }
}
