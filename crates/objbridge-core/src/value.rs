//! Scripting values exchanged with the bridge.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use ordered_float::OrderedFloat;
use xxhash_rust::xxh64::xxh64;

use crate::error::BridgeResult;
use crate::wrapper::Wrapper;
use crate::wrapper_type::WrapperTypeRef;

/// A scripting object that is not a wrapper but knows how to produce one.
///
/// This is the hook used when a wrapper is required and a foreign object is
/// supplied instead.
pub trait WrapperAdapter {
    /// Type name shown in error messages.
    fn type_name(&self) -> &str;

    /// Produce the wrapper this object stands for.
    fn to_wrapper(&self) -> BridgeResult<Value>;
}

/// A by-value native object (vector, variant, matrix, ...).
///
/// The payload is shared between clones; copies with independent storage go
/// through the special type's copy function.
#[derive(Clone)]
pub struct SpecialObject {
    ty: WrapperTypeRef,
    payload: Rc<dyn Any>,
}

impl SpecialObject {
    /// Wrap a native value.
    pub fn new<T: Any>(ty: &WrapperTypeRef, value: T) -> Self {
        Self {
            ty: Rc::clone(ty),
            payload: Rc::new(value),
        }
    }

    /// Wrapper type.
    pub fn ty(&self) -> &WrapperTypeRef {
        &self.ty
    }

    /// Type-erased payload.
    pub fn payload(&self) -> &dyn Any {
        &*self.payload
    }

    /// Typed access to the payload.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// Whether both objects share the same payload.
    pub fn ptr_eq(&self, other: &SpecialObject) -> bool {
        Rc::ptr_eq(&self.payload, &other.payload)
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.payload) as *const () as usize
    }
}

impl fmt::Debug for SpecialObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecialObject")
            .field("type", &self.ty.name())
            .finish_non_exhaustive()
    }
}

/// A scripting value.
#[derive(Clone)]
pub enum Value {
    /// The null value.
    None,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(OrderedFloat<f64>),
    /// String value.
    Str(String),
    /// Fixed-length sequence.
    Tuple(Vec<Value>),
    /// Wrapper for an identity-bearing native object.
    Object(Wrapper),
    /// By-value native object.
    Special(SpecialObject),
    /// Foreign object adaptable to a wrapper.
    Adapter(Rc<dyn WrapperAdapter>),
}

impl Value {
    /// Shorthand for a float value.
    pub fn float(v: f64) -> Self {
        Value::Float(OrderedFloat(v))
    }

    /// Shorthand for a string value.
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Scripting type name of this value, without module prefix.
    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Tuple(_) => "tuple",
            Value::Object(w) => w.ty().stripped_name(),
            Value::Special(s) => s.ty().stripped_name(),
            Value::Adapter(a) => a.type_name(),
        }
    }

    /// Wrapper type of wrapped values.
    pub fn wrapper_type(&self) -> Option<&WrapperTypeRef> {
        match self {
            Value::Object(w) => Some(w.ty()),
            Value::Special(s) => Some(s.ty()),
            _ => None,
        }
    }

    /// Check if this is the null value.
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// The wrapper, if this is a wrapped native object.
    pub fn as_wrapper(&self) -> Option<&Wrapper> {
        match self {
            Value::Object(w) => Some(w),
            _ => None,
        }
    }

    /// The special object, if this is one.
    pub fn as_special(&self) -> Option<&SpecialObject> {
        match self {
            Value::Special(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Special(a), Value::Special(b)) => a.ptr_eq(b),
            (Value::Adapter(a), Value::Adapter(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Int(i) => write!(f, "Int({})", i),
            Value::Float(x) => write!(f, "Float({})", x),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Tuple(items) => f.debug_tuple("Tuple").field(items).finish(),
            Value::Object(w) => write!(f, "Object({:?})", w),
            Value::Special(s) => write!(f, "Special({:?})", s),
            Value::Adapter(a) => write!(f, "Adapter({})", a.type_name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Value::Object(w) => write!(f, "<{} at {:#x}>", w.ty().name(), w.addr()),
            Value::Special(s) => write!(f, "<{} at {:#x}>", s.ty().name(), s.addr()),
            Value::Adapter(a) => write!(f, "<{}>", a.type_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<Wrapper> for Value {
    fn from(w: Wrapper) -> Self {
        Value::Object(w)
    }
}

impl From<SpecialObject> for Value {
    fn from(s: SpecialObject) -> Self {
        Value::Special(s)
    }
}

/// Hash a value the way its equality is defined for variant-like keys.
///
/// Wrapped native objects hash by the identity of the native object they
/// refer to; every other value hashes by its string form, so values that
/// print the same compare and hash the same.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn value_hash(value: &Value) -> u64 {
    match value {
        Value::Object(w) => {
            let addr = w.native_id().map_or(w.addr(), |id| id.addr());
            xxh64(&addr.to_ne_bytes(), 0)
        }
        other => xxh64(other.to_string().as_bytes(), 0),
    }
}
