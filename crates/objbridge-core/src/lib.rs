//! Core types for the objbridge native/scripting identity bridge.
//!
//! This crate holds everything the registries and the bridge facade share:
//!
//! - [`NativeObject`], [`NativeRef`], [`ObjectId`]: the native side
//! - [`WrapperType`], [`Wrapper`], [`AttrDict`]: the scripting side
//! - [`Value`], [`SpecialObject`]: values passed across the bridge
//! - [`pointer`]: the legacy textual pointer codec
//! - [`BridgeError`], [`PointerError`]: error types

pub mod error;
pub mod names;
pub mod native;
pub mod pointer;
pub mod value;
pub mod wrapper;
pub mod wrapper_type;

pub use error::{BridgeError, BridgeResult, PointerError};
pub use names::{is_identifier, module_basename, strip_module};
pub use native::{NativeObject, NativeRef, NativeWeak, ObjectId};
pub use pointer::{
    ParsedAddress, Unmangled, decode_pointer, mangle_pointer,
    mangle_pointer_with_width, parse_address, unmangle_pointer,
};
pub use value::{SpecialObject, Value, WrapperAdapter, value_hash};
pub use wrapper::{AttrDict, Wrapper};
pub use wrapper_type::{Ancestors, GetSetDef, TypeFlags, WrapperType, WrapperTypeRef};
