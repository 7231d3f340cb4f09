//! Registries for the objbridge bridge.
//!
//! - [`ClassRegistry`]: native class name to wrapper class, with nearest
//!   registered ancestor resolution
//! - [`SpecialTypeRegistry`]: by-value types and conversion dispatch
//! - [`NamespaceRegistry`], [`EnumRegistry`], [`ModuleRegistry`]: name tables
//!
//! All registries are plain single-threaded data structures. Sharing and
//! re-entrancy are handled by the bridge that owns them.

pub mod class_registry;
pub mod enums;
pub mod modules;
pub mod namespace;
pub mod special_types;

pub use class_registry::{
    ClassDescriptor, ClassRegistry, MethodDef, MethodFn, NativeConstructor, nearest_ancestor,
};
pub use enums::EnumRegistry;
pub use modules::{ImportRequest, ModuleLoader, ModuleRegistry};
pub use namespace::{Namespace, NamespaceRef, NamespaceRegistry};
pub use special_types::{
    ArgKind, Coerced, ConversionCtor, ConversionFn, CopyFn, MatchLevel, SpecialTypeDescriptor,
    SpecialTypeRegistry, find_conversion,
};
