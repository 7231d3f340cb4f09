//! objbridge: object identity and lifetime bridge between reference-counted
//! native objects and scripting-side wrappers.
//!
//! The [`Bridge`] keeps at most one wrapper per live native object, holds one
//! durable reference per binding count, keeps the custom state of collected
//! wrappers as ghosts, and resolves native run-time classes to wrapper
//! classes (falling back to the nearest registered ancestor).
//!
//! ```
//! use std::rc::Rc;
//! use objbridge::prelude::*;
//!
//! struct Points;
//!
//! impl NativeObject for Points {
//!     fn class_name(&self) -> &str {
//!         "vtkPoints"
//!     }
//!
//!     fn is_a(&self, class_name: &str) -> bool {
//!         matches!(class_name, "vtkPoints" | "vtkObject")
//!     }
//! }
//!
//! let bridge = BridgeConfig::new().build();
//! let ty = WrapperType::new("vtkmodules.vtkObject").into_ref();
//! bridge.add_class_to_map(ClassDescriptor::new("vtkObject", &ty)).unwrap();
//!
//! let native: NativeRef = Rc::new(Points);
//! let wrapper = bridge.get_object_from_pointer(&native).unwrap();
//! assert!(bridge.find_object(&native).unwrap().ptr_eq(&wrapper));
//! ```

pub mod bridge;
pub mod command;
pub mod config;
pub mod ghost_map;
pub mod object_map;

pub use bridge::{Bridge, BridgeState, TeardownReport};
pub use command::{Command, CommandFn, CommandList};
pub use config::{BridgeConfig, BridgeSettings};
pub use ghost_map::{Ghost, GhostMap};
pub use object_map::{ObjectMap, Released};

pub use objbridge_core as core;
pub use objbridge_registry as registry;

// Re-export main types
pub mod prelude {
    pub use crate::bridge::{Bridge, BridgeState, TeardownReport};
    pub use crate::command::Command;
    pub use crate::config::BridgeConfig;
    pub use objbridge_core::{
        AttrDict, BridgeError, BridgeResult, GetSetDef, NativeObject, NativeRef, ObjectId,
        PointerError, SpecialObject, TypeFlags, Value, Wrapper, WrapperAdapter, WrapperType,
        WrapperTypeRef,
    };
    pub use objbridge_registry::{
        ArgKind, ClassDescriptor, Coerced, ConversionCtor, MethodDef, ModuleLoader, Namespace,
        SpecialTypeDescriptor,
    };
}
