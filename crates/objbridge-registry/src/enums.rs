//! Enum table - wrapper types of wrapped native enums.

use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use objbridge_core::WrapperTypeRef;

/// Enum name to wrapper type table. First registration wins.
#[derive(Debug, Default)]
pub struct EnumRegistry {
    enums: FxHashMap<String, WrapperTypeRef>,
}

impl EnumRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `ty` under `name` and return the type now registered.
    pub fn add(&mut self, name: &str, ty: &WrapperTypeRef) -> WrapperTypeRef {
        if let Some(existing) = self.enums.get(name) {
            return Rc::clone(existing);
        }
        debug!(enum_name = %name, "enum added");
        self.enums.insert(name.to_string(), Rc::clone(ty));
        Rc::clone(ty)
    }

    pub fn find(&self, name: &str) -> Option<WrapperTypeRef> {
        self.enums.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.enums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enums.is_empty()
    }

    pub fn clear(&mut self) {
        self.enums.clear();
    }
}
