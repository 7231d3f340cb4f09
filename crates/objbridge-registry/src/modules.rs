//! Loaded extension modules and the loader hook.
//!
//! The registry only records which modules are loaded. Importing and the
//! per-module init notification are delegated to a [`ModuleLoader`]; the
//! bridge calls it without holding any registry borrow, since an import
//! usually runs module init code that registers more classes.

use tracing::debug;

use objbridge_core::{BridgeResult, module_basename};

/// Hook into the scripting runtime's module system.
pub trait ModuleLoader {
    /// Import `name`. With `package`, import it relative to that package.
    fn import(&self, name: &str, package: Option<&str>) -> BridgeResult<()>;

    /// Called after an extension module finished loading.
    fn on_module_init(&self, name: &str) -> BridgeResult<()>;
}

/// How a module name is to be imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportRequest<'a> {
    /// Name as requested, used for the absolute import.
    pub full_name: &'a str,
    /// Last dotted component of the requested name.
    pub name: &'a str,
    /// Whether a relative import is attempted before the absolute one.
    pub relative_first: bool,
}

impl<'a> ImportRequest<'a> {
    /// Plan the import of `full_name`.
    ///
    /// Only a bare name, or one with a single leading dot, is tried
    /// relative to the caller's package first. The loaded-module check uses
    /// the last component.
    pub fn new(full_name: &'a str) -> Self {
        let name = module_basename(full_name);
        let relative_first =
            full_name == name || full_name.strip_prefix('.').is_some_and(|rest| rest == name);
        Self {
            full_name,
            name,
            relative_first,
        }
    }
}

/// Ordered list of loaded extension modules.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    loaded: Vec<String>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a loaded module. Returns false if it was already recorded.
    pub fn add(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        debug!(module = %name, "module loaded");
        self.loaded.push(name.to_string());
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.loaded.iter().any(|m| m == name)
    }

    /// Loaded module names in load order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.loaded.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    pub fn clear(&mut self) {
        self.loaded.clear();
    }
}
