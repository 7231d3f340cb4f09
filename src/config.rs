//! Bridge configuration.

use std::fmt;
use std::rc::Rc;

use objbridge_core::pointer::POINTER_DIGITS;
use objbridge_registry::ModuleLoader;

use crate::bridge::Bridge;

/// Settings fixed for the lifetime of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeSettings {
    /// Keep ghosts of wrappers with custom state.
    pub preserve_ghosts: bool,
    /// Minimum hex digits of mangled pointers.
    pub pointer_digits: usize,
    /// Warn about bindings still alive at teardown.
    pub report_leaks: bool,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            preserve_ghosts: true,
            pointer_digits: POINTER_DIGITS,
            report_leaks: true,
        }
    }
}

/// Builder pattern for bridge configuration
///
/// ```
/// use objbridge::BridgeConfig;
///
/// let bridge = BridgeConfig::new()
///     .with_ghosts(false)
///     .with_pointer_digits(8)
///     .build();
/// assert!(!bridge.settings().preserve_ghosts);
/// ```
#[derive(Default)]
pub struct BridgeConfig {
    settings: BridgeSettings,
    loader: Option<Rc<dyn ModuleLoader>>,
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable ghost preservation.
    pub fn with_ghosts(mut self, preserve: bool) -> Self {
        self.settings.preserve_ghosts = preserve;
        self
    }

    /// Set the minimum digit count of mangled pointers.
    pub fn with_pointer_digits(mut self, digits: usize) -> Self {
        self.settings.pointer_digits = digits;
        self
    }

    /// Enable or disable the teardown leak report.
    pub fn with_leak_report(mut self, report: bool) -> Self {
        self.settings.report_leaks = report;
        self
    }

    /// Install the module loader used for imports and init notifications.
    pub fn with_module_loader<L>(mut self, loader: L) -> Self
    where
        L: ModuleLoader + 'static,
    {
        self.loader = Some(Rc::new(loader));
        self
    }

    /// Install a shared module loader.
    pub fn with_shared_module_loader(mut self, loader: Rc<dyn ModuleLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn build(self) -> Bridge {
        Bridge::with_parts(self.settings, self.loader)
    }
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("settings", &self.settings)
            .field("loader", &self.loader.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = BridgeSettings::default();
        assert!(settings.preserve_ghosts);
        assert!(settings.report_leaks);
        assert_eq!(settings.pointer_digits, 2 * std::mem::size_of::<usize>());
    }

    #[test]
    fn builder_overrides() {
        let bridge = BridgeConfig::new()
            .with_ghosts(false)
            .with_pointer_digits(4)
            .with_leak_report(false)
            .build();
        assert_eq!(
            *bridge.settings(),
            BridgeSettings {
                preserve_ghosts: false,
                pointer_digits: 4,
                report_leaks: false,
            }
        );
    }
}
