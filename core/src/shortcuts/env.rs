//! Environment shortcuts: `@mobile`, `@touch`, `@safari`, ...

use super::{DeviceInfo, Preprocessor, Shortcut};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// Flat, runtime-editable map from shortcut name to a constant or descriptor.
///
/// Names are case-insensitive.
#[derive(Debug, Default)]
pub struct EnvShortcuts {
    entries: RwLock<BTreeMap<String, Shortcut>>,
}

impl EnvShortcuts {
    /// An empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard shortcut set for `device`.
    #[must_use]
    pub fn from_device(device: &DeviceInfo) -> Self {
        let shortcuts = Self::new();
        let flags = [
            ("all", true),
            ("none", false),
            ("bot", device.bot),
            ("mobile", device.mobile),
            ("desktop", !device.mobile),
            ("android", device.android),
            ("ios", device.ios),
            ("touch", device.touch),
            ("blink", device.blink),
            ("edge", device.edge),
            ("gecko", device.gecko),
            ("safari", device.safari),
            ("webkit", device.webkit),
            ("ie", device.ie),
        ];
        for (name, value) in flags {
            shortcuts.add(name, value);
        }
        shortcuts.add("portrait", "(orientation: portrait)");
        shortcuts.add("landscape", "(orientation: landscape)");
        shortcuts
    }

    /// Add or overwrite a shortcut. Returns the previous value.
    pub fn add(&self, name: &str, value: impl Into<Shortcut>) -> Option<Shortcut> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_lowercase(), value.into())
    }

    /// Remove a shortcut. Returns it if it existed.
    pub fn remove(&self, name: &str) -> Option<Shortcut> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&name.to_lowercase())
    }

    /// Look up a shortcut.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Shortcut> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name.to_lowercase())
            .cloned()
    }

    /// All shortcuts, ordered by name.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, Shortcut)> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

impl Preprocessor for EnvShortcuts {
    fn name(&self) -> &str {
        "env"
    }

    fn process(&self, shortcut: &str) -> Option<Shortcut> {
        self.get(shortcut)
    }
}
