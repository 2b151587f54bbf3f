//! Declarative shortcut configuration.
//!
//! A [`ShortcutConfig`] deserializes from JSON or YAML and builds a
//! [`ShortcutRegistry`] with the standard preprocessor chain, adjusted by the
//! config:
//!
//! ```json
//! {
//!   "breakpoints": { "tablet": { "min": 600, "max": 1023 } },
//!   "remove_breakpoints": ["xl"],
//!   "env": { "dark": "(prefers-color-scheme: dark)", "kiosk": true },
//!   "user_agent": "Mozilla/5.0 (iPhone; ...)",
//!   "touch": true,
//!   "ignore_bots_dpr": true
//! }
//! ```
//!
//! Every field is optional.

use crate::{DeviceInfo, MediaQueryError, Shortcut, ShortcutRegistry};
use serde::Deserialize;
use std::collections::BTreeMap;

const MAX_WIDTH: u32 = 999_999;

fn max_width() -> u32 {
    MAX_WIDTH
}

/// A breakpoint declaration. `max` defaults to unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BreakpointConfig {
    /// Lower bound in CSS pixels.
    pub min: u32,
    /// Upper bound in CSS pixels.
    #[serde(default = "max_width")]
    pub max: u32,
}

/// An environment shortcut value: a constant or a media descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    /// `true` resolves to `all`, `false` to `not all`.
    Flag(bool),
    /// A media descriptor.
    Query(String),
}

impl From<EnvValue> for Shortcut {
    fn from(value: EnvValue) -> Self {
        match value {
            EnvValue::Flag(flag) => Shortcut::Const(flag),
            EnvValue::Query(query) => Shortcut::Query(query),
        }
    }
}

/// Shortcut registry configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShortcutConfig {
    /// Breakpoints added on top of (or replacing) the defaults.
    pub breakpoints: BTreeMap<String, BreakpointConfig>,
    /// Default breakpoints to drop. Applied before `breakpoints`.
    pub remove_breakpoints: Vec<String>,
    /// Environment shortcuts added on top of (or replacing) the device flags.
    pub env: BTreeMap<String, EnvValue>,
    /// User agent the device flags are detected from.
    pub user_agent: Option<String>,
    /// Whether touch input is available.
    pub touch: Option<bool>,
    /// Resolve densities above 1x to `not all` for bots.
    pub ignore_bots_dpr: bool,
}

impl ShortcutConfig {
    /// Parse a config from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`MediaQueryError::InvalidConfig`] if the JSON does not match
    /// the config shape.
    pub fn from_json(json: &str) -> Result<Self, MediaQueryError> {
        serde_json::from_str(json).map_err(|e| MediaQueryError::InvalidConfig {
            reason: e.to_string(),
        })
    }

    /// The device the environment shortcuts are derived from.
    #[must_use]
    pub fn device(&self) -> DeviceInfo {
        let device = self
            .user_agent
            .as_deref()
            .map_or_else(DeviceInfo::default, DeviceInfo::from_user_agent);
        let touch = self.touch.unwrap_or(device.touch);
        device.with_touch(touch)
    }

    /// Build a registry from this config.
    ///
    /// # Errors
    ///
    /// - [`MediaQueryError::InvalidBreakpointName`] for a name that is not
    ///   Latin letters only
    /// - [`MediaQueryError::InvalidConfig`] for a breakpoint with `min > max`
    pub fn build(&self) -> Result<ShortcutRegistry, MediaQueryError> {
        let registry = ShortcutRegistry::for_device(&self.device());
        registry.dpr().set_ignore_bots(self.ignore_bots_dpr);

        for name in &self.remove_breakpoints {
            if registry.breakpoints().remove(name).is_none() {
                tracing::debug!(name = %name, "breakpoint to remove was not registered");
            }
        }
        for (name, bp) in &self.breakpoints {
            if bp.min > bp.max {
                return Err(MediaQueryError::InvalidConfig {
                    reason: format!("breakpoint \"{name}\": min {} > max {}", bp.min, bp.max),
                });
            }
            registry.breakpoints().add(name, bp.min, bp.max)?;
        }
        for (name, value) in &self.env {
            registry.env().add(name, value.clone());
        }

        tracing::debug!(
            breakpoints = registry.breakpoints().entries().len(),
            env = registry.env().entries().len(),
            "built shortcut registry from config"
        );
        Ok(registry)
    }
}
