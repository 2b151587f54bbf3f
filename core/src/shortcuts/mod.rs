//! Shortcut preprocessing for `@token` terms.
//!
//! Before a query term is compiled, the [`ShortcutRegistry`] gives every
//! registered [`Preprocessor`] a chance to rewrite `@token` shortcuts into a
//! real media descriptor or a constant.
//!
//! # Priority
//!
//! [`ShortcutRegistry::use_preprocessor`] prepends: the most recently
//! registered preprocessor is asked first. The first one that answers wins;
//! if none answers, the term is left as written.
//!
//! # Built-in preprocessors
//!
//! | Preprocessor | Shortcuts | Example |
//! |---|---|---|
//! | [`DprShortcuts`] | pixel density | `@2x`, `@1.5x` |
//! | [`BreakpointShortcuts`] | named viewport ranges | `@md`, `@+sm`, `@-lg` |
//! | [`EnvShortcuts`] | device/browser flags | `@mobile`, `@touch`, `@safari` |
//!
//! The standard chain registers them in that order, so environment shortcuts
//! have the highest priority.

mod breakpoints;
mod device;
mod dpr;
mod env;

pub use breakpoints::{Breakpoint, BreakpointShortcuts};
pub use device::DeviceInfo;
pub use dpr::DprShortcuts;
pub use env::EnvShortcuts;

use crate::{ALL, NOT_ALL};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

static SHORTCUT_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@([a-zA-Z0-9.+\-]+)$").expect("valid regex"));

static DEFAULT_REGISTRY: Lazy<Arc<ShortcutRegistry>> =
    Lazy::new(|| Arc::new(ShortcutRegistry::new()));

/// The process-wide default registry.
///
/// Used by [`QueryCompiler::new`](crate::QueryCompiler::new). Tests that
/// mutate shortcuts should build their own [`ShortcutRegistry`] instead.
#[must_use]
pub fn default_registry() -> Arc<ShortcutRegistry> {
    Arc::clone(&DEFAULT_REGISTRY)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Traits
// ═══════════════════════════════════════════════════════════════════════════════

/// What a preprocessor resolved a shortcut to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shortcut {
    /// A media descriptor to observe.
    Query(String),
    /// A constant: `true` becomes `all`, `false` becomes `not all`.
    Const(bool),
}

impl Shortcut {
    /// The term this shortcut is substituted with.
    #[must_use]
    pub fn into_term(self) -> String {
        match self {
            Self::Query(query) => query,
            Self::Const(true) => ALL.to_string(),
            Self::Const(false) => NOT_ALL.to_string(),
        }
    }
}

impl From<bool> for Shortcut {
    fn from(value: bool) -> Self {
        Self::Const(value)
    }
}

impl From<&str> for Shortcut {
    fn from(value: &str) -> Self {
        Self::Query(value.to_string())
    }
}

impl From<String> for Shortcut {
    fn from(value: String) -> Self {
        Self::Query(value)
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query(query) => f.write_str(query),
            Self::Const(value) => write!(f, "{value}"),
        }
    }
}

/// A resolver for `@token` shortcuts.
///
/// `process` receives the token without its `@`, lower-cased. Returning `None`
/// declines and passes the token to the next preprocessor.
///
/// # Example
///
/// ```
/// use mediq::{Preprocessor, Shortcut};
///
/// struct Retina;
///
/// impl Preprocessor for Retina {
///     fn name(&self) -> &str {
///         "retina"
///     }
///
///     fn process(&self, shortcut: &str) -> Option<Shortcut> {
///         (shortcut == "retina").then(|| Shortcut::from("(min-resolution: 2dppx)"))
///     }
/// }
/// ```
pub trait Preprocessor: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Resolve `shortcut`, or decline with `None`.
    fn process(&self, shortcut: &str) -> Option<Shortcut>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════════════

/// Ordered chain of preprocessors plus handles to the built-in ones.
///
/// Shared state: registration and the built-in maps are guarded by locks, so
/// a registry can be shared across compilers (and threads) behind an `Arc`.
/// Last write wins per key.
pub struct ShortcutRegistry {
    chain: RwLock<Vec<Arc<dyn Preprocessor>>>,
    breakpoints: Arc<BreakpointShortcuts>,
    dpr: Arc<DprShortcuts>,
    env: Arc<EnvShortcuts>,
}

impl ShortcutRegistry {
    /// Standard chain for a default desktop device.
    #[must_use]
    pub fn new() -> Self {
        Self::for_device(&DeviceInfo::default())
    }

    /// Standard chain with environment shortcuts derived from `device`.
    #[must_use]
    pub fn for_device(device: &DeviceInfo) -> Self {
        let registry = Self {
            chain: RwLock::new(Vec::new()),
            breakpoints: Arc::new(BreakpointShortcuts::default()),
            dpr: Arc::new(DprShortcuts::new(device.bot)),
            env: Arc::new(EnvShortcuts::from_device(device)),
        };
        registry.use_preprocessor(registry.dpr.clone());
        registry.use_preprocessor(registry.breakpoints.clone());
        registry.use_preprocessor(registry.env.clone());
        registry
    }

    /// Register `preprocessor` with the highest priority.
    pub fn use_preprocessor(&self, preprocessor: Arc<dyn Preprocessor>) -> &Self {
        tracing::debug!(preprocessor = preprocessor.name(), "registered shortcut preprocessor");
        self.chain
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(0, preprocessor);
        self
    }

    /// Named breakpoint shortcuts of the standard chain.
    #[must_use]
    pub fn breakpoints(&self) -> &BreakpointShortcuts {
        &self.breakpoints
    }

    /// Pixel density shortcuts of the standard chain.
    #[must_use]
    pub fn dpr(&self) -> &DprShortcuts {
        &self.dpr
    }

    /// Environment shortcuts of the standard chain.
    #[must_use]
    pub fn env(&self) -> &EnvShortcuts {
        &self.env
    }

    /// Names of the registered preprocessors, highest priority first.
    #[must_use]
    pub fn preprocessors(&self) -> Vec<String> {
        self.chain
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Rewrite `term` if it is a `@token` shortcut some preprocessor resolves.
    ///
    /// Terms that are not shortcuts, and shortcuts nobody resolves, are
    /// returned unchanged.
    #[must_use]
    pub fn preprocess(&self, term: &str) -> String {
        let Some(captures) = SHORTCUT_TOKEN.captures(term) else {
            return term.to_string();
        };
        let shortcut = captures[1].to_lowercase();

        let chain = self.chain.read().unwrap_or_else(PoisonError::into_inner);
        for preprocessor in chain.iter() {
            if let Some(resolved) = preprocessor.process(&shortcut) {
                tracing::trace!(
                    shortcut = %shortcut,
                    preprocessor = preprocessor.name(),
                    resolved = %resolved,
                    "resolved shortcut"
                );
                return resolved.into_term();
            }
        }
        tracing::debug!(term, "unresolved shortcut left as literal");
        term.to_string()
    }
}

impl Default for ShortcutRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ShortcutRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShortcutRegistry")
            .field("preprocessors", &self.preprocessors())
            .finish()
    }
}
