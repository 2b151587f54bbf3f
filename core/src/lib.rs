//! mediq - Observable media query conditions and responsive rule lists
//!
//! A small query language that compiles strings such as `@+md and not @ie` or
//! `(min-width: 600px), @mobile` into a live, observable boolean condition
//! tree kept in sync with the environment's media matching primitive.
//!
//! # Architecture
//!
//! - [`MatchMedia`] / [`MediaQueryList`]: the injectable environment primitive
//!   (a browser's `matchMedia`, or [`VirtualMedia`] when headless)
//! - [`Condition`]: closed set of condition nodes (`Always`, `Never`, `Match`,
//!   `And`, `Or`)
//! - [`ShortcutRegistry`]: ordered chain of [`Preprocessor`]s rewriting
//!   `@token` shortcuts (breakpoints, pixel density, device flags)
//! - [`QueryCompiler`]: string → optimized [`Condition`] tree, with a
//!   per-compiler cache
//! - [`Rule`] / [`RuleList`]: conditions paired with payloads; "the value that
//!   applies right now" with later-declared-wins semantics
//!
//! # Key Design Insights
//!
//! 1. **Lazy subscriptions**: a composite condition holds no subscriptions to
//!    its children until somebody listens to it, and releases them when the
//!    last listener leaves. Nothing leaks native listeners.
//!
//! 2. **Reads never go stale**: `matches()` always recomputes from the leaves.
//!    The cached value only serves as a baseline for change detection.
//!
//! 3. **String-based constants**: a condition is the `Always` constant iff its
//!    canonical form is `"all"`, and `Never` iff it is `"not all"`.
//!
//! # Example
//!
//! ```
//! use mediq::prelude::*;
//! use std::rc::Rc;
//!
//! let media = VirtualMedia::new(MediaFeatures::with_size(900.0, 600.0));
//! let compiler = QueryCompiler::new(Rc::new(media.clone()));
//!
//! let wide = compiler.for_query("not @mobile and (min-width: 800px)");
//! assert!(wide.matches());
//!
//! let layout = RuleList::parse("wide=>@+md|narrow", &compiler);
//! assert_eq!(layout.active_value().as_deref(), Some("narrow"));
//!
//! media.set_width(1000.0);
//! assert_eq!(layout.active_value().as_deref(), Some("wide"));
//! ```

// ═══════════════════════════════════════════════════════════════════════════════
// Modules
// ═══════════════════════════════════════════════════════════════════════════════

mod compiler;
mod condition;
mod listener;
mod media;
mod rule;
mod rule_list;
mod trace;
mod virtual_media;

pub mod shortcuts;

#[cfg(feature = "config")]
mod config;

// ═══════════════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════════════

// Core types
pub use compiler::QueryCompiler;
pub use condition::{Condition, ConditionContainer, Junction, MatchCondition};
pub use listener::{Listener, ListenerId, ListenerSet};
pub use media::{MatchMedia, MediaQueryList};
pub use rule::{parse_string, Rule, RuleValue};
pub use rule_list::RuleList;
pub use virtual_media::{MediaFeatures, Pointer, VirtualMedia, VirtualQueryList};

// Shortcuts
pub use shortcuts::{
    default_registry, Breakpoint, BreakpointShortcuts, DeviceInfo, DprShortcuts, EnvShortcuts,
    Preprocessor, Shortcut, ShortcutRegistry,
};

// Config (feature-gated)
#[cfg(feature = "config")]
pub use config::{BreakpointConfig, EnvValue, ShortcutConfig};
#[cfg(feature = "config")]
pub use rule::parse_object;

// Trace types
pub use trace::{ConditionTrace, RuleListTrace, RuleStep};

// ═══════════════════════════════════════════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════════════════════════════════════════

/// Prelude module for convenient imports.
///
/// ```
/// use mediq::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Core types
        Condition,
        // Trace types
        ConditionTrace,
        DeviceInfo,
        ListenerId,
        // Environment
        MatchMedia,
        MediaFeatures,
        // Errors
        MediaQueryError,
        MediaQueryList,
        Preprocessor,
        QueryCompiler,
        Rule,
        RuleList,
        RuleListTrace,
        RuleValue,
        Shortcut,
        ShortcutRegistry,
        VirtualMedia,
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════════

/// Canonical form of the always-true condition.
pub const ALL: &str = "all";

/// Canonical form of the always-false condition.
pub const NOT_ALL: &str = "not all";

/// Separates rules in the rule-list DSL: `a=>@sm|b=>@md|c`.
pub const RULE_DELIMITER: char = '|';

/// Separates a rule's payload from its condition: `payload=>query`.
pub const RULE_SEPARATOR: &str = "=>";

// ═══════════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors from shortcut registration, rule-list construction and configuration.
///
/// These are configuration errors: they surface at the point of declaration,
/// never while evaluating a compiled condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaQueryError {
    /// A breakpoint shortcut name contains something other than Latin letters.
    #[error("invalid breakpoint name \"{name}\": only Latin letters are allowed")]
    InvalidBreakpointName {
        /// The rejected name.
        name: String,
    },

    /// `RuleList::parse_tuple` received value and mask lists of different length.
    #[error("tuple length mismatch: {values} values but {mask} queries in mask")]
    TupleLengthMismatch {
        /// Number of `|`-separated values.
        values: usize,
        /// Number of `|`-separated queries.
        mask: usize,
    },

    /// A media feature value could not be parsed.
    #[error("invalid value \"{value}\" for media feature \"{name}\"")]
    InvalidFeature {
        /// Feature name.
        name: String,
        /// The rejected value.
        value: String,
    },

    /// Shortcut configuration failed to deserialize or validate.
    #[error("invalid config: {reason}")]
    InvalidConfig {
        /// The underlying error message.
        reason: String,
    },
}
