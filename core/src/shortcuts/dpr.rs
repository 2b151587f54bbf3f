//! Pixel density shortcuts: `@1x`, `@1.5x`, `@2x`.

use super::{Preprocessor, Shortcut};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::atomic::{AtomicBool, Ordering};

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(-?[0-9.]+)x$").expect("valid regex"));

/// Resolves `@{n}x` to `(min-resolution: {n}dppx)`.
///
/// Negative or non-numeric densities are declined, so the term falls through
/// to the next preprocessor (and, if nobody resolves it, stays a literal that
/// never matches).
///
/// With [`set_ignore_bots`](Self::set_ignore_bots) enabled, densities above 1x
/// resolve to `not all` for bot agents, so crawlers skip high-density assets.
#[derive(Debug)]
pub struct DprShortcuts {
    bot: AtomicBool,
    ignore_bots: AtomicBool,
}

impl DprShortcuts {
    /// Create the preprocessor. `bot` marks the current agent as a bot.
    #[must_use]
    pub fn new(bot: bool) -> Self {
        Self {
            bot: AtomicBool::new(bot),
            ignore_bots: AtomicBool::new(false),
        }
    }

    /// Force densities above 1x to never match for bots.
    pub fn set_ignore_bots(&self, ignore: bool) {
        self.ignore_bots.store(ignore, Ordering::Relaxed);
    }

    /// Whether densities above 1x are suppressed for bots.
    #[must_use]
    pub fn ignores_bots(&self) -> bool {
        self.ignore_bots.load(Ordering::Relaxed)
    }

    /// Mark the current agent as a bot (or not).
    pub fn set_bot(&self, bot: bool) {
        self.bot.store(bot, Ordering::Relaxed);
    }
}

impl Default for DprShortcuts {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Preprocessor for DprShortcuts {
    fn name(&self) -> &str {
        "dpr"
    }

    fn process(&self, shortcut: &str) -> Option<Shortcut> {
        let captures = TOKEN.captures(shortcut)?;
        let dpr: f64 = captures[1].parse().ok()?;
        if !dpr.is_finite() || dpr < 0.0 {
            return None;
        }
        if dpr > 1.0 && self.ignores_bots() && self.bot.load(Ordering::Relaxed) {
            return Some(Shortcut::Const(false));
        }
        Some(Shortcut::Query(format!("(min-resolution: {dpr}dppx)")))
    }
}
