//! Named breakpoint shortcuts: `@md`, `@+sm`, `@-lg`.

use super::{Preprocessor, Shortcut};
use crate::MediaQueryError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

static NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]+$").expect("valid regex"));

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([+-]?)([a-z]+)$").expect("valid regex"));

/// Default breakpoints: `(name, min, max)` in CSS pixels.
const DEFAULTS: [(&str, u32, u32); 5] = [
    ("xs", 1, 767),
    ("sm", 768, 991),
    ("md", 992, 1199),
    ("lg", 1200, 1599),
    ("xl", 1600, 999_999),
];

/// A viewport width range in CSS pixels, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Breakpoint {
    /// Lower bound.
    pub min: u32,
    /// Upper bound.
    pub max: u32,
}

impl Breakpoint {
    /// Create a breakpoint.
    #[must_use]
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// `(min-width: {min}px) and (max-width: {max}px)`
    #[must_use]
    pub fn range_query(&self) -> String {
        format!("{} and {}", self.min_query(), self.max_query())
    }

    /// `(min-width: {min}px)`
    #[must_use]
    pub fn min_query(&self) -> String {
        format!("(min-width: {}px)", self.min)
    }

    /// `(max-width: {max}px)`
    #[must_use]
    pub fn max_query(&self) -> String {
        format!("(max-width: {}px)", self.max)
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}px", self.min, self.max)
    }
}

/// Registry of named breakpoints.
///
/// Names are Latin letters only, case-insensitive. A leading `+` selects the
/// breakpoint and everything wider, a leading `-` the breakpoint and
/// everything narrower.
#[derive(Debug)]
pub struct BreakpointShortcuts {
    entries: RwLock<HashMap<String, Breakpoint>>,
}

impl BreakpointShortcuts {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Add or overwrite a breakpoint. Returns the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`MediaQueryError::InvalidBreakpointName`] if `name` is not made
    /// of Latin letters only.
    pub fn add(&self, name: &str, min: u32, max: u32) -> Result<Option<Breakpoint>, MediaQueryError> {
        let key = name.to_lowercase();
        if !NAME.is_match(&key) {
            return Err(MediaQueryError::InvalidBreakpointName {
                name: name.to_string(),
            });
        }
        let previous = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Breakpoint::new(min, max));
        tracing::debug!(name, min, max, replaced = previous.is_some(), "breakpoint registered");
        Ok(previous)
    }

    /// Remove a breakpoint. Returns it if it existed.
    pub fn remove(&self, name: &str) -> Option<Breakpoint> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&name.to_lowercase())
    }

    /// Look up a breakpoint by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Breakpoint> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name.to_lowercase())
            .copied()
    }

    /// All breakpoints, ordered by lower bound.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, Breakpoint)> {
        let mut entries: Vec<(String, Breakpoint)> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, bp)| (name.clone(), *bp))
            .collect();
        entries.sort_by(|a, b| a.1.min.cmp(&b.1.min).then_with(|| a.0.cmp(&b.0)));
        entries
    }
}

impl Default for BreakpointShortcuts {
    /// The standard `xs`..`xl` set.
    fn default() -> Self {
        let entries = DEFAULTS
            .iter()
            .map(|(name, min, max)| ((*name).to_string(), Breakpoint::new(*min, *max)))
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }
}

impl Preprocessor for BreakpointShortcuts {
    fn name(&self) -> &str {
        "breakpoints"
    }

    fn process(&self, shortcut: &str) -> Option<Shortcut> {
        let captures = TOKEN.captures(shortcut)?;
        let breakpoint = self.get(&captures[2])?;
        let query = match &captures[1] {
            "+" => breakpoint.min_query(),
            "-" => breakpoint.max_query(),
            _ => breakpoint.range_query(),
        };
        Some(Shortcut::Query(query))
    }
}
