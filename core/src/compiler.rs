//! Compiler: query string -> optimized [`Condition`] tree
//!
//! The query DSL is a two-level normal form:
//!
//! ```text
//! query  := group ( ("," | " or ") group )*
//! group  := term ( " and " term )*
//! term   := [ "not " ] ( "@" shortcut | descriptor )
//! ```
//!
//! Each term is preprocessed through the [`ShortcutRegistry`]. A preprocessor
//! may itself return an inverted descriptor (`not all`), so inversion is
//! stripped again after preprocessing and the two flags are XORed.

use crate::{Condition, MatchMedia, ShortcutRegistry, ALL, NOT_ALL};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

static OR_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*,\s*|\s+or\s+").expect("valid regex"));

static AND_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+and\s+").expect("valid regex"));

static NOT_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^not\s+").expect("valid regex"));

/// Compiles query strings into observable [`Condition`]s.
///
/// Holds the environment leaves are created in, the shortcut registry terms
/// are preprocessed with, and a cache for [`for_query`](Self::for_query).
///
/// # Example
///
/// ```
/// use mediq::{MediaFeatures, QueryCompiler, VirtualMedia};
/// use std::rc::Rc;
///
/// let media = VirtualMedia::new(MediaFeatures::with_size(1000.0, 700.0));
/// let compiler = QueryCompiler::new(Rc::new(media));
///
/// let md = compiler.for_query("@md");
/// assert!(md.matches());
/// assert!(md.ptr_eq(&compiler.for_query("@md")));
/// ```
pub struct QueryCompiler {
    media: Rc<dyn MatchMedia>,
    shortcuts: Arc<ShortcutRegistry>,
    cache: RefCell<HashMap<String, Condition>>,
}

impl QueryCompiler {
    /// Compiler over `media` using the process-wide [`default_registry`](crate::default_registry).
    #[must_use]
    pub fn new(media: Rc<dyn MatchMedia>) -> Self {
        Self::with_shortcuts(media, crate::default_registry())
    }

    /// Compiler over `media` using an explicit registry.
    #[must_use]
    pub fn with_shortcuts(media: Rc<dyn MatchMedia>, shortcuts: Arc<ShortcutRegistry>) -> Self {
        Self {
            media,
            shortcuts,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// The registry terms are preprocessed with.
    #[must_use]
    pub fn shortcuts(&self) -> &ShortcutRegistry {
        &self.shortcuts
    }

    /// The environment leaves are created in.
    #[must_use]
    pub fn media(&self) -> &dyn MatchMedia {
        &*self.media
    }

    /// Compile `query` into a fresh, optimized condition.
    #[must_use]
    pub fn from_query(&self, query: &str) -> Condition {
        let query = query.trim();
        if query.is_empty() {
            return Condition::Always;
        }
        let groups: Vec<Condition> = OR_SPLIT
            .split(query)
            .map(|group| Condition::all(AND_SPLIT.split(group).map(|t| self.term(t)).collect()))
            .collect();
        let condition = Condition::any(groups).optimize();
        tracing::debug!(query, compiled = %condition, "compiled media query");
        condition
    }

    /// Cached variant of [`from_query`](Self::from_query).
    ///
    /// The same query string always returns the same instance until
    /// [`clear_cache`](Self::clear_cache) is called.
    #[must_use]
    pub fn for_query(&self, query: &str) -> Condition {
        if let Some(cached) = self.cache.borrow().get(query) {
            tracing::trace!(query, "media query cache hit");
            return cached.clone();
        }
        let condition = self.from_query(query);
        self.cache
            .borrow_mut()
            .insert(query.to_string(), condition.clone());
        condition
    }

    /// Forget every cached condition.
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Number of cached queries.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.borrow().len()
    }

    fn term(&self, term: &str) -> Condition {
        let (outer_not, rest) = strip_not(term.trim());
        let processed = self.shortcuts.preprocess(rest);
        let (inner_not, descriptor) = strip_not(processed.trim());
        let inverted = outer_not != inner_not;

        // An empty item in a non-empty list is invalid and never matches.
        if descriptor.is_empty() {
            return Condition::Never;
        }
        if descriptor.eq_ignore_ascii_case(ALL) {
            return Condition::from_bool(!inverted);
        }
        if descriptor.eq_ignore_ascii_case(NOT_ALL) {
            return Condition::from_bool(inverted);
        }
        Condition::media(&*self.media, descriptor, inverted)
    }
}

fn strip_not(term: &str) -> (bool, &str) {
    match NOT_PREFIX.find(term) {
        Some(m) => (true, &term[m.end()..]),
        None => (false, term),
    }
}

impl fmt::Debug for QueryCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCompiler")
            .field("shortcuts", &self.shortcuts)
            .field("cached", &self.cache_len())
            .finish()
    }
}
