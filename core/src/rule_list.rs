//! RuleList: "the value that applies right now".
//!
//! An ordered sequence of [`Rule`]s with later-declared-wins semantics. Default
//! rules are moved to the front, so any conditional rule that matches
//! overrides them; the default only supplies the fallback value (or fallback
//! keys, for object-like payloads).

use crate::{
    trace::{RuleListTrace, RuleStep},
    Listener, ListenerId, ListenerSet, MediaQueryError, QueryCompiler, Rule, RuleValue,
    RULE_DELIMITER,
};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

struct RuleListInner<T> {
    rules: Vec<Rule<T>>,
    empty: Rule<T>,
    listeners: ListenerSet<RuleList<T>>,
    subscriptions: RefCell<Vec<ListenerId>>,
    baseline: Cell<Option<usize>>,
    this: Weak<RuleListInner<T>>,
}

/// Ordered, observable list of rules.
///
/// Cloning is cheap: clones share rules and listeners.
///
/// # Example
///
/// ```
/// use mediq::{MediaFeatures, QueryCompiler, RuleList, VirtualMedia};
/// use std::rc::Rc;
///
/// let media = VirtualMedia::new(MediaFeatures::with_size(800.0, 600.0));
/// let compiler = QueryCompiler::new(Rc::new(media.clone()));
///
/// let columns = RuleList::parse_tuple("1|2|3", "@xs|@sm|@+md", &compiler).unwrap();
/// assert_eq!(columns.active_value().as_deref(), Some("2"));
/// ```
pub struct RuleList<T> {
    inner: Rc<RuleListInner<T>>,
}

impl<T> Clone for RuleList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> RuleList<T> {
    /// Build a list from `rules`. Default rules are moved to the front; the
    /// relative order is otherwise kept.
    #[must_use]
    pub fn new(rules: Vec<Rule<T>>) -> Self {
        let (mut ordered, conditional): (Vec<_>, Vec<_>) =
            rules.into_iter().partition(Rule::is_default);
        ordered.extend(conditional);
        let inner = Rc::new_cyclic(|this| RuleListInner {
            rules: ordered,
            empty: Rule::empty(),
            listeners: ListenerSet::new(),
            subscriptions: RefCell::new(Vec::new()),
            baseline: Cell::new(None),
            this: this.clone(),
        });
        Self { inner }
    }

    /// Parse `payload=>query|payload=>query|payload` with a custom payload
    /// parser.
    ///
    /// Blank segments are ignored. Segments whose payload the parser rejects
    /// are dropped.
    pub fn parse_with(
        query: &str,
        compiler: &QueryCompiler,
        parser: impl Fn(&str) -> Option<T>,
    ) -> Self {
        let rules = query
            .split(RULE_DELIMITER)
            .filter(|segment| !segment.trim().is_empty())
            .filter_map(|segment| Rule::parse(segment, compiler, &parser))
            .collect();
        Self::new(rules)
    }

    /// Zip `values` and `mask` (both `|`-separated) into rules, pairwise.
    ///
    /// # Errors
    ///
    /// Returns [`MediaQueryError::TupleLengthMismatch`] if the two lists have
    /// different lengths.
    pub fn parse_tuple_with(
        values: &str,
        mask: &str,
        compiler: &QueryCompiler,
        parser: impl Fn(&str) -> Option<T>,
    ) -> Result<Self, MediaQueryError> {
        let values: Vec<&str> = values.split(RULE_DELIMITER).collect();
        let queries: Vec<&str> = mask.split(RULE_DELIMITER).collect();
        if values.len() != queries.len() {
            return Err(MediaQueryError::TupleLengthMismatch {
                values: values.len(),
                mask: queries.len(),
            });
        }
        let rules = values
            .iter()
            .zip(&queries)
            .filter_map(|(value, query)| Rule::from_parts(value, query, compiler, &parser))
            .collect();
        Ok(Self::new(rules))
    }

    /// Rules in evaluation order (defaults first).
    #[must_use]
    pub fn rules(&self) -> &[Rule<T>] {
        &self.inner.rules
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.rules.len()
    }

    /// Returns `true` if the list has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.rules.is_empty()
    }

    /// The default rule, if one was declared.
    #[must_use]
    pub fn default_rule(&self) -> Option<&Rule<T>> {
        self.inner.rules.first().filter(|rule| rule.is_default())
    }

    /// Index of the last currently matching rule.
    #[must_use]
    pub fn active_index(&self) -> Option<usize> {
        self.inner.rules.iter().rposition(Rule::matches)
    }

    /// The last currently matching rule, or an empty rule (no payload, never
    /// matches) if nothing matches.
    #[must_use]
    pub fn active_rule(&self) -> &Rule<T> {
        self.active_index()
            .map_or(&self.inner.empty, |index| &self.inner.rules[index])
    }

    /// Evaluate every rule with a full trace.
    #[must_use]
    pub fn trace(&self) -> RuleListTrace {
        let steps: Vec<RuleStep> = self
            .inner
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                let condition = rule.condition().trace();
                RuleStep {
                    index,
                    is_default: rule.is_default(),
                    matched: condition.matched(),
                    condition,
                }
            })
            .collect();
        let active = steps.iter().rposition(|step| step.matched);
        RuleListTrace { active, steps }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Whether `self` and `other` are the same list.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: RuleValue> RuleList<T> {
    /// The active rule's payload, layered over the default payload when both
    /// are object-like.
    #[must_use]
    pub fn active_value(&self) -> Option<T> {
        let payload = self.active_rule().payload()?;
        let merged = self
            .default_rule()
            .and_then(Rule::payload)
            .and_then(|base| payload.merge_over(base));
        Some(merged.unwrap_or_else(|| payload.clone()))
    }
}

impl<T: 'static> RuleList<T> {
    /// Listen for changes of the active rule.
    ///
    /// The first listener subscribes to every rule's condition; removing the
    /// last one releases those subscriptions.
    pub fn add_listener(&self, listener: impl Fn(&RuleList<T>) + 'static) -> ListenerId {
        self.subscribe(Rc::new(listener))
    }

    /// Like [`add_listener`](Self::add_listener), with a shared listener.
    pub fn subscribe(&self, listener: Listener<RuleList<T>>) -> ListenerId {
        let attach = self.inner.listeners.is_empty();
        let id = self.inner.listeners.add(listener);
        if attach {
            self.attach();
        }
        id
    }

    /// Remove a listener. Returns `true` if it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let removed = self.inner.listeners.remove(id);
        if removed && self.inner.listeners.is_empty() {
            self.detach();
        }
        removed
    }

    fn attach(&self) {
        self.inner.baseline.set(self.active_index());
        let ids: Vec<ListenerId> = self
            .inner
            .rules
            .iter()
            .map(|rule| {
                let weak = self.inner.this.clone();
                rule.condition().subscribe(Rc::new(move |_| {
                    if let Some(inner) = weak.upgrade() {
                        RuleList { inner }.on_rule_change();
                    }
                }))
            })
            .collect();
        tracing::trace!(rules = ids.len(), "rule list attached to conditions");
        *self.inner.subscriptions.borrow_mut() = ids;
    }

    fn detach(&self) {
        let ids = std::mem::take(&mut *self.inner.subscriptions.borrow_mut());
        for (rule, id) in self.inner.rules.iter().zip(ids) {
            rule.condition().remove_listener(id);
        }
        tracing::trace!(rules = self.inner.rules.len(), "rule list detached from conditions");
    }

    fn on_rule_change(&self) {
        let active = self.active_index();
        if active != self.inner.baseline.get() {
            tracing::debug!(from = ?self.inner.baseline.get(), to = ?active, "active rule changed");
            self.inner.baseline.set(active);
            self.inner.listeners.dispatch(self);
        }
    }
}

impl RuleList<String> {
    /// Parse a rule list with string payloads.
    #[must_use]
    pub fn parse(query: &str, compiler: &QueryCompiler) -> Self {
        Self::parse_with(query, compiler, crate::parse_string)
    }

    /// Zip string values with a query mask.
    ///
    /// # Errors
    ///
    /// Returns [`MediaQueryError::TupleLengthMismatch`] if the two lists have
    /// different lengths.
    pub fn parse_tuple(
        values: &str,
        mask: &str,
        compiler: &QueryCompiler,
    ) -> Result<Self, MediaQueryError> {
        Self::parse_tuple_with(values, mask, compiler, crate::parse_string)
    }
}

impl<T: fmt::Display> fmt::Display for RuleList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rule) in self.inner.rules.iter().enumerate() {
            if i > 0 {
                write!(f, "{RULE_DELIMITER}")?;
            }
            fmt::Display::fmt(rule, f)?;
        }
        Ok(())
    }
}

impl<T: fmt::Debug> fmt::Debug for RuleList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleList")
            .field("rules", &self.inner.rules)
            .field("listeners", &self.inner.listeners.len())
            .finish()
    }
}
