//! Condition: observable boolean nodes of a compiled media query.
//!
//! A [`Condition`] is one of five variants:
//!
//! - `Always` / `Never`: the constants, canonical forms `all` / `not all`
//! - `Match`: a leaf observing one [`MediaQueryList`], optionally inverted
//! - `And` / `Or`: a [`ConditionContainer`] over child conditions
//!
//! # INV: lazy subscriptions
//!
//! A container with no listeners holds no subscriptions to its children. The
//! first `add_listener` attaches to every child and captures a baseline value;
//! removing the last listener detaches from every child. The same holds for a
//! `Match` leaf and its single native subscription.
//!
//! # INV: reads never go stale
//!
//! `matches()` is always recomputed from the leaves. The baseline is only used
//! to decide whether a child notification is an actual transition.

use crate::{
    ConditionTrace, Listener, ListenerId, ListenerSet, MatchMedia, MediaQueryList, ALL, NOT_ALL,
};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

// ═══════════════════════════════════════════════════════════════════════════════
// Condition
// ═══════════════════════════════════════════════════════════════════════════════

/// A boolean-valued, observable node in a compiled query tree.
///
/// Cloning is cheap and preserves identity: clones share listeners and
/// subscriptions. Use [`ptr_eq`](Self::ptr_eq) to compare instances.
#[derive(Clone)]
pub enum Condition {
    /// Always true. Canonical form `all`.
    Always,
    /// Always false. Canonical form `not all`.
    Never,
    /// A single environment descriptor.
    Match(Rc<MatchCondition>),
    /// All children must match (conjunction).
    And(Rc<ConditionContainer>),
    /// Any child must match (disjunction).
    Or(Rc<ConditionContainer>),
}

impl Condition {
    /// The constant condition for `value`.
    #[must_use]
    pub fn from_bool(value: bool) -> Self {
        if value {
            Self::Always
        } else {
            Self::Never
        }
    }

    /// Conjunction of `children`. Not optimized; call [`optimize`](Self::optimize).
    #[must_use]
    pub fn all(children: Vec<Condition>) -> Self {
        Self::And(ConditionContainer::new(Junction::All, children))
    }

    /// Disjunction of `children`. Not optimized; call [`optimize`](Self::optimize).
    #[must_use]
    pub fn any(children: Vec<Condition>) -> Self {
        Self::Or(ConditionContainer::new(Junction::Any, children))
    }

    /// Leaf observing `descriptor` in `media`, inverted if `inverted`.
    #[must_use]
    pub fn media(media: &dyn MatchMedia, descriptor: &str, inverted: bool) -> Self {
        Self::Match(MatchCondition::new(media, descriptor, inverted))
    }

    /// Current truth value.
    #[must_use]
    pub fn matches(&self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Match(m) => m.matches(),
            Self::And(c) | Self::Or(c) => c.matches(),
        }
    }

    /// Listen for transitions of [`matches`](Self::matches).
    ///
    /// The callback receives the new value. Constants never change, so their
    /// listeners are accepted and never called.
    pub fn add_listener(&self, listener: impl Fn(bool) + 'static) -> ListenerId {
        self.subscribe(Rc::new(move |matches: &bool| listener(*matches)))
    }

    /// Like [`add_listener`](Self::add_listener), with a shared listener.
    pub fn subscribe(&self, listener: Listener<bool>) -> ListenerId {
        match self {
            Self::Always | Self::Never => ListenerId::next(),
            Self::Match(m) => m.add_listener(listener),
            Self::And(c) | Self::Or(c) => c.add_listener(listener),
        }
    }

    /// Remove a listener. Returns `true` if it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        match self {
            Self::Always | Self::Never => false,
            Self::Match(m) => m.remove_listener(id),
            Self::And(c) | Self::Or(c) => c.remove_listener(id),
        }
    }

    /// Number of external listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        match self {
            Self::Always | Self::Never => 0,
            Self::Match(m) => m.listeners.len(),
            Self::And(c) | Self::Or(c) => c.listeners.len(),
        }
    }

    /// Semantically equivalent, possibly smaller condition.
    ///
    /// Folds constants and unwraps singleton containers. Never mutates `self`;
    /// a leaf that cannot be simplified is returned as the same instance.
    #[must_use]
    pub fn optimize(&self) -> Condition {
        match self {
            Self::Always | Self::Never => self.clone(),
            Self::Match(_) => {
                if self.is_always() {
                    Self::Always
                } else if self.is_never() {
                    Self::Never
                } else {
                    self.clone()
                }
            }
            Self::And(c) | Self::Or(c) => c.optimize(),
        }
    }

    /// Whether this condition is the `Always` constant by canonical form.
    #[must_use]
    pub fn is_always(&self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            _ => self.to_string().eq_ignore_ascii_case(ALL),
        }
    }

    /// Whether this condition is the `Never` constant by canonical form.
    #[must_use]
    pub fn is_never(&self) -> bool {
        match self {
            Self::Always => false,
            Self::Never => true,
            _ => self.to_string().eq_ignore_ascii_case(NOT_ALL),
        }
    }

    /// Whether `self` and `other` are the same instance.
    ///
    /// Constants of the same kind are always the same instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Condition) -> bool {
        match (self, other) {
            (Self::Always, Self::Always) | (Self::Never, Self::Never) => true,
            (Self::Match(a), Self::Match(b)) => Rc::ptr_eq(a, b),
            (Self::And(a), Self::And(b)) | (Self::Or(a), Self::Or(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Child conditions of a container; empty for leaves and constants.
    #[must_use]
    pub fn children(&self) -> &[Condition] {
        match self {
            Self::And(c) | Self::Or(c) => &c.children,
            _ => &[],
        }
    }

    /// Evaluate with a full trace of every node.
    ///
    /// Unlike [`matches()`](Self::matches) this does not short-circuit: every
    /// child is visited. The `matched` result is still correct.
    #[must_use]
    pub fn trace(&self) -> ConditionTrace {
        match self {
            Self::Always => ConditionTrace::Always,
            Self::Never => ConditionTrace::Never,
            Self::Match(m) => ConditionTrace::Match {
                matched: m.matches(),
                media: m.media().to_string(),
                inverted: m.is_inverted(),
            },
            Self::And(c) => {
                let children: Vec<ConditionTrace> = c.children.iter().map(Self::trace).collect();
                let matched = children.iter().all(ConditionTrace::matched);
                ConditionTrace::And { matched, children }
            }
            Self::Or(c) => {
                let children: Vec<ConditionTrace> = c.children.iter().map(Self::trace).collect();
                let matched = children.iter().any(ConditionTrace::matched);
                ConditionTrace::Or { matched, children }
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str(ALL),
            Self::Never => f.write_str(NOT_ALL),
            Self::Match(m) => fmt::Display::fmt(m, f),
            Self::And(c) | Self::Or(c) => fmt::Display::fmt(c, f),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::Never => f.write_str("Never"),
            Self::Match(m) => fmt::Debug::fmt(m, f),
            Self::And(c) => f.debug_tuple("And").field(&c.children).finish(),
            Self::Or(c) => f.debug_tuple("Or").field(&c.children).finish(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Match leaf
// ═══════════════════════════════════════════════════════════════════════════════

/// Leaf condition wrapping exactly one [`MediaQueryList`].
///
/// Inversion is fixed at construction. The native list is subscribed to at
/// most once, and only while this leaf has listeners.
pub struct MatchCondition {
    list: Rc<dyn MediaQueryList>,
    inverted: bool,
    listeners: ListenerSet<bool>,
    native: Cell<Option<ListenerId>>,
    baseline: Cell<bool>,
    this: Weak<MatchCondition>,
}

impl MatchCondition {
    /// Observe `descriptor` in `media`.
    #[must_use]
    pub fn new(media: &dyn MatchMedia, descriptor: &str, inverted: bool) -> Rc<Self> {
        Self::from_list(media.match_media(descriptor), inverted)
    }

    /// Wrap an existing list.
    #[must_use]
    pub fn from_list(list: Rc<dyn MediaQueryList>, inverted: bool) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            list,
            inverted,
            listeners: ListenerSet::new(),
            native: Cell::new(None),
            baseline: Cell::new(false),
            this: this.clone(),
        })
    }

    /// The observed descriptor (without the inversion prefix).
    #[must_use]
    pub fn media(&self) -> &str {
        self.list.media()
    }

    /// Whether the native value is inverted.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Current truth value.
    #[must_use]
    pub fn matches(&self) -> bool {
        self.list.matches() != self.inverted
    }

    /// Whether the native list is currently subscribed to.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.native.get().is_some()
    }

    fn add_listener(&self, listener: Listener<bool>) -> ListenerId {
        let id = self.listeners.add(listener);
        if self.native.get().is_none() {
            self.baseline.set(self.matches());
            let weak = self.this.clone();
            let native = self.list.add_listener(Rc::new(move |_| {
                if let Some(leaf) = weak.upgrade() {
                    leaf.on_native_change();
                }
            }));
            self.native.set(Some(native));
            tracing::trace!(media = self.media(), "attached native listener");
        }
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        let removed = self.listeners.remove(id);
        if removed && self.listeners.is_empty() {
            if let Some(native) = self.native.take() {
                self.list.remove_listener(native);
                tracing::trace!(media = self.media(), "detached native listener");
            }
        }
        removed
    }

    fn on_native_change(&self) {
        let matches = self.matches();
        if matches != self.baseline.get() {
            self.baseline.set(matches);
            self.listeners.dispatch(&matches);
        }
    }
}

impl fmt::Display for MatchCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inverted {
            write!(f, "not {}", self.media())
        } else {
            f.write_str(self.media())
        }
    }
}

impl fmt::Debug for MatchCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Match")
            .field("media", &self.media())
            .field("inverted", &self.inverted)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Containers
// ═══════════════════════════════════════════════════════════════════════════════

/// How a [`ConditionContainer`] combines its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Junction {
    /// Conjunction: every child must match.
    All,
    /// Disjunction: at least one child must match.
    Any,
}

impl Junction {
    fn separator(self) -> &'static str {
        match self {
            Self::All => " and ",
            Self::Any => ", ",
        }
    }
}

/// Composite condition over an ordered list of children.
///
/// State machine:
///
/// - **Unsubscribed**: no listeners, no child subscriptions
/// - **Subscribed**: at least one listener, subscribed to every child
///
/// While subscribed, a child notification recomputes `matches`; only an
/// actual change against the baseline is dispatched to listeners.
pub struct ConditionContainer {
    junction: Junction,
    children: Vec<Condition>,
    listeners: ListenerSet<bool>,
    subscriptions: RefCell<Vec<ListenerId>>,
    baseline: Cell<bool>,
    this: Weak<ConditionContainer>,
}

impl ConditionContainer {
    fn new(junction: Junction, children: Vec<Condition>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            junction,
            children,
            listeners: ListenerSet::new(),
            subscriptions: RefCell::new(Vec::new()),
            baseline: Cell::new(false),
            this: this.clone(),
        })
    }

    /// How children are combined.
    #[must_use]
    pub fn junction(&self) -> Junction {
        self.junction
    }

    /// The child conditions, in declaration order.
    #[must_use]
    pub fn children(&self) -> &[Condition] {
        &self.children
    }

    /// Current truth value, recomputed from the children.
    #[must_use]
    pub fn matches(&self) -> bool {
        match self.junction {
            Junction::All => self.children.iter().all(Condition::matches),
            Junction::Any => self.children.iter().any(Condition::matches),
        }
    }

    /// Number of subscriptions this container holds on its children.
    #[must_use]
    pub fn child_subscription_count(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    fn add_listener(&self, listener: Listener<bool>) -> ListenerId {
        let attach = self.listeners.is_empty();
        let id = self.listeners.add(listener);
        if attach {
            self.attach();
        }
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        let removed = self.listeners.remove(id);
        if removed && self.listeners.is_empty() {
            self.detach();
        }
        removed
    }

    fn attach(&self) {
        self.baseline.set(self.matches());
        let ids: Vec<ListenerId> = self
            .children
            .iter()
            .map(|child| {
                let weak = self.this.clone();
                child.subscribe(Rc::new(move |_| {
                    if let Some(container) = weak.upgrade() {
                        container.on_child_change();
                    }
                }))
            })
            .collect();
        tracing::trace!(children = ids.len(), "container attached to children");
        *self.subscriptions.borrow_mut() = ids;
    }

    fn detach(&self) {
        let ids = std::mem::take(&mut *self.subscriptions.borrow_mut());
        for (child, id) in self.children.iter().zip(ids) {
            child.remove_listener(id);
        }
        tracing::trace!(children = self.children.len(), "container detached from children");
    }

    fn on_child_change(&self) {
        let matches = self.matches();
        if matches != self.baseline.get() {
            self.baseline.set(matches);
            self.listeners.dispatch(&matches);
        }
    }

    fn optimize(&self) -> Condition {
        let optimized: Vec<Condition> = self.children.iter().map(Condition::optimize).collect();
        let (absorbing, identity): (fn(&Condition) -> bool, fn(&Condition) -> bool) =
            match self.junction {
                Junction::All => (Condition::is_never, Condition::is_always),
                Junction::Any => (Condition::is_always, Condition::is_never),
            };

        if optimized.iter().any(absorbing) {
            return Condition::from_bool(self.junction == Junction::Any);
        }

        let mut reduced: Vec<Condition> = optimized.into_iter().filter(|c| !identity(c)).collect();
        match reduced.len() {
            0 => Condition::from_bool(self.junction == Junction::All),
            1 => reduced.remove(0),
            _ => match self.junction {
                Junction::All => Condition::all(reduced),
                Junction::Any => Condition::any(reduced),
            },
        }
    }
}

impl fmt::Display for ConditionContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                f.write_str(self.junction.separator())?;
            }
            fmt::Display::fmt(child, f)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ConditionContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionContainer")
            .field("junction", &self.junction)
            .field("children", &self.children)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
