//! Evaluation trace types for debugging conditions and rule lists.
//!
//! Trace types mirror the runtime types ([`Condition`](crate::Condition),
//! [`RuleList`](crate::RuleList)) but capture current results instead of
//! live subscriptions.
//!
//! # Two Levels of Trace
//!
//! - [`ConditionTrace`]: per condition, which leaves match right now?
//! - [`RuleListTrace`]: per list, which rules match, which one is active?
//!
//! # Example
//!
//! ```ignore
//! let trace = rules.trace();
//! println!("active: {:?}", trace.active);
//! for step in &trace.steps {
//!     println!("  rule[{}]: matched={}", step.index, step.matched);
//! }
//! ```

use std::fmt;

/// Trace of a condition evaluation.
///
/// In And/Or, ALL children are evaluated (no short-circuit) for maximum
/// debugging value. The `matched` result is still correct.
pub enum ConditionTrace {
    /// The `all` constant.
    Always,
    /// The `not all` constant.
    Never,
    /// A leaf observing one descriptor.
    Match {
        /// Whether the leaf matched (after inversion).
        matched: bool,
        /// The observed descriptor.
        media: String,
        /// Whether the native value is inverted.
        inverted: bool,
    },
    /// AND: all children must match.
    And {
        /// Whether all children matched.
        matched: bool,
        /// Trace of each child.
        children: Vec<ConditionTrace>,
    },
    /// OR: any child must match.
    Or {
        /// Whether any child matched.
        matched: bool,
        /// Trace of each child.
        children: Vec<ConditionTrace>,
    },
}

impl ConditionTrace {
    /// Get the overall match result of this condition.
    #[must_use]
    pub fn matched(&self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Match { matched, .. } | Self::And { matched, .. } | Self::Or { matched, .. } => {
                *matched
            }
        }
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        let mark = |m: bool| if m { "+" } else { "-" };
        match self {
            Self::Always => writeln!(f, "{indent}+ all"),
            Self::Never => writeln!(f, "{indent}- not all"),
            Self::Match {
                matched,
                media,
                inverted,
            } => {
                let not = if *inverted { "not " } else { "" };
                writeln!(f, "{indent}{} {not}{media}", mark(*matched))
            }
            Self::And { matched, children } | Self::Or { matched, children } => {
                let label = if matches!(self, Self::And { .. }) { "and" } else { "or" };
                writeln!(f, "{indent}{} {label}", mark(*matched))?;
                for child in children {
                    child.render(f, depth + 1)?;
                }
                Ok(())
            }
        }
    }
}

/// Indented tree, one node per line, `+` for matching nodes and `-` otherwise.
impl fmt::Display for ConditionTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}

impl fmt::Debug for ConditionTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::Never => f.write_str("Never"),
            Self::Match {
                matched,
                media,
                inverted,
            } => f
                .debug_struct("Match")
                .field("matched", matched)
                .field("media", media)
                .field("inverted", inverted)
                .finish(),
            Self::And { matched, children } => f
                .debug_struct("And")
                .field("matched", matched)
                .field("children", children)
                .finish(),
            Self::Or { matched, children } => f
                .debug_struct("Or")
                .field("matched", matched)
                .field("children", children)
                .finish(),
        }
    }
}

/// Trace of a full [`RuleList`](crate::RuleList) evaluation.
///
/// # INV: `active` == `active_index()`
///
/// The `active` field always equals what
/// [`RuleList::active_index()`](crate::RuleList::active_index) returns for the
/// same environment state.
#[derive(Debug)]
pub struct RuleListTrace {
    /// Index of the winning rule, `None` if nothing matched.
    pub active: Option<usize>,
    /// One step per rule, in sequence order (defaults first).
    pub steps: Vec<RuleStep>,
}

/// One rule's evaluation in a trace.
#[derive(Debug)]
pub struct RuleStep {
    /// Index in the rule sequence (0-based).
    pub index: usize,
    /// Whether the rule is a default rule.
    pub is_default: bool,
    /// Did the rule's condition match?
    pub matched: bool,
    /// Full condition trace.
    pub condition: ConditionTrace,
}
