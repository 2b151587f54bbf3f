//! Rule: a condition paired with a payload.

use crate::{Condition, ListenerId, QueryCompiler, RULE_SEPARATOR};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;

/// A payload type usable in a [`RuleList`](crate::RuleList).
///
/// Object-like payloads override [`merge_over`](Self::merge_over) to layer the
/// winning rule over the default rule's payload. Primitive payloads keep the
/// default implementation and are never merged.
pub trait RuleValue: Clone {
    /// Shallow merge of `self` over `base`, or `None` if this value does not
    /// merge.
    fn merge_over(&self, base: &Self) -> Option<Self> {
        let _ = base;
        None
    }
}

macro_rules! primitive_rule_value {
    ($($ty:ty),* $(,)?) => {
        $(impl RuleValue for $ty {})*
    };
}

primitive_rule_value!(
    String, bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
);

impl<K, V> RuleValue for HashMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn merge_over(&self, base: &Self) -> Option<Self> {
        let mut merged = base.clone();
        merged.extend(self.iter().map(|(k, v)| (k.clone(), v.clone())));
        Some(merged)
    }
}

impl<K, V> RuleValue for BTreeMap<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    fn merge_over(&self, base: &Self) -> Option<Self> {
        let mut merged = base.clone();
        merged.extend(self.iter().map(|(k, v)| (k.clone(), v.clone())));
        Some(merged)
    }
}

#[cfg(feature = "config")]
impl RuleValue for serde_json::Value {
    fn merge_over(&self, base: &Self) -> Option<Self> {
        let (Self::Object(overrides), Self::Object(base)) = (self, base) else {
            return None;
        };
        let mut merged = base.clone();
        for (key, value) in overrides {
            merged.insert(key.clone(), value.clone());
        }
        Some(Self::Object(merged))
    }
}

/// String value parser: the trimmed payload, as written.
#[must_use]
pub fn parse_string(value: &str) -> Option<String> {
    Some(value.trim().to_string())
}

/// Literal value parser: a JSON5 literal (object, array, number, boolean or
/// quoted string).
///
/// Returns `None` for anything that does not parse, which drops the rule.
#[cfg(feature = "config")]
#[must_use]
pub fn parse_object(value: &str) -> Option<serde_json::Value> {
    match json5::from_str(value.trim()) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            tracing::debug!(value, error = %err, "payload is not a valid literal");
            None
        }
    }
}

/// One entry of a rule list.
///
/// A default rule is one declared without a condition. It always matches and
/// supplies the fallback payload.
#[derive(Clone)]
pub struct Rule<T> {
    payload: Option<T>,
    condition: Condition,
    default: bool,
}

impl<T> Rule<T> {
    /// A rule applying `payload` while `condition` matches.
    #[must_use]
    pub fn new(payload: T, condition: Condition) -> Self {
        Self {
            payload: Some(payload),
            condition,
            default: false,
        }
    }

    /// A default rule: no condition, always matches.
    #[must_use]
    pub fn fallback(payload: T) -> Self {
        Self {
            payload: Some(payload),
            condition: Condition::Always,
            default: true,
        }
    }

    /// The sentinel returned when no rule matches: no payload, never matches.
    pub(crate) fn empty() -> Self {
        Self {
            payload: None,
            condition: Condition::Never,
            default: false,
        }
    }

    /// Build a rule from `payload` and a query; an empty query makes a
    /// default rule.
    ///
    /// Returns `None` if `parser` rejects the payload.
    pub fn from_parts(
        payload: &str,
        query: &str,
        compiler: &QueryCompiler,
        parser: impl Fn(&str) -> Option<T>,
    ) -> Option<Self> {
        let Some(value) = parser(payload) else {
            tracing::warn!(payload, query, "rule payload failed to parse, rule skipped");
            return None;
        };
        let query = query.trim();
        if query.is_empty() {
            Some(Self::fallback(value))
        } else {
            Some(Self::new(value, compiler.for_query(query)))
        }
    }

    /// Parse one `payload=>query` segment. A segment without `=>` is a
    /// default rule.
    pub fn parse(
        segment: &str,
        compiler: &QueryCompiler,
        parser: impl Fn(&str) -> Option<T>,
    ) -> Option<Self> {
        let (payload, query) = segment.split_once(RULE_SEPARATOR).unwrap_or((segment, ""));
        Self::from_parts(payload, query, compiler, parser)
    }

    /// The payload; `None` only for the no-match sentinel.
    #[must_use]
    pub fn payload(&self) -> Option<&T> {
        self.payload.as_ref()
    }

    /// The condition this rule applies under.
    #[must_use]
    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Whether this rule was declared without a condition.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.default
    }

    /// Whether the condition currently matches.
    #[must_use]
    pub fn matches(&self) -> bool {
        self.condition.matches()
    }

    /// Listen for transitions of the rule's condition.
    pub fn add_listener(&self, listener: impl Fn(bool) + 'static) -> ListenerId {
        self.condition.add_listener(listener)
    }

    /// Remove a listener. Returns `true` if it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.condition.remove_listener(id)
    }
}

impl<T: fmt::Debug> fmt::Debug for Rule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("payload", &self.payload)
            .field("condition", &self.condition.to_string())
            .field("default", &self.default)
            .finish()
    }
}

impl<T: fmt::Display> fmt::Display for Rule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.payload, self.default) {
            (Some(payload), true) => write!(f, "{payload}"),
            (Some(payload), false) => write!(f, "{payload}{RULE_SEPARATOR}{}", self.condition),
            (None, _) => write!(f, "{RULE_SEPARATOR}{}", self.condition),
        }
    }
}
