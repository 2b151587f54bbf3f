//! Conformance test fixture runner
//!
//! Loads YAML fixtures and runs them against the mediq engine.
//!
//! A fixture compiles one subject (a query, a rule list, or a value/mask
//! tuple) in a virtual environment, then walks through its cases in order.
//! Each case patches the environment and checks the subject's value and, if
//! given, how many change notifications the patch produced.
//!
//! ```yaml
//! name: md_breakpoint
//! description: "@md is the closed 992..1199 range"
//! media: { width: 900 }
//! query: "@md"
//! canonical: "(min-width: 992px) and (max-width: 1199px)"
//! cases:
//!   - name: below
//!     expect: false
//!   - name: inside
//!     media: { width: 1000 }
//!     expect: true
//!     notified: 1
//! ```

use mediq::prelude::*;
use mediq::{parse_object, ShortcutConfig};
use serde::Deserialize;
use serde_json::Value;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

/// A complete test fixture
#[derive(Debug, Deserialize)]
pub struct Fixture {
    pub name: String,
    pub description: String,
    /// Shortcut registry configuration; defaults to the standard chain.
    #[serde(default)]
    pub shortcuts: ShortcutConfig,
    /// Initial environment.
    #[serde(default)]
    pub media: MediaFeatures,
    /// A query to compile.
    #[serde(default)]
    pub query: Option<String>,
    /// A rule list (`payload=>query|...`), or the values of a tuple.
    #[serde(default)]
    pub rules: Option<String>,
    /// The query mask of a tuple; requires `rules`.
    #[serde(default)]
    pub mask: Option<String>,
    /// How rule payloads are parsed.
    #[serde(default)]
    pub parser: PayloadParser,
    /// Expected canonical form of the compiled query.
    #[serde(default)]
    pub canonical: Option<String>,
    pub cases: Vec<TestCase>,
}

/// Rule payload parser selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadParser {
    /// Payloads are trimmed strings.
    #[default]
    String,
    /// Payloads are JSON5 literals.
    Object,
}

/// Test case
#[derive(Debug, Deserialize)]
pub struct TestCase {
    pub name: String,
    /// Features to change before evaluating, e.g. `{ width: 1000 }`.
    #[serde(default)]
    pub media: BTreeMap<String, Value>,
    /// Expected value: a boolean for queries, the active payload (or `null`)
    /// for rule lists.
    pub expect: Value,
    /// Expected number of notifications caused by this case's patch.
    #[serde(default)]
    pub notified: Option<usize>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Subject: what a fixture compiles
// ═══════════════════════════════════════════════════════════════════════════════

enum Subject {
    Query(Condition),
    Strings(RuleList<String>),
    Objects(RuleList<Value>),
}

impl Subject {
    fn value(&self) -> Value {
        match self {
            Self::Query(condition) => Value::Bool(condition.matches()),
            Self::Strings(list) => list.active_value().map_or(Value::Null, Value::String),
            Self::Objects(list) => list.active_value().unwrap_or(Value::Null),
        }
    }

    fn observe(&self, counter: Rc<Cell<usize>>) -> ListenerId {
        let bump = move || counter.set(counter.get() + 1);
        match self {
            Self::Query(condition) => condition.add_listener(move |_| bump()),
            Self::Strings(list) => list.add_listener(move |_| bump()),
            Self::Objects(list) => list.add_listener(move |_| bump()),
        }
    }
}

/// Structural equality with numbers compared by value (`4` == `4.0`).
fn values_match(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| values_match(a, b))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter().all(|(key, a)| b.get(key).is_some_and(|b| values_match(a, b)))
        }
        _ => actual == expected,
    }
}

fn feature_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Runner
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of running a single test case
#[derive(Debug)]
pub struct CaseResult {
    pub case_name: String,
    pub passed: bool,
    pub expected: Value,
    pub actual: Value,
    pub expected_notified: Option<usize>,
    pub notified: usize,
}

impl Fixture {
    /// Parse a fixture from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Parse multiple fixtures from a YAML file with `---` separators
    pub fn from_yaml_multi(yaml: &str) -> Result<Vec<Self>, serde_yaml::Error> {
        let mut fixtures = Vec::new();
        for doc in serde_yaml::Deserializer::from_str(yaml) {
            fixtures.push(Self::deserialize(doc)?);
        }
        Ok(fixtures)
    }

    fn compile(&self, compiler: &QueryCompiler) -> Result<Subject, MediaQueryError> {
        let invalid = |reason: &str| MediaQueryError::InvalidConfig {
            reason: format!("fixture '{}': {reason}", self.name),
        };
        match (&self.query, &self.rules, &self.mask) {
            (Some(query), None, None) => Ok(Subject::Query(compiler.for_query(query))),
            (None, Some(rules), mask) => Ok(match (self.parser, mask) {
                (PayloadParser::String, None) => {
                    Subject::Strings(RuleList::parse(rules, compiler))
                }
                (PayloadParser::String, Some(mask)) => {
                    Subject::Strings(RuleList::parse_tuple(rules, mask, compiler)?)
                }
                (PayloadParser::Object, None) => {
                    Subject::Objects(RuleList::parse_with(rules, compiler, parse_object))
                }
                (PayloadParser::Object, Some(mask)) => Subject::Objects(
                    RuleList::parse_tuple_with(rules, mask, compiler, parse_object)?,
                ),
            }),
            (None, None, Some(_)) => Err(invalid("mask requires rules")),
            (Some(_), Some(_), _) | (Some(_), None, Some(_)) => {
                Err(invalid("query cannot be combined with rules or mask"))
            }
            (None, None, None) => Err(invalid("either query or rules is required")),
        }
    }

    /// Run all test cases and return results
    ///
    /// # Errors
    ///
    /// Returns an error if the shortcut config, the subject or a media patch
    /// is invalid.
    pub fn run(&self) -> Result<Vec<CaseResult>, MediaQueryError> {
        let shortcuts = Arc::new(self.shortcuts.build()?);
        let media = VirtualMedia::new(self.media.clone());
        let compiler = QueryCompiler::with_shortcuts(Rc::new(media.clone()), shortcuts);
        let subject = self.compile(&compiler)?;

        let mut results = Vec::new();
        if let (Some(expected), Subject::Query(condition)) = (&self.canonical, &subject) {
            let actual = condition.to_string();
            results.push(CaseResult {
                case_name: "canonical form".into(),
                passed: &actual == expected,
                expected: Value::String(expected.clone()),
                actual: Value::String(actual),
                expected_notified: None,
                notified: 0,
            });
        }

        let counter = Rc::new(Cell::new(0));
        let _listener = subject.observe(Rc::clone(&counter));
        let mut seen = 0;

        for case in &self.cases {
            if !case.media.is_empty() {
                let mut features = media.features();
                for (name, value) in &case.media {
                    features.set(name, &feature_value(value))?;
                }
                media.update(|current| *current = features);
            }

            let actual = subject.value();
            let notified = counter.get() - seen;
            seen = counter.get();
            results.push(CaseResult {
                case_name: case.name.clone(),
                passed: values_match(&actual, &case.expect)
                    && case.notified.map_or(true, |n| n == notified),
                expected: case.expect.clone(),
                actual,
                expected_notified: case.notified,
                notified,
            });
        }
        Ok(results)
    }

    /// Run all test cases and panic on first failure
    pub fn run_and_assert(&self) {
        let results = self
            .run()
            .unwrap_or_else(|e| panic!("Fixture '{}' could not run: {e}", self.name));
        for result in results {
            assert!(
                result.passed,
                "Fixture '{}' case '{}' failed: expected {} (notified {:?}), got {} (notified {})",
                self.name,
                result.case_name,
                result.expected,
                result.expected_notified,
                result.actual,
                result.notified
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_fixture() {
        let fixture = Fixture::from_yaml(
            r#"
name: md
description: md range
media: { width: 900 }
query: "@md"
canonical: "(min-width: 992px) and (max-width: 1199px)"
cases:
  - name: below
    expect: false
  - name: inside
    media: { width: 1000 }
    expect: true
    notified: 1
"#,
        )
        .unwrap();
        let results = fixture.run().unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.passed), "{results:?}");
    }

    #[test]
    fn test_failed_case_is_reported() {
        let fixture = Fixture::from_yaml(
            r#"
name: wrong
description: expects the wrong value
query: "print"
cases:
  - name: screen
    expect: true
"#,
        )
        .unwrap();
        let results = fixture.run().unwrap();
        assert!(!results[0].passed);
        assert_eq!(results[0].actual, Value::Bool(false));
    }

    #[test]
    fn test_object_rules() {
        let fixture = Fixture::from_yaml(
            r#"
name: objects
description: object payloads merge over the default
media: { width: 1300 }
rules: "{cols: 4}=>@+lg|{cols: 1, gap: 8}"
parser: object
cases:
  - name: large
    expect: { cols: 4, gap: 8 }
  - name: small
    media: { width: 500 }
    expect: { cols: 1, gap: 8 }
    notified: 1
"#,
        )
        .unwrap();
        let results = fixture.run().unwrap();
        assert!(results.iter().all(|r| r.passed), "{results:?}");
    }

    #[test]
    fn test_numbers_match_by_value() {
        assert!(values_match(&serde_json::json!({"a": [4.0]}), &serde_json::json!({"a": [4]})));
        assert!(!values_match(&serde_json::json!({"a": 1}), &serde_json::json!({"a": 1, "b": 2})));
    }

    #[test]
    fn test_missing_subject_is_an_error() {
        let fixture = Fixture::from_yaml(
            r#"
name: empty
description: nothing to compile
cases: []
"#,
        )
        .unwrap();
        assert!(matches!(
            fixture.run(),
            Err(MediaQueryError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_multi_document() {
        let fixtures = Fixture::from_yaml_multi(
            r#"
name: a
description: first
query: all
cases: []
---
name: b
description: second
query: not all
cases: []
"#,
        )
        .unwrap();
        assert_eq!(fixtures.len(), 2);
        assert_eq!(fixtures[1].query.as_deref(), Some("not all"));
    }
}
