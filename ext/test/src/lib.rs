//! mediq-test: Test domain for conformance testing
//!
//! Provides an isolated environment (virtual media + compiler with its own
//! shortcut registry) and notification recorders for testing conditions and
//! rule lists.
//!
//! # Example
//!
//! ```
//! use mediq_test::prelude::*;
//!
//! let env = TestEnv::new(900.0, 600.0);
//! let wide = env.query("(min-width: 800px)");
//! let (_id, events) = record_condition(&wide);
//!
//! env.resize(700.0);
//! assert_eq!(events.events(), [false]);
//! ```

use mediq::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

#[cfg(feature = "fixtures")]
pub mod fixture;

/// Test environment: a [`VirtualMedia`] plus a compiler over it.
///
/// Every environment gets its own [`ShortcutRegistry`], so tests may register
/// shortcuts without affecting each other.
#[derive(Debug)]
pub struct TestEnv {
    media: VirtualMedia,
    compiler: QueryCompiler,
}

impl TestEnv {
    /// Desktop environment with a viewport of the given size.
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self::from_features(MediaFeatures::with_size(width, height))
    }

    /// Desktop environment with the given features.
    #[must_use]
    pub fn from_features(features: MediaFeatures) -> Self {
        Self::with_shortcuts(features, ShortcutRegistry::new())
    }

    /// Environment with the given features and registry.
    #[must_use]
    pub fn with_shortcuts(features: MediaFeatures, shortcuts: ShortcutRegistry) -> Self {
        let media = VirtualMedia::new(features);
        let compiler = QueryCompiler::with_shortcuts(Rc::new(media.clone()), Arc::new(shortcuts));
        Self { media, compiler }
    }

    /// Environment for `device` (drives `@mobile`, `@touch`, ...).
    #[must_use]
    pub fn for_device(width: f64, height: f64, device: &DeviceInfo) -> Self {
        Self::with_shortcuts(
            MediaFeatures::with_size(width, height),
            ShortcutRegistry::for_device(device),
        )
    }

    /// The virtual environment.
    #[must_use]
    pub fn media(&self) -> &VirtualMedia {
        &self.media
    }

    /// The compiler.
    #[must_use]
    pub fn compiler(&self) -> &QueryCompiler {
        &self.compiler
    }

    /// The compiler's shortcut registry.
    #[must_use]
    pub fn shortcuts(&self) -> &ShortcutRegistry {
        self.compiler.shortcuts()
    }

    /// Compile (cached).
    #[must_use]
    pub fn query(&self, query: &str) -> Condition {
        self.compiler.for_query(query)
    }

    /// Parse a string rule list.
    #[must_use]
    pub fn rules(&self, rules: &str) -> RuleList<String> {
        RuleList::parse(rules, &self.compiler)
    }

    /// Change the viewport width.
    pub fn resize(&self, width: f64) {
        self.media.set_width(width);
    }
}

/// Collects events delivered to a listener.
#[derive(Debug)]
pub struct Recorder<T> {
    events: Rc<RefCell<Vec<T>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            events: Rc::clone(&self.events),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self {
            events: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl<T: Clone> Recorder<T> {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one event.
    pub fn push(&self, event: T) {
        self.events.borrow_mut().push(event);
    }

    /// Events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<T> {
        self.events.borrow().clone()
    }

    /// Number of events recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

/// Listen to `condition`, recording every transition.
pub fn record_condition(condition: &Condition) -> (ListenerId, Recorder<bool>) {
    let recorder = Recorder::new();
    let sink = recorder.clone();
    let id = condition.add_listener(move |matches| sink.push(matches));
    (id, recorder)
}

/// Listen to `list`, recording the active index after every change.
pub fn record_rule_list<T: 'static>(list: &RuleList<T>) -> (ListenerId, Recorder<Option<usize>>) {
    let recorder = Recorder::new();
    let sink = recorder.clone();
    let id = list.add_listener(move |list: &RuleList<T>| sink.push(list.active_index()));
    (id, recorder)
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{record_condition, record_rule_list, Recorder, TestEnv};
    pub use mediq::prelude::*;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envs_are_isolated() {
        let a = TestEnv::new(900.0, 600.0);
        let b = TestEnv::new(900.0, 600.0);
        a.shortcuts().env().add("kiosk", true);
        assert!(a.query("@kiosk").matches());
        assert!(!b.query("@kiosk").matches());
    }

    #[test]
    fn test_recorder_take() {
        let recorder = Recorder::new();
        recorder.push(1);
        recorder.push(2);
        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.take(), [1, 2]);
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_record_rule_list() {
        let env = TestEnv::new(900.0, 600.0);
        let list = env.rules("a=>@md|b");
        let (id, events) = record_rule_list(&list);
        env.resize(1000.0);
        env.resize(500.0);
        assert_eq!(events.events(), [Some(1), Some(0)]);
        assert!(list.remove_listener(id));
        assert_eq!(env.media().subscription_count(), 0);
    }

    #[test]
    fn test_device_env() {
        let phone = DeviceInfo {
            mobile: true,
            ..DeviceInfo::default()
        };
        let env = TestEnv::for_device(400.0, 800.0, &phone);
        assert!(env.query("@mobile and @portrait").matches());
    }
}
