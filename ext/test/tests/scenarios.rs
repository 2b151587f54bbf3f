//! End-to-end scenarios through the public API: caching, optimization
//! identities, lazy subscriptions, rule-list resolution and configuration
//! errors.

use mediq::{MatchMedia, MediaQueryError, Rule};
use mediq_test::prelude::*;

fn env() -> TestEnv {
    TestEnv::new(1000.0, 700.0)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Compiler cache
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn cached_query_returns_identical_instance() {
    let env = env();
    for query in [
        "@md",
        "(min-width: 600px)",
        "not @mobile and (min-width: 800px)",
        "print, @+lg and @2x",
        "all",
        "",
    ] {
        let first = env.compiler().for_query(query);
        let second = env.compiler().for_query(query);
        assert!(first.ptr_eq(&second), "cache miss for {query:?}");
    }
}

#[test]
fn clearing_the_cache_recompiles() {
    let env = env();
    let first = env.query("@md or print");
    env.compiler().clear_cache();
    let second = env.query("@md or print");
    assert!(!first.ptr_eq(&second));
    assert_eq!(first.to_string(), second.to_string());
}

// ═══════════════════════════════════════════════════════════════════════════════
// Optimization identities
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn optimize_identities() {
    let env = env();
    let x = Condition::media(env.media(), "(min-width: 600px)", false);

    let and_always = Condition::all(vec![Condition::Always, x.clone()]).optimize();
    assert!(and_always.ptr_eq(&x.optimize()));

    let or_never = Condition::any(vec![Condition::Never, x.clone()]).optimize();
    assert!(or_never.ptr_eq(&x.optimize()));

    let and_never = Condition::all(vec![Condition::Never, x.clone()]).optimize();
    assert!(and_never.is_never());

    let or_always = Condition::any(vec![Condition::Always, x.clone()]).optimize();
    assert!(or_always.is_always());
}

#[test]
fn optimize_does_not_mutate_receiver() {
    let env = env();
    let x = Condition::media(env.media(), "(min-width: 600px)", false);
    let tree = Condition::all(vec![Condition::Always, x]);
    let _ = tree.optimize();
    assert_eq!(tree.children().len(), 2);
    assert_eq!(tree.to_string(), "all and (min-width: 600px)");
}

#[test]
fn string_equal_constants_are_detected() {
    let env = env();
    let literal = Condition::media(env.media(), "all", false);
    assert!(literal.is_always());
    assert!(literal.optimize().ptr_eq(&Condition::Always));

    let inverted = Condition::media(env.media(), "all", true);
    assert!(inverted.is_never());
}

#[test]
fn constant_round_trip() {
    let env = env();
    for query in ["all", "not all", "@desktop", "@mobile", "not @none", "", "@md or @desktop"] {
        let condition = env.compiler().from_query(query);
        if condition.is_always() || condition.is_never() {
            let again = env.compiler().from_query(&condition.to_string());
            assert_eq!(condition.matches(), again.matches(), "round trip of {query:?}");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Lazy subscriptions
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn container_subscribes_lazily() {
    let env = env();
    let condition = env.query("@md and not print, (orientation: portrait)");
    let Condition::Or(container) = &condition else {
        panic!("expected a disjunction, got {condition:?}");
    };
    assert_eq!(container.child_subscription_count(), 0);
    assert_eq!(env.media().subscription_count(), 0);

    let (id, _) = record_condition(&condition);
    assert_eq!(container.child_subscription_count(), 2);
    assert_eq!(env.media().subscription_count(), 3);

    assert!(condition.remove_listener(id));
    assert_eq!(container.child_subscription_count(), 0);
    assert_eq!(env.media().subscription_count(), 0);
}

#[test]
fn leaves_shared_by_two_listeners_subscribe_once() {
    let env = env();
    let condition = env.query("(min-width: 600px)");
    let (a, _) = record_condition(&condition);
    let (b, _) = record_condition(&condition);
    assert_eq!(env.media().subscription_count(), 1);
    condition.remove_listener(a);
    assert_eq!(env.media().subscription_count(), 1);
    condition.remove_listener(b);
    assert_eq!(env.media().subscription_count(), 0);
}

#[test]
fn reads_never_go_stale_while_unsubscribed() {
    let env = env();
    let condition = env.query("@md, print");
    assert!(condition.matches());
    env.resize(1300.0);
    assert!(!condition.matches());
}

#[test]
fn listener_panics_do_not_stop_delivery() {
    let env = env();
    let condition = env.query("@md");
    condition.add_listener(|_| panic!("first listener fails"));
    let (_, events) = record_condition(&condition);
    env.resize(1300.0);
    assert_eq!(events.events(), [false]);
}

#[test]
fn custom_media_list_is_injectable() {
    let env = env();
    let list = env.media().match_media("(min-width: 900px)");
    let leaf = mediq::MatchCondition::from_list(list, true);
    let condition = Condition::Match(leaf);
    assert!(!condition.matches());
    env.resize(800.0);
    assert!(condition.matches());
}

// ═══════════════════════════════════════════════════════════════════════════════
// Rule lists
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn default_rule_ordered_first() {
    let env = TestEnv::new(900.0, 700.0);
    let list = env.rules("a=>@MD|b");
    assert_eq!(list.len(), 2);
    assert!(list.rules()[0].is_default());
    assert_eq!(list.rules()[0].payload().map(String::as_str), Some("b"));
    assert_eq!(list.active_value().as_deref(), Some("b"));

    env.resize(1000.0);
    assert_eq!(list.active_value().as_deref(), Some("a"));
}

#[test]
fn tuple_zips_in_order() {
    let env = TestEnv::new(800.0, 700.0);
    let list = RuleList::parse_tuple("1|2|3", "@XS|@SM|@MD", env.compiler()).expect("same length");
    let payloads: Vec<&str> = list
        .rules()
        .iter()
        .filter_map(|rule| rule.payload().map(String::as_str))
        .collect();
    assert_eq!(payloads, ["1", "2", "3"]);
    assert_eq!(list.active_value().as_deref(), Some("2"));
}

#[test]
fn tuple_length_mismatch_fails() {
    let env = env();
    let err = RuleList::parse_tuple("1|2|3", "@xs|@sm", env.compiler()).unwrap_err();
    assert_eq!(err, MediaQueryError::TupleLengthMismatch { values: 3, mask: 2 });
    assert_eq!(
        err.to_string(),
        "tuple length mismatch: 3 values but 2 queries in mask"
    );
}

#[test]
fn later_declared_matching_rule_wins() {
    let env = TestEnv::new(1300.0, 700.0);
    let list = env.rules("first=>@+sm|second=>@+md");
    assert!(list.rules().iter().all(Rule::matches));
    assert_eq!(list.active_value().as_deref(), Some("second"));
    assert_eq!(list.active_index(), Some(1));
}

#[test]
fn active_rule_is_idempotent() {
    let env = env();
    let list = env.rules("a=>@sm|b=>@md|c");
    let index = list.active_index();
    let value = list.active_value();
    for _ in 0..5 {
        assert_eq!(list.active_index(), index);
        assert_eq!(list.active_value(), value);
    }
}

#[test]
fn rule_list_subscriptions_are_lazy() {
    let env = env();
    let list = env.rules("a=>@sm|b=>@md or print|c");
    assert_eq!(env.media().subscription_count(), 0);

    let (id, events) = record_rule_list(&list);
    assert_eq!(env.media().subscription_count(), 3);

    env.resize(800.0);
    env.resize(850.0);
    env.resize(300.0);
    assert_eq!(events.events(), [Some(1), Some(0)]);

    assert!(list.remove_listener(id));
    assert_eq!(env.media().subscription_count(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Shortcut registration
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn breakpoint_name_with_digit_fails() {
    let env = env();
    let err = env.shortcuts().breakpoints().add("sm2", 1, 2).unwrap_err();
    assert_eq!(err, MediaQueryError::InvalidBreakpointName { name: "sm2".into() });
}

#[test]
fn breakpoint_overwrite_returns_previous() {
    let env = env();
    let bp = env.shortcuts().breakpoints();
    let previous = bp.add("sm", 700, 900).expect("valid name");
    assert_eq!(previous, Some(mediq::Breakpoint::new(768, 991)));
    let again = bp.add("sm", 100, 200).expect("valid name");
    assert_eq!(again, Some(mediq::Breakpoint::new(700, 900)));
}

#[test]
fn unresolved_density_fails_open() {
    let env = env();
    let condition = env.query("@-2x");
    assert_eq!(condition.to_string(), "@-2x");
    assert!(!condition.matches());
}

#[test]
fn preprocessors_registered_later_take_priority() {
    struct Everything;

    impl Preprocessor for Everything {
        fn name(&self) -> &str {
            "everything"
        }

        fn process(&self, _shortcut: &str) -> Option<Shortcut> {
            Some(Shortcut::Const(true))
        }
    }

    let env = TestEnv::new(300.0, 700.0);
    assert!(!env.compiler().from_query("@lg").matches());
    env.shortcuts().use_preprocessor(std::sync::Arc::new(Everything));
    assert!(env.compiler().from_query("@lg").matches());
}

// ═══════════════════════════════════════════════════════════════════════════════
// Device scenario
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn not_mobile_and_wide() {
    let query = "not @mobile and (min-width: 800px)";

    let desktop = TestEnv::new(900.0, 700.0);
    assert!(desktop.query(query).matches());

    let phone = DeviceInfo {
        mobile: true,
        ..DeviceInfo::default()
    };
    let mobile = TestEnv::for_device(900.0, 700.0, &phone);
    assert!(!mobile.query(query).matches());
}

#[test]
fn user_agent_drives_environment_shortcuts() {
    let device = DeviceInfo::from_user_agent(
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 \
         (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
    )
    .with_touch(true);
    let env = TestEnv::for_device(390.0, 844.0, &device);
    assert!(env.query("@mobile and @ios and @touch").matches());
    assert!(env.query("@safari and @portrait").matches());
    assert!(!env.query("@android or @desktop").matches());
}

#[test]
fn trace_explains_result() {
    let env = env();
    let condition = env.query("@sm, @md and not print");
    let trace = condition.trace();
    assert_eq!(trace.matched(), condition.matches());
    assert_eq!(
        trace.to_string(),
        "+ or\n  - (min-width: 768px) and (max-width: 991px)\n  + and\n    + (min-width: 992px) and (max-width: 1199px)\n    + not print\n"
    );
}
