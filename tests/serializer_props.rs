// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Properties of the bounded serializer and of emitted records.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use serde_json::Value;

use agentrace::schema::Metrics;
use agentrace::serializer::{bound_depth, serialize, serialize_with_report, DEPTH_PLACEHOLDER};
use agentrace::{LogLevel, Observability};

fn nesting(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(nesting).max().unwrap_or(0),
        Value::Object(map) => 1 + map.values().map(nesting).max().unwrap_or(0),
        _ => 0,
    }
}

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        (-1.0e12f64..1.0e12).prop_map(Value::from),
        ".{0,12}".prop_map(Value::from),
    ];
    leaf.prop_recursive(8, 96, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map(".{0,8}", inner, 0..6)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_depth_never_exceeds_budget(value in arb_json(), max_depth in 1usize..6) {
        let captured = serialize(&value, max_depth);
        prop_assert!(nesting(&captured) <= max_depth);
    }

    #[test]
    fn prop_shallow_values_pass_through(value in arb_json()) {
        let depth = nesting(&value).max(1);
        prop_assert_eq!(serialize(&value, depth), value);
    }

    #[test]
    fn prop_bound_depth_matches_serialize(value in arb_json(), max_depth in 1usize..6) {
        prop_assert_eq!(bound_depth(value.clone(), max_depth), serialize(&value, max_depth));
    }

    #[test]
    fn prop_any_floats_encode(values in prop::collection::vec(any::<f64>(), 0..16)) {
        let captured = serialize(&values, 4);
        prop_assert!(serde_json::to_string(&captured).is_ok());
    }

    #[test]
    fn prop_emitted_records_encode(
        value in arb_json(),
        metrics in prop::collection::btree_map("[a-z_]{1,10}", any::<f64>(), 0..6),
    ) {
        let obs = Observability::builder().max_depth(4).build();
        let ctx = obs.current_context();
        let record = obs.emitter().emit(
            LogLevel::Info,
            "prop.value",
            &ctx,
            &value,
            Some(metrics.into_iter().collect::<Metrics>()),
            None,
        );

        prop_assert!(record.metrics.values().all(|v| v.is_finite()));
        let line = record.to_json_line();
        prop_assert!(line.is_ok());
        let parsed: Value = serde_json::from_str(&line.unwrap()).unwrap();
        prop_assert!(parsed["data"].is_object());
    }
}

struct Node {
    name: String,
    next: RefCell<Option<Rc<Node>>>,
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let next = self.next.borrow();
        let mut state = s.serialize_struct("Node", 2)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("next", &next.as_deref())?;
        state.end()
    }
}

#[test]
fn test_self_referential_value_is_cut() {
    let node = Rc::new(Node {
        name: "loop".to_string(),
        next: RefCell::new(None),
    });
    *node.next.borrow_mut() = Some(node.clone());

    let obs = Observability::builder().max_depth(5).build();
    let record = obs.log(LogLevel::Info, "agent.state", &*node);

    let line = record.to_json_line().unwrap();
    assert!(line.contains(DEPTH_PLACEHOLDER));
    assert_eq!(record.data["name"], "loop");
    assert_eq!(record.data["next"]["next"]["name"], "loop");
    assert_eq!(obs.diagnostics().serializer_fallbacks, 1);

    node.next.borrow_mut().take();
}

/// A cycle with no struct or sequence in it: newtype, `Option`, `Rc`.
struct Link(RefCell<Option<Rc<Link>>>);

impl Serialize for Link {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let next = self.0.borrow();
        s.serialize_newtype_struct("Link", &next.as_deref())
    }
}

#[test]
fn test_cycle_through_newtype_terminates() {
    let link = Rc::new(Link(RefCell::new(None)));
    *link.0.borrow_mut() = Some(link.clone());

    let (value, fallbacks) = serialize_with_report(link.as_ref(), 10);
    assert_eq!(value, Value::from(DEPTH_PLACEHOLDER));
    assert_eq!(fallbacks, 1);

    let obs = Observability::builder().build();
    let record = obs.log(LogLevel::Debug, "agent.state", &*link);
    assert_eq!(record.data["value"], DEPTH_PLACEHOLDER);

    link.0.borrow_mut().take();
}
