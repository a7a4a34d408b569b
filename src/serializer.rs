// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Bounded, cycle-safe capture of call arguments and results.
//!
//! [`serialize`] drives a value's own `Serialize` impl into a
//! [`serde_json::Value`] through a custom serializer that tracks nesting.
//! Once the depth budget is spent, containers are replaced by
//! [`DEPTH_PLACEHOLDER`] *without* visiting their elements, so a value that
//! refers back to itself terminates instead of overflowing the stack.
//! `Some` and newtype layers spend a level too, so cycles made only of
//! wrappers are cut the same way.
//!
//! Nothing is truncated on the happy path: long strings and large collections
//! are captured whole. Shortening for display is left to outputs.

use std::cell::Cell;
use std::fmt;

use serde::ser::{self, Serialize};
use serde_json::{Map, Number, Value};

/// Default nesting budget for captured values.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Substituted for any container nested deeper than the budget.
pub const DEPTH_PLACEHOLDER: &str = "<max depth exceeded>";

/// Serialize `value` into JSON, never failing.
///
/// Structs and maps become objects, sequences and tuples become arrays, unit
/// enum variants become their name and `chrono` timestamps become ISO-8601
/// strings. Values whose `Serialize` impl errors degrade to an
/// `"<unserializable: ..>"` string.
pub fn serialize<T: Serialize + ?Sized>(value: &T, max_depth: usize) -> Value {
    serialize_with_report(value, max_depth).0
}

/// Like [`serialize`], also returning how many placeholders were substituted.
pub fn serialize_with_report<T: Serialize + ?Sized>(value: &T, max_depth: usize) -> (Value, usize) {
    let fallbacks = Cell::new(0);
    let serializer = ValueSerializer {
        depth: 0,
        max_depth,
        fallbacks: &fallbacks,
    };
    let value = serializer.capture(value);
    (value, fallbacks.get())
}

/// Apply the depth budget to an already-built JSON value.
pub fn bound_depth(value: Value, max_depth: usize) -> Value {
    fn walk(value: Value, depth: usize, max_depth: usize) -> Value {
        match value {
            Value::Array(_) | Value::Object(_) if depth >= max_depth => {
                Value::String(DEPTH_PLACEHOLDER.to_string())
            }
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| walk(item, depth + 1, max_depth))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, walk(v, depth + 1, max_depth)))
                    .collect(),
            ),
            scalar => scalar,
        }
    }
    walk(value, 0, max_depth)
}

/// Serializes any `Debug` value as its string representation.
///
/// Use this for arguments or results that have no `Serialize` impl:
///
/// ```rust,ignore
/// let tool = traced_tool(&obs, "open", |path: Debugged<'_, PathBuf>| ...);
/// ```
pub struct Debugged<'a, T: ?Sized>(pub &'a T);

impl<T: fmt::Debug + ?Sized> Serialize for Debugged<'_, T> {
    fn serialize<S: ser::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&format_args!("{:?}", self.0))
    }
}

/// Error raised by a value's own `Serialize` impl.
#[derive(Debug)]
pub struct CaptureError(String);

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for CaptureError {}

impl ser::Error for CaptureError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self(msg.to_string())
    }
}

#[derive(Clone, Copy)]
struct ValueSerializer<'a> {
    depth: usize,
    max_depth: usize,
    fallbacks: &'a Cell<usize>,
}

impl<'a> ValueSerializer<'a> {
    fn child(self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self
        }
    }

    fn exhausted(self) -> bool {
        self.depth >= self.max_depth
    }

    fn placeholder(self) -> Value {
        self.fallbacks.set(self.fallbacks.get() + 1);
        Value::String(DEPTH_PLACEHOLDER.to_string())
    }

    /// Serialize at this depth, degrading errors to a placeholder string.
    fn capture<T: Serialize + ?Sized>(self, value: &T) -> Value {
        match value.serialize(self) {
            Ok(value) => value,
            Err(err) => {
                self.fallbacks.set(self.fallbacks.get() + 1);
                Value::String(format!("<unserializable: {err}>"))
            }
        }
    }

    /// `Some` and newtype layers add no JSON nesting but still spend one
    /// level, so a cycle built only from them reaches the bound. A scalar
    /// one layer past the bound is kept.
    fn unwrap_layer<T: Serialize + ?Sized>(self, value: &T) -> Result<Value, CaptureError> {
        if self.depth > self.max_depth {
            return Ok(self.placeholder());
        }
        value.serialize(self.child())
    }

    fn key<T: Serialize + ?Sized>(self, key: &T) -> String {
        match self.child().capture(key) {
            Value::String(s) => s,
            other => other.to_string(),
        }
    }

    fn float(self, v: f64) -> Value {
        match Number::from_f64(v) {
            Some(n) => Value::Number(n),
            None => Value::String(v.to_string()),
        }
    }

    fn seq(self, len: Option<usize>) -> SeqCollector<'a> {
        SeqCollector {
            items: (!self.exhausted()).then(|| Vec::with_capacity(len.unwrap_or(0))),
            ser: self,
        }
    }

    fn map(self) -> MapCollector<'a> {
        MapCollector {
            entries: (!self.exhausted()).then(Map::new),
            pending_key: None,
            ser: self,
        }
    }
}

impl<'a> ser::Serializer for ValueSerializer<'a> {
    type Ok = Value;
    type Error = CaptureError;

    type SerializeSeq = SeqCollector<'a>;
    type SerializeTuple = SeqCollector<'a>;
    type SerializeTupleStruct = SeqCollector<'a>;
    type SerializeTupleVariant = VariantCollector<SeqCollector<'a>>;
    type SerializeMap = MapCollector<'a>;
    type SerializeStruct = MapCollector<'a>;
    type SerializeStructVariant = VariantCollector<MapCollector<'a>>;

    fn serialize_bool(self, v: bool) -> Result<Value, CaptureError> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, CaptureError> {
        Ok(Value::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Value, CaptureError> {
        Ok(Value::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Value, CaptureError> {
        Ok(Value::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, CaptureError> {
        Ok(Value::from(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Value, CaptureError> {
        Ok(i64::try_from(v)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(v.to_string())))
    }

    fn serialize_u8(self, v: u8) -> Result<Value, CaptureError> {
        Ok(Value::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Value, CaptureError> {
        Ok(Value::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Value, CaptureError> {
        Ok(Value::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Value, CaptureError> {
        Ok(Value::from(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, CaptureError> {
        Ok(u64::try_from(v)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(v.to_string())))
    }

    fn serialize_f32(self, v: f32) -> Result<Value, CaptureError> {
        Ok(self.float(f64::from(v)))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, CaptureError> {
        Ok(self.float(v))
    }

    fn serialize_char(self, v: char) -> Result<Value, CaptureError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, CaptureError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, CaptureError> {
        if self.exhausted() {
            return Ok(self.placeholder());
        }
        Ok(Value::Array(v.iter().map(|b| Value::from(*b)).collect()))
    }

    fn serialize_none(self) -> Result<Value, CaptureError> {
        Ok(Value::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Value, CaptureError> {
        self.unwrap_layer(value)
    }

    fn serialize_unit(self) -> Result<Value, CaptureError> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, CaptureError> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Value, CaptureError> {
        Ok(Value::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, CaptureError> {
        self.unwrap_layer(value)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, CaptureError> {
        if self.exhausted() {
            return Ok(self.placeholder());
        }
        let mut map = Map::new();
        map.insert(variant.to_string(), self.child().capture(value));
        Ok(Value::Object(map))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqCollector<'a>, CaptureError> {
        Ok(self.seq(len))
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqCollector<'a>, CaptureError> {
        Ok(self.seq(Some(len)))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqCollector<'a>, CaptureError> {
        Ok(self.seq(Some(len)))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantCollector<SeqCollector<'a>>, CaptureError> {
        Ok(VariantCollector {
            variant,
            inner: self.seq(Some(len)),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapCollector<'a>, CaptureError> {
        Ok(self.map())
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<MapCollector<'a>, CaptureError> {
        Ok(self.map())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<VariantCollector<MapCollector<'a>>, CaptureError> {
        Ok(VariantCollector {
            variant,
            inner: self.map(),
        })
    }
}

/// Collects sequence elements; `items` is `None` once the budget is spent.
struct SeqCollector<'a> {
    ser: ValueSerializer<'a>,
    items: Option<Vec<Value>>,
}

impl SeqCollector<'_> {
    fn push<T: Serialize + ?Sized>(&mut self, value: &T) {
        if let Some(items) = &mut self.items {
            items.push(self.ser.child().capture(value));
        }
    }

    fn finish(self) -> Value {
        match self.items {
            Some(items) => Value::Array(items),
            None => self.ser.placeholder(),
        }
    }
}

impl ser::SerializeSeq for SeqCollector<'_> {
    type Ok = Value;
    type Error = CaptureError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CaptureError> {
        self.push(value);
        Ok(())
    }

    fn end(self) -> Result<Value, CaptureError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for SeqCollector<'_> {
    type Ok = Value;
    type Error = CaptureError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CaptureError> {
        self.push(value);
        Ok(())
    }

    fn end(self) -> Result<Value, CaptureError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for SeqCollector<'_> {
    type Ok = Value;
    type Error = CaptureError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CaptureError> {
        self.push(value);
        Ok(())
    }

    fn end(self) -> Result<Value, CaptureError> {
        Ok(self.finish())
    }
}

/// Collects map entries and struct fields.
struct MapCollector<'a> {
    ser: ValueSerializer<'a>,
    entries: Option<Map<String, Value>>,
    pending_key: Option<String>,
}

impl MapCollector<'_> {
    fn insert<T: Serialize + ?Sized>(&mut self, key: String, value: &T) {
        if let Some(entries) = &mut self.entries {
            entries.insert(key, self.ser.child().capture(value));
        }
    }

    fn finish(self) -> Value {
        match self.entries {
            Some(entries) => Value::Object(entries),
            None => self.ser.placeholder(),
        }
    }
}

impl ser::SerializeMap for MapCollector<'_> {
    type Ok = Value;
    type Error = CaptureError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), CaptureError> {
        if self.entries.is_some() {
            self.pending_key = Some(self.ser.key(key));
        }
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CaptureError> {
        let key = self.pending_key.take().unwrap_or_default();
        self.insert(key, value);
        Ok(())
    }

    fn end(self) -> Result<Value, CaptureError> {
        Ok(self.finish())
    }
}

impl ser::SerializeStruct for MapCollector<'_> {
    type Ok = Value;
    type Error = CaptureError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), CaptureError> {
        self.insert(key.to_string(), value);
        Ok(())
    }

    fn end(self) -> Result<Value, CaptureError> {
        Ok(self.finish())
    }
}

/// Wraps a tuple or struct variant as `{variant: inner}`.
struct VariantCollector<C> {
    variant: &'static str,
    inner: C,
}

impl<C> VariantCollector<C> {
    fn wrap(variant: &'static str, inner: Value) -> Value {
        if inner.as_str() == Some(DEPTH_PLACEHOLDER) {
            return inner;
        }
        let mut map = Map::new();
        map.insert(variant.to_string(), inner);
        Value::Object(map)
    }
}

impl ser::SerializeTupleVariant for VariantCollector<SeqCollector<'_>> {
    type Ok = Value;
    type Error = CaptureError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CaptureError> {
        self.inner.push(value);
        Ok(())
    }

    fn end(self) -> Result<Value, CaptureError> {
        Ok(Self::wrap(self.variant, self.inner.finish()))
    }
}

impl ser::SerializeStructVariant for VariantCollector<MapCollector<'_>> {
    type Ok = Value;
    type Error = CaptureError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), CaptureError> {
        self.inner.insert(key.to_string(), value);
        Ok(())
    }

    fn end(self) -> Result<Value, CaptureError> {
        Ok(Self::wrap(self.variant, self.inner.finish()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde::Serialize;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    #[derive(Serialize)]
    #[serde(rename_all = "snake_case")]
    enum Mode {
        Headless,
        Visible,
    }

    #[derive(Serialize)]
    enum Action {
        Click { selector: String },
        Scroll(i32, i32),
        Wait(u64),
    }

    #[derive(Serialize)]
    struct Request {
        url: String,
        retries: u8,
        mode: Mode,
        headers: BTreeMap<String, String>,
    }

    struct Node {
        name: String,
        next: RefCell<Option<Rc<Node>>>,
    }

    impl Serialize for Node {
        fn serialize<S: ser::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
            use serde::ser::SerializeStruct;
            let next = self.next.borrow();
            let mut state = s.serialize_struct("Node", 2)?;
            state.serialize_field("name", &self.name)?;
            state.serialize_field("next", &next.as_deref())?;
            state.end()
        }
    }

    struct Refuses;

    impl Serialize for Refuses {
        fn serialize<S: ser::Serializer>(&self, _s: S) -> Result<S::Ok, S::Error> {
            Err(ser::Error::custom("socket handles cannot be captured"))
        }
    }

    #[test]
    fn test_struct_with_enum_and_map() {
        let mut headers = BTreeMap::new();
        headers.insert("accept".to_string(), "text/html".to_string());
        let value = serialize(
            &Request {
                url: "https://example.com".to_string(),
                retries: 3,
                mode: Mode::Headless,
                headers,
            },
            DEFAULT_MAX_DEPTH,
        );

        assert_eq!(
            value,
            json!({
                "url": "https://example.com",
                "retries": 3,
                "mode": "headless",
                "headers": {"accept": "text/html"}
            })
        );
    }

    #[test]
    fn test_enum_variants() {
        assert_eq!(serialize(&Mode::Visible, 4), json!("visible"));
        assert_eq!(
            serialize(&Action::Click { selector: "#go".into() }, 4),
            json!({"Click": {"selector": "#go"}})
        );
        assert_eq!(serialize(&Action::Scroll(0, 400), 4), json!({"Scroll": [0, 400]}));
        assert_eq!(serialize(&Action::Wait(250), 4), json!({"Wait": 250}));
    }

    #[test]
    fn test_datetime_is_iso8601() {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
        assert_eq!(serialize(&at, 4), json!("2026-03-14T15:09:26Z"));
    }

    #[test]
    fn test_tuple_args_become_array() {
        let args = ("https://example.com".to_string(),);
        assert_eq!(serialize(&args, 4), json!(["https://example.com"]));
    }

    #[test]
    fn test_depth_budget_replaces_deep_containers() {
        let value = json!({"a": {"b": {"c": {"d": 1}}}});
        let captured = serialize(&value, 2);
        assert_eq!(captured, json!({"a": {"b": DEPTH_PLACEHOLDER}}));
    }

    #[test]
    fn test_scalars_survive_at_depth_limit() {
        let captured = serialize(&json!({"a": [1, 2, 3], "b": "x"}), 1);
        assert_eq!(captured, json!({"a": DEPTH_PLACEHOLDER, "b": "x"}));
    }

    #[test]
    fn test_self_referential_value_terminates() {
        let node = Rc::new(Node {
            name: "loop".to_string(),
            next: RefCell::new(None),
        });
        *node.next.borrow_mut() = Some(Rc::clone(&node));

        let (value, fallbacks) = serialize_with_report(node.as_ref(), 5);
        node.next.borrow_mut().take();

        // Each hop spends two levels: the `next` field and its `Some`.
        let mut cursor = &value;
        for _ in 0..3 {
            assert_eq!(cursor["name"], json!("loop"));
            cursor = &cursor["next"];
        }
        assert_eq!(cursor, &json!(DEPTH_PLACEHOLDER));
        assert_eq!(fallbacks, 1);
    }

    #[derive(Serialize)]
    struct Retry {
        retries: Option<u8>,
        label: Label,
    }

    #[derive(Serialize)]
    struct Label(String);

    #[test]
    fn test_wrapped_scalars_survive_at_depth_limit() {
        let value = serialize(
            &Retry {
                retries: Some(3),
                label: Label("fast".to_string()),
            },
            1,
        );
        assert_eq!(value, json!({"retries": 3, "label": "fast"}));
        assert_eq!(serialize(&Some(7), 0), json!(7));
        assert_eq!(serialize(&Some(Some(7)), 0), json!(DEPTH_PLACEHOLDER));
    }

    #[test]
    fn test_failing_serialize_degrades() {
        let value = serialize(&json!({"ok": 1}), 4);
        assert_eq!(value, json!({"ok": 1}));

        let value = serialize(&Refuses, 4);
        let text = value.as_str().unwrap();
        assert!(text.starts_with("<unserializable:"));
        assert!(text.contains("socket handles"));

        let mut map = BTreeMap::new();
        map.insert("conn", Refuses);
        let (value, fallbacks) = serialize_with_report(&map, 4);
        assert!(value["conn"].as_str().unwrap().starts_with("<unserializable:"));
        assert_eq!(fallbacks, 1);
    }

    #[test]
    fn test_non_string_keys_and_non_finite_floats() {
        let mut map = BTreeMap::new();
        map.insert(404, f64::NAN);
        map.insert(200, 1.5);
        let value = serialize(&map, 4);
        assert_eq!(value, json!({"200": 1.5, "404": "NaN"}));
        assert_eq!(serialize(&f64::INFINITY, 4), json!("inf"));
    }

    #[test]
    fn test_large_content_is_not_truncated() {
        let page = "x".repeat(200_000);
        let value = serialize(&page, 4);
        assert_eq!(value.as_str().unwrap().len(), 200_000);
    }

    #[test]
    fn test_debugged_uses_debug_repr() {
        let path = std::path::PathBuf::from("/tmp/plan.md");
        assert_eq!(serialize(&Debugged(&path), 4), json!("\"/tmp/plan.md\""));
    }

    #[test]
    fn test_bound_depth_on_value() {
        let value = json!([[["deep"]], "shallow"]);
        assert_eq!(bound_depth(value, 2), json!([[DEPTH_PLACEHOLDER], "shallow"]));
    }

    #[test]
    fn test_large_integers() {
        assert_eq!(serialize(&u128::MAX, 1), json!(u128::MAX.to_string()));
        assert_eq!(serialize(&-5i128, 1), json!(-5));
    }
}
