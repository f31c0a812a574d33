// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Coercion of non-JSON values into JSON-friendly stand-ins.
//!
//! [`Coercion`] is a [`Transform`] for the traversal engine; [`stringify`]
//! runs the engine with it. Every conversion that touches caller data is
//! guarded, and a failed conversion renders as `"[Error]"`.

use crate::filter::{serialize, Limits, Transform};
use crate::guard::{guard, AccessError, AccessFault};
use crate::safe::SafeValue;
use crate::value::{Callable, Exception, PathKey, Property, Sentinel, Value};

const CALLABLE_MAX_CHARS: usize = 50;
const ELLIPSIS: &str = "...";

/// Transform that rewrites sentinels, collections, callables, exceptions and
/// buffers into JSON-representable values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Coercion;

impl Transform for Coercion {
	fn transform(&self, _key: &PathKey, value: Value) -> Value {
		coerce(value)
	}
}

/// Applies the coercion rules to a single node.
pub fn coerce(value: Value) -> Value {
	match value {
		Value::Sentinel(Sentinel::CircularReference) => Value::from("[Circular]"),
		Value::Sentinel(Sentinel::AccessError) => error_text(),
		Value::BigInt(n) => text_of(|| Ok(n.to_string())),
		Value::Token(t) => text_of(|| Ok(t.to_string())),
		Value::Pattern(p) => text_of(|| Ok(p.to_string())),
		Value::Keyed(keyed) => tagged(
			"Map",
			guard(|| keyed.pairs()).map(|pairs| {
				Value::sequence(pairs.into_iter().map(|(k, v)| Value::sequence([k, v])))
			}),
		),
		Value::Distinct(distinct) => tagged(
			"Set",
			guard(|| distinct.values()).map(Value::sequence),
		),
		Value::Callable(callable) => text_of(|| Ok(callable_summary(&callable))),
		Value::Exception(exception) => exception_fields(&exception),
		Value::Buffer(buffer) => Value::from(format!("ArrayBuffer({})", buffer.len())),
		other => other,
	}
}

/// Serializes `value` with [`Coercion`] applied to every node.
///
/// ```
/// use loom_notify_core::{stringify, KeyedCollection, Limits, Value};
/// use serde_json::json;
///
/// let keyed = KeyedCollection::new();
/// keyed.insert("user", 42);
/// let out = stringify(&Value::from(keyed), Limits::default());
/// assert_eq!(out.to_json().unwrap(), json!({"type": "Map", "value": [["user", 42]]}));
/// ```
pub fn stringify(value: &Value, limits: Limits) -> SafeValue {
	serialize(value, Some(&Coercion), limits)
}

fn error_text() -> Value {
	Value::from(Sentinel::AccessError.marker())
}

fn text_of<F>(render: F) -> Value
where
	F: FnOnce() -> Result<String, AccessFault>,
{
	guard(render).map_or_else(|_| error_text(), Value::Text)
}

fn tagged(kind: &str, members: Result<Value, AccessError>) -> Value {
	Value::mapping([
		("type", Value::from(kind)),
		("value", members.unwrap_or_else(|_| error_text())),
	])
}

fn exception_fields(exception: &Exception) -> Value {
	let Ok(fields) = guard(|| exception.own_fields()) else {
		return error_text();
	};
	Value::mapping(
		fields
			.into_iter()
			.map(|(name, property): (String, Property)| (name, read_field(&property))),
	)
}

fn read_field(property: &Property) -> Value {
	guard(|| property.read()).unwrap_or_else(|_| error_text())
}

/// Source text with whitespace runs collapsed, cut to fit
/// [`CALLABLE_MAX_CHARS`].
fn callable_summary(callable: &Callable) -> String {
	let mut collapsed = String::with_capacity(callable.source().len());
	let mut in_space = false;
	for c in callable.source().chars() {
		if c.is_whitespace() {
			if !in_space {
				collapsed.push(' ');
			}
			in_space = true;
		} else {
			collapsed.push(c);
			in_space = false;
		}
	}
	truncate(collapsed, CALLABLE_MAX_CHARS)
}

fn truncate(input: String, max_chars: usize) -> String {
	if input.chars().count() <= max_chars {
		return input;
	}
	let keep = max_chars - ELLIPSIS.len();
	let mut out: String = input.chars().take(keep).collect();
	out.push_str(ELLIPSIS);
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::value::{BigInt, Buffer, DistinctCollection, KeyedCollection, Mapping, Pattern, Token};
	use proptest::prelude::*;
	use serde_json::json;

	fn json_of(value: impl Into<Value>) -> serde_json::Value {
		stringify(&value.into(), Limits::default()).to_json().unwrap()
	}

	#[test]
	fn test_plain_values_pass_through() {
		let input = json!({"a": 1, "b": [true, null, "x"], "c": {"d": 2.5}});
		assert_eq!(json_of(Value::from(input.clone())), input);
	}

	#[test]
	fn test_circular_becomes_text() {
		let root = Mapping::from_entries([("name", "loop")]);
		root.insert("me", root.clone());
		let out = stringify(&Value::from(root), Limits::default());
		assert_eq!(out.get("me"), Some(&SafeValue::from("[Circular]")));
	}

	#[test]
	fn test_access_error_becomes_text() {
		let root = Mapping::new();
		root.define_getter("broken", || Err(AccessFault::new("kaboom")));
		let out = stringify(&Value::from(root), Limits::default());
		assert_eq!(out.get("broken"), Some(&SafeValue::from("[Error]")));
	}

	#[test]
	fn test_textual_primitives() {
		let input = Value::mapping([
			("big", Value::from(BigInt::from(123_456_789_012_345_678_901_234_567_890_u128))),
			("sym", Value::from(Token::new("desc"))),
			("anon", Value::from(Token::anonymous())),
			("re", Value::from(Pattern::new(r"^a+\d$").unwrap())),
		]);
		assert_eq!(
			json_of(input),
			json!({
				"big": "123456789012345678901234567890",
				"sym": "Symbol(desc)",
				"anon": "Symbol()",
				"re": "/^a+\\d$/",
			})
		);
	}

	#[test]
	fn test_keyed_collection() {
		let keyed = KeyedCollection::new();
		keyed.insert("abc", "def");
		keyed.insert(1, Value::mapping([("nested", true)]));
		assert_eq!(
			json_of(keyed),
			json!({"type": "Map", "value": [["abc", "def"], [1, {"nested": true}]]})
		);
	}

	#[test]
	fn test_distinct_collection() {
		let distinct = DistinctCollection::new();
		distinct.insert("a");
		distinct.insert("b");
		distinct.insert("a");
		assert_eq!(json_of(distinct), json!({"type": "Set", "value": ["a", "b"]}));
	}

	#[test]
	fn test_collection_cycle() {
		let keyed = KeyedCollection::new();
		keyed.insert("self", keyed.clone());
		assert_eq!(
			json_of(keyed),
			json!({"type": "Map", "value": [["self", "[Circular]"]]})
		);
	}

	#[test]
	fn test_callable_collapses_whitespace() {
		let callable = Callable::new("fn  add(a, b)\n\t{ a + b }");
		assert_eq!(json_of(callable), json!("fn add(a, b) { a + b }"));
	}

	#[test]
	fn test_callable_is_truncated() {
		let source = format!("fn long() {{ {} }}", "x".repeat(80));
		let out = json_of(Callable::new(source));
		let text = out.as_str().unwrap();
		assert_eq!(text.chars().count(), 50);
		assert!(text.starts_with("fn long() { xxx"));
		assert!(text.ends_with("..."));
	}

	#[test]
	fn test_callable_of_exactly_fifty_chars_is_kept() {
		let source = "y".repeat(50);
		assert_eq!(json_of(Callable::new(source.clone())), json!(source));
	}

	#[test]
	fn test_exception_exposes_all_own_fields() {
		let exception = Exception::new("TypeError", "bad input").with_stack("at main");
		exception.set_field("code", 42);
		exception.define_getter("secret", || Err(AccessFault::new("denied")));
		assert_eq!(
			json_of(Value::mapping([("error", exception)])),
			json!({
				"error": {
					"name": "TypeError",
					"message": "bad input",
					"stack": "at main",
					"code": 42,
					"secret": "[Error]",
				}
			})
		);
	}

	#[test]
	fn test_exception_referencing_itself() {
		let exception = Exception::new("Error", "loop");
		exception.set_field("me", exception.clone());
		assert_eq!(
			json_of(exception),
			json!({"name": "Error", "message": "loop", "me": "[Circular]"})
		);
	}

	#[test]
	fn test_buffer_summary() {
		assert_eq!(json_of(Buffer::new(vec![0_u8; 16])), json!("ArrayBuffer(16)"));
	}

	#[test]
	fn test_limits_still_apply() {
		let input = Value::sequence([1, 2, 3, 4]);
		let out = stringify(&input, Limits::default().with_edges(2));
		assert_eq!(out.to_json().unwrap(), json!([1, 2, "[...]"]));
	}

	fn plain_json() -> impl Strategy<Value = serde_json::Value> {
		let leaf = prop_oneof![
			Just(serde_json::Value::Null),
			any::<bool>().prop_map(serde_json::Value::from),
			any::<i32>().prop_map(serde_json::Value::from),
			"[a-z]{0,8}".prop_map(serde_json::Value::from),
		];
		leaf.prop_recursive(4, 32, 4, |inner| {
			prop_oneof![
				prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::from),
				prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
					.prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
			]
		})
	}

	proptest! {
		#[test]
		fn stringify_is_identity_on_plain_json(input in plain_json()) {
			let out = stringify(&Value::from(input.clone()), Limits::UNBOUNDED);
			prop_assert_eq!(out.to_json().unwrap(), input);
		}

		#[test]
		fn stringify_output_always_encodes(input in plain_json(), big in any::<i64>()) {
			let root = Mapping::from_entries([("data", Value::from(input))]);
			root.insert("big", BigInt::from(big));
			root.insert("me", root.clone());
			let out = stringify(&Value::from(root), Limits::default());
			prop_assert!(out.to_json().is_ok());
		}
	}
}
