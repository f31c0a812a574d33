// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Key-based redaction.
//!
//! Any mapping entry whose key is in the [`Denylist`] is replaced by
//! [`REDACTED`], at any depth and whatever the value's type. Nothing else
//! changes.

use std::collections::HashSet;

use crate::filter::{serialize, Limits, Transform};
use crate::safe::SafeValue;
use crate::value::{PathKey, Value};

/// Replacement text for denylisted members.
pub const REDACTED: &str = "[REDACTED]";

/// Set of mapping keys whose values must never leave the process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Denylist(HashSet<String>);

impl Denylist {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, key: impl Into<String>) -> bool {
		self.0.insert(key.into())
	}

	pub fn contains(&self, key: &str) -> bool {
		self.0.contains(key)
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}
}

impl<S: Into<String>> FromIterator<S> for Denylist {
	fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
		Self(iter.into_iter().map(Into::into).collect())
	}
}

impl<S: Into<String>> Extend<S> for Denylist {
	fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
		self.0.extend(iter.into_iter().map(Into::into));
	}
}

/// Returns a copy of `value` with denylisted mapping members replaced.
///
/// ```
/// use loom_notify_core::{redact, Denylist, SafeValue};
/// use serde_json::json;
///
/// let denylist: Denylist = ["api_key"].into_iter().collect();
/// let value = SafeValue::from(json!({"request": {"api_key": "secret", "path": "/"}}));
/// assert_eq!(
///     redact(&value, &denylist).to_json().unwrap(),
///     json!({"request": {"api_key": "[REDACTED]", "path": "/"}})
/// );
/// ```
pub fn redact(value: &SafeValue, denylist: &Denylist) -> SafeValue {
	let mut out = value.clone();
	redact_in_place(&mut out, denylist);
	out
}

/// In-place variant of [`redact`].
pub fn redact_in_place(value: &mut SafeValue, denylist: &Denylist) {
	if denylist.is_empty() {
		return;
	}
	match value {
		SafeValue::Sequence(items) => {
			for item in items {
				redact_in_place(item, denylist);
			}
		}
		SafeValue::Mapping(entries) => {
			for (key, member) in entries.iter_mut() {
				if denylist.contains(key) {
					*member = SafeValue::from(REDACTED);
				} else {
					redact_in_place(member, denylist);
				}
			}
		}
		_ => {}
	}
}

/// Transform that redacts denylisted members while the graph is walked.
#[derive(Debug, Clone, Copy)]
pub struct RedactKeys<'a>(pub &'a Denylist);

impl Transform for RedactKeys<'_> {
	fn transform(&self, key: &PathKey, value: Value) -> Value {
		match key.as_name() {
			Some(name) if self.0.contains(name) => Value::from(REDACTED),
			_ => value,
		}
	}
}

/// Serializes a raw value graph with denylisted members redacted.
///
/// A denylisted member is replaced before descent, so its subtree is never
/// walked.
pub fn redact_value(value: &Value, denylist: &Denylist, limits: Limits) -> SafeValue {
	serialize(value, Some(&RedactKeys(denylist)), limits)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::guard::AccessFault;
	use crate::value::Mapping;
	use proptest::prelude::*;
	use serde_json::json;

	fn denylist(keys: &[&str]) -> Denylist {
		keys.iter().copied().collect()
	}

	#[test]
	fn test_redacts_matching_keys_at_any_depth() {
		let value = SafeValue::from(json!({
			"password": "hunter2",
			"profile": {"name": "Kentaro", "password": {"nested": true}},
			"list": [{"password": 1}, {"other": 2}],
		}));
		assert_eq!(
			redact(&value, &denylist(&["password"])).to_json().unwrap(),
			json!({
				"password": "[REDACTED]",
				"profile": {"name": "Kentaro", "password": "[REDACTED]"},
				"list": [{"password": "[REDACTED]"}, {"other": 2}],
			})
		);
	}

	#[test]
	fn test_keys_match_exactly() {
		let value = SafeValue::from(json!({"Password": "a", "password_hint": "b"}));
		assert_eq!(redact(&value, &denylist(&["password"])), value);
	}

	#[test]
	fn test_leaves_pass_through() {
		let denylist = denylist(&["x"]);
		for leaf in [SafeValue::Null, SafeValue::from("x"), SafeValue::from(1.0)] {
			assert_eq!(redact(&leaf, &denylist), leaf);
		}
	}

	#[test]
	fn test_empty_denylist_is_identity() {
		let value = SafeValue::from(json!({"a": {"b": [1, 2]}}));
		assert_eq!(redact(&value, &Denylist::new()), value);
	}

	#[test]
	fn test_redact_value_replaces_denylisted_members() {
		let root = Mapping::from_entries([("user", "ken")]);
		root.define_getter("secret", || Err(AccessFault::new("unreadable")));
		root.insert("token", Value::mapping([("raw", "abc")]));
		let out = redact_value(
			&Value::from(root),
			&denylist(&["secret", "token"]),
			Limits::default(),
		);
		assert_eq!(
			out.to_json().unwrap(),
			json!({"user": "ken", "secret": "[REDACTED]", "token": "[REDACTED]"})
		);
	}

	#[test]
	fn test_redact_value_handles_cycles() {
		let root = Mapping::from_entries([("api_key", "abc")]);
		root.insert("me", root.clone());
		let out = redact_value(&Value::from(root), &denylist(&["api_key"]), Limits::default());
		assert_eq!(
			out.to_json().unwrap(),
			json!({"api_key": "[REDACTED]", "me": "[Circular]"})
		);
	}

	fn keys_in(value: &SafeValue, out: &mut Vec<String>) {
		match value {
			SafeValue::Sequence(items) => items.iter().for_each(|i| keys_in(i, out)),
			SafeValue::Mapping(entries) => {
				for (k, v) in entries {
					out.push(k.clone());
					keys_in(v, out);
				}
			}
			_ => {}
		}
	}

	fn tree() -> impl Strategy<Value = serde_json::Value> {
		let leaf = prop_oneof![
			any::<i32>().prop_map(serde_json::Value::from),
			"[a-z]{0,6}".prop_map(serde_json::Value::from),
		];
		leaf.prop_recursive(4, 32, 4, |inner| {
			prop_oneof![
				prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::from),
				prop::collection::btree_map("[a-d]", inner, 0..4)
					.prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
			]
		})
	}

	fn matches_except_redacted(
		original: &SafeValue,
		redacted: &SafeValue,
		denylist: &Denylist,
	) -> bool {
		match (original, redacted) {
			(SafeValue::Sequence(a), SafeValue::Sequence(b)) => {
				a.len() == b.len()
					&& a.iter()
						.zip(b)
						.all(|(x, y)| matches_except_redacted(x, y, denylist))
			}
			(SafeValue::Mapping(a), SafeValue::Mapping(b)) => {
				a.len() == b.len()
					&& a.iter().zip(b).all(|((ka, va), (kb, vb))| {
						ka == kb
							&& if denylist.contains(ka) {
								vb.as_str() == Some(REDACTED)
							} else {
								matches_except_redacted(va, vb, denylist)
							}
					})
			}
			(a, b) => a == b,
		}
	}

	proptest! {
		#[test]
		fn redaction_is_selective(input in tree(), keys in prop::collection::vec("[a-d]", 0..3)) {
			let denylist: Denylist = keys.into_iter().collect();
			let original = SafeValue::from(input);
			let redacted = redact(&original, &denylist);

			let mut before = Vec::new();
			let mut after = Vec::new();
			keys_in(&original, &mut before);
			keys_in(&redacted, &mut after);
			prop_assert!(after.iter().all(|k| before.contains(k)));
			prop_assert!(matches_except_redacted(&original, &redacted, &denylist));
		}
	}
}
