// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Serializer output: an owned, finite, acyclic tree.

use indexmap::IndexMap;
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::value::{BigInt, Pattern, Sentinel, Token};

/// Largest integer a JSON consumer can hold exactly in a double.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A bounded, acyclic, JSON-compatible projection of a [`Value`](crate::Value).
///
/// Encoding follows JavaScript `JSON.stringify` semantics:
/// - `Undefined` and `Token` members are omitted from mappings and encoded as
///   `null` inside sequences
/// - non-finite numbers encode as `null`
/// - `Pattern` encodes as an empty object
/// - sentinels encode as their marker text (`"[Circular]"`, `"[Error]"`,
///   `"[...]"`)
/// - `BigInt` has no JSON form and fails encoding
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SafeValue {
	#[default]
	Undefined,
	Null,
	Bool(bool),
	Number(f64),
	Text(String),
	Token(Token),
	BigInt(BigInt),
	Pattern(Pattern),
	Sequence(Vec<SafeValue>),
	Mapping(IndexMap<String, SafeValue>),
	Sentinel(Sentinel),
}

impl SafeValue {
	pub fn mapping<I, K>(entries: I) -> Self
	where
		I: IntoIterator<Item = (K, SafeValue)>,
		K: Into<String>,
	{
		Self::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::Text(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_sequence(&self) -> Option<&[SafeValue]> {
		match self {
			Self::Sequence(items) => Some(items),
			_ => None,
		}
	}

	pub fn as_mapping(&self) -> Option<&IndexMap<String, SafeValue>> {
		match self {
			Self::Mapping(entries) => Some(entries),
			_ => None,
		}
	}

	/// Looks up a mapping member.
	pub fn get(&self, key: &str) -> Option<&SafeValue> {
		self.as_mapping().and_then(|entries| entries.get(key))
	}

	pub fn is_sentinel(&self, sentinel: Sentinel) -> bool {
		matches!(self, Self::Sentinel(s) if *s == sentinel)
	}

	/// Whether the value is dropped from mappings when encoded.
	fn is_absent(&self) -> bool {
		matches!(self, Self::Undefined | Self::Token(_))
	}

	/// Encodes into a `serde_json::Value`. Fails if a `BigInt` is present.
	pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
		serde_json::to_value(self)
	}
}

impl Serialize for SafeValue {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			Self::Undefined | Self::Null | Self::Token(_) => serializer.serialize_unit(),
			Self::Bool(b) => serializer.serialize_bool(*b),
			Self::Number(n) if !n.is_finite() => serializer.serialize_unit(),
			Self::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => {
				serializer.serialize_i64(*n as i64)
			}
			Self::Number(n) => serializer.serialize_f64(*n),
			Self::Text(s) => serializer.serialize_str(s),
			Self::BigInt(n) => Err(S::Error::custom(format!(
				"BigInt value {n} can't be serialized in JSON"
			))),
			Self::Pattern(_) => serializer.serialize_map(Some(0))?.end(),
			Self::Sentinel(sentinel) => serializer.serialize_str(sentinel.marker()),
			Self::Sequence(items) => {
				let mut seq = serializer.serialize_seq(Some(items.len()))?;
				for item in items {
					if item.is_absent() {
						seq.serialize_element(&())?;
					} else {
						seq.serialize_element(item)?;
					}
				}
				seq.end()
			}
			Self::Mapping(entries) => {
				let present = entries.values().filter(|v| !v.is_absent()).count();
				let mut map = serializer.serialize_map(Some(present))?;
				for (key, value) in entries.iter().filter(|(_, v)| !v.is_absent()) {
					map.serialize_entry(key, value)?;
				}
				map.end()
			}
		}
	}
}

impl From<serde_json::Value> for SafeValue {
	fn from(json: serde_json::Value) -> Self {
		match json {
			serde_json::Value::Null => Self::Null,
			serde_json::Value::Bool(b) => Self::Bool(b),
			serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
			serde_json::Value::String(s) => Self::Text(s),
			serde_json::Value::Array(items) => {
				Self::Sequence(items.into_iter().map(Self::from).collect())
			}
			serde_json::Value::Object(entries) => {
				Self::Mapping(entries.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
			}
		}
	}
}

impl From<&str> for SafeValue {
	fn from(s: &str) -> Self {
		Self::Text(s.to_string())
	}
}

impl From<String> for SafeValue {
	fn from(s: String) -> Self {
		Self::Text(s)
	}
}

impl From<f64> for SafeValue {
	fn from(n: f64) -> Self {
		Self::Number(n)
	}
}

impl From<bool> for SafeValue {
	fn from(b: bool) -> Self {
		Self::Bool(b)
	}
}

impl From<Sentinel> for SafeValue {
	fn from(sentinel: Sentinel) -> Self {
		Self::Sentinel(sentinel)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_encodes_sentinels_as_markers() {
		let value = SafeValue::Sequence(vec![
			Sentinel::CircularReference.into(),
			Sentinel::AccessError.into(),
			Sentinel::Truncated.into(),
		]);
		assert_eq!(value.to_json().unwrap(), json!(["[Circular]", "[Error]", "[...]"]));
	}

	#[test]
	fn test_absent_values_follow_json_rules() {
		let value = SafeValue::mapping([
			("kept", SafeValue::from("yes")),
			("gone", SafeValue::Undefined),
			("token", SafeValue::Token(Token::new("t"))),
			(
				"list",
				SafeValue::Sequence(vec![SafeValue::Undefined, SafeValue::from(1.0)]),
			),
		]);
		assert_eq!(value.to_json().unwrap(), json!({"kept": "yes", "list": [null, 1]}));
	}

	#[test]
	fn test_numbers() {
		let value = SafeValue::Sequence(vec![
			SafeValue::from(3.0),
			SafeValue::from(0.25),
			SafeValue::from(f64::NAN),
			SafeValue::from(f64::INFINITY),
		]);
		assert_eq!(value.to_json().unwrap(), json!([3, 0.25, null, null]));
	}

	#[test]
	fn test_pattern_encodes_as_empty_object() {
		let value = SafeValue::Pattern(Pattern::new("a+").unwrap());
		assert_eq!(value.to_json().unwrap(), json!({}));
	}

	#[test]
	fn test_bigint_fails_encoding() {
		let value = SafeValue::mapping([("n", SafeValue::BigInt(BigInt::from(7_i64)))]);
		assert!(value.to_json().is_err());
		assert!(serde_json::to_string(&value).is_err());
	}

	#[test]
	fn test_from_json() {
		let value = SafeValue::from(json!({"b": 1, "a": [true, null]}));
		assert_eq!(value.get("b"), Some(&SafeValue::Number(1.0)));
		assert_eq!(
			value.get("a").and_then(SafeValue::as_sequence).map(<[_]>::len),
			Some(2)
		);
	}
}
