// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cycle-safe, bounded traversal of a value graph.
//!
//! [`serialize`] walks a [`Value`] depth-first and produces a [`SafeValue`].
//! For every node it:
//!
//! 1. replaces the node with [`Sentinel::CircularReference`] if the node is
//!    one of its own ancestors
//! 2. applies the caller's [`Transform`]
//! 3. invokes the node's custom serialization hook, if any, through
//!    [`guard`]
//! 4. returns leaves as-is
//! 5. replaces the node with [`Sentinel::Truncated`] when the depth or edge
//!    bound is exceeded
//! 6. otherwise descends into the members, reading each through [`guard`]
//!
//! Cycle detection uses the ancestor stack of the current path only, so a
//! substructure shared by two parents is rendered under both. Cycles are
//! checked before the transform and hook run and are not re-checked on their
//! output: a transform or hook that builds a new self-referential structure
//! can recurse until a depth limit stops it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{CoreError, Result};
use crate::guard::{guard, guard_value};
use crate::safe::SafeValue;
use crate::value::{Opaque, PathKey, Property, Sentinel, Value};

/// Per-node transformation applied during traversal.
///
/// Invoked on every node, including the root and sentinels, before structural
/// descent. Implemented for any `Fn(&PathKey, Value) -> Value`.
pub trait Transform {
	fn transform(&self, key: &PathKey, value: Value) -> Value;
}

impl<F> Transform for F
where
	F: Fn(&PathKey, Value) -> Value,
{
	fn transform(&self, key: &PathKey, value: Value) -> Value {
		self(key, value)
	}
}

/// Depth and width bounds. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
	/// Maximum nesting depth; the root is at depth 0.
	pub depth: Option<usize>,
	/// Maximum number of members visited per container.
	pub edges: Option<usize>,
}

impl Limits {
	pub const UNBOUNDED: Limits = Limits {
		depth: None,
		edges: None,
	};

	pub fn new(depth: usize, edges: usize) -> Self {
		Self {
			depth: Some(depth),
			edges: Some(edges),
		}
	}

	pub fn with_depth(mut self, depth: usize) -> Self {
		self.depth = Some(depth);
		self
	}

	pub fn with_edges(mut self, edges: usize) -> Self {
		self.edges = Some(edges);
		self
	}

	/// Builds limits from signed configuration values, rejecting negatives.
	pub fn try_from_signed(depth: Option<i64>, edges: Option<i64>) -> Result<Self> {
		Ok(Self {
			depth: depth.map(|v| unsigned("depth", v)).transpose()?,
			edges: edges.map(|v| unsigned("edges", v)).transpose()?,
		})
	}

	fn depth_exceeded(&self, depth: usize) -> bool {
		self.depth.is_some_and(|limit| depth > limit)
	}

	fn edge_exceeded(&self, index: usize) -> bool {
		self.edges.is_some_and(|limit| index >= limit)
	}

	fn visible(&self, len: usize) -> usize {
		self.edges.map_or(len, |limit| len.min(limit))
	}
}

fn unsigned(name: &'static str, value: i64) -> Result<usize> {
	usize::try_from(value).map_err(|_| CoreError::NegativeLimit { name, value })
}

/// Serializes `value` into a bounded, acyclic [`SafeValue`].
///
/// Never fails and never panics on hostile input: cycles, failing getters and
/// exceeded bounds become [`Sentinel`] values in the output. A panicking
/// `transform` is the caller's bug and is not caught.
///
/// # Example
///
/// ```
/// use loom_notify_core::{serialize, Limits, Mapping, SafeValue, Sentinel, Value};
///
/// let node = Mapping::new();
/// node.insert("name", "root");
/// node.insert("self", node.clone());
///
/// let out = serialize(&Value::from(node), None, Limits::default());
/// assert_eq!(out.get("name"), Some(&SafeValue::from("root")));
/// assert!(out.get("self").unwrap().is_sentinel(Sentinel::CircularReference));
/// ```
pub fn serialize(value: &Value, transform: Option<&dyn Transform>, limits: Limits) -> SafeValue {
	let mut walker = Walker {
		transform,
		limits,
		ancestors: Vec::new(),
	};
	walker.visit(&PathKey::Root, value.clone(), 0, 0)
}

struct Walker<'a> {
	transform: Option<&'a dyn Transform>,
	limits: Limits,
	/// Ancestors on the current path. Holding the handles keeps their
	/// identities from being reused by nodes created during descent.
	ancestors: Vec<Value>,
}

impl Walker<'_> {
	fn on_path(&self, node: &Value) -> bool {
		match node.identity() {
			Some(id) => self.ancestors.iter().any(|a| a.identity() == Some(id)),
			None => false,
		}
	}

	fn visit(&mut self, key: &PathKey, node: Value, depth: usize, index: usize) -> SafeValue {
		let original = node.clone();
		let mut current = if self.on_path(&node) {
			Value::Sentinel(Sentinel::CircularReference)
		} else {
			node
		};

		if let Some(transform) = self.transform {
			current = transform.transform(key, current);
		}

		let hooked = guard(|| current.serialize_hook(key).transpose());
		match hooked {
			Ok(Some(replacement)) => current = replacement,
			Ok(None) => {}
			Err(_) => return SafeValue::Sentinel(Sentinel::AccessError),
		}

		if let Some(leaf) = leaf(&current) {
			return leaf;
		}

		if self.limits.depth_exceeded(depth) || self.limits.edge_exceeded(index) {
			trace!(%key, depth, index, "bound exceeded, truncating");
			return SafeValue::Sentinel(Sentinel::Truncated);
		}

		// The pre-transform node is what later members may point back to.
		let tracked = original.identity().is_some();
		if tracked {
			self.ancestors.push(original);
		}
		let projected = self.descend(current, depth);
		if tracked {
			self.ancestors.pop();
		}
		projected
	}

	fn descend(&mut self, container: Value, depth: usize) -> SafeValue {
		match container {
			Value::Sequence(seq) => match guard(|| seq.members()) {
				Ok(items) => self.sequence(&items, depth),
				Err(_) => SafeValue::Sentinel(Sentinel::AccessError),
			},
			Value::Mapping(map) => match guard(|| map.entries()) {
				Ok(entries) => self.mapping(entries, depth),
				Err(_) => SafeValue::Sentinel(Sentinel::AccessError),
			},
			Value::Exception(exception) => match guard(|| exception.custom_fields()) {
				Ok(fields) => self.mapping(fields, depth),
				Err(_) => SafeValue::Sentinel(Sentinel::AccessError),
			},
			Value::Opaque(opaque) => self.opaque(&opaque, depth),
			// No enumerable own members without a coercing transform.
			Value::Keyed(_) | Value::Distinct(_) | Value::Buffer(_) => {
				SafeValue::Mapping(IndexMap::new())
			}
			other => leaf(&other).unwrap_or(SafeValue::Undefined),
		}
	}

	fn sequence(&mut self, items: &[Property], depth: usize) -> SafeValue {
		let visible = self.limits.visible(items.len());
		let mut out = Vec::with_capacity(visible + 1);
		for (i, item) in items.iter().take(visible).enumerate() {
			let member = guard_value(|| item.read());
			out.push(self.visit(&PathKey::Index(i), member, depth + 1, i));
		}
		if visible < items.len() {
			out.push(SafeValue::Sentinel(Sentinel::Truncated));
		}
		SafeValue::Sequence(out)
	}

	fn mapping(&mut self, entries: Vec<(String, Property)>, depth: usize) -> SafeValue {
		let visible = self.limits.visible(entries.len());
		let mut out = IndexMap::with_capacity(visible);
		for (i, (name, property)) in entries.into_iter().take(visible).enumerate() {
			let member = guard_value(|| property.read());
			let projected = self.visit(&PathKey::Name(name.clone()), member, depth + 1, i);
			out.insert(name, projected);
		}
		SafeValue::Mapping(out)
	}

	fn opaque(&mut self, opaque: &Opaque, depth: usize) -> SafeValue {
		let inspect = opaque.inspect();
		let keys = match guard(|| inspect.keys()) {
			Ok(keys) => keys,
			Err(_) => return SafeValue::Sentinel(Sentinel::AccessError),
		};
		let entries = keys
			.into_iter()
			.map(|key| {
				let member = guard_value(|| inspect.get(&key));
				(key, Property::Value(member))
			})
			.collect();
		self.mapping(entries, depth)
	}
}

fn leaf(value: &Value) -> Option<SafeValue> {
	Some(match value {
		Value::Undefined | Value::Callable(_) => SafeValue::Undefined,
		Value::Null => SafeValue::Null,
		Value::Bool(b) => SafeValue::Bool(*b),
		Value::Number(n) => SafeValue::Number(*n),
		Value::Text(s) => SafeValue::Text(s.clone()),
		Value::Token(t) => SafeValue::Token(t.clone()),
		Value::BigInt(n) => SafeValue::BigInt(n.clone()),
		Value::Pattern(p) => SafeValue::Pattern(p.clone()),
		Value::Sentinel(s) => SafeValue::Sentinel(*s),
		_ => return None,
	})
}
