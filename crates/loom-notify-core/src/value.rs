// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The dynamic value graph handed to the serializer.
//!
//! Containers are shared handles (`Arc` + `RwLock`), so a graph may share
//! substructure between several parents and may contain cycles. Handles are
//! compared by identity ([`NodeId`]), never by content.
//!
//! Members of sequences, mappings and exceptions are [`Property`] values: a
//! stored value or a getter closure that may fail or panic. Host objects whose
//! shape is only reachable through fallible accessors are wrapped in
//! [`Opaque`] via the [`Inspect`] trait.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use regex::Regex;

use crate::error::{CoreError, Result};
use crate::guard::AccessFault;

/// Result of reading caller-owned data.
pub type Access<T> = std::result::Result<T, AccessFault>;

/// Getter closure backing a computed member.
pub type Getter = Arc<dyn Fn() -> Access<Value> + Send + Sync>;

/// Custom serialization hook. Receives the key the value is reached under.
pub type SerializeHook = Arc<dyn Fn(&PathKey) -> Access<Value> + Send + Sync>;

/// Key under which a node is reached from its parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathKey {
	Root,
	Index(usize),
	Name(String),
}

impl PathKey {
	/// Returns the member name for mapping keys.
	pub fn as_name(&self) -> Option<&str> {
		match self {
			Self::Name(name) => Some(name),
			_ => None,
		}
	}
}

impl fmt::Display for PathKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Root => Ok(()),
			Self::Index(index) => write!(f, "{index}"),
			Self::Name(name) => f.write_str(name),
		}
	}
}

/// Identity of a shared container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
	fn of<T: ?Sized>(handle: &Arc<T>) -> Self {
		Self(Arc::as_ptr(handle) as *const () as usize)
	}
}

/// Markers the serializer substitutes for nodes it cannot render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentinel {
	/// The node is its own ancestor.
	CircularReference,
	/// Reading the node or one of its members failed.
	AccessError,
	/// A depth or width bound was exceeded.
	Truncated,
}

impl Sentinel {
	pub fn marker(self) -> &'static str {
		match self {
			Self::CircularReference => "[Circular]",
			Self::AccessError => "[Error]",
			Self::Truncated => "[...]",
		}
	}
}

impl fmt::Display for Sentinel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.marker())
	}
}

/// A member slot: either a stored value or a getter evaluated on read.
#[derive(Clone)]
pub enum Property {
	Value(Value),
	Getter(Getter),
}

impl Property {
	pub fn getter<F>(getter: F) -> Self
	where
		F: Fn() -> Access<Value> + Send + Sync + 'static,
	{
		Self::Getter(Arc::new(getter))
	}

	/// Reads the member. Getters may fail or panic; callers wrap this in
	/// [`guard`](crate::guard).
	pub fn read(&self) -> Access<Value> {
		match self {
			Self::Value(value) => Ok(value.clone()),
			Self::Getter(getter) => getter(),
		}
	}
}

impl fmt::Debug for Property {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
			Self::Getter(_) => f.write_str("Getter"),
		}
	}
}

impl From<Value> for Property {
	fn from(value: Value) -> Self {
		Self::Value(value)
	}
}

fn poisoned() -> AccessFault {
	AccessFault::new("container lock poisoned")
}

fn read<T>(lock: &RwLock<T>) -> Access<RwLockReadGuard<'_, T>> {
	lock.read().map_err(|_| poisoned())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
	lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn peek<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
	lock.read().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct SequenceData {
	items: Vec<Property>,
	hook: Option<SerializeHook>,
}

/// Ordered, index-keyed container.
#[derive(Clone, Default)]
pub struct Sequence(Arc<RwLock<SequenceData>>);

impl Sequence {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_values<I, V>(values: I) -> Self
	where
		I: IntoIterator<Item = V>,
		V: Into<Value>,
	{
		let items = values.into_iter().map(|v| Property::Value(v.into())).collect();
		Self(Arc::new(RwLock::new(SequenceData { items, hook: None })))
	}

	pub fn push(&self, value: impl Into<Value>) {
		write(&self.0).items.push(Property::Value(value.into()));
	}

	pub fn push_getter<F>(&self, getter: F)
	where
		F: Fn() -> Access<Value> + Send + Sync + 'static,
	{
		write(&self.0).items.push(Property::getter(getter));
	}

	/// Installs a custom serialization hook replacing this sequence's rendering.
	pub fn set_hook<F>(&self, hook: F)
	where
		F: Fn(&PathKey) -> Access<Value> + Send + Sync + 'static,
	{
		write(&self.0).hook = Some(Arc::new(hook));
	}

	pub fn len(&self) -> usize {
		peek(&self.0).items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Snapshot of the members, taken under the read lock.
	pub fn members(&self) -> Access<Vec<Property>> {
		Ok(read(&self.0)?.items.clone())
	}

	pub fn id(&self) -> NodeId {
		NodeId::of(&self.0)
	}

	fn hook(&self) -> Access<Option<SerializeHook>> {
		Ok(read(&self.0)?.hook.clone())
	}
}

impl fmt::Debug for Sequence {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Sequence")
			.field("id", &self.id())
			.field("len", &self.len())
			.finish()
	}
}

#[derive(Default)]
struct MappingData {
	entries: IndexMap<String, Property>,
	hook: Option<SerializeHook>,
}

/// String-keyed container preserving insertion order.
#[derive(Clone, Default)]
pub struct Mapping(Arc<RwLock<MappingData>>);

impl Mapping {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_entries<I, K, V>(entries: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<Value>,
	{
		let entries = entries
			.into_iter()
			.map(|(k, v)| (k.into(), Property::Value(v.into())))
			.collect();
		Self(Arc::new(RwLock::new(MappingData {
			entries,
			hook: None,
		})))
	}

	/// Inserts or replaces a member. Replacing keeps the original position.
	pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) {
		write(&self.0)
			.entries
			.insert(key.into(), Property::Value(value.into()));
	}

	pub fn define_getter<F>(&self, key: impl Into<String>, getter: F)
	where
		F: Fn() -> Access<Value> + Send + Sync + 'static,
	{
		write(&self.0)
			.entries
			.insert(key.into(), Property::getter(getter));
	}

	pub fn remove(&self, key: &str) -> Option<Property> {
		write(&self.0).entries.shift_remove(key)
	}

	pub fn get(&self, key: &str) -> Option<Property> {
		peek(&self.0).entries.get(key).cloned()
	}

	pub fn contains_key(&self, key: &str) -> bool {
		peek(&self.0).entries.contains_key(key)
	}

	/// Installs a custom serialization hook replacing this mapping's rendering.
	pub fn set_hook<F>(&self, hook: F)
	where
		F: Fn(&PathKey) -> Access<Value> + Send + Sync + 'static,
	{
		write(&self.0).hook = Some(Arc::new(hook));
	}

	pub fn len(&self) -> usize {
		peek(&self.0).entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn keys(&self) -> Access<Vec<String>> {
		Ok(read(&self.0)?.entries.keys().cloned().collect())
	}

	/// Snapshot of the entries in insertion order, taken under the read lock.
	pub fn entries(&self) -> Access<Vec<(String, Property)>> {
		Ok(read(&self.0)?
			.entries
			.iter()
			.map(|(k, p)| (k.clone(), p.clone()))
			.collect())
	}

	pub fn id(&self) -> NodeId {
		NodeId::of(&self.0)
	}

	fn hook(&self) -> Access<Option<SerializeHook>> {
		Ok(read(&self.0)?.hook.clone())
	}
}

impl fmt::Debug for Mapping {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Mapping")
			.field("id", &self.id())
			.field("len", &self.len())
			.finish()
	}
}

struct ExceptionData {
	name: String,
	message: String,
	stack: Option<String>,
	fields: IndexMap<String, Property>,
}

/// Error-like value: a name, a message, optional stack text and custom fields.
#[derive(Clone)]
pub struct Exception(Arc<RwLock<ExceptionData>>);

impl Exception {
	pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
		Self(Arc::new(RwLock::new(ExceptionData {
			name: name.into(),
			message: message.into(),
			stack: None,
			fields: IndexMap::new(),
		})))
	}

	/// Builds an exception from a Rust error. The `source()` chain becomes a
	/// nested `cause` field.
	pub fn from_error<E>(error: &E) -> Self
	where
		E: std::error::Error + 'static,
	{
		Self::from_dyn(short_type_name(std::any::type_name::<E>()), error)
	}

	fn from_dyn(name: &str, error: &(dyn std::error::Error + 'static)) -> Self {
		let exception = Self::new(name, error.to_string());
		if let Some(source) = error.source() {
			exception.set_field("cause", Self::from_dyn("Error", source));
		}
		exception
	}

	pub fn with_stack(self, stack: impl Into<String>) -> Self {
		write(&self.0).stack = Some(stack.into());
		self
	}

	pub fn set_field(&self, key: impl Into<String>, value: impl Into<Value>) {
		write(&self.0)
			.fields
			.insert(key.into(), Property::Value(value.into()));
	}

	pub fn define_getter<F>(&self, key: impl Into<String>, getter: F)
	where
		F: Fn() -> Access<Value> + Send + Sync + 'static,
	{
		write(&self.0)
			.fields
			.insert(key.into(), Property::getter(getter));
	}

	pub fn name(&self) -> Access<String> {
		Ok(read(&self.0)?.name.clone())
	}

	pub fn message(&self) -> Access<String> {
		Ok(read(&self.0)?.message.clone())
	}

	pub fn stack(&self) -> Access<Option<String>> {
		Ok(read(&self.0)?.stack.clone())
	}

	/// Custom fields only, in insertion order.
	pub fn custom_fields(&self) -> Access<Vec<(String, Property)>> {
		Ok(read(&self.0)?
			.fields
			.iter()
			.map(|(k, p)| (k.clone(), p.clone()))
			.collect())
	}

	/// Every own field: `name`, `message`, `stack` when present, then the
	/// custom fields.
	pub fn own_fields(&self) -> Access<Vec<(String, Property)>> {
		let data = read(&self.0)?;
		let mut fields = Vec::with_capacity(data.fields.len() + 3);
		fields.push(("name".to_string(), Property::Value(Value::from(data.name.as_str()))));
		fields.push((
			"message".to_string(),
			Property::Value(Value::from(data.message.as_str())),
		));
		if let Some(stack) = &data.stack {
			fields.push(("stack".to_string(), Property::Value(Value::from(stack.as_str()))));
		}
		fields.extend(data.fields.iter().map(|(k, p)| (k.clone(), p.clone())));
		Ok(fields)
	}

	pub fn id(&self) -> NodeId {
		NodeId::of(&self.0)
	}
}

impl fmt::Debug for Exception {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let data = peek(&self.0);
		f.debug_struct("Exception")
			.field("id", &self.id())
			.field("name", &data.name)
			.field("message", &data.message)
			.finish_non_exhaustive()
	}
}

/// Order-preserving associative container with arbitrary keys.
#[derive(Clone, Default)]
pub struct KeyedCollection(Arc<RwLock<Vec<(Value, Value)>>>);

impl KeyedCollection {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts a pair, replacing the value of an existing key in place.
	pub fn insert(&self, key: impl Into<Value>, value: impl Into<Value>) {
		let key = key.into();
		let value = value.into();
		let mut pairs = write(&self.0);
		match pairs.iter_mut().find(|(k, _)| k.same_value(&key)) {
			Some(pair) => pair.1 = value,
			None => pairs.push((key, value)),
		}
	}

	pub fn len(&self) -> usize {
		peek(&self.0).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn pairs(&self) -> Access<Vec<(Value, Value)>> {
		Ok(read(&self.0)?.clone())
	}

	pub fn id(&self) -> NodeId {
		NodeId::of(&self.0)
	}
}

impl fmt::Debug for KeyedCollection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("KeyedCollection")
			.field("id", &self.id())
			.field("len", &self.len())
			.finish()
	}
}

/// Order-preserving set of distinct values.
#[derive(Clone, Default)]
pub struct DistinctCollection(Arc<RwLock<Vec<Value>>>);

impl DistinctCollection {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a value, returning `false` if an equal value was already present.
	pub fn insert(&self, value: impl Into<Value>) -> bool {
		let value = value.into();
		let mut values = write(&self.0);
		if values.iter().any(|v| v.same_value(&value)) {
			return false;
		}
		values.push(value);
		true
	}

	pub fn len(&self) -> usize {
		peek(&self.0).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn values(&self) -> Access<Vec<Value>> {
		Ok(read(&self.0)?.clone())
	}

	pub fn id(&self) -> NodeId {
		NodeId::of(&self.0)
	}
}

impl fmt::Debug for DistinctCollection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DistinctCollection")
			.field("id", &self.id())
			.field("len", &self.len())
			.finish()
	}
}

/// Fixed-size binary region.
#[derive(Clone)]
pub struct Buffer(Arc<[u8]>);

impl Buffer {
	pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
		Self(Arc::from(bytes.into()))
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}

	pub fn id(&self) -> NodeId {
		NodeId::of(&self.0)
	}
}

impl fmt::Debug for Buffer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Buffer({})", self.0.len())
	}
}

/// Callable value, carried by its textual source.
#[derive(Clone)]
pub struct Callable(Arc<str>);

impl Callable {
	pub fn new(source: impl Into<String>) -> Self {
		Self(Arc::from(source.into()))
	}

	/// Describes a Rust closure or function by its type name.
	pub fn of<F>(_function: &F) -> Self {
		Self::new(std::any::type_name::<F>())
	}

	pub fn source(&self) -> &str {
		&self.0
	}

	pub fn id(&self) -> NodeId {
		NodeId::of(&self.0)
	}
}

impl fmt::Debug for Callable {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Callable").field(&self.source()).finish()
	}
}

/// Unique token. Two tokens are equal only if they are the same token.
#[derive(Clone)]
pub struct Token(Arc<Option<String>>);

impl Token {
	pub fn new(description: impl Into<String>) -> Self {
		Self(Arc::new(Some(description.into())))
	}

	pub fn anonymous() -> Self {
		Self(Arc::new(None))
	}

	pub fn description(&self) -> Option<&str> {
		self.0.as_deref()
	}
}

impl PartialEq for Token {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

impl fmt::Display for Token {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Symbol({})", self.description().unwrap_or_default())
	}
}

impl fmt::Debug for Token {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Token({self})")
	}
}

/// Arbitrary-precision integer held as canonical decimal text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigInt(String);

impl BigInt {
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl FromStr for BigInt {
	type Err = CoreError;

	fn from_str(s: &str) -> Result<Self> {
		let (negative, digits) = match s.strip_prefix('-') {
			Some(rest) => (true, rest),
			None => (false, s),
		};
		if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
			return Err(CoreError::InvalidBigInt(s.to_string()));
		}
		let digits = digits.trim_start_matches('0');
		Ok(match (negative, digits) {
			(_, "") => Self("0".to_string()),
			(true, d) => Self(format!("-{d}")),
			(false, d) => Self(d.to_string()),
		})
	}
}

macro_rules! bigint_from {
	($($ty:ty),*) => {
		$(impl From<$ty> for BigInt {
			fn from(n: $ty) -> Self {
				Self(n.to_string())
			}
		})*
	};
}

bigint_from!(i64, u64, i128, u128);

impl fmt::Display for BigInt {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Regular-expression value.
#[derive(Clone)]
pub struct Pattern(Arc<Regex>);

impl Pattern {
	pub fn new(pattern: &str) -> Result<Self> {
		Ok(Self(Arc::new(Regex::new(pattern)?)))
	}

	pub fn as_str(&self) -> &str {
		self.0.as_str()
	}

	pub fn regex(&self) -> &Regex {
		&self.0
	}
}

impl From<Regex> for Pattern {
	fn from(regex: Regex) -> Self {
		Self(Arc::new(regex))
	}
}

impl PartialEq for Pattern {
	fn eq(&self, other: &Self) -> bool {
		self.as_str() == other.as_str()
	}
}

impl fmt::Display for Pattern {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "/{}/", self.as_str())
	}
}

impl fmt::Debug for Pattern {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Pattern({self})")
	}
}

/// Host object reachable only through fallible accessors.
///
/// Implement this for objects that intercept member access, compute members
/// lazily, or otherwise may fail when inspected.
pub trait Inspect: Send + Sync {
	/// Own member names in a stable order.
	fn keys(&self) -> Access<Vec<String>>;

	fn get(&self, key: &str) -> Access<Value>;

	/// Custom serialization hook. `None` means the object has none.
	fn to_json(&self, _key: &PathKey) -> Option<Access<Value>> {
		None
	}
}

#[derive(Clone)]
pub struct Opaque(Arc<dyn Inspect>);

impl Opaque {
	pub fn new(inner: impl Inspect + 'static) -> Self {
		Self(Arc::new(inner))
	}

	pub fn inspect(&self) -> &dyn Inspect {
		&*self.0
	}

	pub fn id(&self) -> NodeId {
		NodeId::of(&self.0)
	}
}

impl fmt::Debug for Opaque {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Opaque").field("id", &self.id()).finish()
	}
}

/// A node of the value graph.
#[derive(Debug, Clone, Default)]
pub enum Value {
	#[default]
	Undefined,
	Null,
	Bool(bool),
	Number(f64),
	Text(String),
	Token(Token),
	BigInt(BigInt),
	Pattern(Pattern),
	Sequence(Sequence),
	Mapping(Mapping),
	Callable(Callable),
	Exception(Exception),
	Buffer(Buffer),
	Keyed(KeyedCollection),
	Distinct(DistinctCollection),
	Opaque(Opaque),
	Sentinel(Sentinel),
}

impl Value {
	pub fn sequence<I, V>(values: I) -> Self
	where
		I: IntoIterator<Item = V>,
		V: Into<Value>,
	{
		Self::Sequence(Sequence::from_values(values))
	}

	pub fn mapping<I, K, V>(entries: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<Value>,
	{
		Self::Mapping(Mapping::from_entries(entries))
	}

	/// Identity of shared containers; `None` for primitives and sentinels.
	pub fn identity(&self) -> Option<NodeId> {
		match self {
			Self::Sequence(v) => Some(v.id()),
			Self::Mapping(v) => Some(v.id()),
			Self::Callable(v) => Some(v.id()),
			Self::Exception(v) => Some(v.id()),
			Self::Buffer(v) => Some(v.id()),
			Self::Keyed(v) => Some(v.id()),
			Self::Distinct(v) => Some(v.id()),
			Self::Opaque(v) => Some(v.id()),
			_ => None,
		}
	}

	/// Whether the value is rendered as-is, without structural descent.
	pub fn is_leaf(&self) -> bool {
		matches!(
			self,
			Self::Undefined
				| Self::Null | Self::Bool(_)
				| Self::Number(_)
				| Self::Text(_)
				| Self::Token(_)
				| Self::BigInt(_)
				| Self::Pattern(_)
				| Self::Callable(_)
				| Self::Sentinel(_)
		)
	}

	/// Key equality used by [`KeyedCollection`] and [`DistinctCollection`]:
	/// primitives compare by value (`NaN` equals itself), containers by
	/// identity.
	pub fn same_value(&self, other: &Value) -> bool {
		match (self, other) {
			(Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
			(Self::Bool(a), Self::Bool(b)) => a == b,
			(Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
			(Self::Text(a), Self::Text(b)) => a == b,
			(Self::Token(a), Self::Token(b)) => a == b,
			(Self::BigInt(a), Self::BigInt(b)) => a == b,
			(Self::Sentinel(a), Self::Sentinel(b)) => a == b,
			(a, b) => match (a.identity(), b.identity()) {
				(Some(x), Some(y)) => x == y,
				_ => false,
			},
		}
	}

	/// Invokes the custom serialization hook, if the value carries one.
	///
	/// Returns `None` when there is no hook. The hook itself may fail or
	/// panic; the traversal guards this call.
	pub fn serialize_hook(&self, key: &PathKey) -> Option<Access<Value>> {
		let hook = match self {
			Self::Sequence(seq) => seq.hook(),
			Self::Mapping(map) => map.hook(),
			Self::Opaque(opaque) => return opaque.inspect().to_json(key),
			_ => return None,
		};
		match hook {
			Ok(Some(hook)) => Some(hook(key)),
			Ok(None) => None,
			Err(fault) => Some(Err(fault)),
		}
	}

	/// Short human-readable description used when a value is reported in
	/// place of an error.
	pub fn describe(&self) -> String {
		match self {
			Self::Undefined => "undefined".to_string(),
			Self::Null => "null".to_string(),
			Self::Bool(b) => b.to_string(),
			Self::Number(n) => format_number(*n),
			Self::Text(s) => s.clone(),
			Self::Token(t) => t.to_string(),
			Self::BigInt(n) => n.to_string(),
			Self::Pattern(p) => p.to_string(),
			Self::Sequence(_) => "[object Array]".to_string(),
			Self::Mapping(_) | Self::Keyed(_) | Self::Distinct(_) | Self::Opaque(_) => {
				"[object Object]".to_string()
			}
			Self::Callable(c) => c.source().to_string(),
			Self::Exception(e) => match (e.name(), e.message()) {
				(Ok(name), Ok(message)) => format!("{name}: {message}"),
				_ => "[object Error]".to_string(),
			},
			Self::Buffer(b) => format!("ArrayBuffer({})", b.len()),
			Self::Sentinel(s) => s.to_string(),
		}
	}
}

/// Formats a number the way it reads in JSON: integral values have no
/// fractional part.
fn format_number(n: f64) -> String {
	if n.is_nan() {
		"NaN".to_string()
	} else if n.is_infinite() {
		let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
		text.to_string()
	} else if n.fract() == 0.0 && n.abs() < 1e21 {
		format!("{n:.0}")
	} else {
		n.to_string()
	}
}

/// Last path segment of a type name, without generic arguments.
///
/// `my_app::errors::CheckoutError<T>` becomes `CheckoutError`.
pub fn short_type_name(full: &str) -> &str {
	let base = full.split('<').next().unwrap_or(full);
	base.rsplit("::").next().unwrap_or(base)
}

macro_rules! value_from_number {
	($($ty:ty),*) => {
		$(impl From<$ty> for Value {
			fn from(n: $ty) -> Self {
				Self::Number(n as f64)
			}
		})*
	};
}

value_from_number!(f64, f32, i32, i64, u32, u64, usize);

macro_rules! value_from_variant {
	($($ty:ty => $variant:ident),*) => {
		$(impl From<$ty> for Value {
			fn from(v: $ty) -> Self {
				Self::$variant(v)
			}
		})*
	};
}

value_from_variant!(
	bool => Bool,
	String => Text,
	Token => Token,
	BigInt => BigInt,
	Pattern => Pattern,
	Sequence => Sequence,
	Mapping => Mapping,
	Callable => Callable,
	Exception => Exception,
	Buffer => Buffer,
	KeyedCollection => Keyed,
	DistinctCollection => Distinct,
	Opaque => Opaque,
	Sentinel => Sentinel
);

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Self::Text(s.to_string())
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map_or(Self::Null, Into::into)
	}
}

impl From<serde_json::Value> for Value {
	fn from(json: serde_json::Value) -> Self {
		match json {
			serde_json::Value::Null => Self::Null,
			serde_json::Value::Bool(b) => Self::Bool(b),
			serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
			serde_json::Value::String(s) => Self::Text(s),
			serde_json::Value::Array(items) => Self::sequence(items),
			serde_json::Value::Object(entries) => Self::mapping(entries),
		}
	}
}
