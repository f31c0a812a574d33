// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Conversion of whatever was passed to `notify` into exception records.

use std::error::Error as StdError;

use loom_notify_core::{guard, short_type_name, Exception, Mapping, Value};
use tracing::debug;

use crate::backtrace::{capture_stacktrace, parse_backtrace};
use crate::event::{ExceptionRecord, StackFrame};

/// Error class used when the notified value is not error-like.
pub const INVALID_ERROR_CLASS: &str = "InvalidError";

const DEFAULT_ERROR_CLASS: &str = "Error";
const MAX_CAUSES: usize = 32;

/// Anything that can be reported.
#[derive(Debug, Clone)]
pub enum Notifiable<'a> {
	/// A Rust error. `class` is the short name of its concrete type.
	Error {
		class: &'static str,
		error: &'a (dyn StdError + 'static),
	},
	/// An exception value from the value graph.
	Exception(Exception),
	/// An error described only by its class and message.
	Named { name: String, message: String },
	/// A plain message.
	Message(String),
	/// Any other value.
	Value(Value),
}

impl<'a> Notifiable<'a> {
	pub fn error<E>(error: &'a E) -> Self
	where
		E: StdError + 'static,
	{
		Self::Error {
			class: short_type_name(std::any::type_name::<E>()),
			error,
		}
	}

	pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
		Self::Named {
			name: name.into(),
			message: message.into(),
		}
	}
}

impl From<&str> for Notifiable<'_> {
	fn from(message: &str) -> Self {
		Self::Message(message.to_string())
	}
}

impl From<String> for Notifiable<'_> {
	fn from(message: String) -> Self {
		Self::Message(message)
	}
}

impl From<Exception> for Notifiable<'_> {
	fn from(exception: Exception) -> Self {
		Self::Exception(exception)
	}
}

impl From<Value> for Notifiable<'_> {
	fn from(value: Value) -> Self {
		Self::Value(value)
	}
}

/// Result of converting a [`Notifiable`].
#[derive(Debug, Clone)]
pub struct Converted {
	/// The reported error first, then its causes.
	pub exceptions: Vec<ExceptionRecord>,
	/// Metadata tabs contributed by the notified value.
	pub metadata: Option<Mapping>,
}

/// Builds exception records for `notifiable`. `component` names the entry
/// point and labels the metadata tab used for non-error values.
pub fn to_exceptions(notifiable: Notifiable<'_>, component: &str) -> Converted {
	match notifiable {
		Notifiable::Error { class, error } => from_std_error(class, error),
		Notifiable::Exception(exception) => from_exception(&exception),
		Notifiable::Named { name, message } if !name.is_empty() && !message.is_empty() => {
			generated(name, message)
		}
		Notifiable::Named { name, message } => invalid(&format!("{name}: {message}"), component),
		Notifiable::Message(message) => generated(DEFAULT_ERROR_CLASS.to_string(), message),
		Notifiable::Value(value) => from_value(value, component),
	}
}

fn generated(class: String, message: String) -> Converted {
	let mut record = ExceptionRecord::new(class, message);
	record.stacktrace = capture_stacktrace();
	Converted {
		exceptions: vec![record],
		metadata: None,
	}
}

fn invalid(description: &str, component: &str) -> Converted {
	debug!(component, "notified value is not an error");
	let mut converted = generated(
		INVALID_ERROR_CLASS.to_string(),
		format!("{component} received a non-error. See \"{component}\" tab for more detail."),
	);
	let metadata = Mapping::new();
	metadata.insert(
		component,
		Value::mapping([("non-error parameter", description)]),
	);
	converted.metadata = Some(metadata);
	converted
}

fn from_std_error(class: &str, error: &(dyn StdError + 'static)) -> Converted {
	let mut converted = generated(class.to_string(), error.to_string());
	let mut source = error.source();
	while let Some(cause) = source {
		if converted.exceptions.len() > MAX_CAUSES {
			break;
		}
		converted
			.exceptions
			.push(ExceptionRecord::new(debug_class(cause), cause.to_string()));
		source = cause.source();
	}
	converted
}

/// Best-effort class name for an error known only as `dyn Error`: the
/// leading identifier of its `Debug` output.
fn debug_class(error: &dyn StdError) -> String {
	let debug = format!("{error:?}");
	let class: String = debug
		.chars()
		.take_while(|c| c.is_alphanumeric() || *c == '_')
		.collect();
	if class.is_empty() || !class.starts_with(|c: char| c.is_ascii_uppercase()) {
		DEFAULT_ERROR_CLASS.to_string()
	} else {
		class
	}
}

fn from_value(value: Value, component: &str) -> Converted {
	match value {
		Value::Exception(exception) => from_exception(&exception),
		Value::Text(text) => generated(DEFAULT_ERROR_CLASS.to_string(), text),
		value @ (Value::Number(_) | Value::Bool(_)) => {
			generated(DEFAULT_ERROR_CLASS.to_string(), value.describe())
		}
		Value::Mapping(map) => match simple_error(&map) {
			Some((name, message)) => generated(name, message),
			None => invalid(&Value::Mapping(map).describe(), component),
		},
		other => invalid(&other.describe(), component),
	}
}

/// `name`/`errorClass` plus `message`/`errorMessage`, both non-empty text.
fn simple_error(map: &Mapping) -> Option<(String, String)> {
	let text = |key: &str| match map.get(key).and_then(|p| guard(|| p.read()).ok()) {
		Some(Value::Text(s)) if !s.is_empty() => Some(s),
		_ => None,
	};
	let name = text("name").or_else(|| text("errorClass"))?;
	let message = text("message").or_else(|| text("errorMessage"))?;
	Some((name, message))
}

fn from_exception(exception: &Exception) -> Converted {
	// Visited handles stay alive so a getter-built cause cannot take the
	// identity of one already seen.
	let mut seen: Vec<Exception> = vec![exception.clone()];
	let mut exceptions = vec![exception_record(exception, true)];

	let mut cause = exception_cause(exception);
	while let Some(next) = cause {
		if seen.iter().any(|e| e.id() == next.id()) || exceptions.len() > MAX_CAUSES {
			break;
		}
		exceptions.push(exception_record(&next, false));
		cause = exception_cause(&next);
		seen.push(next);
	}

	let metadata = exception_metadata(exception).map(|tab| {
		let name = exception
			.name()
			.unwrap_or_else(|_| DEFAULT_ERROR_CLASS.to_string());
		let metadata = Mapping::new();
		metadata.insert(name, tab);
		metadata
	});

	Converted {
		exceptions,
		metadata,
	}
}

fn exception_record(exception: &Exception, backtrace: bool) -> ExceptionRecord {
	let name = exception
		.name()
		.unwrap_or_else(|_| DEFAULT_ERROR_CLASS.to_string());
	let message = exception.message().unwrap_or_default();
	let mut record = ExceptionRecord::new(name.clone(), message.clone());

	let own_stack = exception
		.stack()
		.ok()
		.flatten()
		.filter(|s| !s.is_empty() && *s != format!("{name}: {message}"));
	record.stacktrace = if backtrace {
		resolve_stack(own_stack.as_deref(), capture_stacktrace)
	} else {
		resolve_stack(own_stack.as_deref(), Vec::new)
	};
	record
}

/// Frames parsed from `stack`, or `fallback` when there are none. Stack text
/// not in the `std::backtrace` format parses to nothing.
fn resolve_stack<F>(stack: Option<&str>, fallback: F) -> Vec<StackFrame>
where
	F: FnOnce() -> Vec<StackFrame>,
{
	let parsed = stack.map(parse_backtrace).unwrap_or_default();
	if parsed.is_empty() {
		fallback()
	} else {
		parsed
	}
}

fn custom_field(exception: &Exception, key: &str) -> Option<Value> {
	let fields = guard(|| exception.custom_fields()).ok()?;
	let (_, property) = fields.into_iter().find(|(name, _)| name == key)?;
	guard(|| property.read()).ok()
}

fn exception_cause(exception: &Exception) -> Option<Exception> {
	match custom_field(exception, "cause")? {
		Value::Exception(cause) => Some(cause),
		_ => None,
	}
}

fn exception_metadata(exception: &Exception) -> Option<Value> {
	match custom_field(exception, "metadata")? {
		value @ (Value::Mapping(_) | Value::Opaque(_)) => Some(value),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use loom_notify_core::{serialize, AccessFault, Limits};
	use serde_json::json;
	use std::fmt;

	#[derive(Debug)]
	struct CheckoutError {
		source: std::num::ParseIntError,
	}

	impl fmt::Display for CheckoutError {
		fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
			write!(f, "Failed checkout")
		}
	}

	impl StdError for CheckoutError {
		fn source(&self) -> Option<&(dyn StdError + 'static)> {
			Some(&self.source)
		}
	}

	fn metadata_json(converted: &Converted) -> serde_json::Value {
		let metadata = converted.metadata.clone().unwrap();
		serialize(&Value::from(metadata), None, Limits::default())
			.to_json()
			.unwrap()
	}

	#[test]
	fn test_std_error_uses_type_name_and_source_chain() {
		let error = CheckoutError {
			source: "abc".parse::<u32>().unwrap_err(),
		};
		let converted = to_exceptions(Notifiable::error(&error), "notify");
		assert_eq!(converted.exceptions.len(), 2);
		assert_eq!(converted.exceptions[0].error_class, "CheckoutError");
		assert_eq!(converted.exceptions[0].message, "Failed checkout");
		assert_eq!(converted.exceptions[1].error_class, "ParseIntError");
		assert_eq!(converted.exceptions[1].message, "invalid digit found in string");
		assert!(converted.exceptions[1].stacktrace.is_empty());
		assert!(converted.metadata.is_none());
	}

	#[test]
	fn test_message_is_reported_as_error() {
		let converted = to_exceptions("something broke".into(), "notify");
		assert_eq!(converted.exceptions[0].error_class, "Error");
		assert_eq!(converted.exceptions[0].message, "something broke");
	}

	#[test]
	fn test_named_error() {
		let converted = to_exceptions(Notifiable::named("QuotaError", "Out of quota"), "notify");
		assert_eq!(converted.exceptions[0].error_class, "QuotaError");
		assert_eq!(converted.exceptions[0].message, "Out of quota");
	}

	#[test]
	fn test_simple_error_mapping() {
		let value = Value::mapping([("errorClass", "CheckoutError"), ("errorMessage", "Failed")]);
		let converted = to_exceptions(value.into(), "notify");
		assert_eq!(converted.exceptions[0].error_class, "CheckoutError");
		assert_eq!(converted.exceptions[0].message, "Failed");
	}

	#[test]
	fn test_non_error_value_is_invalid_error() {
		let value = Value::mapping([("foo", "bar")]);
		let converted = to_exceptions(value.into(), "notify");
		assert_eq!(converted.exceptions[0].error_class, INVALID_ERROR_CLASS);
		assert_eq!(
			converted.exceptions[0].message,
			"notify received a non-error. See \"notify\" tab for more detail."
		);
		assert_eq!(
			metadata_json(&converted),
			json!({"notify": {"non-error parameter": "[object Object]"}})
		);
	}

	#[test]
	fn test_empty_named_error_is_invalid() {
		let converted = to_exceptions(Notifiable::named("", "no name"), "onunhandled");
		assert_eq!(converted.exceptions[0].error_class, INVALID_ERROR_CLASS);
		assert!(metadata_json(&converted).get("onunhandled").is_some());
	}

	#[test]
	fn test_exception_value_with_stack_and_causes() {
		let root_cause = Exception::new("IoError", "disk full");
		let cause = Exception::new("WriteError", "write failed");
		cause.set_field("cause", root_cause);
		let exception = Exception::new("SaveError", "could not save")
			.with_stack("   0: my_app::save\n             at ./src/save.rs:10:3");
		exception.set_field("cause", cause);

		let converted = to_exceptions(exception.into(), "notify");
		let classes: Vec<_> = converted
			.exceptions
			.iter()
			.map(|e| e.error_class.as_str())
			.collect();
		assert_eq!(classes, vec!["SaveError", "WriteError", "IoError"]);
		assert_eq!(converted.exceptions[0].stacktrace.len(), 1);
		assert_eq!(converted.exceptions[0].stacktrace[0].file, "./src/save.rs");
		assert!(converted.exceptions[2].stacktrace.is_empty());
	}

	fn getter_chain(level: usize, depth: usize) -> Exception {
		let exception = Exception::new(format!("Level{level}"), "failed");
		if level < depth {
			exception.define_getter("cause", move || {
				Ok(Value::from(getter_chain(level + 1, depth)))
			});
		}
		exception
	}

	#[test]
	fn test_getter_built_cause_chain_is_followed_to_the_end() {
		for _ in 0..50 {
			let converted = to_exceptions(getter_chain(0, 6).into(), "notify");
			let classes: Vec<_> = converted
				.exceptions
				.iter()
				.map(|e| e.error_class.as_str())
				.collect();
			assert_eq!(
				classes,
				vec!["Level0", "Level1", "Level2", "Level3", "Level4", "Level5", "Level6"]
			);
		}
	}

	#[test]
	fn test_foreign_stack_text_falls_back() {
		let fallback = || vec![StackFrame {
			file: "./src/main.rs".to_string(),
			..Default::default()
		}];
		let js_stack = "Error: boom\n    at submit (app.js:10:3)\n    at main (app.js:1:1)";
		assert_eq!(resolve_stack(Some(js_stack), fallback), fallback());
		assert_eq!(resolve_stack(None, fallback), fallback());

		let rust_stack = "   0: my_app::save\n             at ./src/save.rs:10:3";
		let frames = resolve_stack(Some(rust_stack), fallback);
		assert_eq!(frames.len(), 1);
		assert_eq!(frames[0].file, "./src/save.rs");
	}

	#[test]
	fn test_foreign_stack_on_uncaptured_cause_stays_empty() {
		let cause = Exception::new("JsError", "boom").with_stack("JsError: boom\n    at x (a.js:1:1)");
		let exception = Exception::new("SaveError", "could not save");
		exception.set_field("cause", cause);
		let converted = to_exceptions(exception.into(), "notify");
		assert!(converted.exceptions[1].stacktrace.is_empty());
	}

	#[test]
	fn test_cyclic_cause_chain_terminates() {
		let a = Exception::new("A", "a");
		let b = Exception::new("B", "b");
		a.set_field("cause", b.clone());
		b.set_field("cause", a.clone());
		let converted = to_exceptions(a.into(), "notify");
		assert_eq!(converted.exceptions.len(), 2);
	}

	#[test]
	fn test_exception_metadata_is_merged_under_its_name() {
		let exception = Exception::new("CheckoutError", "Failed");
		exception.set_field("metadata", Value::mapping([("cart", 3)]));
		let converted = to_exceptions(exception.into(), "notify");
		assert_eq!(metadata_json(&converted), json!({"CheckoutError": {"cart": 3}}));
	}

	#[test]
	fn test_failing_exception_fields_do_not_abort_conversion() {
		let exception = Exception::new("FlakyError", "flaky");
		exception.define_getter("cause", || Err(AccessFault::new("nope")));
		exception.define_getter("metadata", || panic!("metadata getter exploded"));
		let converted = to_exceptions(exception.into(), "notify");
		assert_eq!(converted.exceptions.len(), 1);
		assert!(converted.metadata.is_none());
	}

	#[test]
	fn test_debug_class() {
		let error = "x".parse::<i32>().unwrap_err();
		assert_eq!(debug_class(&error), "ParseIntError");
		let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
		assert_eq!(debug_class(&io), "Custom");
	}
}
