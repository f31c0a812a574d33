// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event model.
//!
//! [`Event`] is what on-error callbacks see and may modify: its metadata and
//! breadcrumb metadata are raw [`Value`] graphs. [`DeliveryEvent`] is the
//! finalized form that goes over the wire, with every dynamic part already
//! serialized into a bounded [`SafeValue`].

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use loom_notify_core::{redact_in_place, Denylist, Mapping, SafeValue, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::NotifyError;

/// Name reported in the notifier section of every payload.
pub const NOTIFIER_NAME: &str = "loom-notify";
/// Version reported in the notifier section of every payload.
pub const NOTIFIER_VERSION: &str = env!("CARGO_PKG_VERSION");
/// Protocol version of the payload.
pub const PAYLOAD_VERSION: &str = "5";

/// Event severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
	Error,
	#[default]
	Warning,
	Info,
}

impl fmt::Display for Severity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Error => write!(f, "error"),
			Self::Warning => write!(f, "warning"),
			Self::Info => write!(f, "info"),
		}
	}
}

impl FromStr for Severity {
	type Err = NotifyError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"error" => Ok(Self::Error),
			"warning" => Ok(Self::Warning),
			"info" => Ok(Self::Info),
			_ => Err(NotifyError::InvalidSeverity(s.to_string())),
		}
	}
}

/// Why an event has the severity it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SeverityReasonType {
	UnhandledException,
	UnhandledError,
	Log,
	Signal,
	UserCallbackSetSeverity,
	UserSpecifiedSeverity,
	HandledException,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityReason {
	#[serde(rename = "type")]
	pub kind: SeverityReasonType,
	#[serde(default, skip_serializing_if = "IndexMap::is_empty")]
	pub attributes: IndexMap<String, String>,
}

impl SeverityReason {
	pub fn new(kind: SeverityReasonType) -> Self {
		Self {
			kind,
			attributes: IndexMap::new(),
		}
	}

	pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.attributes.insert(key.into(), value.into());
		self
	}
}

/// Category of a breadcrumb.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreadcrumbType {
	Navigation,
	Request,
	Process,
	Log,
	User,
	State,
	Error,
	#[default]
	Manual,
}

impl fmt::Display for BreadcrumbType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Navigation => "navigation",
			Self::Request => "request",
			Self::Process => "process",
			Self::Log => "log",
			Self::User => "user",
			Self::State => "state",
			Self::Error => "error",
			Self::Manual => "manual",
		};
		f.write_str(name)
	}
}

impl FromStr for BreadcrumbType {
	type Err = NotifyError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"navigation" => Ok(Self::Navigation),
			"request" => Ok(Self::Request),
			"process" => Ok(Self::Process),
			"log" => Ok(Self::Log),
			"user" => Ok(Self::User),
			"state" => Ok(Self::State),
			"error" => Ok(Self::Error),
			"manual" => Ok(Self::Manual),
			_ => Err(NotifyError::InvalidBreadcrumbType(s.to_string())),
		}
	}
}

/// Something that happened before the event.
#[derive(Debug, Clone)]
pub struct Breadcrumb {
	pub timestamp: DateTime<Utc>,
	pub name: String,
	pub kind: BreadcrumbType,
	pub metadata: Option<Value>,
}

impl Breadcrumb {
	pub fn new(name: impl Into<String>, kind: BreadcrumbType) -> Self {
		Self {
			timestamp: Utc::now(),
			name: name.into(),
			kind,
			metadata: None,
		}
	}

	pub fn with_metadata(mut self, metadata: impl Into<Value>) -> Self {
		self.metadata = Some(metadata.into());
		self
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
	pub file: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub line_number: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub column_number: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub method: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub in_project: Option<bool>,
}

/// One entry of the exception chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionRecord {
	pub error_class: String,
	pub message: String,
	pub stacktrace: Vec<StackFrame>,
	#[serde(rename = "type")]
	pub kind: String,
}

impl ExceptionRecord {
	pub fn new(error_class: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			error_class: error_class.into(),
			message: message.into(),
			stacktrace: Vec::new(),
			kind: "rust".to_string(),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
}

impl User {
	pub fn is_empty(&self) -> bool {
		self.id.is_none() && self.email.is_none() && self.name.is_none()
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub release_stage: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub version: Option<String>,
	#[serde(rename = "type", skip_serializing_if = "Option::is_none")]
	pub kind: Option<String>,
	/// Milliseconds since the application started.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub duration: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub hostname: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub os_name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub time: Option<String>,
}

impl DeviceInfo {
	/// Device section for an event raised now.
	pub fn current() -> Self {
		Self {
			hostname: std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty()),
			os_name: Some(std::env::consts::OS.to_string()),
			time: Some(timestamp(Utc::now())),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInfo {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub client_ip: Option<String>,
	#[serde(default, skip_serializing_if = "IndexMap::is_empty")]
	pub headers: IndexMap<String, String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub http_method: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub referer: Option<String>,
}

/// An event as seen by on-error callbacks.
#[derive(Debug, Clone)]
pub struct Event {
	pub exceptions: Vec<ExceptionRecord>,
	pub breadcrumbs: Vec<Breadcrumb>,
	pub request: Option<RequestInfo>,
	pub context: Option<String>,
	pub grouping_hash: Option<String>,
	pub unhandled: bool,
	pub severity: Severity,
	pub severity_reason: Option<SeverityReason>,
	pub user: Option<User>,
	pub app: AppInfo,
	pub device: DeviceInfo,
	/// Metadata tabs keyed by tab name.
	pub metadata: Mapping,
}

impl Event {
	pub fn new(exceptions: Vec<ExceptionRecord>) -> Self {
		Self {
			exceptions,
			breadcrumbs: Vec::new(),
			request: None,
			context: None,
			grouping_hash: None,
			unhandled: false,
			severity: Severity::default(),
			severity_reason: None,
			user: None,
			app: AppInfo::default(),
			device: DeviceInfo::current(),
			metadata: Mapping::new(),
		}
	}

	/// Sets a single entry in a metadata tab, creating the tab if needed.
	pub fn add_metadata(&self, tab: &str, key: impl Into<String>, value: impl Into<Value>) {
		let section = match self.metadata.get(tab).and_then(|p| p.read().ok()) {
			Some(Value::Mapping(section)) => section,
			_ => {
				let section = Mapping::new();
				self.metadata.insert(tab, section.clone());
				section
			}
		};
		section.insert(key, value);
	}

	/// Replaces a whole metadata tab.
	pub fn set_metadata_tab(&self, tab: impl Into<String>, value: impl Into<Value>) {
		self.metadata.insert(tab, value);
	}

	pub fn clear_metadata(&self, tab: &str) {
		self.metadata.remove(tab);
	}
}

/// Input for [`NotifyClient::notify_event`](crate::NotifyClient::notify_event).
#[derive(Debug, Clone, Default)]
pub struct PartialEvent {
	pub exceptions: Vec<ExceptionRecord>,
	pub unhandled: Option<bool>,
	pub severity: Option<Severity>,
	pub severity_reason: Option<SeverityReason>,
	pub metadata: Option<Mapping>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryBreadcrumb {
	pub timestamp: String,
	pub name: String,
	#[serde(rename = "type")]
	pub kind: BreadcrumbType,
	#[serde(rename = "metaData", skip_serializing_if = "Option::is_none")]
	pub metadata: Option<SafeValue>,
}

/// Finalized event ready for encoding.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryEvent {
	pub exceptions: Vec<ExceptionRecord>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub breadcrumbs: Vec<DeliveryBreadcrumb>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub request: Option<SafeValue>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub context: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub grouping_hash: Option<String>,
	pub unhandled: bool,
	pub severity: Severity,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub severity_reason: Option<SeverityReason>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub user: Option<User>,
	pub app: AppInfo,
	pub device: DeviceInfo,
	#[serde(rename = "metaData")]
	pub metadata: SafeValue,
}

impl DeliveryEvent {
	/// Redacts denylisted keys in the request, the metadata and every
	/// breadcrumb's metadata.
	pub fn redact(&mut self, denylist: &Denylist) {
		if let Some(request) = &mut self.request {
			redact_in_place(request, denylist);
		}
		redact_in_place(&mut self.metadata, denylist);
		for breadcrumb in &mut self.breadcrumbs {
			if let Some(metadata) = &mut breadcrumb.metadata {
				redact_in_place(metadata, denylist);
			}
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notifier {
	pub name: String,
	pub version: String,
	pub url: String,
}

impl Default for Notifier {
	fn default() -> Self {
		Self {
			name: NOTIFIER_NAME.to_string(),
			version: NOTIFIER_VERSION.to_string(),
			url: "https://github.com/ghuntley/loom".to_string(),
		}
	}
}

/// Top-level request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
	pub api_key: String,
	pub payload_version: String,
	pub notifier: Notifier,
	pub events: Vec<DeliveryEvent>,
}

impl Payload {
	pub fn new(api_key: impl Into<String>, event: DeliveryEvent) -> Self {
		Self {
			api_key: api_key.into(),
			payload_version: PAYLOAD_VERSION.to_string(),
			notifier: Notifier::default(),
			events: vec![event],
		}
	}
}

/// RFC 3339 timestamp with millisecond precision.
pub fn timestamp(at: DateTime<Utc>) -> String {
	at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use serde_json::json;

	#[test]
	fn test_default_severity_is_warning() {
		assert_eq!(Severity::default(), Severity::Warning);
		assert_eq!(Event::new(Vec::new()).severity, Severity::Warning);
	}

	#[test]
	fn test_unknown_names_are_rejected() {
		assert!(matches!(
			"fatal".parse::<Severity>(),
			Err(NotifyError::InvalidSeverity(_))
		));
		assert!(matches!(
			"ui".parse::<BreadcrumbType>(),
			Err(NotifyError::InvalidBreadcrumbType(_))
		));
	}

	#[test]
	fn test_add_metadata_creates_and_extends_tabs() {
		let event = Event::new(Vec::new());
		event.add_metadata("order", "id", 42);
		event.add_metadata("order", "total", "9.99");
		let out = loom_notify_core::serialize(
			&Value::from(event.metadata.clone()),
			None,
			loom_notify_core::Limits::default(),
		);
		assert_eq!(out.to_json().unwrap(), json!({"order": {"id": 42, "total": "9.99"}}));

		event.clear_metadata("order");
		assert!(event.metadata.is_empty());
	}

	#[test]
	fn test_delivery_event_wire_names() {
		let event = DeliveryEvent {
			exceptions: vec![ExceptionRecord::new("CheckoutError", "Failed checkout")],
			breadcrumbs: vec![DeliveryBreadcrumb {
				timestamp: "2025-01-01T00:00:00.000Z".to_string(),
				name: "Client loaded".to_string(),
				kind: BreadcrumbType::State,
				metadata: Some(SafeValue::from(json!({}))),
			}],
			request: None,
			context: None,
			grouping_hash: Some("checkout".to_string()),
			unhandled: false,
			severity: Severity::Error,
			severity_reason: Some(SeverityReason::new(SeverityReasonType::HandledException)),
			user: None,
			app: AppInfo {
				release_stage: Some("production".to_string()),
				version: None,
				kind: Some("rust".to_string()),
				duration: None,
			},
			device: DeviceInfo::default(),
			metadata: SafeValue::from(json!({"tab": {"k": "v"}})),
		};
		let encoded = serde_json::to_value(&event).unwrap();
		assert_eq!(
			encoded,
			json!({
				"exceptions": [{
					"errorClass": "CheckoutError",
					"message": "Failed checkout",
					"stacktrace": [],
					"type": "rust",
				}],
				"breadcrumbs": [{
					"timestamp": "2025-01-01T00:00:00.000Z",
					"name": "Client loaded",
					"type": "state",
					"metaData": {},
				}],
				"groupingHash": "checkout",
				"unhandled": false,
				"severity": "error",
				"severityReason": {"type": "handledException"},
				"app": {"releaseStage": "production", "type": "rust"},
				"device": {},
				"metaData": {"tab": {"k": "v"}},
			})
		);
	}

	#[test]
	fn test_payload_header_fields() {
		let event = DeliveryEvent {
			exceptions: Vec::new(),
			breadcrumbs: Vec::new(),
			request: None,
			context: None,
			grouping_hash: None,
			unhandled: true,
			severity: Severity::Error,
			severity_reason: None,
			user: Some(User {
				id: Some("u1".to_string()),
				..Default::default()
			}),
			app: AppInfo::default(),
			device: DeviceInfo::default(),
			metadata: SafeValue::mapping(Vec::<(String, SafeValue)>::new()),
		};
		let encoded = serde_json::to_value(Payload::new("key", event)).unwrap();
		assert_eq!(encoded["apiKey"], "key");
		assert_eq!(encoded["payloadVersion"], "5");
		assert_eq!(encoded["notifier"]["name"], NOTIFIER_NAME);
		assert_eq!(encoded["events"][0]["user"], json!({"id": "u1"}));
	}

	#[test]
	fn test_timestamp_has_millisecond_precision() {
		let at = DateTime::parse_from_rfc3339("2025-03-04T05:06:07.123456Z")
			.unwrap()
			.with_timezone(&Utc);
		assert_eq!(timestamp(at), "2025-03-04T05:06:07.123Z");
	}

	proptest! {
		#[test]
		fn severity_roundtrip(severity in prop_oneof![
			Just(Severity::Error),
			Just(Severity::Warning),
			Just(Severity::Info),
		]) {
			let parsed: Severity = severity.to_string().parse().unwrap();
			prop_assert_eq!(severity, parsed);
		}

		#[test]
		fn breadcrumb_type_roundtrip(kind in prop_oneof![
			Just(BreadcrumbType::Navigation),
			Just(BreadcrumbType::Request),
			Just(BreadcrumbType::Process),
			Just(BreadcrumbType::Log),
			Just(BreadcrumbType::User),
			Just(BreadcrumbType::State),
			Just(BreadcrumbType::Error),
			Just(BreadcrumbType::Manual),
		]) {
			let parsed: BreadcrumbType = kind.to_string().parse().unwrap();
			prop_assert_eq!(kind, parsed);
		}
	}
}
