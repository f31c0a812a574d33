// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Breadcrumbs the client leaves about its own reports.

use loom_notify_core::{Mapping, Value};

use crate::event::{Breadcrumb, BreadcrumbType, Event};

/// Breadcrumb recording that `event` was reported, named after its first
/// exception. `None` when the event has no exceptions.
pub fn error_breadcrumb(event: &Event) -> Option<Breadcrumb> {
	let first = event.exceptions.first()?;
	let metadata = Mapping::from_entries([
		("errorClass", Value::from(first.error_class.as_str())),
		("errorMessage", Value::from(first.message.as_str())),
		("severity", Value::from(event.severity.to_string())),
	]);
	Some(Breadcrumb::new(first.error_class.clone(), BreadcrumbType::Error).with_metadata(metadata))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::event::{ExceptionRecord, Severity};
	use loom_notify_core::{serialize, Limits};
	use serde_json::json;

	#[test]
	fn test_error_breadcrumb_describes_first_exception() {
		let mut event = Event::new(vec![
			ExceptionRecord::new("CheckoutError", "card declined"),
			ExceptionRecord::new("IoError", "timeout"),
		]);
		event.severity = Severity::Error;

		let breadcrumb = error_breadcrumb(&event).unwrap();
		assert_eq!(breadcrumb.name, "CheckoutError");
		assert_eq!(breadcrumb.kind, BreadcrumbType::Error);

		let metadata = serialize(&breadcrumb.metadata.unwrap(), None, Limits::default());
		assert_eq!(
			metadata.to_json().unwrap(),
			json!({"errorClass": "CheckoutError", "errorMessage": "card declined", "severity": "error"})
		);
	}

	#[test]
	fn test_no_breadcrumb_without_exceptions() {
		assert!(error_breadcrumb(&Event::new(Vec::new())).is_none());
	}
}
