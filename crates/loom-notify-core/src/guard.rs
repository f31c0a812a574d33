// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Guarded member access.
//!
//! Every read the traversal performs on caller-owned data (getters, key
//! enumeration, custom serialization hooks, textual conversions) goes through
//! [`guard`]. A read that returns an [`AccessFault`] or panics is turned into
//! [`AccessError`] so that one hostile member cannot halt the walk.

use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;
use tracing::trace;

use crate::value::{Sentinel, Value};

/// Failure reported by a getter, hook or inspected host object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct AccessFault(pub String);

impl AccessFault {
	pub fn new(message: impl Into<String>) -> Self {
		Self(message.into())
	}
}

/// Marker returned by [`guard`] when the guarded read failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("property access failed")]
pub struct AccessError;

/// Runs `thunk`, converting a returned fault or a panic into [`AccessError`].
///
/// # Example
///
/// ```
/// use loom_notify_core::{guard, AccessError, AccessFault};
///
/// assert_eq!(guard(|| Ok::<_, AccessFault>(42)), Ok(42));
/// assert_eq!(guard(|| Err::<u8, _>(AccessFault::new("kaboom"))), Err(AccessError));
/// ```
pub fn guard<T, F>(thunk: F) -> Result<T, AccessError>
where
	F: FnOnce() -> Result<T, AccessFault>,
{
	match panic::catch_unwind(AssertUnwindSafe(thunk)) {
		Ok(Ok(value)) => Ok(value),
		Ok(Err(fault)) => {
			trace!(error = %fault, "guarded access failed");
			Err(AccessError)
		}
		Err(_) => {
			trace!("guarded access panicked");
			Err(AccessError)
		}
	}
}

/// Like [`guard`], but yields the [`Sentinel::AccessError`] value on failure.
pub fn guard_value<F>(thunk: F) -> Value
where
	F: FnOnce() -> Result<Value, AccessFault>,
{
	guard(thunk).unwrap_or(Value::Sentinel(Sentinel::AccessError))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_guard_passes_success_through() {
		assert_eq!(guard(|| Ok::<_, AccessFault>("ok")), Ok("ok"));
	}

	#[test]
	fn test_guard_converts_fault() {
		let result: Result<u32, AccessError> = guard(|| Err(AccessFault::new("denied")));
		assert_eq!(result, Err(AccessError));
	}

	#[test]
	fn test_guard_converts_panic() {
		let result: Result<u32, AccessError> = guard(|| panic!("getter exploded"));
		assert_eq!(result, Err(AccessError));
	}

	#[test]
	fn test_guard_value_yields_sentinel() {
		let value = guard_value(|| Err(AccessFault::new("nope")));
		assert!(matches!(value, Value::Sentinel(Sentinel::AccessError)));

		let value = guard_value(|| Ok(Value::from("fine")));
		assert!(matches!(value, Value::Text(ref s) if s == "fine"));
	}
}
