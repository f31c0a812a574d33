// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Safe serialization core for the Loom notifier.
//!
//! Turns an arbitrary, possibly hostile value graph into a finite, acyclic,
//! JSON-compatible tree that can be attached to an error report. It is used by
//! the `loom-notify` client before events are encoded and delivered.
//!
//! # Overview
//!
//! - [`value`]: the dynamic value graph (shared containers, getters, host
//!   objects behind [`Inspect`])
//! - [`guard`]: isolation of failing or panicking member reads
//! - [`filter`]: the cycle-safe, depth- and width-bounded traversal engine
//! - [`stringify`]: coercion of non-JSON values into JSON-friendly stand-ins
//! - [`redact`]: key-based redaction of sensitive members
//!
//! The traversal never fails. Problems in the input show up as sentinel
//! markers in the output: `"[Circular]"`, `"[Error]"` and `"[...]"`.

pub mod error;
pub mod filter;
pub mod guard;
pub mod redact;
pub mod safe;
pub mod stringify;
pub mod value;

pub use error::{CoreError, Result};
pub use filter::{serialize, Limits, Transform};
pub use guard::{guard, guard_value, AccessError, AccessFault};
pub use redact::{redact, redact_in_place, redact_value, Denylist, RedactKeys, REDACTED};
pub use safe::SafeValue;
pub use stringify::{coerce, stringify, Coercion};
pub use value::{
	short_type_name, Access, BigInt, Buffer, Callable, DistinctCollection, Exception, Getter, Inspect,
	KeyedCollection, Mapping, NodeId, Opaque, PathKey, Pattern, Property, Sentinel, Sequence,
	SerializeHook, Token, Value,
};
