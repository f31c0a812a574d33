// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the serialization core.
//!
//! The traversal itself never fails. These errors only surface when a caller
//! builds values or limits from invalid input.

use thiserror::Error;

/// Errors raised while constructing values or limits.
#[derive(Debug, Error)]
pub enum CoreError {
	#[error("{name} limit must not be negative, got {value}")]
	NegativeLimit { name: &'static str, value: i64 },

	#[error("invalid integer literal: {0:?}")]
	InvalidBigInt(String),

	#[error("invalid pattern: {0}")]
	InvalidPattern(#[from] regex::Error),
}

/// Result type for core construction operations.
pub type Result<T> = std::result::Result<T, CoreError>;
