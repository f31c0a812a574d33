// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the notify client.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for notify operations.
pub type Result<T> = std::result::Result<T, NotifyError>;

/// Errors that can occur in the notify client.
#[derive(Debug, Error)]
pub enum NotifyError {
	/// No API key was configured.
	#[error("API key is required")]
	MissingApiKey,

	/// HTTP request failed.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Server returned an error.
	#[error("server error (status {status}): {message}")]
	ServerError {
		/// HTTP status code.
		status: u16,
		/// Error message from server.
		message: String,
	},

	/// Rate limited by server.
	#[error("rate limited, retry after {retry_after_secs:?} seconds")]
	RateLimited {
		/// Optional retry-after header value.
		retry_after_secs: Option<u64>,
	},

	/// Failed to encode the payload.
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	/// Payload is over the size limit even with metadata removed.
	#[error("payload of {size} bytes exceeds the {max} byte limit")]
	PayloadTooLarge { size: usize, max: usize },

	/// Configuration could not be loaded or is invalid.
	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error("unknown severity: {0}")]
	InvalidSeverity(String),

	#[error("unknown breadcrumb type: {0}")]
	InvalidBreadcrumbType(String),
}

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// I/O error reading config file
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// TOML parsing error
	#[error("TOML parse error in {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	/// Validation error
	#[error("Validation error: {0}")]
	Validation(String),

	/// Missing required field
	#[error("Missing required field: {0}")]
	MissingField(String),

	/// Invalid value
	#[error("Invalid value for {field}: {message}")]
	InvalidValue { field: String, message: String },
}

impl ConfigError {
	pub fn validation(msg: impl Into<String>) -> Self {
		Self::Validation(msg.into())
	}

	pub fn missing_field(field: impl Into<String>) -> Self {
		Self::MissingField(field.into())
	}

	pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
		Self::InvalidValue {
			field: field.into(),
			message: message.into(),
		}
	}
}
