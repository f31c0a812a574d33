// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client configuration.
//!
//! Sources are layered in order: built-in defaults, an optional TOML file,
//! then `LOOM_NOTIFY_*` environment variables. Later layers override earlier
//! ones field by field.

use std::path::Path;
use std::time::Duration;

use loom_notify_core::Limits;
use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;

/// Prefix of the environment variables read by [`NotifyConfig::from_env`].
pub const ENV_PREFIX: &str = "LOOM_NOTIFY_";

/// Default traversal depth bound for event metadata.
pub const DEFAULT_DEPTH_LIMIT: i64 = 20;
/// Default per-container member bound for event metadata.
pub const DEFAULT_EDGES_LIMIT: i64 = 500;
/// Default number of breadcrumbs kept.
pub const DEFAULT_MAX_BREADCRUMBS: usize = 25;

/// Configuration layer. Every field is optional so layers can be merged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotifyConfig {
	pub api_key: Option<String>,
	pub endpoint: Option<String>,
	pub app_version: Option<String>,
	pub app_type: Option<String>,
	pub release_stage: Option<String>,
	pub enabled_release_stages: Option<Vec<String>>,
	pub max_breadcrumbs: Option<usize>,
	pub redact_keys: Option<Vec<String>>,
	pub stringify_values: Option<bool>,
	/// Leave an `error` breadcrumb after each reported event.
	pub error_breadcrumbs: Option<bool>,
	pub depth_limit: Option<i64>,
	pub edges_limit: Option<i64>,
	pub request_timeout_secs: Option<u64>,
}

impl NotifyConfig {
	pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
		toml::from_str(content)
	}

	pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path)?;
		Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParse {
			path: path.to_path_buf(),
			source,
		})
	}

	/// Reads overrides from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_env_vars(|name| std::env::var(name).ok())
	}

	/// Reads overrides through `lookup`, which maps a variable name to its
	/// value.
	pub fn from_env_vars<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let var = |field: &str| lookup(&format!("{ENV_PREFIX}{field}")).filter(|v| !v.is_empty());
		let list = |field: &str| {
			var(field).map(|v| {
				v.split(',')
					.map(str::trim)
					.filter(|s| !s.is_empty())
					.map(String::from)
					.collect::<Vec<_>>()
			})
		};

		Ok(Self {
			api_key: var("API_KEY"),
			endpoint: var("ENDPOINT"),
			app_version: var("APP_VERSION"),
			app_type: var("APP_TYPE"),
			release_stage: var("RELEASE_STAGE"),
			enabled_release_stages: list("ENABLED_RELEASE_STAGES"),
			max_breadcrumbs: parse_var(var("MAX_BREADCRUMBS"), "max_breadcrumbs")?,
			redact_keys: list("REDACT_KEYS"),
			stringify_values: parse_bool(var("STRINGIFY_VALUES"), "stringify_values")?,
			error_breadcrumbs: parse_bool(var("ERROR_BREADCRUMBS"), "error_breadcrumbs")?,
			depth_limit: parse_var(var("DEPTH_LIMIT"), "depth_limit")?,
			edges_limit: parse_var(var("EDGES_LIMIT"), "edges_limit")?,
			request_timeout_secs: parse_var(var("REQUEST_TIMEOUT_SECS"), "request_timeout_secs")?,
		})
	}

	/// Overlays `other` on top of `self`.
	pub fn merge(self, other: NotifyConfig) -> NotifyConfig {
		NotifyConfig {
			api_key: other.api_key.or(self.api_key),
			endpoint: other.endpoint.or(self.endpoint),
			app_version: other.app_version.or(self.app_version),
			app_type: other.app_type.or(self.app_type),
			release_stage: other.release_stage.or(self.release_stage),
			enabled_release_stages: other.enabled_release_stages.or(self.enabled_release_stages),
			max_breadcrumbs: other.max_breadcrumbs.or(self.max_breadcrumbs),
			redact_keys: other.redact_keys.or(self.redact_keys),
			stringify_values: other.stringify_values.or(self.stringify_values),
			error_breadcrumbs: other.error_breadcrumbs.or(self.error_breadcrumbs),
			depth_limit: other.depth_limit.or(self.depth_limit),
			edges_limit: other.edges_limit.or(self.edges_limit),
			request_timeout_secs: other.request_timeout_secs.or(self.request_timeout_secs),
		}
	}

	/// Loads defaults, then `path` if given, then the environment, and
	/// validates the result.
	pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
		let mut config = Self::defaults();
		if let Some(path) = path {
			debug!(path = %path.display(), "Loading notify config file");
			config = config.merge(Self::from_file(path)?);
		}
		config = config.merge(Self::from_env()?);
		config.validate()?;
		Ok(config)
	}

	pub fn defaults() -> Self {
		Self {
			max_breadcrumbs: Some(DEFAULT_MAX_BREADCRUMBS),
			stringify_values: Some(true),
			depth_limit: Some(DEFAULT_DEPTH_LIMIT),
			edges_limit: Some(DEFAULT_EDGES_LIMIT),
			..Self::default()
		}
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		self.limits()?;
		if let Some(endpoint) = &self.endpoint {
			if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
				return Err(ConfigError::invalid_value(
					"endpoint",
					"must be an http:// or https:// URL",
				));
			}
		}
		if self.request_timeout_secs == Some(0) {
			return Err(ConfigError::invalid_value(
				"request_timeout_secs",
				"must be greater than zero",
			));
		}
		if self.api_key.as_deref().is_some_and(str::is_empty) {
			return Err(ConfigError::validation("api_key must not be empty"));
		}
		Ok(())
	}

	/// Traversal limits, rejecting negative values.
	pub fn limits(&self) -> Result<Limits, ConfigError> {
		Limits::try_from_signed(self.depth_limit, self.edges_limit)
			.map_err(|e| ConfigError::invalid_value("limits", e.to_string()))
	}

	pub fn request_timeout(&self) -> Option<Duration> {
		self.request_timeout_secs.map(Duration::from_secs)
	}
}

fn parse_var<T: std::str::FromStr>(
	value: Option<String>,
	field: &str,
) -> Result<Option<T>, ConfigError> {
	value
		.map(|v| {
			v.trim()
				.parse()
				.map_err(|_| ConfigError::invalid_value(field, format!("cannot parse {v:?}")))
		})
		.transpose()
}

fn parse_bool(value: Option<String>, field: &str) -> Result<Option<bool>, ConfigError> {
	value
		.map(|v| match v.trim().to_ascii_lowercase().as_str() {
			"1" | "true" | "yes" | "on" => Ok(true),
			"0" | "false" | "no" | "off" => Ok(false),
			_ => Err(ConfigError::invalid_value(field, format!("expected a boolean, got {v:?}"))),
		})
		.transpose()
}
