// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Notify client: builds events, runs callbacks, finalizes and delivers.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use loom_notify_core::{
	redact_value, serialize, stringify, Denylist, Limits, Mapping, SafeValue, Sentinel, Value,
};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::{NotifyConfig, DEFAULT_MAX_BREADCRUMBS};
use crate::delivery::{Delivery, DeliveryRequest, HttpDelivery, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT};
use crate::error::{NotifyError, Result};
use crate::event::{
	timestamp, AppInfo, Breadcrumb, BreadcrumbType, DeliveryBreadcrumb, DeliveryEvent, DeviceInfo,
	Event, PartialEvent, Payload, Severity, User,
};
use crate::breadcrumbs::error_breadcrumb;
use crate::exception::{to_exceptions, Converted, Notifiable};

/// Largest encoded payload the collector accepts.
pub const MAX_PAYLOAD_BYTES: usize = 1_000_000;

const DEFAULT_APP_TYPE: &str = "rust";
const DEFAULT_RELEASE_STAGE: &str = "production";

/// Callback run before delivery. Returning `false` cancels the event.
pub type OnError = Arc<dyn Fn(&mut Event) -> bool + Send + Sync>;
/// Callback run once an event has been accepted and encoded.
pub type OnPostError = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handle returned when registering a callback, used to remove it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// Per-call options for [`NotifyClient::notify`].
#[derive(Clone, Default)]
pub struct NotifyOptions {
	pub severity: Option<Severity>,
	/// Extra metadata tabs, merged over those derived from the error.
	pub metadata: Option<Mapping>,
	/// Runs after the registered on-error callbacks.
	pub on_error: Option<OnError>,
}

impl NotifyOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn severity(mut self, severity: Severity) -> Self {
		self.severity = Some(severity);
		self
	}

	pub fn metadata(mut self, metadata: Mapping) -> Self {
		self.metadata = Some(metadata);
		self
	}

	pub fn on_error<F>(mut self, callback: F) -> Self
	where
		F: Fn(&mut Event) -> bool + Send + Sync + 'static,
	{
		self.on_error = Some(Arc::new(callback));
		self
	}
}

impl std::fmt::Debug for NotifyOptions {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("NotifyOptions")
			.field("severity", &self.severity)
			.field("metadata", &self.metadata)
			.field("on_error", &self.on_error.is_some())
			.finish()
	}
}

/// Builder for constructing a NotifyClient.
pub struct NotifyClientBuilder {
	api_key: Option<String>,
	endpoint: String,
	app_version: Option<String>,
	app_type: String,
	release_stage: String,
	enabled_release_stages: Option<Vec<String>>,
	max_breadcrumbs: usize,
	user: Option<User>,
	redact_keys: Denylist,
	stringify_values: bool,
	error_breadcrumbs: bool,
	limits: Limits,
	request_timeout: Duration,
	delivery: Option<Arc<dyn Delivery>>,
	on_error: Vec<OnError>,
}

impl NotifyClientBuilder {
	/// Creates a new builder with default settings.
	pub fn new() -> Self {
		Self {
			api_key: None,
			endpoint: DEFAULT_ENDPOINT.to_string(),
			app_version: None,
			app_type: DEFAULT_APP_TYPE.to_string(),
			release_stage: DEFAULT_RELEASE_STAGE.to_string(),
			enabled_release_stages: None,
			max_breadcrumbs: DEFAULT_MAX_BREADCRUMBS,
			user: None,
			redact_keys: Denylist::new(),
			stringify_values: true,
			error_breadcrumbs: false,
			limits: Limits::new(20, 500),
			request_timeout: DEFAULT_TIMEOUT,
			delivery: None,
			on_error: Vec::new(),
		}
	}

	/// Applies a loaded configuration. Fields the configuration leaves unset
	/// keep their current value.
	pub fn from_config(mut self, config: NotifyConfig) -> Result<Self> {
		config.validate()?;
		let limits = config.limits()?;
		let request_timeout = config.request_timeout();
		if let Some(api_key) = config.api_key {
			self.api_key = Some(api_key);
		}
		if let Some(endpoint) = config.endpoint {
			self.endpoint = endpoint;
		}
		if let Some(version) = config.app_version {
			self.app_version = Some(version);
		}
		if let Some(app_type) = config.app_type {
			self.app_type = app_type;
		}
		if let Some(stage) = config.release_stage {
			self.release_stage = stage;
		}
		if let Some(stages) = config.enabled_release_stages {
			self.enabled_release_stages = Some(stages);
		}
		if let Some(max) = config.max_breadcrumbs {
			self.max_breadcrumbs = max;
		}
		if let Some(keys) = config.redact_keys {
			self.redact_keys.extend(keys);
		}
		if let Some(stringify_values) = config.stringify_values {
			self.stringify_values = stringify_values;
		}
		if let Some(error_breadcrumbs) = config.error_breadcrumbs {
			self.error_breadcrumbs = error_breadcrumbs;
		}
		if let Some(depth) = limits.depth {
			self.limits.depth = Some(depth);
		}
		if let Some(edges) = limits.edges {
			self.limits.edges = Some(edges);
		}
		if let Some(timeout) = request_timeout {
			self.request_timeout = timeout;
		}
		Ok(self)
	}

	pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
		self.api_key = Some(api_key.into());
		self
	}

	/// Sets the notify endpoint used by the default HTTP delivery.
	pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.endpoint = endpoint.into();
		self
	}

	pub fn app_version(mut self, version: impl Into<String>) -> Self {
		self.app_version = Some(version.into());
		self
	}

	pub fn app_type(mut self, app_type: impl Into<String>) -> Self {
		self.app_type = app_type.into();
		self
	}

	/// Sets the release stage.
	///
	/// Example: `production`, `staging`, `development`
	pub fn release_stage(mut self, stage: impl Into<String>) -> Self {
		self.release_stage = stage.into();
		self
	}

	/// Only report events when the release stage is one of `stages`.
	pub fn enabled_release_stages<I, S>(mut self, stages: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.enabled_release_stages = Some(stages.into_iter().map(Into::into).collect());
		self
	}

	pub fn max_breadcrumbs(mut self, max: usize) -> Self {
		self.max_breadcrumbs = max;
		self
	}

	pub fn user(mut self, user: User) -> Self {
		self.user = Some(user);
		self
	}

	/// Adds keys whose values are replaced with `[REDACTED]` before delivery.
	pub fn redact_keys<I, S>(mut self, keys: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.redact_keys.extend(keys);
		self
	}

	/// Enables or disables coercion of non-JSON values in metadata.
	pub fn stringify_values(mut self, enabled: bool) -> Self {
		self.stringify_values = enabled;
		self
	}

	/// Leave an `error` breadcrumb after each reported event.
	pub fn error_breadcrumbs(mut self, enabled: bool) -> Self {
		self.error_breadcrumbs = enabled;
		self
	}

	pub fn limits(mut self, limits: Limits) -> Self {
		self.limits = limits;
		self
	}

	/// Sets the HTTP request timeout of the default delivery.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}

	/// Replaces the default HTTP delivery.
	pub fn delivery(mut self, delivery: impl Delivery + 'static) -> Self {
		self.delivery = Some(Arc::new(delivery));
		self
	}

	/// Registers an on-error callback at construction time.
	pub fn on_error(mut self, callback: OnError) -> Self {
		self.on_error.push(callback);
		self
	}

	/// Builds the NotifyClient.
	pub fn build(self) -> Result<NotifyClient> {
		let api_key = self
			.api_key
			.filter(|k| !k.is_empty())
			.ok_or(NotifyError::MissingApiKey)?;

		let delivery: Arc<dyn Delivery> = match self.delivery {
			Some(delivery) => delivery,
			None => Arc::new(HttpDelivery::new(self.endpoint.clone(), self.request_timeout)?),
		};

		let next_callback_id = AtomicU64::new(0);
		let on_error = self
			.on_error
			.into_iter()
			.map(|callback| (CallbackId(next_callback_id.fetch_add(1, Ordering::SeqCst)), callback))
			.collect();

		let loaded =
			Breadcrumb::new("Client loaded", BreadcrumbType::State).with_metadata(Mapping::new());

		let inner = Arc::new(NotifyClientInner {
			api_key,
			app_version: self.app_version,
			app_type: self.app_type,
			release_stage: self.release_stage,
			enabled_release_stages: self.enabled_release_stages,
			max_breadcrumbs: self.max_breadcrumbs,
			redact_keys: self.redact_keys,
			stringify_values: self.stringify_values,
			error_breadcrumbs: self.error_breadcrumbs,
			limits: self.limits,
			delivery,
			user: RwLock::new(self.user),
			breadcrumbs: RwLock::new(vec![loaded]),
			on_error: RwLock::new(on_error),
			on_post_error: RwLock::new(Vec::new()),
			next_callback_id,
		});

		info!(
			endpoint = %self.endpoint,
			release_stage = %inner.release_stage,
			"Notify client initialized"
		);

		Ok(NotifyClient { inner })
	}
}

impl Default for NotifyClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

struct NotifyClientInner {
	api_key: String,
	app_version: Option<String>,
	app_type: String,
	release_stage: String,
	enabled_release_stages: Option<Vec<String>>,
	max_breadcrumbs: usize,
	redact_keys: Denylist,
	stringify_values: bool,
	error_breadcrumbs: bool,
	limits: Limits,
	delivery: Arc<dyn Delivery>,
	user: RwLock<Option<User>>,
	breadcrumbs: RwLock<Vec<Breadcrumb>>,
	on_error: RwLock<Vec<(CallbackId, OnError)>>,
	on_post_error: RwLock<Vec<(CallbackId, OnPostError)>>,
	next_callback_id: AtomicU64,
}

/// Client for reporting errors to a notify endpoint.
///
/// # Example
///
/// ```ignore
/// use loom_notify::{Notifiable, NotifyClient, NotifyOptions, Severity};
///
/// let client = NotifyClient::builder()
///     .api_key("your_api_key")
///     .app_version(env!("CARGO_PKG_VERSION"))
///     .redact_keys(["password"])
///     .build()?;
///
/// client.leave_breadcrumb("Checkout started", None, None).await;
///
/// if let Err(e) = checkout() {
///     client
///         .notify(Notifiable::error(&e), NotifyOptions::new().severity(Severity::Error))
///         .await?;
/// }
/// ```
#[derive(Clone)]
pub struct NotifyClient {
	inner: Arc<NotifyClientInner>,
}

impl NotifyClient {
	/// Creates a new builder for constructing a NotifyClient.
	pub fn builder() -> NotifyClientBuilder {
		NotifyClientBuilder::new()
	}

	/// Reports an error.
	///
	/// The error is converted before the returned future is first polled, so
	/// the future does not borrow it.
	pub fn notify(
		&self,
		error: Notifiable<'_>,
		options: NotifyOptions,
	) -> impl Future<Output = Result<()>> + Send + 'static {
		let Converted {
			exceptions,
			metadata,
		} = to_exceptions(error, "notify");

		let metadata = match (metadata, options.metadata) {
			(Some(derived), Some(extra)) => {
				merge_tabs(&derived, &extra);
				Some(derived)
			}
			(derived, extra) => extra.or(derived),
		};

		let partial = PartialEvent {
			exceptions,
			unhandled: None,
			severity: options.severity,
			severity_reason: None,
			metadata,
		};
		let client = self.clone();
		let on_error = options.on_error;
		async move { client.process(partial, on_error).await }
	}

	/// Reports a pre-built event. Used by integrations that set `unhandled`
	/// or a severity reason.
	pub async fn notify_event(&self, event: PartialEvent) -> Result<()> {
		self.process(event, None).await
	}

	/// Records a breadcrumb. Empty messages are ignored.
	pub async fn leave_breadcrumb(
		&self,
		message: impl Into<String>,
		metadata: Option<Value>,
		kind: Option<BreadcrumbType>,
	) {
		let message = message.into();
		if message.is_empty() {
			return;
		}

		let mut breadcrumb = Breadcrumb::new(message, kind.unwrap_or_default());
		breadcrumb.metadata = metadata;
		self.push_breadcrumb(breadcrumb).await;
	}

	/// Appends `breadcrumb`, keeping the most recent `max_breadcrumbs`.
	async fn push_breadcrumb(&self, breadcrumb: Breadcrumb) {
		let mut breadcrumbs = self.inner.breadcrumbs.write().await;
		breadcrumbs.push(breadcrumb);
		let excess = breadcrumbs.len().saturating_sub(self.inner.max_breadcrumbs);
		breadcrumbs.drain(..excess);
	}

	pub async fn breadcrumbs(&self) -> Vec<Breadcrumb> {
		self.inner.breadcrumbs.read().await.clone()
	}

	pub async fn clear_breadcrumbs(&self) {
		self.inner.breadcrumbs.write().await.clear();
	}

	pub async fn set_user(&self, user: User) {
		*self.inner.user.write().await = Some(user);
	}

	/// Current user, empty when none was set.
	pub async fn user(&self) -> User {
		self.inner.user.read().await.clone().unwrap_or_default()
	}

	pub async fn clear_user(&self) {
		*self.inner.user.write().await = None;
	}

	pub async fn add_on_error(&self, callback: OnError) -> CallbackId {
		let id = self.next_callback_id();
		self.inner.on_error.write().await.push((id, callback));
		id
	}

	/// Returns whether a callback was removed.
	pub async fn remove_on_error(&self, id: CallbackId) -> bool {
		let mut callbacks = self.inner.on_error.write().await;
		let before = callbacks.len();
		callbacks.retain(|(existing, _)| *existing != id);
		callbacks.len() != before
	}

	pub async fn add_on_post_error(&self, callback: OnPostError) -> CallbackId {
		let id = self.next_callback_id();
		self.inner.on_post_error.write().await.push((id, callback));
		id
	}

	pub async fn remove_on_post_error(&self, id: CallbackId) -> bool {
		let mut callbacks = self.inner.on_post_error.write().await;
		let before = callbacks.len();
		callbacks.retain(|(existing, _)| *existing != id);
		callbacks.len() != before
	}

	/// Applies the configured denylist to a finalized event.
	pub fn redact_event(&self, event: &mut DeliveryEvent) {
		event.redact(&self.inner.redact_keys);
	}

	/// Serializes `value` with the configured denylist and limits applied.
	pub fn redact_object(&self, value: &Value) -> SafeValue {
		redact_value(value, &self.inner.redact_keys, self.inner.limits)
	}

	fn next_callback_id(&self) -> CallbackId {
		CallbackId(self.inner.next_callback_id.fetch_add(1, Ordering::SeqCst))
	}

	fn release_stage_enabled(&self) -> bool {
		match &self.inner.enabled_release_stages {
			Some(stages) => stages.iter().any(|s| *s == self.inner.release_stage),
			None => true,
		}
	}

	async fn process(&self, partial: PartialEvent, on_error: Option<OnError>) -> Result<()> {
		if !self.release_stage_enabled() {
			debug!(
				release_stage = %self.inner.release_stage,
				"Release stage not enabled, skipping event"
			);
			return Ok(());
		}

		let mut event = self.build_event(partial).await;

		let mut callbacks: Vec<OnError> = self
			.inner
			.on_error
			.read()
			.await
			.iter()
			.map(|(_, callback)| Arc::clone(callback))
			.collect();
		callbacks.extend(on_error);

		for callback in &callbacks {
			if !callback(&mut event) {
				debug!("Event cancelled by on-error callback");
				return Ok(());
			}
		}

		let delivery_event = self.finalize(&event);
		let body = self.encode(delivery_event)?;

		let post_callbacks: Vec<OnPostError> = self
			.inner
			.on_post_error
			.read()
			.await
			.iter()
			.map(|(_, callback)| Arc::clone(callback))
			.collect();
		for callback in &post_callbacks {
			callback(&event);
		}
		if self.inner.error_breadcrumbs {
			if let Some(breadcrumb) = error_breadcrumb(&event) {
				self.push_breadcrumb(breadcrumb).await;
			}
		}

		let request = DeliveryRequest {
			api_key: self.inner.api_key.clone(),
			body,
		};
		if let Err(e) = self.inner.delivery.send(request).await {
			error!(error = %e, "Failed to post report");
		}
		Ok(())
	}

	async fn build_event(&self, partial: PartialEvent) -> Event {
		let mut event = Event::new(partial.exceptions);
		event.breadcrumbs = self.inner.breadcrumbs.read().await.clone();
		event.unhandled = partial.unhandled.unwrap_or(false);
		event.severity = partial.severity.unwrap_or_default();
		event.severity_reason = partial.severity_reason;
		event.user = self.inner.user.read().await.clone();
		event.app = AppInfo {
			release_stage: Some(self.inner.release_stage.clone()),
			version: self.inner.app_version.clone(),
			kind: Some(self.inner.app_type.clone()),
			duration: None,
		};
		event.device = DeviceInfo::current();
		if let Some(metadata) = partial.metadata {
			event.metadata = metadata;
		}
		event
	}

	/// Serializes every dynamic part of the event, then redacts.
	fn finalize(&self, event: &Event) -> DeliveryEvent {
		let limits = self.inner.limits;
		let render = |value: &Value| {
			if self.inner.stringify_values {
				stringify(value, limits)
			} else {
				serialize(value, None, limits)
			}
		};

		let breadcrumbs = event
			.breadcrumbs
			.iter()
			.map(|breadcrumb| DeliveryBreadcrumb {
				timestamp: timestamp(breadcrumb.timestamp),
				name: breadcrumb.name.clone(),
				kind: breadcrumb.kind,
				metadata: breadcrumb.metadata.as_ref().map(&render),
			})
			.collect();

		let request = event
			.request
			.as_ref()
			.and_then(|request| serde_json::to_value(request).ok())
			.map(SafeValue::from);

		let mut delivery_event = DeliveryEvent {
			exceptions: event.exceptions.clone(),
			breadcrumbs,
			request,
			context: event.context.clone(),
			grouping_hash: event.grouping_hash.clone(),
			unhandled: event.unhandled,
			severity: event.severity,
			severity_reason: event.severity_reason.clone(),
			user: event.user.clone().filter(|u| !u.is_empty()),
			app: event.app.clone(),
			device: event.device.clone(),
			metadata: render(&Value::from(event.metadata.clone())),
		};
		delivery_event.redact(&self.inner.redact_keys);
		delivery_event
	}

	/// Encodes the payload, dropping metadata that cannot be encoded or that
	/// pushes the payload over [`MAX_PAYLOAD_BYTES`].
	fn encode(&self, event: DeliveryEvent) -> Result<Vec<u8>> {
		let mut payload = Payload::new(self.inner.api_key.clone(), event);

		let mut body = match serde_json::to_vec(&payload) {
			Ok(body) => body,
			Err(e) => {
				warn!(error = %e, "Unable to serialize metadata, removing it");
				replace_metadata(&mut payload, "Unable to serialize metadata");
				serde_json::to_vec(&payload)?
			}
		};

		if body.len() > MAX_PAYLOAD_BYTES {
			let size = body.len();
			warn!(size, max = MAX_PAYLOAD_BYTES, "Payload too large, removing metadata");
			replace_metadata(
				&mut payload,
				&format!(
					"Payload was {}Mb. Metadata removed.",
					size as f64 / MAX_PAYLOAD_BYTES as f64
				),
			);
			body = serde_json::to_vec(&payload)?;
			if body.len() > MAX_PAYLOAD_BYTES {
				return Err(NotifyError::PayloadTooLarge {
					size: body.len(),
					max: MAX_PAYLOAD_BYTES,
				});
			}
		}

		Ok(body)
	}
}

fn replace_metadata(payload: &mut Payload, notice: &str) {
	for event in &mut payload.events {
		event.metadata = SafeValue::mapping([("notifier", SafeValue::from(notice))]);
	}
}

/// Copies every tab of `extra` into `target`, replacing tabs of the same name.
fn merge_tabs(target: &Mapping, extra: &Mapping) {
	if let Ok(entries) = extra.entries() {
		for (tab, property) in entries {
			match property.read() {
				Ok(value) => target.insert(tab, value),
				Err(_) => target.insert(tab, Value::from(Sentinel::AccessError)),
			}
		}
	}
}
