// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error reporting client for Rust applications.
//!
//! Converts errors into events, attaches breadcrumbs, user and metadata, makes
//! every dynamic part safe to encode with [`loom_notify_core`], and delivers
//! the result to a notify endpoint.
//!
//! # Example
//!
//! ```ignore
//! use loom_notify::{Notifiable, NotifyClient, NotifyConfig, NotifyOptions};
//!
//! let config = NotifyConfig::load(None)?;
//! let client = NotifyClient::builder().from_config(config)?.build()?;
//!
//! client.leave_breadcrumb("Loaded cart", None, None).await;
//! client.notify(Notifiable::error(&err), NotifyOptions::new()).await?;
//! ```

pub mod backtrace;
pub mod breadcrumbs;
pub mod client;
pub mod config;
pub mod delivery;
pub mod duration;
pub mod error;
pub mod event;
pub mod exception;
pub mod limit;

pub use breadcrumbs::error_breadcrumb;
pub use client::{
	CallbackId, NotifyClient, NotifyClientBuilder, NotifyOptions, OnError, OnPostError,
	MAX_PAYLOAD_BYTES,
};
pub use config::NotifyConfig;
pub use delivery::{Delivery, DeliveryRequest, HttpDelivery, DEFAULT_ENDPOINT};
pub use duration::AppDuration;
pub use error::{ConfigError, NotifyError, Result};
pub use event::{
	AppInfo, Breadcrumb, BreadcrumbType, DeliveryEvent, DeviceInfo, Event, ExceptionRecord,
	PartialEvent, Payload, RequestInfo, Severity, SeverityReason, SeverityReasonType, StackFrame,
	User,
};
pub use exception::{to_exceptions, Converted, Notifiable};
pub use limit::EventLimiter;

pub use loom_notify_core::{Limits, Mapping, SafeValue, Value};
