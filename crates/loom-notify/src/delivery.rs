// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Transport of encoded payloads to the notify endpoint.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::debug;

use crate::error::{NotifyError, Result};
use crate::event::{timestamp, PAYLOAD_VERSION};

/// Default notify endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://notify.bugsnag.com/";
/// Default timeout for delivery requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("loom-notify/", env!("CARGO_PKG_VERSION"));

/// An encoded payload ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
	pub api_key: String,
	/// JSON-encoded [`Payload`](crate::event::Payload).
	pub body: Vec<u8>,
}

/// Sends encoded payloads somewhere.
#[async_trait]
pub trait Delivery: Send + Sync {
	async fn send(&self, request: DeliveryRequest) -> Result<()>;
}

/// Delivers payloads with an HTTP POST.
#[derive(Debug, Clone)]
pub struct HttpDelivery {
	endpoint: String,
	http_client: Client,
}

impl HttpDelivery {
	pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
		let http_client = Client::builder()
			.timeout(timeout)
			.user_agent(USER_AGENT)
			.build()
			.map_err(NotifyError::RequestFailed)?;
		Ok(Self {
			endpoint: endpoint.into(),
			http_client,
		})
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}
}

#[async_trait]
impl Delivery for HttpDelivery {
	async fn send(&self, request: DeliveryRequest) -> Result<()> {
		debug!(endpoint = %self.endpoint, bytes = request.body.len(), "Sending event");

		let response = self
			.http_client
			.post(&self.endpoint)
			.header("Content-Type", "application/json")
			.header("Bugsnag-Api-Key", &request.api_key)
			.header("Bugsnag-Payload-Version", PAYLOAD_VERSION)
			.header("Bugsnag-Sent-At", timestamp(Utc::now()))
			.body(request.body)
			.send()
			.await?;

		if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
			let retry_after = response
				.headers()
				.get("Retry-After")
				.and_then(|v| v.to_str().ok())
				.and_then(|s| s.parse().ok());
			return Err(NotifyError::RateLimited {
				retry_after_secs: retry_after,
			});
		}

		if !response.status().is_success() {
			let status = response.status().as_u16();
			let message = response.text().await.unwrap_or_default();
			return Err(NotifyError::ServerError { status, message });
		}

		debug!("Event delivered");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use wiremock::matchers::{body_string, header, header_exists, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn request(body: &str) -> DeliveryRequest {
		DeliveryRequest {
			api_key: "0123456789abcdef".to_string(),
			body: body.as_bytes().to_vec(),
		}
	}

	#[tokio::test]
	async fn test_posts_payload_with_protocol_headers() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/"))
			.and(header("Content-Type", "application/json"))
			.and(header("Bugsnag-Api-Key", "0123456789abcdef"))
			.and(header("Bugsnag-Payload-Version", "5"))
			.and(header_exists("Bugsnag-Sent-At"))
			.and(header("User-Agent", USER_AGENT))
			.and(body_string(r#"{"events":[]}"#))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		let delivery = HttpDelivery::new(format!("{}/", server.uri()), DEFAULT_TIMEOUT).unwrap();
		delivery.send(request(r#"{"events":[]}"#)).await.unwrap();
	}

	#[tokio::test]
	async fn test_server_error_is_reported() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(400).set_body_string("bad payload"))
			.mount(&server)
			.await;

		let delivery = HttpDelivery::new(server.uri(), DEFAULT_TIMEOUT).unwrap();
		let result = delivery.send(request("{}")).await;
		assert!(matches!(
			result,
			Err(NotifyError::ServerError { status: 400, ref message }) if message == "bad payload"
		));
	}

	#[tokio::test]
	async fn test_rate_limit_is_reported() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "60"))
			.mount(&server)
			.await;

		let delivery = HttpDelivery::new(server.uri(), DEFAULT_TIMEOUT).unwrap();
		let result = delivery.send(request("{}")).await;
		assert!(matches!(
			result,
			Err(NotifyError::RateLimited {
				retry_after_secs: Some(60)
			})
		));
	}

	#[tokio::test]
	async fn test_unreachable_endpoint_is_request_failure() {
		let delivery =
			HttpDelivery::new("http://127.0.0.1:9/", Duration::from_millis(500)).unwrap();
		let result = delivery.send(request("{}")).await;
		assert!(matches!(result, Err(NotifyError::RequestFailed(_))));
	}
}
