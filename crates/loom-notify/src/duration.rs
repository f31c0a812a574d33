// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Time since application start, reported as `app.duration`.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::client::OnError;
use crate::event::Event;

/// Measures how long the application has been running.
///
/// Register [`callback`](Self::callback) as an on-error callback to stamp
/// every event with the elapsed milliseconds.
#[derive(Debug, Clone)]
pub struct AppDuration {
	started: Arc<Mutex<Instant>>,
}

impl AppDuration {
	/// Starts measuring now.
	pub fn new() -> Self {
		Self {
			started: Arc::new(Mutex::new(Instant::now())),
		}
	}

	pub fn elapsed(&self) -> Duration {
		self.started
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.elapsed()
	}

	/// Restarts the measurement from now.
	pub fn reset(&self) {
		*self.started.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
	}

	pub fn callback(&self) -> OnError {
		let duration = self.clone();
		Arc::new(move |event: &mut Event| {
			let millis = u64::try_from(duration.elapsed().as_millis()).unwrap_or(u64::MAX);
			event.app.duration = Some(millis);
			true
		})
	}
}

impl Default for AppDuration {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::thread::sleep;

	#[test]
	fn test_callback_sets_duration() {
		let duration = AppDuration::new();
		sleep(Duration::from_millis(20));

		let mut event = Event::new(Vec::new());
		assert!(duration.callback()(&mut event));
		assert!(event.app.duration.unwrap() >= 20);
	}

	#[test]
	fn test_reset_restarts_measurement() {
		let duration = AppDuration::new();
		sleep(Duration::from_millis(50));
		assert!(duration.elapsed() >= Duration::from_millis(50));

		duration.reset();
		assert!(duration.elapsed() < Duration::from_millis(50));
	}

	#[test]
	fn test_clones_share_start() {
		let duration = AppDuration::new();
		let clone = duration.clone();
		sleep(Duration::from_millis(20));
		clone.reset();
		assert!(duration.elapsed() < Duration::from_millis(20));
	}
}
