// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cap on the number of events sent.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::client::OnError;
use crate::event::Event;

/// Lets at most `limit` events through until [`reset`](Self::reset).
///
/// Register [`callback`](Self::callback) as an on-error callback.
#[derive(Debug, Clone)]
pub struct EventLimiter {
	limit: usize,
	count: Arc<AtomicUsize>,
}

impl EventLimiter {
	pub fn new(limit: usize) -> Self {
		Self {
			limit,
			count: Arc::new(AtomicUsize::new(0)),
		}
	}

	pub fn limit(&self) -> usize {
		self.limit
	}

	/// Number of events let through since the last reset.
	pub fn count(&self) -> usize {
		self.count.load(Ordering::SeqCst)
	}

	pub fn reset(&self) {
		self.count.store(0, Ordering::SeqCst);
	}

	/// Takes a slot if one is free.
	pub fn try_acquire(&self) -> bool {
		let limit = self.limit;
		let acquired = self
			.count
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < limit).then_some(n + 1))
			.is_ok();
		if !acquired {
			debug!(limit, "Event limit reached, dropping event");
		}
		acquired
	}

	pub fn callback(&self) -> OnError {
		let limiter = self.clone();
		Arc::new(move |_event: &mut Event| limiter.try_acquire())
	}
}
