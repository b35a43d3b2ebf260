// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fixed-window request throttling.
//!
//! Each `(identifier, path)` pair owns an independent window of
//! `max_requests` tokens. The window opens on first sight and resets only
//! once a full window has elapsed; requests inside the window drain tokens
//! without sliding it. On exhaustion the caller gets the whole seconds
//! until the window reopens, rounded up.
//!
//! State is process-local by intent: with several server processes the
//! effective ceiling is `max_requests` per process, which this deployment
//! accepts in exchange for keeping the hot path free of shared storage.
//! Buckets are never pruned; the key space is bounded by active
//! principals times distinct paths.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Mutex;

/// The caller exhausted its window; retry after the indicated delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Too many requests")]
pub struct RateLimitError {
	/// Whole seconds until the window reopens, rounded up. Zero when the
	/// reset is imminent.
	pub retry_after_secs: u64,
}

struct Bucket {
	tokens: u32,
	window_started: Instant,
}

/// Process-local fixed-window rate limiter.
pub struct RateLimiter {
	buckets: Mutex<HashMap<String, Bucket>>,
	window: Duration,
	max_requests: u32,
}

impl RateLimiter {
	pub fn new(window: Duration, max_requests: u32) -> Self {
		Self {
			buckets: Mutex::new(HashMap::new()),
			window,
			max_requests,
		}
	}

	/// Consumes one token for `identifier` on `path`.
	///
	/// Windows are per `(identifier, path)` pair, so a chatty integration
	/// hammering one endpoint cannot starve the same key's access to
	/// another.
	pub async fn consume(&self, identifier: &str, path: &str) -> Result<(), RateLimitError> {
		self.consume_at(identifier, path, Instant::now()).await
	}

	async fn consume_at(
		&self,
		identifier: &str,
		path: &str,
		now: Instant,
	) -> Result<(), RateLimitError> {
		let key = format!("{identifier}:{path}");
		let mut buckets = self.buckets.lock().await;
		let bucket = buckets.entry(key).or_insert(Bucket {
			tokens: self.max_requests,
			window_started: now,
		});

		let elapsed = now.duration_since(bucket.window_started);
		if elapsed > self.window {
			bucket.tokens = self.max_requests;
			bucket.window_started = now;
		}

		if bucket.tokens == 0 {
			let remaining = self.window.saturating_sub(elapsed);
			return Err(RateLimitError {
				retry_after_secs: remaining.as_millis().div_ceil(1000) as u64,
			});
		}

		bucket.tokens -= 1;
		Ok(())
	}
}
