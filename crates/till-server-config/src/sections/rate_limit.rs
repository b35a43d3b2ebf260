// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rate limiter configuration section.

use serde::{Deserialize, Serialize};

/// Rate limiter configuration (runtime, fully resolved).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
	/// Fixed window length in milliseconds.
	pub window_ms: u64,
	/// Requests allowed per principal+path within one window.
	pub max_requests: u32,
}

impl Default for RateLimitConfig {
	fn default() -> Self {
		Self {
			window_ms: 60_000,
			max_requests: 120,
		}
	}
}

/// Rate limiter configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfigLayer {
	pub window_ms: Option<u64>,
	pub max_requests: Option<u32>,
}

impl RateLimitConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.window_ms.is_some() {
			self.window_ms = other.window_ms;
		}
		if other.max_requests.is_some() {
			self.max_requests = other.max_requests;
		}
	}

	pub fn finalize(self) -> RateLimitConfig {
		RateLimitConfig {
			window_ms: self.window_ms.unwrap_or(60_000), // 1 minute
			max_requests: self.max_requests.unwrap_or(120),
		}
	}
}
