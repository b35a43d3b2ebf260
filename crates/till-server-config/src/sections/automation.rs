// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Automation scheduler configuration section.

use serde::{Deserialize, Serialize};

/// Automation configuration (runtime, fully resolved).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutomationConfig {
	/// Delay between scheduler cycles in milliseconds.
	pub interval_ms: u64,
	/// Delay before respawning the worker after an unexpected exit.
	pub restart_delay_ms: u64,
	/// Kill switch: when true the supervisor never starts the worker.
	pub disabled: bool,
}

impl Default for AutomationConfig {
	fn default() -> Self {
		Self {
			interval_ms: 300_000, // 5 minutes
			restart_delay_ms: 10_000,
			disabled: false,
		}
	}
}

/// Automation configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AutomationConfigLayer {
	pub interval_ms: Option<u64>,
	pub restart_delay_ms: Option<u64>,
	pub disabled: Option<bool>,
}

impl AutomationConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.interval_ms.is_some() {
			self.interval_ms = other.interval_ms;
		}
		if other.restart_delay_ms.is_some() {
			self.restart_delay_ms = other.restart_delay_ms;
		}
		if other.disabled.is_some() {
			self.disabled = other.disabled;
		}
	}

	pub fn finalize(self) -> AutomationConfig {
		AutomationConfig {
			interval_ms: self.interval_ms.unwrap_or(300_000), // 5 minutes
			restart_delay_ms: self.restart_delay_ms.unwrap_or(10_000),
			disabled: self.disabled.unwrap_or(false),
		}
	}
}
