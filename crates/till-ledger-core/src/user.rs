// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User account record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// Currency assumed when a user has not picked one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// A ledger owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
	pub id: UserId,
	pub display_name: String,
	pub email: String,
	/// ISO 4217 code, e.g. `USD` or `EUR`. `None` falls back to
	/// [`DEFAULT_CURRENCY`] at resolution time.
	pub default_currency: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl User {
	/// The currency to present amounts in for this user.
	pub fn currency(&self) -> &str {
		self.default_currency.as_deref().unwrap_or(DEFAULT_CURRENCY)
	}
}
