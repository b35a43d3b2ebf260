// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API key records for programmatic access.
//!
//! A key is stored as a lookup prefix plus an Argon2 hash of its secret. The
//! raw token is shown once at creation time and cannot be recovered. Token
//! generation, parsing and hashing live in the auth layer; this module only
//! models the stored record and its lifecycle flags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ApiKeyId, UserId};
use crate::scope::ApiScope;

/// A stored API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
	pub id: ApiKeyId,
	pub user_id: UserId,
	/// Optional human-readable label chosen at creation time.
	pub description: Option<String>,
	/// Public lookup handle, unique across all keys.
	pub key_prefix: String,
	/// Argon2 hash of the secret segment. Never the secret itself.
	pub key_hash: String,
	pub scopes: Vec<ApiScope>,
	pub expires_at: Option<DateTime<Utc>>,
	pub last_used_at: Option<DateTime<Utc>>,
	pub revoked_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
}

impl ApiKey {
	/// Returns `true` if this key has been revoked.
	pub fn is_revoked(&self) -> bool {
		self.revoked_at.is_some()
	}

	/// Returns `true` if this key's expiry instant has passed.
	///
	/// A key with no expiry never expires. A key expiring exactly at `now`
	/// is still valid.
	pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
		self.expires_at.map(|at| at < now).unwrap_or(false)
	}

	/// Returns `true` if the key grants every scope in `required`.
	pub fn has_scopes(&self, required: &[ApiScope]) -> bool {
		required.iter().all(|scope| self.scopes.contains(scope))
	}
}
