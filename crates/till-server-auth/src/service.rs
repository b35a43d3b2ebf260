// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API key management.
//!
//! Creation returns the one-time-visible token alongside the stored
//! record; the token cannot be shown again. Revocation is two-step: the
//! first revoke soft-deletes a live key (it stays listed, and auth
//! reports it as revoked rather than unknown), revoking it again removes
//! the row for good.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

use till_ledger_core::validate::MAX_DESCRIPTION_LEN;
use till_ledger_core::{normalize_scopes, ApiKey, ApiKeyId, UserId, ValidationError};
use till_server_db::{ApiKeyStore, DbError};

use crate::token::{generate_token, hash_secret};

/// Errors from API key management operations.
#[derive(Debug, Error)]
pub enum ApiKeyServiceError {
	#[error(transparent)]
	Validation(#[from] ValidationError),

	/// No key with the given id belongs to the acting user. Covers both
	/// genuinely unknown ids and other users' keys, so the response never
	/// hints that a foreign key exists.
	#[error("API key not found")]
	NotFound,

	#[error(transparent)]
	Db(#[from] DbError),

	#[error("{0}")]
	Internal(String),
}

impl ApiKeyServiceError {
	/// The HTTP status this error maps to at the boundary.
	pub fn status(&self) -> StatusCode {
		match self {
			ApiKeyServiceError::Validation(_) => StatusCode::BAD_REQUEST,
			ApiKeyServiceError::NotFound => StatusCode::NOT_FOUND,
			ApiKeyServiceError::Db(_) | ApiKeyServiceError::Internal(_) => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		}
	}
}

/// A newly created key with its one-time-visible token.
#[derive(Debug, Clone)]
pub struct CreatedApiKey {
	pub record: ApiKey,
	/// Full bearer token. Shown once; only its hash is stored.
	pub token: String,
}

/// What a revoke request actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevokeOutcome {
	/// The key was live and is now revoked. It stays listed and is
	/// rejected at auth time with an explicit "revoked" error.
	Revoked,
	/// The key was already revoked and has now been deleted permanently.
	Deleted,
}

/// Management operations on a user's API keys.
pub struct ApiKeyService {
	api_keys: Arc<dyn ApiKeyStore>,
}

impl ApiKeyService {
	pub fn new(api_keys: Arc<dyn ApiKeyStore>) -> Self {
		Self { api_keys }
	}

	/// Creates a key for `user_id` from raw requested scope names.
	///
	/// Unknown scope names are dropped, not rejected; only when nothing
	/// valid remains does the request fail. The returned token is the
	/// caller's only chance to see the secret.
	#[tracing::instrument(skip(self, raw_scopes, description), fields(user_id = %user_id))]
	pub async fn create_api_key(
		&self,
		user_id: &UserId,
		raw_scopes: &[String],
		description: Option<&str>,
		expires_at: Option<DateTime<Utc>>,
	) -> Result<CreatedApiKey, ApiKeyServiceError> {
		let scopes = normalize_scopes(raw_scopes);
		if scopes.is_empty() {
			return Err(
				ValidationError::single("scopes", "At least one valid scope is required").into(),
			);
		}
		if let Some(text) = description {
			if text.chars().count() > MAX_DESCRIPTION_LEN {
				return Err(ValidationError::single(
					"description",
					format!("must be at most {MAX_DESCRIPTION_LEN} characters"),
				)
				.into());
			}
		}

		let generated = generate_token();
		let key_hash = hash_secret(&generated.secret)
			.map_err(|error| ApiKeyServiceError::Internal(error.to_string()))?;

		let record = self
			.api_keys
			.create_api_key(
				user_id,
				description,
				&generated.prefix,
				&key_hash,
				&scopes,
				expires_at,
			)
			.await?;

		tracing::info!(api_key_id = %record.id, key_prefix = %record.key_prefix, "API key created");
		Ok(CreatedApiKey {
			record,
			token: generated.token,
		})
	}

	/// Lists the user's keys, newest first, revoked keys included.
	pub async fn list_api_keys(&self, user_id: &UserId) -> Result<Vec<ApiKey>, ApiKeyServiceError> {
		Ok(self.api_keys.list_api_keys_for_user(user_id).await?)
	}

	/// Revokes a key, or deletes it if it was already revoked.
	#[tracing::instrument(skip(self), fields(api_key_id = %id, user_id = %user_id))]
	pub async fn revoke_api_key(
		&self,
		id: &ApiKeyId,
		user_id: &UserId,
	) -> Result<RevokeOutcome, ApiKeyServiceError> {
		let key = self
			.api_keys
			.get_api_key(id, user_id)
			.await?
			.ok_or(ApiKeyServiceError::NotFound)?;

		if key.is_revoked() {
			self.api_keys.delete_api_key(id, user_id).await?;
			tracing::info!("already-revoked API key deleted");
			return Ok(RevokeOutcome::Deleted);
		}

		self.api_keys.revoke_api_key(id, user_id).await?;
		Ok(RevokeOutcome::Revoked)
	}
}
