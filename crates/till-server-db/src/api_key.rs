// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API key repository for database operations.
//!
//! Keys are user-scoped. Lookup goes through the unique `key_prefix`; the
//! secret itself is stored only as an Argon2 hash. Revocation and deletion
//! are ownership-guarded in SQL so a caller can never affect another user's
//! keys, whatever id it guesses.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};

use till_ledger_core::{ApiKey, ApiKeyId, ApiScope, UserId};

use crate::error::DbError;
use crate::row::{parse_datetime, parse_datetime_opt, parse_uuid};

#[async_trait]
pub trait ApiKeyStore: Send + Sync {
	async fn create_api_key(
		&self,
		user_id: &UserId,
		description: Option<&str>,
		key_prefix: &str,
		key_hash: &str,
		scopes: &[ApiScope],
		expires_at: Option<DateTime<Utc>>,
	) -> Result<ApiKey, DbError>;
	async fn get_api_key(&self, id: &ApiKeyId, user_id: &UserId) -> Result<Option<ApiKey>, DbError>;
	async fn get_api_key_by_prefix(&self, key_prefix: &str) -> Result<Option<ApiKey>, DbError>;
	async fn list_api_keys_for_user(&self, user_id: &UserId) -> Result<Vec<ApiKey>, DbError>;
	async fn revoke_api_key(&self, id: &ApiKeyId, user_id: &UserId) -> Result<bool, DbError>;
	async fn delete_api_key(&self, id: &ApiKeyId, user_id: &UserId) -> Result<bool, DbError>;
	async fn update_last_used(&self, id: &ApiKeyId) -> Result<(), DbError>;
	async fn revoke_expired_api_keys(&self, now: DateTime<Utc>) -> Result<u64, DbError>;
}

#[async_trait]
impl ApiKeyStore for ApiKeyRepository {
	async fn create_api_key(
		&self,
		user_id: &UserId,
		description: Option<&str>,
		key_prefix: &str,
		key_hash: &str,
		scopes: &[ApiScope],
		expires_at: Option<DateTime<Utc>>,
	) -> Result<ApiKey, DbError> {
		self
			.create_api_key(user_id, description, key_prefix, key_hash, scopes, expires_at)
			.await
	}

	async fn get_api_key(&self, id: &ApiKeyId, user_id: &UserId) -> Result<Option<ApiKey>, DbError> {
		self.get_api_key(id, user_id).await
	}

	async fn get_api_key_by_prefix(&self, key_prefix: &str) -> Result<Option<ApiKey>, DbError> {
		self.get_api_key_by_prefix(key_prefix).await
	}

	async fn list_api_keys_for_user(&self, user_id: &UserId) -> Result<Vec<ApiKey>, DbError> {
		self.list_api_keys_for_user(user_id).await
	}

	async fn revoke_api_key(&self, id: &ApiKeyId, user_id: &UserId) -> Result<bool, DbError> {
		self.revoke_api_key(id, user_id).await
	}

	async fn delete_api_key(&self, id: &ApiKeyId, user_id: &UserId) -> Result<bool, DbError> {
		self.delete_api_key(id, user_id).await
	}

	async fn update_last_used(&self, id: &ApiKeyId) -> Result<(), DbError> {
		self.update_last_used(id).await
	}

	async fn revoke_expired_api_keys(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
		self.revoke_expired_api_keys(now).await
	}
}

/// Repository for API key database operations.
#[derive(Clone)]
pub struct ApiKeyRepository {
	pool: SqlitePool,
}

impl ApiKeyRepository {
	/// Create a new API key repository with the given pool.
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Create a new API key.
	///
	/// # Arguments
	/// * `key_prefix` - Public lookup handle (must be unique)
	/// * `key_hash` - Argon2 hash of the secret segment (never the secret)
	/// * `expires_at` - Optional expiry; expired keys are swept by the scheduler
	///
	/// # Database Constraints
	/// - `key_prefix` must be unique
	/// - `user_id` must reference an existing user
	#[tracing::instrument(skip(self, key_hash), fields(user_id = %user_id, key_prefix = %key_prefix))]
	pub async fn create_api_key(
		&self,
		user_id: &UserId,
		description: Option<&str>,
		key_prefix: &str,
		key_hash: &str,
		scopes: &[ApiScope],
		expires_at: Option<DateTime<Utc>>,
	) -> Result<ApiKey, DbError> {
		let record = ApiKey {
			id: ApiKeyId::new(),
			user_id: *user_id,
			description: description.map(|text| text.to_string()),
			key_prefix: key_prefix.to_string(),
			key_hash: key_hash.to_string(),
			scopes: scopes.to_vec(),
			expires_at,
			last_used_at: None,
			revoked_at: None,
			created_at: Utc::now(),
		};
		let scopes_json = serde_json::to_string(&record.scopes)?;

		sqlx::query(
			r#"
			INSERT INTO api_keys (
				id, user_id, description, key_prefix, key_hash, scopes, expires_at, created_at
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(record.id.to_string())
		.bind(record.user_id.to_string())
		.bind(record.description.as_deref())
		.bind(&record.key_prefix)
		.bind(&record.key_hash)
		.bind(&scopes_json)
		.bind(record.expires_at.map(|at| at.to_rfc3339()))
		.bind(record.created_at.to_rfc3339())
		.execute(&self.pool)
		.await?;

		tracing::debug!(api_key_id = %record.id, "API key created");
		Ok(record)
	}

	/// Get an API key by id, scoped to its owner.
	///
	/// Returns `None` for keys that exist but belong to someone else.
	#[tracing::instrument(skip(self), fields(api_key_id = %id, user_id = %user_id))]
	pub async fn get_api_key(
		&self,
		id: &ApiKeyId,
		user_id: &UserId,
	) -> Result<Option<ApiKey>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, user_id, description, key_prefix, key_hash, scopes, expires_at,
			       last_used_at, revoked_at, created_at
			FROM api_keys
			WHERE id = ? AND user_id = ?
			"#,
		)
		.bind(id.to_string())
		.bind(user_id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => Ok(Some(parse_api_key_row(&row)?)),
			None => Ok(None),
		}
	}

	/// Get an API key by its public prefix.
	///
	/// # Note
	/// Returns the key regardless of revocation or expiry - the auth layer
	/// checks lifecycle state so it can answer 403 rather than 401.
	#[tracing::instrument(skip(self), fields(key_prefix = %key_prefix))]
	pub async fn get_api_key_by_prefix(&self, key_prefix: &str) -> Result<Option<ApiKey>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, user_id, description, key_prefix, key_hash, scopes, expires_at,
			       last_used_at, revoked_at, created_at
			FROM api_keys
			WHERE key_prefix = ?
			"#,
		)
		.bind(key_prefix)
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => Ok(Some(parse_api_key_row(&row)?)),
			None => Ok(None),
		}
	}

	/// List all API keys for a user, newest first, revoked ones included.
	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn list_api_keys_for_user(&self, user_id: &UserId) -> Result<Vec<ApiKey>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, user_id, description, key_prefix, key_hash, scopes, expires_at,
			       last_used_at, revoked_at, created_at
			FROM api_keys
			WHERE user_id = ?
			ORDER BY created_at DESC
			"#,
		)
		.bind(user_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		let mut keys = Vec::with_capacity(rows.len());
		for row in rows {
			keys.push(parse_api_key_row(&row)?);
		}
		Ok(keys)
	}

	/// Revoke an API key owned by `user_id`.
	///
	/// # Returns
	/// `true` if the key was revoked; `false` if it does not exist, belongs
	/// to someone else, or was already revoked.
	#[tracing::instrument(skip(self), fields(api_key_id = %id, user_id = %user_id))]
	pub async fn revoke_api_key(&self, id: &ApiKeyId, user_id: &UserId) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			UPDATE api_keys
			SET revoked_at = ?
			WHERE id = ? AND user_id = ? AND revoked_at IS NULL
			"#,
		)
		.bind(Utc::now().to_rfc3339())
		.bind(id.to_string())
		.bind(user_id.to_string())
		.execute(&self.pool)
		.await?;

		let revoked = result.rows_affected() > 0;
		if revoked {
			tracing::info!(api_key_id = %id, "API key revoked");
		}
		Ok(revoked)
	}

	/// Delete an API key owned by `user_id`.
	///
	/// # Returns
	/// `true` if a row was deleted.
	#[tracing::instrument(skip(self), fields(api_key_id = %id, user_id = %user_id))]
	pub async fn delete_api_key(&self, id: &ApiKeyId, user_id: &UserId) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM api_keys WHERE id = ? AND user_id = ?")
			.bind(id.to_string())
			.bind(user_id.to_string())
			.execute(&self.pool)
			.await?;

		let deleted = result.rows_affected() > 0;
		if deleted {
			tracing::info!(api_key_id = %id, "API key deleted");
		}
		Ok(deleted)
	}

	/// Update the last used timestamp for an API key.
	#[tracing::instrument(skip(self), fields(api_key_id = %id))]
	pub async fn update_last_used(&self, id: &ApiKeyId) -> Result<(), DbError> {
		sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
			.bind(Utc::now().to_rfc3339())
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		Ok(())
	}

	/// Revoke every key whose expiry has passed and is not yet revoked.
	///
	/// The revocation timestamp is `now`, not the key's expiry instant, so
	/// the sweep is visible in the audit trail as its own event.
	///
	/// # Returns
	/// Number of keys revoked.
	#[tracing::instrument(skip(self))]
	pub async fn revoke_expired_api_keys(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
		let result = sqlx::query(
			r#"
			UPDATE api_keys
			SET revoked_at = ?
			WHERE revoked_at IS NULL AND expires_at IS NOT NULL AND expires_at < ?
			"#,
		)
		.bind(now.to_rfc3339())
		.bind(now.to_rfc3339())
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected())
	}
}

fn parse_api_key_row(row: &sqlx::sqlite::SqliteRow) -> Result<ApiKey, DbError> {
	let id_str: String = row.get("id");
	let user_id_str: String = row.get("user_id");
	let description: Option<String> = row.get("description");
	let key_prefix: String = row.get("key_prefix");
	let key_hash: String = row.get("key_hash");
	let scopes_json: String = row.get("scopes");
	let expires_at_str: Option<String> = row.get("expires_at");
	let last_used_at_str: Option<String> = row.get("last_used_at");
	let revoked_at_str: Option<String> = row.get("revoked_at");
	let created_at_str: String = row.get("created_at");

	let scopes: Vec<ApiScope> = serde_json::from_str(&scopes_json)?;

	Ok(ApiKey {
		id: ApiKeyId(parse_uuid("api_key id", &id_str)?),
		user_id: UserId(parse_uuid("user_id", &user_id_str)?),
		description,
		key_prefix,
		key_hash,
		scopes,
		expires_at: parse_datetime_opt("expires_at", expires_at_str)?,
		last_used_at: parse_datetime_opt("last_used_at", last_used_at_str)?,
		revoked_at: parse_datetime_opt("revoked_at", revoked_at_str)?,
		created_at: parse_datetime("created_at", &created_at_str)?,
	})
}
