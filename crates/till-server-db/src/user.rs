// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User repository for database operations.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqlitePool, Row};

use till_ledger_core::{User, UserId};

use crate::error::DbError;
use crate::row::{parse_datetime, parse_uuid};

#[async_trait]
pub trait UserStore: Send + Sync {
	async fn get_user(&self, id: &UserId) -> Result<Option<User>, DbError>;
	async fn users_with_active_templates(&self) -> Result<Vec<UserId>, DbError>;
	async fn create_user(
		&self,
		display_name: &str,
		email: &str,
		default_currency: Option<&str>,
	) -> Result<User, DbError>;
}

#[async_trait]
impl UserStore for UserRepository {
	async fn get_user(&self, id: &UserId) -> Result<Option<User>, DbError> {
		self.get_user(id).await
	}

	async fn users_with_active_templates(&self) -> Result<Vec<UserId>, DbError> {
		self.users_with_active_templates().await
	}

	async fn create_user(
		&self,
		display_name: &str,
		email: &str,
		default_currency: Option<&str>,
	) -> Result<User, DbError> {
		self.create_user(display_name, email, default_currency).await
	}
}

/// Repository for user database operations.
#[derive(Clone)]
pub struct UserRepository {
	pool: SqlitePool,
}

impl UserRepository {
	/// Create a new user repository with the given pool.
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Get a user by id.
	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn get_user(&self, id: &UserId) -> Result<Option<User>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, display_name, email, default_currency, created_at, updated_at
			FROM users
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => Ok(Some(parse_user_row(&row)?)),
			None => Ok(None),
		}
	}

	/// Users owning at least one active recurring template of either kind.
	///
	/// This is the scheduler's work list: users without active templates are
	/// skipped entirely rather than visited and found empty.
	#[tracing::instrument(skip(self))]
	pub async fn users_with_active_templates(&self) -> Result<Vec<UserId>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT DISTINCT user_id
			FROM recurring_templates
			WHERE is_active = 1
			"#,
		)
		.fetch_all(&self.pool)
		.await?;

		let mut ids = Vec::with_capacity(rows.len());
		for row in rows {
			let id_str: String = row.get("user_id");
			ids.push(UserId(parse_uuid("user_id", &id_str)?));
		}
		tracing::debug!(count = ids.len(), "listed users with active templates");
		Ok(ids)
	}

	/// Create a new user.
	///
	/// # Database Constraints
	/// - `email` must be unique
	#[tracing::instrument(skip(self), fields(email = %email))]
	pub async fn create_user(
		&self,
		display_name: &str,
		email: &str,
		default_currency: Option<&str>,
	) -> Result<User, DbError> {
		let user = User {
			id: UserId::new(),
			display_name: display_name.to_string(),
			email: email.to_string(),
			default_currency: default_currency.map(str::to_string),
			created_at: Utc::now(),
			updated_at: Utc::now(),
		};

		sqlx::query(
			r#"
			INSERT INTO users (id, display_name, email, default_currency, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(user.id.to_string())
		.bind(&user.display_name)
		.bind(&user.email)
		.bind(user.default_currency.as_deref())
		.bind(user.created_at.to_rfc3339())
		.bind(user.updated_at.to_rfc3339())
		.execute(&self.pool)
		.await?;

		tracing::debug!(user_id = %user.id, "user created");
		Ok(user)
	}
}

fn parse_user_row(row: &sqlx::sqlite::SqliteRow) -> Result<User, DbError> {
	let id_str: String = row.get("id");
	let display_name: String = row.get("display_name");
	let email: String = row.get("email");
	let default_currency: Option<String> = row.get("default_currency");
	let created_at_str: String = row.get("created_at");
	let updated_at_str: String = row.get("updated_at");

	Ok(User {
		id: UserId(parse_uuid("user id", &id_str)?),
		display_name,
		email,
		default_currency,
		created_at: parse_datetime("created_at", &created_at_str)?,
		updated_at: parse_datetime("updated_at", &updated_at_str)?,
	})
}
