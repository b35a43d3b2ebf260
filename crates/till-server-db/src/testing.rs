// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Test fixtures shared across repository tests.

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use till_ledger_core::UserId;

use crate::migrations::run_migrations;

/// In-memory pool pinned to a single connection so every query sees the same
/// database.
pub async fn create_test_pool() -> SqlitePool {
	let options = SqliteConnectOptions::from_str(":memory:")
		.unwrap()
		.foreign_keys(true)
		.create_if_missing(true);

	SqlitePoolOptions::new()
		.max_connections(1)
		.connect_with(options)
		.await
		.expect("Failed to create test pool")
}

/// In-memory pool with the full schema applied.
pub async fn create_migrated_pool() -> SqlitePool {
	let pool = create_test_pool().await;
	run_migrations(&pool).await.expect("Failed to migrate test pool");
	pool
}

/// Insert a minimal user row and return its id.
pub async fn seed_user(pool: &SqlitePool) -> UserId {
	seed_user_with_currency(pool, None).await
}

/// Insert a user row with a chosen `default_currency`.
pub async fn seed_user_with_currency(pool: &SqlitePool, currency: Option<&str>) -> UserId {
	let id = UserId::new();
	let now = Utc::now().to_rfc3339();

	sqlx::query(
		r#"
		INSERT INTO users (id, display_name, email, default_currency, created_at, updated_at)
		VALUES (?, ?, ?, ?, ?, ?)
		"#,
	)
	.bind(id.to_string())
	.bind("Test User")
	.bind(format!("{id}@example.com"))
	.bind(currency)
	.bind(&now)
	.bind(&now)
	.execute(pool)
	.await
	.expect("Failed to seed user");

	id
}
