// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Schema setup.
//!
//! Every statement is idempotent (`IF NOT EXISTS`), so running migrations on
//! an already-provisioned database is a no-op. Timestamps are stored as
//! RFC 3339 TEXT, calendar dates as `YYYY-MM-DD` TEXT, and encrypted fields
//! as JSON payload TEXT that the database layer never interprets.

use sqlx::sqlite::SqlitePool;

use crate::error::DbError;

const MIGRATIONS: &[(&str, &str)] = &[
	(
		"users",
		r#"
		CREATE TABLE IF NOT EXISTS users (
			id TEXT PRIMARY KEY,
			display_name TEXT NOT NULL,
			email TEXT NOT NULL UNIQUE,
			default_currency TEXT,
			created_at TEXT NOT NULL,
			updated_at TEXT NOT NULL
		)
		"#,
	),
	(
		"recurring_templates",
		r#"
		CREATE TABLE IF NOT EXISTS recurring_templates (
			id TEXT PRIMARY KEY,
			user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
			kind TEXT NOT NULL CHECK (kind IN ('expense', 'income')),
			category_id TEXT,
			due_day_of_month INTEGER NOT NULL DEFAULT 1,
			split_by INTEGER,
			is_active INTEGER NOT NULL DEFAULT 1,
			last_generated_on TEXT,
			amount_encrypted TEXT NOT NULL,
			description_encrypted TEXT NOT NULL,
			created_at TEXT NOT NULL,
			updated_at TEXT NOT NULL
		)
		"#,
	),
	(
		"idx_recurring_templates_user_kind",
		r#"
		CREATE INDEX IF NOT EXISTS idx_recurring_templates_user_kind
		ON recurring_templates(user_id, kind, is_active)
		"#,
	),
	(
		"ledger_entries",
		r#"
		CREATE TABLE IF NOT EXISTS ledger_entries (
			id TEXT PRIMARY KEY,
			user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
			kind TEXT NOT NULL CHECK (kind IN ('expense', 'income')),
			category_id TEXT,
			occurred_on TEXT NOT NULL,
			split_by INTEGER,
			recurring_source_id TEXT REFERENCES recurring_templates(id) ON DELETE SET NULL,
			amount_encrypted TEXT NOT NULL,
			impact_amount_encrypted TEXT,
			description_encrypted TEXT NOT NULL,
			created_at TEXT NOT NULL
		)
		"#,
	),
	(
		"idx_ledger_entries_user_kind_date",
		r#"
		CREATE INDEX IF NOT EXISTS idx_ledger_entries_user_kind_date
		ON ledger_entries(user_id, kind, occurred_on)
		"#,
	),
	(
		"idx_ledger_entries_source",
		r#"
		CREATE INDEX IF NOT EXISTS idx_ledger_entries_source
		ON ledger_entries(recurring_source_id)
		"#,
	),
	(
		"api_keys",
		r#"
		CREATE TABLE IF NOT EXISTS api_keys (
			id TEXT PRIMARY KEY,
			user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
			description TEXT,
			key_prefix TEXT NOT NULL UNIQUE,
			key_hash TEXT NOT NULL,
			scopes TEXT NOT NULL,
			expires_at TEXT,
			last_used_at TEXT,
			revoked_at TEXT,
			created_at TEXT NOT NULL
		)
		"#,
	),
];

/// Bring the schema up to date.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
	for (name, sql) in MIGRATIONS {
		tracing::debug!(migration = name, "applying migration");
		sqlx::query(sql).execute(pool).await?;
	}
	tracing::info!(count = MIGRATIONS.len(), "database schema ready");
	Ok(())
}
