// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ledger entry repository for database operations.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{sqlite::SqlitePool, Row};

use till_ledger_core::{
	CategoryId, EntryId, LedgerEntry, LedgerKind, NewLedgerEntry, TemplateId, UserId,
};

use crate::error::DbError;
use crate::row::{parse_date, parse_datetime, parse_json, parse_json_opt, parse_uuid, parse_uuid_opt};

/// Listing cap; one ledger page never returns more rows than this.
pub const DEFAULT_LIST_LIMIT: i64 = 200;

/// Date-range filter for entry listings.
#[derive(Debug, Clone)]
pub struct EntryFilter {
	/// Inclusive lower bound on `occurred_on`.
	pub from: Option<NaiveDate>,
	/// Inclusive upper bound on `occurred_on`.
	pub to: Option<NaiveDate>,
	pub limit: i64,
}

impl Default for EntryFilter {
	fn default() -> Self {
		Self {
			from: None,
			to: None,
			limit: DEFAULT_LIST_LIMIT,
		}
	}
}

#[async_trait]
pub trait EntryStore: Send + Sync {
	async fn create_entry(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, DbError>;
	async fn get_entry(&self, id: &EntryId) -> Result<Option<LedgerEntry>, DbError>;
	async fn list_entries(
		&self,
		user_id: &UserId,
		kind: LedgerKind,
		filter: &EntryFilter,
	) -> Result<Vec<LedgerEntry>, DbError>;
	async fn update_entry(&self, entry: &LedgerEntry) -> Result<(), DbError>;
	async fn delete_entry(&self, id: &EntryId) -> Result<bool, DbError>;
}

#[async_trait]
impl EntryStore for EntryRepository {
	async fn create_entry(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, DbError> {
		self.create_entry(entry).await
	}

	async fn get_entry(&self, id: &EntryId) -> Result<Option<LedgerEntry>, DbError> {
		self.get_entry(id).await
	}

	async fn list_entries(
		&self,
		user_id: &UserId,
		kind: LedgerKind,
		filter: &EntryFilter,
	) -> Result<Vec<LedgerEntry>, DbError> {
		self.list_entries(user_id, kind, filter).await
	}

	async fn update_entry(&self, entry: &LedgerEntry) -> Result<(), DbError> {
		self.update_entry(entry).await
	}

	async fn delete_entry(&self, id: &EntryId) -> Result<bool, DbError> {
		self.delete_entry(id).await
	}
}

/// Repository for ledger entry database operations.
#[derive(Clone)]
pub struct EntryRepository {
	pool: SqlitePool,
}

impl EntryRepository {
	/// Create a new entry repository with the given pool.
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a ledger entry.
	///
	/// Both manual entries and materialized ones come through here; the
	/// latter carry a `recurring_source_id`.
	#[tracing::instrument(skip(self, entry), fields(user_id = %entry.user_id, kind = %entry.kind))]
	pub async fn create_entry(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, DbError> {
		let record = LedgerEntry {
			id: EntryId::new(),
			user_id: entry.user_id,
			kind: entry.kind,
			category_id: entry.category_id,
			occurred_on: entry.occurred_on,
			split_by: entry.split_by,
			recurring_source_id: entry.recurring_source_id,
			amount_encrypted: entry.amount_encrypted,
			impact_amount_encrypted: entry.impact_amount_encrypted,
			description_encrypted: entry.description_encrypted,
			created_at: Utc::now(),
		};

		let impact_json = record
			.impact_amount_encrypted
			.as_ref()
			.map(serde_json::to_string)
			.transpose()?;

		sqlx::query(
			r#"
			INSERT INTO ledger_entries (
				id, user_id, kind, category_id, occurred_on, split_by, recurring_source_id,
				amount_encrypted, impact_amount_encrypted, description_encrypted, created_at
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(record.id.to_string())
		.bind(record.user_id.to_string())
		.bind(record.kind.as_str())
		.bind(record.category_id.map(|id| id.to_string()))
		.bind(record.occurred_on.to_string())
		.bind(record.split_by.map(|v| v as i64))
		.bind(record.recurring_source_id.map(|id| id.to_string()))
		.bind(serde_json::to_string(&record.amount_encrypted)?)
		.bind(impact_json)
		.bind(serde_json::to_string(&record.description_encrypted)?)
		.bind(record.created_at.to_rfc3339())
		.execute(&self.pool)
		.await?;

		tracing::debug!(entry_id = %record.id, occurred_on = %record.occurred_on, "ledger entry created");
		Ok(record)
	}

	/// Get an entry by id.
	#[tracing::instrument(skip(self), fields(entry_id = %id))]
	pub async fn get_entry(&self, id: &EntryId) -> Result<Option<LedgerEntry>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, user_id, kind, category_id, occurred_on, split_by, recurring_source_id,
			       amount_encrypted, impact_amount_encrypted, description_encrypted, created_at
			FROM ledger_entries
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => Ok(Some(parse_entry_row(&row)?)),
			None => Ok(None),
		}
	}

	/// List entries of one kind for a user, most recent date first.
	///
	/// The result is capped at `filter.limit` rows; callers wanting history
	/// beyond the cap narrow the date range instead of paging.
	#[tracing::instrument(skip(self, filter), fields(user_id = %user_id, kind = %kind))]
	pub async fn list_entries(
		&self,
		user_id: &UserId,
		kind: LedgerKind,
		filter: &EntryFilter,
	) -> Result<Vec<LedgerEntry>, DbError> {
		let mut conditions = vec!["user_id = ?".to_string(), "kind = ?".to_string()];
		if filter.from.is_some() {
			conditions.push("occurred_on >= ?".to_string());
		}
		if filter.to.is_some() {
			conditions.push("occurred_on <= ?".to_string());
		}
		let where_clause = conditions.join(" AND ");

		let sql = format!(
			"SELECT id, user_id, kind, category_id, occurred_on, split_by, recurring_source_id, \
			 amount_encrypted, impact_amount_encrypted, description_encrypted, created_at \
			 FROM ledger_entries WHERE {} ORDER BY occurred_on DESC, created_at DESC LIMIT ?",
			where_clause
		);

		let mut query = sqlx::query(&sql)
			.bind(user_id.to_string())
			.bind(kind.as_str());
		if let Some(from) = filter.from {
			query = query.bind(from.to_string());
		}
		if let Some(to) = filter.to {
			query = query.bind(to.to_string());
		}
		query = query.bind(filter.limit);

		let rows = query.fetch_all(&self.pool).await?;

		let mut entries = Vec::with_capacity(rows.len());
		for row in rows {
			entries.push(parse_entry_row(&row)?);
		}
		tracing::debug!(count = entries.len(), "listed ledger entries");
		Ok(entries)
	}

	/// Persist edits to an entry's mutable fields.
	///
	/// Immutability of generated entries is enforced in the service layer,
	/// not here; the repository writes whatever record it is handed.
	#[tracing::instrument(skip(self, entry), fields(entry_id = %entry.id))]
	pub async fn update_entry(&self, entry: &LedgerEntry) -> Result<(), DbError> {
		let impact_json = entry
			.impact_amount_encrypted
			.as_ref()
			.map(serde_json::to_string)
			.transpose()?;

		let result = sqlx::query(
			r#"
			UPDATE ledger_entries
			SET category_id = ?, occurred_on = ?, split_by = ?,
			    amount_encrypted = ?, impact_amount_encrypted = ?, description_encrypted = ?
			WHERE id = ?
			"#,
		)
		.bind(entry.category_id.map(|id| id.to_string()))
		.bind(entry.occurred_on.to_string())
		.bind(entry.split_by.map(|v| v as i64))
		.bind(serde_json::to_string(&entry.amount_encrypted)?)
		.bind(impact_json)
		.bind(serde_json::to_string(&entry.description_encrypted)?)
		.bind(entry.id.to_string())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("entry {}", entry.id)));
		}
		Ok(())
	}

	/// Delete an entry.
	///
	/// # Returns
	/// `true` if a row was deleted.
	#[tracing::instrument(skip(self), fields(entry_id = %id))]
	pub async fn delete_entry(&self, id: &EntryId) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM ledger_entries WHERE id = ?")
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}
}

fn parse_entry_row(row: &sqlx::sqlite::SqliteRow) -> Result<LedgerEntry, DbError> {
	let id_str: String = row.get("id");
	let user_id_str: String = row.get("user_id");
	let kind_str: String = row.get("kind");
	let category_id_str: Option<String> = row.get("category_id");
	let occurred_on_str: String = row.get("occurred_on");
	let split_by: Option<i64> = row.get("split_by");
	let recurring_source_id_str: Option<String> = row.get("recurring_source_id");
	let amount_encrypted_str: String = row.get("amount_encrypted");
	let impact_encrypted_str: Option<String> = row.get("impact_amount_encrypted");
	let description_encrypted_str: String = row.get("description_encrypted");
	let created_at_str: String = row.get("created_at");

	let kind: LedgerKind = kind_str
		.parse()
		.map_err(|e: String| DbError::Internal(format!("Invalid kind: {e}")))?;

	Ok(LedgerEntry {
		id: EntryId(parse_uuid("entry id", &id_str)?),
		user_id: UserId(parse_uuid("user_id", &user_id_str)?),
		kind,
		category_id: parse_uuid_opt("category_id", category_id_str)?.map(CategoryId),
		occurred_on: parse_date("occurred_on", &occurred_on_str)?,
		split_by: split_by.map(|v| v as u32),
		recurring_source_id: parse_uuid_opt("recurring_source_id", recurring_source_id_str)?
			.map(TemplateId),
		amount_encrypted: parse_json("amount_encrypted", &amount_encrypted_str)?,
		impact_amount_encrypted: parse_json_opt("impact_amount_encrypted", impact_encrypted_str)?,
		description_encrypted: parse_json("description_encrypted", &description_encrypted_str)?,
		created_at: parse_datetime("created_at", &created_at_str)?,
	})
}
