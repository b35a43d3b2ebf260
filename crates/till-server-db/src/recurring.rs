// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Recurring template repository for database operations.
//!
//! The materialization watermark (`last_generated_on`) is advanced with a
//! plain overwrite. Concurrent materializers may therefore both observe the
//! old watermark and create a duplicate entry; that duplicate is visible and
//! deletable, which is preferred over holding row locks across entry creation.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{sqlite::SqlitePool, Row};

use till_ledger_core::{
	CategoryId, LedgerKind, NewRecurringTemplate, RecurringTemplate, TemplateId, UserId,
};

use crate::error::DbError;
use crate::row::{parse_date_opt, parse_datetime, parse_json, parse_uuid, parse_uuid_opt};

#[async_trait]
pub trait RecurringStore: Send + Sync {
	async fn create_template(
		&self,
		template: NewRecurringTemplate,
	) -> Result<RecurringTemplate, DbError>;
	async fn get_template(&self, id: &TemplateId) -> Result<Option<RecurringTemplate>, DbError>;
	async fn list_templates_for_user(
		&self,
		user_id: &UserId,
		kind: LedgerKind,
	) -> Result<Vec<RecurringTemplate>, DbError>;
	async fn list_active_templates(
		&self,
		user_id: &UserId,
		kind: LedgerKind,
	) -> Result<Vec<RecurringTemplate>, DbError>;
	async fn advance_watermark(&self, id: &TemplateId, to: NaiveDate) -> Result<(), DbError>;
	async fn update_template(&self, template: &RecurringTemplate) -> Result<(), DbError>;
	async fn delete_template(&self, id: &TemplateId) -> Result<bool, DbError>;
}

#[async_trait]
impl RecurringStore for RecurringRepository {
	async fn create_template(
		&self,
		template: NewRecurringTemplate,
	) -> Result<RecurringTemplate, DbError> {
		self.create_template(template).await
	}

	async fn get_template(&self, id: &TemplateId) -> Result<Option<RecurringTemplate>, DbError> {
		self.get_template(id).await
	}

	async fn list_templates_for_user(
		&self,
		user_id: &UserId,
		kind: LedgerKind,
	) -> Result<Vec<RecurringTemplate>, DbError> {
		self.list_templates_for_user(user_id, kind).await
	}

	async fn list_active_templates(
		&self,
		user_id: &UserId,
		kind: LedgerKind,
	) -> Result<Vec<RecurringTemplate>, DbError> {
		self.list_active_templates(user_id, kind).await
	}

	async fn advance_watermark(&self, id: &TemplateId, to: NaiveDate) -> Result<(), DbError> {
		self.advance_watermark(id, to).await
	}

	async fn update_template(&self, template: &RecurringTemplate) -> Result<(), DbError> {
		self.update_template(template).await
	}

	async fn delete_template(&self, id: &TemplateId) -> Result<bool, DbError> {
		self.delete_template(id).await
	}
}

/// Repository for recurring template database operations.
#[derive(Clone)]
pub struct RecurringRepository {
	pool: SqlitePool,
}

impl RecurringRepository {
	/// Create a new recurring template repository with the given pool.
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Create a new recurring template.
	///
	/// The template starts with no watermark; its first materialization run
	/// seeds `last_generated_on`.
	#[tracing::instrument(skip(self, template), fields(user_id = %template.user_id, kind = %template.kind))]
	pub async fn create_template(
		&self,
		template: NewRecurringTemplate,
	) -> Result<RecurringTemplate, DbError> {
		let now = Utc::now();
		let record = RecurringTemplate {
			id: TemplateId::new(),
			user_id: template.user_id,
			kind: template.kind,
			category_id: template.category_id,
			due_day_of_month: template.due_day_of_month,
			split_by: template.split_by,
			is_active: template.is_active,
			last_generated_on: None,
			amount_encrypted: template.amount_encrypted,
			description_encrypted: template.description_encrypted,
			created_at: now,
			updated_at: now,
		};

		sqlx::query(
			r#"
			INSERT INTO recurring_templates (
				id, user_id, kind, category_id, due_day_of_month, split_by, is_active,
				last_generated_on, amount_encrypted, description_encrypted, created_at, updated_at
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(record.id.to_string())
		.bind(record.user_id.to_string())
		.bind(record.kind.as_str())
		.bind(record.category_id.map(|id| id.to_string()))
		.bind(record.due_day_of_month as i64)
		.bind(record.split_by.map(|v| v as i64))
		.bind(record.is_active)
		.bind(Option::<String>::None)
		.bind(serde_json::to_string(&record.amount_encrypted)?)
		.bind(serde_json::to_string(&record.description_encrypted)?)
		.bind(record.created_at.to_rfc3339())
		.bind(record.updated_at.to_rfc3339())
		.execute(&self.pool)
		.await?;

		tracing::debug!(template_id = %record.id, "recurring template created");
		Ok(record)
	}

	/// Get a template by id.
	#[tracing::instrument(skip(self), fields(template_id = %id))]
	pub async fn get_template(&self, id: &TemplateId) -> Result<Option<RecurringTemplate>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, user_id, kind, category_id, due_day_of_month, split_by, is_active,
			       last_generated_on, amount_encrypted, description_encrypted, created_at, updated_at
			FROM recurring_templates
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => Ok(Some(parse_template_row(&row)?)),
			None => Ok(None),
		}
	}

	/// List all templates of one kind for a user, newest first.
	///
	/// Includes paused templates; use [`list_active_templates`] for the
	/// materialization work list.
	///
	/// [`list_active_templates`]: RecurringRepository::list_active_templates
	#[tracing::instrument(skip(self), fields(user_id = %user_id, kind = %kind))]
	pub async fn list_templates_for_user(
		&self,
		user_id: &UserId,
		kind: LedgerKind,
	) -> Result<Vec<RecurringTemplate>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, user_id, kind, category_id, due_day_of_month, split_by, is_active,
			       last_generated_on, amount_encrypted, description_encrypted, created_at, updated_at
			FROM recurring_templates
			WHERE user_id = ? AND kind = ?
			ORDER BY created_at DESC
			"#,
		)
		.bind(user_id.to_string())
		.bind(kind.as_str())
		.fetch_all(&self.pool)
		.await?;

		let mut templates = Vec::with_capacity(rows.len());
		for row in rows {
			templates.push(parse_template_row(&row)?);
		}
		Ok(templates)
	}

	/// List active templates of one kind for a user.
	#[tracing::instrument(skip(self), fields(user_id = %user_id, kind = %kind))]
	pub async fn list_active_templates(
		&self,
		user_id: &UserId,
		kind: LedgerKind,
	) -> Result<Vec<RecurringTemplate>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, user_id, kind, category_id, due_day_of_month, split_by, is_active,
			       last_generated_on, amount_encrypted, description_encrypted, created_at, updated_at
			FROM recurring_templates
			WHERE user_id = ? AND kind = ? AND is_active = 1
			ORDER BY created_at DESC
			"#,
		)
		.bind(user_id.to_string())
		.bind(kind.as_str())
		.fetch_all(&self.pool)
		.await?;

		let mut templates = Vec::with_capacity(rows.len());
		for row in rows {
			templates.push(parse_template_row(&row)?);
		}
		tracing::debug!(count = templates.len(), "listed active templates");
		Ok(templates)
	}

	/// Move the materialization watermark to `to`.
	///
	/// Last-writer-wins by design; callers only ever advance the watermark to
	/// the due date of an entry they just created.
	#[tracing::instrument(skip(self), fields(template_id = %id, to = %to))]
	pub async fn advance_watermark(&self, id: &TemplateId, to: NaiveDate) -> Result<(), DbError> {
		sqlx::query(
			r#"
			UPDATE recurring_templates
			SET last_generated_on = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(to.to_string())
		.bind(Utc::now().to_rfc3339())
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		tracing::debug!(template_id = %id, watermark = %to, "watermark advanced");
		Ok(())
	}

	/// Persist edits to a template's mutable fields.
	///
	/// The watermark is deliberately not written here; it only moves through
	/// [`advance_watermark`].
	///
	/// [`advance_watermark`]: RecurringRepository::advance_watermark
	#[tracing::instrument(skip(self, template), fields(template_id = %template.id))]
	pub async fn update_template(&self, template: &RecurringTemplate) -> Result<(), DbError> {
		let result = sqlx::query(
			r#"
			UPDATE recurring_templates
			SET category_id = ?, due_day_of_month = ?, split_by = ?, is_active = ?,
			    amount_encrypted = ?, description_encrypted = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(template.category_id.map(|id| id.to_string()))
		.bind(template.due_day_of_month as i64)
		.bind(template.split_by.map(|v| v as i64))
		.bind(template.is_active)
		.bind(serde_json::to_string(&template.amount_encrypted)?)
		.bind(serde_json::to_string(&template.description_encrypted)?)
		.bind(Utc::now().to_rfc3339())
		.bind(template.id.to_string())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("template {}", template.id)));
		}
		Ok(())
	}

	/// Delete a template.
	///
	/// Entries generated from it survive with their source reference cleared.
	///
	/// # Returns
	/// `true` if a row was deleted.
	#[tracing::instrument(skip(self), fields(template_id = %id))]
	pub async fn delete_template(&self, id: &TemplateId) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM recurring_templates WHERE id = ?")
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		let deleted = result.rows_affected() > 0;
		if deleted {
			tracing::info!(template_id = %id, "recurring template deleted");
		}
		Ok(deleted)
	}
}

fn parse_template_row(row: &sqlx::sqlite::SqliteRow) -> Result<RecurringTemplate, DbError> {
	let id_str: String = row.get("id");
	let user_id_str: String = row.get("user_id");
	let kind_str: String = row.get("kind");
	let category_id_str: Option<String> = row.get("category_id");
	let due_day_of_month: i64 = row.get("due_day_of_month");
	let split_by: Option<i64> = row.get("split_by");
	let is_active: bool = row.get("is_active");
	let last_generated_on_str: Option<String> = row.get("last_generated_on");
	let amount_encrypted_str: String = row.get("amount_encrypted");
	let description_encrypted_str: String = row.get("description_encrypted");
	let created_at_str: String = row.get("created_at");
	let updated_at_str: String = row.get("updated_at");

	let kind: LedgerKind = kind_str
		.parse()
		.map_err(|e: String| DbError::Internal(format!("Invalid kind: {e}")))?;

	Ok(RecurringTemplate {
		id: TemplateId(parse_uuid("template id", &id_str)?),
		user_id: UserId(parse_uuid("user_id", &user_id_str)?),
		kind,
		category_id: parse_uuid_opt("category_id", category_id_str)?.map(CategoryId),
		due_day_of_month: due_day_of_month as u32,
		split_by: split_by.map(|v| v as u32),
		is_active,
		last_generated_on: parse_date_opt("last_generated_on", last_generated_on_str)?,
		amount_encrypted: parse_json("amount_encrypted", &amount_encrypted_str)?,
		description_encrypted: parse_json("description_encrypted", &description_encrypted_str)?,
		created_at: parse_datetime("created_at", &created_at_str)?,
		updated_at: parse_datetime("updated_at", &updated_at_str)?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{create_migrated_pool, seed_user};
	use crate::user::UserRepository;
	use serde_json::json;

	fn new_template(user_id: UserId, kind: LedgerKind) -> NewRecurringTemplate {
		NewRecurringTemplate {
			user_id,
			kind,
			category_id: None,
			due_day_of_month: 15,
			split_by: None,
			is_active: true,
			amount_encrypted: json!({"iv": "aWk=", "tag": "dGFn", "cipher": "Y2lwaGVy", "type": "number"}),
			description_encrypted: json!({"iv": "aWk=", "tag": "dGFn", "cipher": "Y2lwaGVy", "type": "string"}),
		}
	}

	#[tokio::test]
	async fn test_create_and_get_template() {
		let pool = create_migrated_pool().await;
		let user_id = seed_user(&pool).await;
		let repo = RecurringRepository::new(pool);

		let created = repo
			.create_template(new_template(user_id, LedgerKind::Expense))
			.await
			.unwrap();

		let fetched = repo.get_template(&created.id).await.unwrap().unwrap();
		assert_eq!(fetched.user_id, user_id);
		assert_eq!(fetched.kind, LedgerKind::Expense);
		assert_eq!(fetched.due_day_of_month, 15);
		assert!(fetched.is_active);
		assert!(fetched.last_generated_on.is_none());
		assert_eq!(fetched.amount_encrypted["type"], "number");
	}

	#[tokio::test]
	async fn test_list_active_filters_kind_and_state() {
		let pool = create_migrated_pool().await;
		let user_id = seed_user(&pool).await;
		let repo = RecurringRepository::new(pool);

		let active = repo
			.create_template(new_template(user_id, LedgerKind::Expense))
			.await
			.unwrap();
		repo.create_template(new_template(user_id, LedgerKind::Income))
			.await
			.unwrap();

		let mut paused = repo
			.create_template(new_template(user_id, LedgerKind::Expense))
			.await
			.unwrap();
		paused.is_active = false;
		repo.update_template(&paused).await.unwrap();

		let listed = repo
			.list_active_templates(&user_id, LedgerKind::Expense)
			.await
			.unwrap();
		assert_eq!(listed.len(), 1);
		assert_eq!(listed[0].id, active.id);

		// The full listing still shows the paused template.
		let all = repo
			.list_templates_for_user(&user_id, LedgerKind::Expense)
			.await
			.unwrap();
		assert_eq!(all.len(), 2);
	}

	#[tokio::test]
	async fn test_advance_watermark_persists() {
		let pool = create_migrated_pool().await;
		let user_id = seed_user(&pool).await;
		let repo = RecurringRepository::new(pool);

		let template = repo
			.create_template(new_template(user_id, LedgerKind::Income))
			.await
			.unwrap();

		let due = NaiveDate::from_ymd_opt(2025, 2, 28).unwrap();
		repo.advance_watermark(&template.id, due).await.unwrap();

		let fetched = repo.get_template(&template.id).await.unwrap().unwrap();
		assert_eq!(fetched.last_generated_on, Some(due));
	}

	#[tokio::test]
	async fn test_update_does_not_touch_watermark() {
		let pool = create_migrated_pool().await;
		let user_id = seed_user(&pool).await;
		let repo = RecurringRepository::new(pool);

		let mut template = repo
			.create_template(new_template(user_id, LedgerKind::Expense))
			.await
			.unwrap();
		let due = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
		repo.advance_watermark(&template.id, due).await.unwrap();

		template.due_day_of_month = 28;
		repo.update_template(&template).await.unwrap();

		let fetched = repo.get_template(&template.id).await.unwrap().unwrap();
		assert_eq!(fetched.due_day_of_month, 28);
		assert_eq!(fetched.last_generated_on, Some(due));
	}

	#[tokio::test]
	async fn test_update_missing_template_is_not_found() {
		let pool = create_migrated_pool().await;
		let user_id = seed_user(&pool).await;
		let repo = RecurringRepository::new(pool.clone());

		let mut template = repo
			.create_template(new_template(user_id, LedgerKind::Expense))
			.await
			.unwrap();
		repo.delete_template(&template.id).await.unwrap();

		template.due_day_of_month = 3;
		let result = repo.update_template(&template).await;
		assert!(matches!(result, Err(DbError::NotFound(_))));
	}

	#[tokio::test]
	async fn test_delete_template() {
		let pool = create_migrated_pool().await;
		let user_id = seed_user(&pool).await;
		let repo = RecurringRepository::new(pool);

		let template = repo
			.create_template(new_template(user_id, LedgerKind::Expense))
			.await
			.unwrap();

		assert!(repo.delete_template(&template.id).await.unwrap());
		assert!(!repo.delete_template(&template.id).await.unwrap());
		assert!(repo.get_template(&template.id).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_active_templates_feed_user_work_list() {
		let pool = create_migrated_pool().await;
		let user_id = seed_user(&pool).await;
		let other_user = seed_user(&pool).await;

		let recurring = RecurringRepository::new(pool.clone());
		let users = UserRepository::new(pool);

		recurring
			.create_template(new_template(user_id, LedgerKind::Income))
			.await
			.unwrap();

		let ids = users.users_with_active_templates().await.unwrap();
		assert_eq!(ids, vec![user_id]);
		assert!(!ids.contains(&other_user));
	}
}
