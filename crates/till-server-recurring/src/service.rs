// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ledger read/write service.
//!
//! Listing materializes first: any recurring postings owed up to today are
//! created before the query runs, so readers see fresh data even when the
//! background scheduler is down or lagging. Everything crossing this
//! boundary is decrypted on the way out and encrypted on the way in; the
//! stores below only ever see opaque payloads.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use till_common_crypto::RecordCipher;
use till_ledger_core::{
	CategoryId, EntryDraft, EntryId, EntryUpdate, LedgerEntry, LedgerKind, NewLedgerEntry,
	NewRecurringTemplate, RecurringTemplate, TemplateDraft, TemplateId, TemplateUpdate, UserId,
};
use till_server_db::{EntryFilter, EntryStore, RecurringStore, DEFAULT_LIST_LIMIT};

use crate::error::{LedgerServiceError, Result};
use crate::materializer::Materializer;

/// Listing parameters for ledger entries.
#[derive(Debug, Clone, Default)]
pub struct EntryQuery {
	/// Inclusive lower bound on the entry date.
	pub from: Option<NaiveDate>,
	/// Inclusive upper bound on the entry date.
	pub to: Option<NaiveDate>,
	/// Row cap; clamped to the default limit.
	pub limit: Option<i64>,
}

impl EntryQuery {
	fn to_filter(&self) -> EntryFilter {
		EntryFilter {
			from: self.from,
			to: self.to,
			limit: self
				.limit
				.unwrap_or(DEFAULT_LIST_LIMIT)
				.clamp(1, DEFAULT_LIST_LIMIT),
		}
	}
}

/// A ledger entry with its encrypted fields resolved to plaintext.
#[derive(Debug, Clone, Serialize)]
pub struct EntryView {
	pub id: EntryId,
	pub kind: LedgerKind,
	pub occurred_on: NaiveDate,
	pub category_id: Option<CategoryId>,
	pub split_by: Option<u32>,
	pub amount: Decimal,
	pub impact_amount: Option<Decimal>,
	pub description: String,
	/// True when the entry was materialized from a recurring template. Such
	/// entries reject direct edits.
	pub is_generated: bool,
	pub created_at: DateTime<Utc>,
}

/// A recurring template with its encrypted fields resolved to plaintext.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateView {
	pub id: TemplateId,
	pub kind: LedgerKind,
	pub category_id: Option<CategoryId>,
	pub due_day_of_month: u32,
	pub split_by: Option<u32>,
	pub is_active: bool,
	pub last_generated_on: Option<NaiveDate>,
	pub amount: Decimal,
	pub description: String,
	pub created_at: DateTime<Utc>,
}

/// Entry and template operations for one ledger kind at a time.
pub struct LedgerService {
	materializer: Materializer,
	templates: Arc<dyn RecurringStore>,
	entries: Arc<dyn EntryStore>,
	cipher: Arc<dyn RecordCipher>,
}

impl LedgerService {
	pub fn new(
		templates: Arc<dyn RecurringStore>,
		entries: Arc<dyn EntryStore>,
		cipher: Arc<dyn RecordCipher>,
	) -> Self {
		let materializer = Materializer::new(Arc::clone(&templates), Arc::clone(&entries));
		Self {
			materializer,
			templates,
			entries,
			cipher,
		}
	}

	/// The materializer this service runs on its read path, shared with the
	/// background worker.
	pub fn materializer(&self) -> &Materializer {
		&self.materializer
	}

	/// Lists entries newest first, materializing overdue recurring postings
	/// before the query so the listing is current.
	#[tracing::instrument(skip(self, query), fields(user_id = %user_id, kind = %kind))]
	pub async fn list_entries(
		&self,
		user_id: &UserId,
		kind: LedgerKind,
		query: &EntryQuery,
	) -> Result<Vec<EntryView>> {
		self.materializer.materialize(user_id, kind).await?;

		let entries = self
			.entries
			.list_entries(user_id, kind, &query.to_filter())
			.await?;
		Ok(entries.iter().map(|entry| self.entry_view(entry)).collect())
	}

	/// Creates a manual ledger entry from plaintext input.
	#[tracing::instrument(skip(self, draft), fields(user_id = %user_id, kind = %kind))]
	pub async fn create_entry(
		&self,
		user_id: &UserId,
		kind: LedgerKind,
		draft: &EntryDraft,
	) -> Result<EntryView> {
		draft.validate(kind)?;

		let impact_encrypted = match draft.impact_amount {
			Some(impact) => Some(self.cipher.encrypt_amount(impact)?.to_value()),
			None => None,
		};
		let entry = NewLedgerEntry {
			user_id: *user_id,
			kind,
			category_id: draft.category_id,
			occurred_on: draft.occurred_on,
			split_by: None,
			recurring_source_id: None,
			amount_encrypted: self.cipher.encrypt_amount(draft.amount)?.to_value(),
			impact_amount_encrypted: impact_encrypted,
			description_encrypted: self.cipher.encrypt_string(&draft.description)?.to_value(),
		};

		let created = self.entries.create_entry(entry).await?;
		Ok(self.entry_view(&created))
	}

	/// Applies a partial edit to a manual entry.
	///
	/// Generated entries are rejected outright; their template is the only
	/// way to change future postings, and history stays as posted.
	#[tracing::instrument(skip(self, update), fields(user_id = %user_id, entry_id = %id))]
	pub async fn update_entry(
		&self,
		user_id: &UserId,
		kind: LedgerKind,
		id: &EntryId,
		update: &EntryUpdate,
	) -> Result<EntryView> {
		let mut entry = self.owned_entry(user_id, kind, id).await?;
		if entry.is_generated() {
			return Err(LedgerServiceError::GeneratedImmutable);
		}
		if update.is_empty() {
			return Ok(self.entry_view(&entry));
		}
		update.validate(kind)?;

		if let Some(occurred_on) = update.occurred_on {
			entry.occurred_on = occurred_on;
		}
		if let Some(category_id) = update.category_id {
			entry.category_id = Some(category_id);
		}
		if let Some(amount) = update.amount {
			entry.amount_encrypted = self.cipher.encrypt_amount(amount)?.to_value();
		}
		if let Some(impact) = update.impact_amount {
			entry.impact_amount_encrypted = Some(self.cipher.encrypt_amount(impact)?.to_value());
		}
		if let Some(description) = &update.description {
			entry.description_encrypted = self.cipher.encrypt_string(description)?.to_value();
		}

		self.entries.update_entry(&entry).await?;
		Ok(self.entry_view(&entry))
	}

	/// Deletes an entry. Generated entries may be deleted; this is how a
	/// duplicate from the known materialization race gets cleaned up.
	#[tracing::instrument(skip(self), fields(user_id = %user_id, entry_id = %id))]
	pub async fn delete_entry(
		&self,
		user_id: &UserId,
		kind: LedgerKind,
		id: &EntryId,
	) -> Result<()> {
		let entry = self.owned_entry(user_id, kind, id).await?;
		self.entries.delete_entry(&entry.id).await?;
		Ok(())
	}

	/// Creates a recurring template from plaintext input.
	///
	/// The template starts without a watermark; its first materialization
	/// pass seeds postings from the current month.
	#[tracing::instrument(skip(self, draft), fields(user_id = %user_id, kind = %kind))]
	pub async fn create_template(
		&self,
		user_id: &UserId,
		kind: LedgerKind,
		draft: &TemplateDraft,
	) -> Result<TemplateView> {
		draft.validate(kind)?;

		let template = NewRecurringTemplate {
			user_id: *user_id,
			kind,
			category_id: match kind {
				LedgerKind::Expense => draft.category_id,
				LedgerKind::Income => None,
			},
			due_day_of_month: draft.due_day(),
			split_by: match kind {
				LedgerKind::Expense => Some(draft.split()),
				LedgerKind::Income => None,
			},
			is_active: draft.is_active,
			amount_encrypted: self.cipher.encrypt_amount(draft.amount)?.to_value(),
			description_encrypted: self.cipher.encrypt_string(&draft.description)?.to_value(),
		};

		let created = self.templates.create_template(template).await?;
		Ok(self.template_view(&created))
	}

	/// Lists the user's templates of one kind, paused ones included.
	pub async fn list_templates(
		&self,
		user_id: &UserId,
		kind: LedgerKind,
	) -> Result<Vec<TemplateView>> {
		let templates = self.templates.list_templates_for_user(user_id, kind).await?;
		Ok(templates
			.iter()
			.map(|template| self.template_view(template))
			.collect())
	}

	/// Applies a partial edit to a template.
	///
	/// The watermark is untouched: edits change what future materialization
	/// produces, never what already posted.
	#[tracing::instrument(skip(self, update), fields(user_id = %user_id, template_id = %id))]
	pub async fn update_template(
		&self,
		user_id: &UserId,
		kind: LedgerKind,
		id: &TemplateId,
		update: &TemplateUpdate,
	) -> Result<TemplateView> {
		let mut template = self.owned_template(user_id, kind, id).await?;
		if update.is_empty() {
			return Ok(self.template_view(&template));
		}
		update.validate(kind)?;

		if let Some(category_id) = update.category_id {
			template.category_id = Some(category_id);
		}
		if let Some(amount) = update.amount {
			template.amount_encrypted = self.cipher.encrypt_amount(amount)?.to_value();
		}
		if let Some(description) = &update.description {
			template.description_encrypted = self.cipher.encrypt_string(description)?.to_value();
		}
		if let Some(due_day) = update.due_day_of_month {
			template.due_day_of_month = due_day;
		}
		if let Some(split_by) = update.split_by {
			template.split_by = Some(split_by);
		}
		if let Some(is_active) = update.is_active {
			template.is_active = is_active;
		}

		self.templates.update_template(&template).await?;
		Ok(self.template_view(&template))
	}

	/// Deletes a template. Entries already generated from it survive with
	/// their source reference cleared.
	#[tracing::instrument(skip(self), fields(user_id = %user_id, template_id = %id))]
	pub async fn delete_template(
		&self,
		user_id: &UserId,
		kind: LedgerKind,
		id: &TemplateId,
	) -> Result<()> {
		let template = self.owned_template(user_id, kind, id).await?;
		self.templates.delete_template(&template.id).await?;
		Ok(())
	}

	/// Fetches an entry, treating other users' rows and kind mismatches as
	/// absent.
	async fn owned_entry(
		&self,
		user_id: &UserId,
		kind: LedgerKind,
		id: &EntryId,
	) -> Result<LedgerEntry> {
		let entry = self
			.entries
			.get_entry(id)
			.await?
			.ok_or(LedgerServiceError::EntryNotFound)?;
		if entry.user_id != *user_id || entry.kind != kind {
			return Err(LedgerServiceError::EntryNotFound);
		}
		Ok(entry)
	}

	async fn owned_template(
		&self,
		user_id: &UserId,
		kind: LedgerKind,
		id: &TemplateId,
	) -> Result<RecurringTemplate> {
		let template = self
			.templates
			.get_template(id)
			.await?
			.ok_or(LedgerServiceError::TemplateNotFound)?;
		if template.user_id != *user_id || template.kind != kind {
			return Err(LedgerServiceError::TemplateNotFound);
		}
		Ok(template)
	}

	fn entry_view(&self, entry: &LedgerEntry) -> EntryView {
		EntryView {
			id: entry.id,
			kind: entry.kind,
			occurred_on: entry.occurred_on,
			category_id: entry.category_id,
			split_by: entry.split_by,
			amount: self.cipher.decrypt_amount(&entry.amount_encrypted, Decimal::ZERO),
			impact_amount: entry
				.impact_amount_encrypted
				.as_ref()
				.map(|payload| self.cipher.decrypt_amount(payload, Decimal::ZERO)),
			description: self.cipher.decrypt_string(&entry.description_encrypted, ""),
			is_generated: entry.is_generated(),
			created_at: entry.created_at,
		}
	}

	fn template_view(&self, template: &RecurringTemplate) -> TemplateView {
		TemplateView {
			id: template.id,
			kind: template.kind,
			category_id: template.category_id,
			due_day_of_month: template.due_day_of_month,
			split_by: template.split_by,
			is_active: template.is_active,
			last_generated_on: template.last_generated_on,
			amount: self.cipher.decrypt_amount(&template.amount_encrypted, Decimal::ZERO),
			description: self.cipher.decrypt_string(&template.description_encrypted, ""),
			created_at: template.created_at,
		}
	}
}
