// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Generate-once materialization of recurring templates.
//!
//! For every active template the materializer projects the due dates owed
//! since the template's watermark and creates one ledger entry per date,
//! advancing the watermark after each create:
//!
//! ```text
//! template ──project──▶ [due₁, due₂, …]
//!    for each dueᵢ:  create entry(dueᵢ) ──then──▶ watermark = dueᵢ
//! ```
//!
//! The create-then-advance order makes an interrupted run resumable: the
//! watermark only ever covers entries that exist. A crash between the two
//! steps leaves one entry ahead of the watermark, which a retry recreates —
//! one duplicate, tolerated rather than locked against. The same tolerance
//! covers the request-time and scheduler-time paths racing each other.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use till_ledger_core::{LedgerKind, NewLedgerEntry, RecurringTemplate, UserId};
use till_server_db::{DbError, EntryStore, RecurringStore};

/// What one materialization pass did for one user and kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeOutcome {
	/// Ledger entries created across all templates.
	pub entries_created: usize,
	/// Templates whose catch-up loop aborted on a persistence error.
	pub templates_failed: usize,
}

/// Projects recurring templates into concrete ledger entries.
///
/// Cheap to clone; both the read-path service and the background worker hold
/// their own copy over the same stores.
#[derive(Clone)]
pub struct Materializer {
	templates: Arc<dyn RecurringStore>,
	entries: Arc<dyn EntryStore>,
}

impl Materializer {
	pub fn new(templates: Arc<dyn RecurringStore>, entries: Arc<dyn EntryStore>) -> Self {
		Self { templates, entries }
	}

	/// Materializes everything owed up to today for one user and kind.
	pub async fn materialize(
		&self,
		user_id: &UserId,
		kind: LedgerKind,
	) -> Result<MaterializeOutcome, DbError> {
		self.materialize_as_of(user_id, kind, Utc::now().date_naive())
			.await
	}

	/// Materialization with an explicit "today".
	///
	/// Failing to load the work list is the only propagated error. A failure
	/// inside one template's catch-up loop aborts that template, is logged,
	/// and leaves the rest of the batch untouched.
	#[tracing::instrument(skip(self), fields(user_id = %user_id, kind = %kind, today = %today))]
	pub async fn materialize_as_of(
		&self,
		user_id: &UserId,
		kind: LedgerKind,
		today: NaiveDate,
	) -> Result<MaterializeOutcome, DbError> {
		let templates = self.templates.list_active_templates(user_id, kind).await?;

		let mut outcome = MaterializeOutcome::default();
		for template in templates {
			let (created, error) = self.catch_up(&template, today).await;
			outcome.entries_created += created;
			if let Some(error) = error {
				outcome.templates_failed += 1;
				tracing::error!(
					template_id = %template.id,
					error = %error,
					"materialization aborted for template, continuing with the rest"
				);
			}
		}

		if outcome.entries_created > 0 {
			tracing::info!(
				entries_created = outcome.entries_created,
				"materialized recurring entries"
			);
		}
		Ok(outcome)
	}

	/// Creates one entry per overdue date, oldest first.
	///
	/// Each overdue month gets its own dated entry; a template dormant for
	/// three months posts three entries, never a lump sum.
	///
	/// Returns the entries created before any error, so an interrupted
	/// catch-up still reports the entries it did post.
	async fn catch_up(
		&self,
		template: &RecurringTemplate,
		today: NaiveDate,
	) -> (usize, Option<DbError>) {
		let mut created = 0;
		for due in template.due_dates_up_to(today) {
			let entry = NewLedgerEntry {
				user_id: template.user_id,
				kind: template.kind,
				category_id: template.category_id,
				occurred_on: due,
				split_by: template.split_by,
				recurring_source_id: Some(template.id),
				amount_encrypted: template.amount_encrypted.clone(),
				impact_amount_encrypted: None,
				description_encrypted: template.description_encrypted.clone(),
			};
			// create before advancing: the watermark must never cover a date
			// without an entry
			if let Err(error) = self.entries.create_entry(entry).await {
				return (created, Some(error));
			}
			created += 1;
			if let Err(error) = self.templates.advance_watermark(&template.id, due).await {
				return (created, Some(error));
			}
		}
		(created, None)
	}
}
