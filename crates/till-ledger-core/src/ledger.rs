// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ledger records: recurring templates and materialized entries.
//!
//! Monetary amounts and descriptions are carried as opaque encrypted payloads
//! (`serde_json::Value`); this crate never looks inside them. Encryption and
//! decryption happen at the service boundary.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::ids::{CategoryId, EntryId, TemplateId, UserId};
use crate::schedule::{due_dates_up_to, DueDates};
use crate::validate::{
	FieldIssue, ValidationError, DEFAULT_DUE_DAY, DEFAULT_SPLIT_BY, MAX_DESCRIPTION_LEN,
	MAX_DUE_DAY, MAX_SPLIT_BY,
};

/// Which side of the ledger a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
	Expense,
	Income,
}

impl LedgerKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			LedgerKind::Expense => "expense",
			LedgerKind::Income => "income",
		}
	}
}

impl fmt::Display for LedgerKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl FromStr for LedgerKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"expense" => Ok(LedgerKind::Expense),
			"income" => Ok(LedgerKind::Income),
			_ => Err(format!("invalid ledger kind: {}", s)),
		}
	}
}

/// A recurring-transaction template.
///
/// `last_generated_on` is the materialization watermark: once set it always
/// equals the due date of the most recently created entry from this template.
/// It never points into the future and is never moved backwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringTemplate {
	pub id: TemplateId,
	pub user_id: UserId,
	pub kind: LedgerKind,
	/// Expense templates only.
	pub category_id: Option<CategoryId>,
	/// Nominal posting day, clamped to shorter months at projection time.
	pub due_day_of_month: u32,
	/// Expense templates only; divisor for shared costs.
	pub split_by: Option<u32>,
	pub is_active: bool,
	pub last_generated_on: Option<NaiveDate>,
	pub amount_encrypted: Value,
	pub description_encrypted: Value,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl RecurringTemplate {
	/// Projects the due dates this template owes up to `today`, starting
	/// from its current watermark.
	pub fn due_dates_up_to(&self, today: NaiveDate) -> DueDates {
		due_dates_up_to(self.last_generated_on, self.due_day_of_month, today)
	}
}

/// A concrete dated ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
	pub id: EntryId,
	pub user_id: UserId,
	pub kind: LedgerKind,
	pub category_id: Option<CategoryId>,
	pub occurred_on: NaiveDate,
	pub split_by: Option<u32>,
	/// Set when this entry was materialized from a template. Non-owning,
	/// lookup-only.
	pub recurring_source_id: Option<TemplateId>,
	pub amount_encrypted: Value,
	pub impact_amount_encrypted: Option<Value>,
	pub description_encrypted: Value,
	pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
	/// Entries created by materialization are immutable via direct edit;
	/// only their template may change future postings.
	pub fn is_generated(&self) -> bool {
		self.recurring_source_id.is_some()
	}
}

/// Insert payload for a ledger entry, with fields already encrypted.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
	pub user_id: UserId,
	pub kind: LedgerKind,
	pub category_id: Option<CategoryId>,
	pub occurred_on: NaiveDate,
	pub split_by: Option<u32>,
	pub recurring_source_id: Option<TemplateId>,
	pub amount_encrypted: Value,
	pub impact_amount_encrypted: Option<Value>,
	pub description_encrypted: Value,
}

/// Insert payload for a recurring template, with fields already encrypted.
#[derive(Debug, Clone)]
pub struct NewRecurringTemplate {
	pub user_id: UserId,
	pub kind: LedgerKind,
	pub category_id: Option<CategoryId>,
	pub due_day_of_month: u32,
	pub split_by: Option<u32>,
	pub is_active: bool,
	pub amount_encrypted: Value,
	pub description_encrypted: Value,
}

/// Plaintext input for creating or editing a ledger entry, before
/// encryption.
#[derive(Debug, Clone, Deserialize)]
pub struct EntryDraft {
	pub occurred_on: NaiveDate,
	pub category_id: Option<CategoryId>,
	pub amount: Decimal,
	pub impact_amount: Option<Decimal>,
	pub description: String,
}

impl EntryDraft {
	/// Validates the draft for the given ledger kind, collecting every
	/// violated constraint rather than stopping at the first.
	pub fn validate(&self, kind: LedgerKind) -> Result<(), ValidationError> {
		let mut issues = Vec::new();
		if self.amount <= Decimal::ZERO {
			issues.push(FieldIssue::new("amount", "must be a positive amount"));
		}
		if let Some(impact) = self.impact_amount {
			if impact <= Decimal::ZERO {
				issues.push(FieldIssue::new("impact_amount", "must be a positive amount"));
			}
		}
		if self.description.is_empty() {
			issues.push(FieldIssue::new("description", "must not be empty"));
		} else if self.description.chars().count() > MAX_DESCRIPTION_LEN {
			issues.push(FieldIssue::new("description", "must be 120 characters or fewer"));
		}
		if kind == LedgerKind::Income && self.category_id.is_some() {
			issues.push(FieldIssue::new("category_id", "not allowed for income entries"));
		}
		ValidationError::from_issues(issues)
	}
}

/// Plaintext input for creating a recurring template, before encryption.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateDraft {
	pub category_id: Option<CategoryId>,
	pub amount: Decimal,
	pub description: String,
	pub due_day_of_month: Option<u32>,
	pub split_by: Option<u32>,
	#[serde(default = "default_active")]
	pub is_active: bool,
}

fn default_active() -> bool {
	true
}

impl TemplateDraft {
	/// Nominal due day with the schema default applied.
	pub fn due_day(&self) -> u32 {
		self.due_day_of_month.unwrap_or(DEFAULT_DUE_DAY)
	}

	/// Split divisor with the schema default applied; only meaningful for
	/// expense templates.
	pub fn split(&self) -> u32 {
		self.split_by.unwrap_or(DEFAULT_SPLIT_BY)
	}

	pub fn validate(&self, kind: LedgerKind) -> Result<(), ValidationError> {
		let mut issues = Vec::new();
		if self.amount <= Decimal::ZERO {
			issues.push(FieldIssue::new("amount", "must be a positive amount"));
		}
		if self.description.is_empty() {
			issues.push(FieldIssue::new("description", "must not be empty"));
		} else if self.description.chars().count() > MAX_DESCRIPTION_LEN {
			issues.push(FieldIssue::new("description", "must be 120 characters or fewer"));
		}
		if let Some(day) = self.due_day_of_month {
			if !(1..=MAX_DUE_DAY).contains(&day) {
				issues.push(FieldIssue::new("due_day_of_month", "must be between 1 and 31"));
			}
		}
		match kind {
			LedgerKind::Expense => {
				if let Some(split) = self.split_by {
					if !(1..=MAX_SPLIT_BY).contains(&split) {
						issues.push(FieldIssue::new("split_by", "must be between 1 and 10"));
					}
				}
			}
			LedgerKind::Income => {
				if self.category_id.is_some() {
					issues.push(FieldIssue::new("category_id", "not allowed for income templates"));
				}
				if self.split_by.is_some() {
					issues.push(FieldIssue::new("split_by", "not allowed for income templates"));
				}
			}
		}
		ValidationError::from_issues(issues)
	}
}

/// Partial edit to a ledger entry. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryUpdate {
	pub occurred_on: Option<NaiveDate>,
	pub category_id: Option<CategoryId>,
	pub amount: Option<Decimal>,
	pub impact_amount: Option<Decimal>,
	pub description: Option<String>,
}

impl EntryUpdate {
	pub fn is_empty(&self) -> bool {
		self.occurred_on.is_none()
			&& self.category_id.is_none()
			&& self.amount.is_none()
			&& self.impact_amount.is_none()
			&& self.description.is_none()
	}

	pub fn validate(&self, kind: LedgerKind) -> Result<(), ValidationError> {
		let mut issues = Vec::new();
		if let Some(amount) = self.amount {
			if amount <= Decimal::ZERO {
				issues.push(FieldIssue::new("amount", "must be a positive amount"));
			}
		}
		if let Some(impact) = self.impact_amount {
			if impact <= Decimal::ZERO {
				issues.push(FieldIssue::new("impact_amount", "must be a positive amount"));
			}
		}
		if let Some(description) = &self.description {
			if description.is_empty() {
				issues.push(FieldIssue::new("description", "must not be empty"));
			} else if description.chars().count() > MAX_DESCRIPTION_LEN {
				issues.push(FieldIssue::new("description", "must be 120 characters or fewer"));
			}
		}
		if kind == LedgerKind::Income {
			if self.category_id.is_some() {
				issues.push(FieldIssue::new("category_id", "not allowed for income entries"));
			}
			if self.impact_amount.is_some() {
				issues.push(FieldIssue::new("impact_amount", "not allowed for income entries"));
			}
		}
		ValidationError::from_issues(issues)
	}
}

/// Partial edit to a recurring template. Absent fields keep their stored
/// value; a set category cannot be cleared through this path.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateUpdate {
	pub category_id: Option<CategoryId>,
	pub amount: Option<Decimal>,
	pub description: Option<String>,
	pub due_day_of_month: Option<u32>,
	pub split_by: Option<u32>,
	pub is_active: Option<bool>,
}

impl TemplateUpdate {
	pub fn is_empty(&self) -> bool {
		self.category_id.is_none()
			&& self.amount.is_none()
			&& self.description.is_none()
			&& self.due_day_of_month.is_none()
			&& self.split_by.is_none()
			&& self.is_active.is_none()
	}

	pub fn validate(&self, kind: LedgerKind) -> Result<(), ValidationError> {
		let mut issues = Vec::new();
		if let Some(amount) = self.amount {
			if amount <= Decimal::ZERO {
				issues.push(FieldIssue::new("amount", "must be a positive amount"));
			}
		}
		if let Some(description) = &self.description {
			if description.is_empty() {
				issues.push(FieldIssue::new("description", "must not be empty"));
			} else if description.chars().count() > MAX_DESCRIPTION_LEN {
				issues.push(FieldIssue::new("description", "must be 120 characters or fewer"));
			}
		}
		if let Some(day) = self.due_day_of_month {
			if !(1..=MAX_DUE_DAY).contains(&day) {
				issues.push(FieldIssue::new("due_day_of_month", "must be between 1 and 31"));
			}
		}
		match kind {
			LedgerKind::Expense => {
				if let Some(split) = self.split_by {
					if !(1..=MAX_SPLIT_BY).contains(&split) {
						issues.push(FieldIssue::new("split_by", "must be between 1 and 10"));
					}
				}
			}
			LedgerKind::Income => {
				if self.category_id.is_some() {
					issues.push(FieldIssue::new("category_id", "not allowed for income templates"));
				}
				if self.split_by.is_some() {
					issues.push(FieldIssue::new("split_by", "not allowed for income templates"));
				}
			}
		}
		ValidationError::from_issues(issues)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn draft(amount: Decimal, description: &str) -> EntryDraft {
		EntryDraft {
			occurred_on: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
			category_id: None,
			amount,
			impact_amount: None,
			description: description.to_string(),
		}
	}

	mod ledger_kind {
		use super::*;

		#[test]
		fn roundtrips_through_str() {
			assert_eq!("expense".parse::<LedgerKind>().unwrap(), LedgerKind::Expense);
			assert_eq!("income".parse::<LedgerKind>().unwrap(), LedgerKind::Income);
			assert_eq!(LedgerKind::Expense.as_str(), "expense");
			assert!("transfer".parse::<LedgerKind>().is_err());
		}
	}

	mod entry_draft {
		use super::*;

		#[test]
		fn accepts_valid_expense() {
			let draft = draft(Decimal::new(1250, 2), "Rent");
			assert!(draft.validate(LedgerKind::Expense).is_ok());
		}

		#[test]
		fn rejects_non_positive_amount() {
			let err = draft(Decimal::ZERO, "Rent")
				.validate(LedgerKind::Expense)
				.unwrap_err();
			assert!(err.issues.iter().any(|issue| issue.path == "amount"));
		}

		#[test]
		fn rejects_oversized_description() {
			let err = draft(Decimal::ONE, &"x".repeat(121))
				.validate(LedgerKind::Expense)
				.unwrap_err();
			assert!(err.issues.iter().any(|issue| issue.path == "description"));
		}

		#[test]
		fn rejects_category_on_income() {
			let mut income = draft(Decimal::ONE, "Salary");
			income.category_id = Some(CategoryId::new());
			let err = income.validate(LedgerKind::Income).unwrap_err();
			assert!(err.issues.iter().any(|issue| issue.path == "category_id"));
		}

		#[test]
		fn collects_multiple_issues() {
			let err = draft(Decimal::ZERO, "").validate(LedgerKind::Expense).unwrap_err();
			assert_eq!(err.issues.len(), 2);
		}
	}

	mod entry_update {
		use super::*;

		#[test]
		fn empty_update_is_detected() {
			assert!(EntryUpdate::default().is_empty());
			let update = EntryUpdate {
				description: Some("Groceries".to_string()),
				..Default::default()
			};
			assert!(!update.is_empty());
		}

		#[test]
		fn validates_only_present_fields() {
			let update = EntryUpdate {
				occurred_on: Some(NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()),
				..Default::default()
			};
			assert!(update.validate(LedgerKind::Expense).is_ok());

			let update = EntryUpdate {
				amount: Some(Decimal::ZERO),
				..Default::default()
			};
			assert!(update.validate(LedgerKind::Expense).is_err());
		}

		#[test]
		fn income_updates_reject_expense_fields() {
			let update = EntryUpdate {
				category_id: Some(CategoryId::new()),
				impact_amount: Some(Decimal::ONE),
				..Default::default()
			};
			let err = update.validate(LedgerKind::Income).unwrap_err();
			assert_eq!(err.issues.len(), 2);
		}
	}

	mod template_update {
		use super::*;

		#[test]
		fn accepts_partial_edit() {
			let update = TemplateUpdate {
				due_day_of_month: Some(15),
				is_active: Some(false),
				..Default::default()
			};
			assert!(update.validate(LedgerKind::Expense).is_ok());
			assert!(!update.is_empty());
		}

		#[test]
		fn rejects_out_of_range_fields() {
			let update = TemplateUpdate {
				due_day_of_month: Some(0),
				split_by: Some(11),
				..Default::default()
			};
			let err = update.validate(LedgerKind::Expense).unwrap_err();
			assert_eq!(err.issues.len(), 2);
		}
	}

	mod template_draft {
		use super::*;

		fn template(amount: Decimal) -> TemplateDraft {
			TemplateDraft {
				category_id: None,
				amount,
				description: "Gym membership".to_string(),
				due_day_of_month: None,
				split_by: None,
				is_active: true,
			}
		}

		#[test]
		fn defaults_apply() {
			let draft = template(Decimal::ONE);
			assert_eq!(draft.due_day(), 1);
			assert_eq!(draft.split(), 1);
			assert!(draft.validate(LedgerKind::Expense).is_ok());
		}

		#[test]
		fn rejects_due_day_out_of_range() {
			let mut draft = template(Decimal::ONE);
			draft.due_day_of_month = Some(32);
			let err = draft.validate(LedgerKind::Expense).unwrap_err();
			assert!(err.issues.iter().any(|issue| issue.path == "due_day_of_month"));

			draft.due_day_of_month = Some(0);
			assert!(draft.validate(LedgerKind::Expense).is_err());
		}

		#[test]
		fn rejects_split_out_of_range() {
			let mut draft = template(Decimal::ONE);
			draft.split_by = Some(11);
			let err = draft.validate(LedgerKind::Expense).unwrap_err();
			assert!(err.issues.iter().any(|issue| issue.path == "split_by"));
		}

		#[test]
		fn income_templates_reject_expense_fields() {
			let mut draft = template(Decimal::ONE);
			draft.category_id = Some(CategoryId::new());
			draft.split_by = Some(2);
			let err = draft.validate(LedgerKind::Income).unwrap_err();
			assert_eq!(err.issues.len(), 2);
		}
	}

	#[test]
	fn generated_flag_follows_source_reference() {
		let entry = LedgerEntry {
			id: EntryId::new(),
			user_id: UserId::new(),
			kind: LedgerKind::Expense,
			category_id: None,
			occurred_on: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
			split_by: None,
			recurring_source_id: Some(TemplateId::new()),
			amount_encrypted: serde_json::json!({}),
			impact_amount_encrypted: None,
			description_encrypted: serde_json::json!({}),
			created_at: Utc::now(),
		};
		assert!(entry.is_generated());
	}
}
