// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core ledger domain for Till.
//!
//! This crate holds the persistence-free heart of the recurring-transaction
//! engine: typed identifiers, ledger records, the API scope enumeration, input
//! validation, and the pure due-date projection used by both the request-time
//! and background materialization paths.

pub mod api_key;
pub mod ids;
pub mod ledger;
pub mod schedule;
pub mod scope;
pub mod user;
pub mod validate;

pub use api_key::ApiKey;
pub use ids::{ApiKeyId, CategoryId, EntryId, TemplateId, UserId};
pub use ledger::{
	EntryDraft, EntryUpdate, LedgerEntry, LedgerKind, NewLedgerEntry, NewRecurringTemplate,
	RecurringTemplate, TemplateDraft, TemplateUpdate,
};
pub use schedule::{clamp_to_month, days_in_month, due_dates_up_to, DueDates};
pub use scope::{normalize_scopes, scopes_to_strings, ApiScope};
pub use user::{User, DEFAULT_CURRENCY};
pub use validate::{FieldIssue, ValidationError};
