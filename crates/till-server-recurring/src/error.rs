// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use http::StatusCode;
use till_common_crypto::CryptoError;
use till_ledger_core::ValidationError;
use till_server_db::DbError;

pub type Result<T> = std::result::Result<T, LedgerServiceError>;

/// Errors surfaced by the ledger and template services.
///
/// Not-found covers both missing rows and rows owned by someone else, so a
/// response never reveals whether a foreign id exists.
#[derive(Debug, thiserror::Error)]
pub enum LedgerServiceError {
	#[error(transparent)]
	Validation(#[from] ValidationError),

	#[error("Entry not found")]
	EntryNotFound,

	#[error("Recurring template not found")]
	TemplateNotFound,

	/// Entries materialized from a template reject direct edits; the
	/// template is the single source of truth for future postings.
	#[error("Recurring entries cannot be edited")]
	GeneratedImmutable,

	#[error("Database error: {0}")]
	Db(#[from] DbError),

	#[error("Encryption error: {0}")]
	Crypto(#[from] CryptoError),
}

impl LedgerServiceError {
	pub fn status(&self) -> StatusCode {
		match self {
			LedgerServiceError::Validation(_) => StatusCode::BAD_REQUEST,
			LedgerServiceError::EntryNotFound | LedgerServiceError::TemplateNotFound => {
				StatusCode::NOT_FOUND
			}
			LedgerServiceError::GeneratedImmutable => StatusCode::CONFLICT,
			LedgerServiceError::Db(_) | LedgerServiceError::Crypto(_) => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		}
	}

	/// Message safe to return to a client. Server-side failures collapse to
	/// a generic string so internals never leak.
	pub fn client_message(&self) -> String {
		if self.status().is_server_error() {
			"Internal server error".to_string()
		} else {
			self.to_string()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_codes_separate_client_and_server_faults() {
		assert_eq!(
			LedgerServiceError::EntryNotFound.status(),
			StatusCode::NOT_FOUND
		);
		assert_eq!(
			LedgerServiceError::GeneratedImmutable.status(),
			StatusCode::CONFLICT
		);
		assert_eq!(
			LedgerServiceError::Db(DbError::Internal("oops".to_string())).status(),
			StatusCode::INTERNAL_SERVER_ERROR
		);
	}

	#[test]
	fn immutable_edit_message_is_stable() {
		assert_eq!(
			LedgerServiceError::GeneratedImmutable.to_string(),
			"Recurring entries cannot be edited"
		);
	}

	#[test]
	fn server_errors_collapse_to_generic_message() {
		let err = LedgerServiceError::Db(DbError::Internal("connection refused".to_string()));
		assert_eq!(err.client_message(), "Internal server error");
		assert_eq!(
			LedgerServiceError::EntryNotFound.client_message(),
			"Entry not found"
		);
	}
}
