// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Structured input validation.
//!
//! Validation failures carry a list of field-level issues so callers can map
//! them to a 400 response body without losing which fields were wrong.

use serde::Serialize;
use thiserror::Error;

/// Longest accepted description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 120;
/// Highest nominal due day a template may declare.
pub const MAX_DUE_DAY: u32 = 31;
/// Largest accepted split divisor.
pub const MAX_SPLIT_BY: u32 = 10;
/// Due day applied when a template omits one.
pub const DEFAULT_DUE_DAY: u32 = 1;
/// Split divisor applied when an expense template omits one.
pub const DEFAULT_SPLIT_BY: u32 = 1;

/// One violated constraint on one input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
	/// Dotted path of the offending field, e.g. `due_day_of_month`.
	pub path: String,
	pub message: String,
}

impl FieldIssue {
	pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			message: message.into(),
		}
	}
}

/// Input failed validation; maps to HTTP 400 at the boundary.
#[derive(Debug, Clone, Error, Serialize)]
#[error("validation failed: {}", summary(.issues))]
pub struct ValidationError {
	pub issues: Vec<FieldIssue>,
}

impl ValidationError {
	/// Builds an error from collected issues, or `Ok(())` when none were
	/// found.
	pub fn from_issues(issues: Vec<FieldIssue>) -> Result<(), ValidationError> {
		if issues.is_empty() {
			Ok(())
		} else {
			Err(ValidationError { issues })
		}
	}

	pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
		ValidationError {
			issues: vec![FieldIssue::new(path, message)],
		}
	}
}

fn summary(issues: &[FieldIssue]) -> String {
	issues
		.iter()
		.map(|issue| format!("{} {}", issue.path, issue.message))
		.collect::<Vec<_>>()
		.join(", ")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_issue_list_is_ok() {
		assert!(ValidationError::from_issues(Vec::new()).is_ok());
	}

	#[test]
	fn display_lists_every_issue() {
		let err = ValidationError {
			issues: vec![
				FieldIssue::new("amount", "must be a positive amount"),
				FieldIssue::new("description", "must not be empty"),
			],
		};
		let text = err.to_string();
		assert!(text.contains("amount"));
		assert!(text.contains("description"));
	}

	#[test]
	fn single_builds_one_issue() {
		let err = ValidationError::single("scopes", "at least one scope is required");
		assert_eq!(err.issues.len(), 1);
		assert_eq!(err.issues[0].path, "scopes");
	}
}
