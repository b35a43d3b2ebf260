// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API key scopes.
//!
//! Scopes are a closed enumeration gating endpoint categories. Internally and
//! in storage they use the underscore form (`expenses_read`); the outward
//! client-facing form uses a colon (`expenses:read`). [`normalize_scopes`]
//! accepts either form and silently drops unknown names, matching the
//! permissive intake on key creation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named permission granted to an API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiScope {
	ExpensesRead,
	ExpensesWrite,
	AnalyticsRead,
	IncomeWrite,
	BudgetRead,
}

impl ApiScope {
	/// Every scope defined by the system, in canonical order.
	///
	/// This is also the implicit grant for session principals, which bypass
	/// the scope system entirely.
	pub fn all() -> [ApiScope; 5] {
		[
			ApiScope::ExpensesRead,
			ApiScope::ExpensesWrite,
			ApiScope::AnalyticsRead,
			ApiScope::IncomeWrite,
			ApiScope::BudgetRead,
		]
	}

	/// Returns the storage form, e.g. `expenses_read`.
	pub fn as_str(&self) -> &'static str {
		match self {
			ApiScope::ExpensesRead => "expenses_read",
			ApiScope::ExpensesWrite => "expenses_write",
			ApiScope::AnalyticsRead => "analytics_read",
			ApiScope::IncomeWrite => "income_write",
			ApiScope::BudgetRead => "budget_read",
		}
	}

	/// Returns the client-facing form, e.g. `expenses:read`.
	pub fn external(&self) -> &'static str {
		match self {
			ApiScope::ExpensesRead => "expenses:read",
			ApiScope::ExpensesWrite => "expenses:write",
			ApiScope::AnalyticsRead => "analytics:read",
			ApiScope::IncomeWrite => "income:write",
			ApiScope::BudgetRead => "budget:read",
		}
	}
}

impl fmt::Display for ApiScope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl FromStr for ApiScope {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"expenses_read" => Ok(ApiScope::ExpensesRead),
			"expenses_write" => Ok(ApiScope::ExpensesWrite),
			"analytics_read" => Ok(ApiScope::AnalyticsRead),
			"income_write" => Ok(ApiScope::IncomeWrite),
			"budget_read" => Ok(ApiScope::BudgetRead),
			_ => Err(format!("invalid api scope: {}", s)),
		}
	}
}

/// Maps raw scope names to known scopes, accepting both the colon and the
/// underscore form. Unknown names are dropped, not rejected.
pub fn normalize_scopes(raw: &[String]) -> Vec<ApiScope> {
	raw.iter()
		.filter_map(|scope| scope.replace(':', "_").parse::<ApiScope>().ok())
		.collect()
}

/// Renders scopes in the client-facing colon form.
pub fn scopes_to_strings(scopes: &[ApiScope]) -> Vec<String> {
	scopes.iter().map(|scope| scope.external().to_string()).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn storage_and_external_forms() {
		assert_eq!(ApiScope::ExpensesRead.as_str(), "expenses_read");
		assert_eq!(ApiScope::ExpensesRead.external(), "expenses:read");
		assert_eq!(ApiScope::IncomeWrite.as_str(), "income_write");
		assert_eq!(ApiScope::IncomeWrite.external(), "income:write");
	}

	#[test]
	fn parse_storage_form() {
		assert_eq!(
			"budget_read".parse::<ApiScope>().unwrap(),
			ApiScope::BudgetRead
		);
		assert!("budget:read".parse::<ApiScope>().is_err());
		assert!("root".parse::<ApiScope>().is_err());
	}

	#[test]
	fn normalize_accepts_both_forms() {
		let raw = vec![
			"expenses:read".to_string(),
			"expenses_write".to_string(),
			"analytics:read".to_string(),
		];
		assert_eq!(
			normalize_scopes(&raw),
			vec![
				ApiScope::ExpensesRead,
				ApiScope::ExpensesWrite,
				ApiScope::AnalyticsRead,
			]
		);
	}

	#[test]
	fn normalize_drops_unknown_names() {
		let raw = vec![
			"expenses:read".to_string(),
			"admin:everything".to_string(),
			"".to_string(),
		];
		assert_eq!(normalize_scopes(&raw), vec![ApiScope::ExpensesRead]);
	}

	#[test]
	fn external_rendering_roundtrips_through_normalize() {
		let scopes = ApiScope::all();
		let rendered = scopes_to_strings(&scopes);
		assert_eq!(rendered[0], "expenses:read");
		assert_eq!(normalize_scopes(&rendered), scopes.to_vec());
	}

	#[test]
	fn serde_uses_storage_form() {
		let json = serde_json::to_string(&ApiScope::AnalyticsRead).unwrap();
		assert_eq!(json, "\"analytics_read\"");
		let parsed: ApiScope = serde_json::from_str(&json).unwrap();
		assert_eq!(parsed, ApiScope::AnalyticsRead);
	}
}
