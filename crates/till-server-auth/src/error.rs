// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error taxonomy for request authentication.
//!
//! Every failure carries an HTTP-style status so the boundary can answer
//! without re-classifying: 401 for credentials that are missing or cannot
//! be proven, 403 for keys that exist but are revoked, expired or
//! under-scoped, 429 when the rate limit is exhausted. Persistence and
//! hashing failures are never surfaced verbatim;
//! [`AuthError::client_message`] collapses them to a generic 500 body.

use http::StatusCode;
use thiserror::Error;

use till_server_db::DbError;

use crate::rate_limit::RateLimitError;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Why a request could not be authenticated.
#[derive(Debug, Error)]
pub enum AuthError {
	/// The presented token does not match the expected shape.
	#[error("Invalid API key format")]
	InvalidKeyFormat,

	/// No key is stored under the presented prefix.
	#[error("API key not found")]
	KeyNotFound,

	/// The key exists but has been revoked.
	///
	/// Deliberately distinct from [`AuthError::KeyNotFound`]: a revoked
	/// key answers 403, not 401, so the caller learns the credential is
	/// dead rather than mistyped.
	#[error("API key has been revoked")]
	KeyRevoked,

	/// The key exists but its expiry has passed.
	#[error("API key expired")]
	KeyExpired,

	/// The secret did not verify against the stored hash.
	#[error("API key invalid")]
	KeyInvalid,

	/// The key is missing at least one required scope.
	#[error("API key scope insufficient")]
	ScopeInsufficient,

	/// No credential was presented at all.
	#[error("Unauthorized")]
	Unauthorized,

	/// The caller exhausted its rate-limit window.
	#[error("Too many requests")]
	RateLimited { retry_after_secs: u64 },

	#[error("database error: {0}")]
	Db(#[from] DbError),

	#[error("{0}")]
	Internal(String),
}

impl From<RateLimitError> for AuthError {
	fn from(error: RateLimitError) -> Self {
		AuthError::RateLimited {
			retry_after_secs: error.retry_after_secs,
		}
	}
}

impl AuthError {
	/// The HTTP status this error maps to at the boundary.
	pub fn status(&self) -> StatusCode {
		match self {
			AuthError::InvalidKeyFormat
			| AuthError::KeyNotFound
			| AuthError::KeyInvalid
			| AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
			AuthError::KeyRevoked | AuthError::KeyExpired | AuthError::ScopeInsufficient => {
				StatusCode::FORBIDDEN
			}
			AuthError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
			AuthError::Db(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Seconds the caller should wait before retrying, for 429 responses.
	pub fn retry_after_secs(&self) -> Option<u64> {
		match self {
			AuthError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
			_ => None,
		}
	}

	/// The message safe to return to the client.
	///
	/// 4xx messages pass through unchanged. Anything that maps to a 500
	/// collapses to a generic body; the full error goes to the log, not
	/// the response.
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
	fn statuses_follow_the_taxonomy() {
		assert_eq!(AuthError::InvalidKeyFormat.status(), StatusCode::UNAUTHORIZED);
		assert_eq!(AuthError::KeyNotFound.status(), StatusCode::UNAUTHORIZED);
		assert_eq!(AuthError::KeyInvalid.status(), StatusCode::UNAUTHORIZED);
		assert_eq!(AuthError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
		assert_eq!(AuthError::KeyRevoked.status(), StatusCode::FORBIDDEN);
		assert_eq!(AuthError::KeyExpired.status(), StatusCode::FORBIDDEN);
		assert_eq!(AuthError::ScopeInsufficient.status(), StatusCode::FORBIDDEN);
		assert_eq!(
			AuthError::RateLimited { retry_after_secs: 7 }.status(),
			StatusCode::TOO_MANY_REQUESTS
		);
		assert_eq!(
			AuthError::Internal("boom".to_string()).status(),
			StatusCode::INTERNAL_SERVER_ERROR
		);
	}

	#[test]
	fn retry_after_only_on_rate_limit() {
		assert_eq!(
			AuthError::RateLimited { retry_after_secs: 42 }.retry_after_secs(),
			Some(42)
		);
		assert_eq!(AuthError::Unauthorized.retry_after_secs(), None);
	}

	#[test]
	fn server_errors_never_leak_detail() {
		let error = AuthError::Internal("argon2 parameter mismatch".to_string());
		assert_eq!(error.client_message(), "Internal server error");

		let error = AuthError::KeyRevoked;
		assert_eq!(error.client_message(), "API key has been revoked");
	}

	#[test]
	fn rate_limit_error_converts() {
		let error: AuthError = RateLimitError { retry_after_secs: 9 }.into();
		assert_eq!(error.retry_after_secs(), Some(9));
		assert_eq!(error.to_string(), "Too many requests");
	}
}
