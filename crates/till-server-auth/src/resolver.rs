// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request authentication.
//!
//! Resolves the acting principal for a request and enforces credential
//! lifecycle, scope and rate-limit policy in a fixed order:
//!
//! ```text
//! Request → x-api-key header present?
//!             │
//!             ├── yes → parse → lookup by prefix → revoked? → expired?
//!             │         → verify secret → check scopes → rate limit
//!             │         → AuthContext (source: api-key)
//!             │
//!             └── no  → session lookup → rate limit
//!                       → AuthContext (source: session, all scopes)
//! ```
//!
//! An API key header, when present, is authoritative: a request carrying
//! both a session cookie and a bad key is rejected on the key, never
//! silently downgraded to the session. The expiry check here is
//! independent of the background sweep that revokes expired keys — both
//! paths must reject on their own. The rate limit is consumed last so
//! rejected credentials never drain the caller's window.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use http::HeaderMap;
use serde::Serialize;

use till_ledger_core::{ApiScope, UserId, DEFAULT_CURRENCY};
use till_server_db::{ApiKeyStore, UserStore};

use crate::error::AuthError;
use crate::rate_limit::RateLimiter;
use crate::token::{parse_token, verify_secret};

/// Header carrying the API token.
pub const API_KEY_HEADER: &str = "x-api-key";

/// How the acting principal authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthSource {
	Session,
	ApiKey,
}

impl AuthSource {
	pub fn as_str(&self) -> &'static str {
		match self {
			AuthSource::Session => "session",
			AuthSource::ApiKey => "api-key",
		}
	}
}

impl std::fmt::Display for AuthSource {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

/// Authorization context for one request.
///
/// Constructed fresh per request and never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct AuthContext {
	pub user_id: UserId,
	pub source: AuthSource,
	/// Scopes granted to this principal. Sessions hold every scope; API
	/// keys hold exactly their stored grant, not the requested subset.
	pub scopes: Vec<ApiScope>,
	/// Denormalized currency preference for response formatting.
	pub currency: String,
}

impl AuthContext {
	pub fn has_scope(&self, scope: ApiScope) -> bool {
		self.scopes.contains(&scope)
	}
}

/// A logged-in browser principal resolved from request headers.
#[derive(Debug, Clone)]
pub struct SessionPrincipal {
	pub user_id: UserId,
	pub default_currency: Option<String>,
}

/// Source of browser-session principals.
///
/// Session issuance and cookie handling live outside this crate; the
/// resolver only asks "whose session, if anyone's, is on this request".
#[async_trait]
pub trait SessionSource: Send + Sync {
	async fn current_session(
		&self,
		headers: &HeaderMap,
	) -> Result<Option<SessionPrincipal>, AuthError>;
}

/// Resolves request credentials into an [`AuthContext`].
pub struct AuthResolver {
	api_keys: Arc<dyn ApiKeyStore>,
	users: Arc<dyn UserStore>,
	sessions: Arc<dyn SessionSource>,
	rate_limiter: Arc<RateLimiter>,
}

impl AuthResolver {
	pub fn new(
		api_keys: Arc<dyn ApiKeyStore>,
		users: Arc<dyn UserStore>,
		sessions: Arc<dyn SessionSource>,
		rate_limiter: Arc<RateLimiter>,
	) -> Self {
		Self {
			api_keys,
			users,
			sessions,
			rate_limiter,
		}
	}

	/// Authenticates one request.
	///
	/// `required_scopes` applies to API-key principals only; sessions
	/// implicitly hold every scope.
	#[tracing::instrument(level = "debug", skip(self, headers, required_scopes), fields(path = %path))]
	pub async fn authenticate(
		&self,
		headers: &HeaderMap,
		path: &str,
		required_scopes: &[ApiScope],
	) -> Result<AuthContext, AuthError> {
		match headers.get(API_KEY_HEADER) {
			Some(value) => {
				let token = value.to_str().map_err(|_| AuthError::InvalidKeyFormat)?;
				self.authenticate_api_key(token, path, required_scopes).await
			}
			None => self.authenticate_session(headers, path).await,
		}
	}

	async fn authenticate_api_key(
		&self,
		token: &str,
		path: &str,
		required_scopes: &[ApiScope],
	) -> Result<AuthContext, AuthError> {
		let parsed = parse_token(token).ok_or(AuthError::InvalidKeyFormat)?;

		let key = self
			.api_keys
			.get_api_key_by_prefix(parsed.prefix)
			.await?
			.ok_or(AuthError::KeyNotFound)?;

		if key.is_revoked() {
			return Err(AuthError::KeyRevoked);
		}
		if key.is_expired(Utc::now()) {
			return Err(AuthError::KeyExpired);
		}
		if !verify_secret(parsed.secret, &key.key_hash)? {
			return Err(AuthError::KeyInvalid);
		}
		if !key.has_scopes(required_scopes) {
			return Err(AuthError::ScopeInsufficient);
		}

		self
			.rate_limiter
			.consume(&format!("key:{}", key.key_prefix), path)
			.await?;

		let currency = match self.users.get_user(&key.user_id).await? {
			Some(user) => user.currency().to_string(),
			None => DEFAULT_CURRENCY.to_string(),
		};

		// Usage tracking must never fail the request.
		if let Err(error) = self.api_keys.update_last_used(&key.id).await {
			tracing::warn!(api_key_id = %key.id, %error, "failed to record API key usage");
		}

		tracing::debug!(
			user_id = %key.user_id,
			key_prefix = %key.key_prefix,
			"authenticated via API key"
		);
		Ok(AuthContext {
			user_id: key.user_id,
			source: AuthSource::ApiKey,
			scopes: key.scopes,
			currency,
		})
	}

	async fn authenticate_session(
		&self,
		headers: &HeaderMap,
		path: &str,
	) -> Result<AuthContext, AuthError> {
		let principal = self
			.sessions
			.current_session(headers)
			.await?
			.ok_or(AuthError::Unauthorized)?;

		self
			.rate_limiter
			.consume(&format!("user:{}", principal.user_id), path)
			.await?;

		let currency = principal
			.default_currency
			.unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

		tracing::debug!(user_id = %principal.user_id, "authenticated via session");
		Ok(AuthContext {
			user_id: principal.user_id,
			source: AuthSource::Session,
			scopes: ApiScope::all().to_vec(),
			currency,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	use chrono::Duration as ChronoDuration;
	use http::HeaderValue;
	use sqlx::sqlite::SqlitePool;

	use till_ledger_core::ApiKey;
	use till_server_db::testing::{create_migrated_pool, seed_user, seed_user_with_currency};
	use till_server_db::{ApiKeyRepository, UserRepository};

	use crate::token::{generate_token, hash_secret};

	struct NoSession;

	#[async_trait]
	impl SessionSource for NoSession {
		async fn current_session(
			&self,
			_headers: &HeaderMap,
		) -> Result<Option<SessionPrincipal>, AuthError> {
			Ok(None)
		}
	}

	struct FixedSession(SessionPrincipal);

	#[async_trait]
	impl SessionSource for FixedSession {
		async fn current_session(
			&self,
			_headers: &HeaderMap,
		) -> Result<Option<SessionPrincipal>, AuthError> {
			Ok(Some(self.0.clone()))
		}
	}

	fn resolver(
		pool: &SqlitePool,
		sessions: Arc<dyn SessionSource>,
		max_requests: u32,
	) -> AuthResolver {
		AuthResolver::new(
			Arc::new(ApiKeyRepository::new(pool.clone())),
			Arc::new(UserRepository::new(pool.clone())),
			sessions,
			Arc::new(RateLimiter::new(Duration::from_secs(60), max_requests)),
		)
	}

	async fn issue_key(
		pool: &SqlitePool,
		user_id: &UserId,
		scopes: &[ApiScope],
		expires_at: Option<chrono::DateTime<Utc>>,
	) -> (ApiKey, String) {
		let generated = generate_token();
		let key_hash = hash_secret(&generated.secret).unwrap();
		let record = ApiKeyRepository::new(pool.clone())
			.create_api_key(user_id, None, &generated.prefix, &key_hash, scopes, expires_at)
			.await
			.unwrap();
		(record, generated.token)
	}

	fn key_headers(token: &str) -> HeaderMap {
		let mut headers = HeaderMap::new();
		headers.insert(API_KEY_HEADER, HeaderValue::from_str(token).unwrap());
		headers
	}

	#[tokio::test]
	async fn api_key_happy_path() {
		let pool = create_migrated_pool().await;
		let user_id = seed_user_with_currency(&pool, Some("EUR")).await;
		let (record, token) =
			issue_key(&pool, &user_id, &[ApiScope::ExpensesRead, ApiScope::AnalyticsRead], None)
				.await;
		let resolver = resolver(&pool, Arc::new(NoSession), 10);

		let context = resolver
			.authenticate(&key_headers(&token), "/api/expenses", &[ApiScope::ExpensesRead])
			.await
			.unwrap();

		assert_eq!(context.user_id, user_id);
		assert_eq!(context.source, AuthSource::ApiKey);
		// Granted scopes, not the requested subset.
		assert_eq!(
			context.scopes,
			vec![ApiScope::ExpensesRead, ApiScope::AnalyticsRead]
		);
		assert_eq!(context.currency, "EUR");

		// Successful auth records usage.
		let fetched = ApiKeyRepository::new(pool.clone())
			.get_api_key_by_prefix(&record.key_prefix)
			.await
			.unwrap()
			.unwrap();
		assert!(fetched.last_used_at.is_some());
	}

	#[tokio::test]
	async fn malformed_token_is_rejected_as_format_error() {
		let pool = create_migrated_pool().await;
		let resolver = resolver(&pool, Arc::new(NoSession), 10);

		let error = resolver
			.authenticate(&key_headers("not-a-token"), "/api/expenses", &[])
			.await
			.unwrap_err();
		assert!(matches!(error, AuthError::InvalidKeyFormat));
		assert_eq!(error.status(), http::StatusCode::UNAUTHORIZED);
	}

	#[tokio::test]
	async fn unknown_prefix_is_not_found() {
		let pool = create_migrated_pool().await;
		let resolver = resolver(&pool, Arc::new(NoSession), 10);

		let error = resolver
			.authenticate(
				&key_headers("exp_00000000_11111111111111111111111111111111"),
				"/api/expenses",
				&[],
			)
			.await
			.unwrap_err();
		assert!(matches!(error, AuthError::KeyNotFound));
	}

	#[tokio::test]
	async fn revoked_key_is_rejected_explicitly() {
		let pool = create_migrated_pool().await;
		let user_id = seed_user(&pool).await;
		let (record, token) = issue_key(&pool, &user_id, &[ApiScope::ExpensesRead], None).await;
		ApiKeyRepository::new(pool.clone())
			.revoke_api_key(&record.id, &user_id)
			.await
			.unwrap();
		let resolver = resolver(&pool, Arc::new(NoSession), 10);

		let error = resolver
			.authenticate(&key_headers(&token), "/api/expenses", &[])
			.await
			.unwrap_err();
		assert!(matches!(error, AuthError::KeyRevoked));
		assert_eq!(error.status(), http::StatusCode::FORBIDDEN);
	}

	#[tokio::test]
	async fn expired_key_is_rejected_without_waiting_for_the_sweep() {
		let pool = create_migrated_pool().await;
		let user_id = seed_user(&pool).await;
		let expires_at = Utc::now() - ChronoDuration::minutes(5);
		let (_, token) =
			issue_key(&pool, &user_id, &[ApiScope::ExpensesRead], Some(expires_at)).await;
		let resolver = resolver(&pool, Arc::new(NoSession), 10);

		let error = resolver
			.authenticate(&key_headers(&token), "/api/expenses", &[])
			.await
			.unwrap_err();
		assert!(matches!(error, AuthError::KeyExpired));
	}

	#[tokio::test]
	async fn wrong_secret_is_rejected() {
		let pool = create_migrated_pool().await;
		let user_id = seed_user(&pool).await;
		let (record, _) = issue_key(&pool, &user_id, &[ApiScope::ExpensesRead], None).await;
		let forged = format!("{}{}_{}", crate::token::TOKEN_PREFIX, record.key_prefix, "f".repeat(32));
		let resolver = resolver(&pool, Arc::new(NoSession), 10);

		let error = resolver
			.authenticate(&key_headers(&forged), "/api/expenses", &[])
			.await
			.unwrap_err();
		assert!(matches!(error, AuthError::KeyInvalid));
	}

	#[tokio::test]
	async fn missing_scope_is_rejected() {
		let pool = create_migrated_pool().await;
		let user_id = seed_user(&pool).await;
		let (_, token) = issue_key(&pool, &user_id, &[ApiScope::ExpensesRead], None).await;
		let resolver = resolver(&pool, Arc::new(NoSession), 10);

		let error = resolver
			.authenticate(
				&key_headers(&token),
				"/api/expenses",
				&[ApiScope::ExpensesRead, ApiScope::ExpensesWrite],
			)
			.await
			.unwrap_err();
		assert!(matches!(error, AuthError::ScopeInsufficient));
	}

	#[tokio::test]
	async fn api_key_header_wins_over_session() {
		let pool = create_migrated_pool().await;
		let session_user = seed_user(&pool).await;
		let session = FixedSession(SessionPrincipal {
			user_id: session_user,
			default_currency: None,
		});
		let resolver = resolver(&pool, Arc::new(session), 10);

		// Valid session, bad key: the key decides.
		let error = resolver
			.authenticate(
				&key_headers("exp_00000000_11111111111111111111111111111111"),
				"/api/expenses",
				&[],
			)
			.await
			.unwrap_err();
		assert!(matches!(error, AuthError::KeyNotFound));
	}

	#[tokio::test]
	async fn session_principal_holds_every_scope() {
		let pool = create_migrated_pool().await;
		let user_id = seed_user(&pool).await;
		let session = FixedSession(SessionPrincipal {
			user_id,
			default_currency: None,
		});
		let resolver = resolver(&pool, Arc::new(session), 10);

		let context = resolver
			.authenticate(&HeaderMap::new(), "/api/expenses", &[])
			.await
			.unwrap();
		assert_eq!(context.source, AuthSource::Session);
		assert_eq!(context.scopes, ApiScope::all().to_vec());
		assert_eq!(context.currency, DEFAULT_CURRENCY);
		assert!(context.has_scope(ApiScope::BudgetRead));
	}

	#[tokio::test]
	async fn no_credentials_is_unauthorized() {
		let pool = create_migrated_pool().await;
		let resolver = resolver(&pool, Arc::new(NoSession), 10);

		let error = resolver
			.authenticate(&HeaderMap::new(), "/api/expenses", &[])
			.await
			.unwrap_err();
		assert!(matches!(error, AuthError::Unauthorized));
	}

	#[tokio::test]
	async fn api_key_requests_are_rate_limited_per_path() {
		let pool = create_migrated_pool().await;
		let user_id = seed_user(&pool).await;
		let (_, token) = issue_key(&pool, &user_id, &[ApiScope::ExpensesRead], None).await;
		let resolver = resolver(&pool, Arc::new(NoSession), 2);
		let headers = key_headers(&token);

		resolver.authenticate(&headers, "/api/expenses", &[]).await.unwrap();
		resolver.authenticate(&headers, "/api/expenses", &[]).await.unwrap();

		let error = resolver
			.authenticate(&headers, "/api/expenses", &[])
			.await
			.unwrap_err();
		assert_eq!(error.status(), http::StatusCode::TOO_MANY_REQUESTS);
		assert!(error.retry_after_secs().is_some());

		// A different path has its own window.
		resolver.authenticate(&headers, "/api/analytics", &[]).await.unwrap();
	}

	#[tokio::test]
	async fn session_requests_are_rate_limited() {
		let pool = create_migrated_pool().await;
		let user_id = seed_user(&pool).await;
		let session = FixedSession(SessionPrincipal {
			user_id,
			default_currency: None,
		});
		let resolver = resolver(&pool, Arc::new(session), 1);

		resolver
			.authenticate(&HeaderMap::new(), "/api/expenses", &[])
			.await
			.unwrap();
		let error = resolver
			.authenticate(&HeaderMap::new(), "/api/expenses", &[])
			.await
			.unwrap_err();
		assert!(matches!(error, AuthError::RateLimited { .. }));
	}

	#[tokio::test]
	async fn rejected_credentials_do_not_drain_the_window() {
		let pool = create_migrated_pool().await;
		let user_id = seed_user(&pool).await;
		let (_, token) = issue_key(&pool, &user_id, &[ApiScope::ExpensesRead], None).await;
		let resolver = resolver(&pool, Arc::new(NoSession), 1);
		let headers = key_headers(&token);

		// Scope rejections happen before the limiter is consulted.
		for _ in 0..3 {
			let error = resolver
				.authenticate(&headers, "/api/expenses", &[ApiScope::ExpensesWrite])
				.await
				.unwrap_err();
			assert!(matches!(error, AuthError::ScopeInsufficient));
		}

		// The single token of the window is still available.
		resolver
			.authenticate(&headers, "/api/expenses", &[ApiScope::ExpensesRead])
			.await
			.unwrap();
	}
}
