// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Opaque bearer token credentials.
//!
//! A token is `exp_` + an 8-character public lookup segment + `_` + a
//! 32-character secret:
//!
//! ```text
//! exp_ab3f9c12_7be04d11c59a42f3a0d58c6b21e9f4d7
//! └┬─┘└──┬───┘ └───────────────┬──────────────┘
//! literal prefix (lookup)    secret (hashed for storage)
//! ```
//!
//! Only the Argon2 hash of the secret is persisted; the full token is
//! shown once at creation and cannot be recovered. Lookups go through the
//! prefix alone — the secret is never used as a query key.
//!
//! Parsing is positional and fails closed: anything that does not match
//! the shape yields `None`, never an error, so callers have exactly one
//! "invalid format" signal.

use argon2::{
	password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
	Argon2,
};
#[cfg(test)]
use argon2::{Algorithm, Params, Version};
use uuid::Uuid;

use crate::error::AuthError;

/// Literal prefix every API token starts with.
pub const TOKEN_PREFIX: &str = "exp_";
/// Length of the public lookup segment.
pub const KEY_PREFIX_LEN: usize = 8;
/// Length of the secret segment in freshly generated tokens.
pub const SECRET_LEN: usize = 32;

/// A freshly generated token, pre-split into its stored components.
///
/// `token` is the one-time-visible credential handed to the user. Only
/// `prefix` and a hash of `secret` may be persisted.
#[derive(Debug, Clone)]
pub struct GeneratedToken {
	pub token: String,
	pub prefix: String,
	pub secret: String,
}

/// Borrowed view of a well-formed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedToken<'a> {
	pub prefix: &'a str,
	pub secret: &'a str,
}

/// Generates a new API token.
pub fn generate_token() -> GeneratedToken {
	let lookup = Uuid::new_v4().to_string().replace('-', "");
	let prefix = lookup[..KEY_PREFIX_LEN].to_string();
	let secret = Uuid::new_v4().to_string().replace('-', "");
	let token = format!("{TOKEN_PREFIX}{prefix}_{secret}");
	GeneratedToken {
		token,
		prefix,
		secret,
	}
}

/// Splits a raw token into its lookup prefix and secret.
///
/// Returns `None` on any malformed input: wrong literal prefix, missing
/// separator, truncated lookup segment, or an empty secret.
pub fn parse_token(token: &str) -> Option<ParsedToken<'_>> {
	if !token.starts_with(TOKEN_PREFIX) {
		return None;
	}
	let separator_at = TOKEN_PREFIX.len() + KEY_PREFIX_LEN;
	if token.as_bytes().get(separator_at) != Some(&b'_') {
		return None;
	}
	let prefix = token.get(TOKEN_PREFIX.len()..separator_at)?;
	let secret = token.get(separator_at + 1..)?;
	if secret.is_empty() {
		return None;
	}
	Some(ParsedToken { prefix, secret })
}

/// Hashes a token secret with Argon2 for storage.
pub fn hash_secret(secret: &str) -> Result<String, AuthError> {
	let salt = SaltString::generate(&mut OsRng);
	argon2_instance()
		.hash_password(secret.as_bytes(), &salt)
		.map(|hash| hash.to_string())
		.map_err(|_| AuthError::Internal("Failed to hash API key secret".to_string()))
}

/// Verifies a presented secret against a stored hash.
///
/// The comparison goes through the hashing library, never raw string
/// equality. Verification reads its cost parameters out of the stored
/// hash, so keys hashed under older parameters keep verifying.
pub fn verify_secret(secret: &str, hash: &str) -> Result<bool, AuthError> {
	let parsed = PasswordHash::new(hash)
		.map_err(|_| AuthError::Internal("Invalid API key hash format".to_string()))?;
	Ok(
		argon2_instance()
			.verify_password(secret.as_bytes(), &parsed)
			.is_ok(),
	)
}

/// Argon2 instance for hashing new secrets.
///
/// Tests run with intentionally weak parameters so the suite stays fast;
/// everything else uses the Argon2id defaults (~19 MiB, 2 iterations).
#[inline]
fn argon2_instance() -> Argon2<'static> {
	#[cfg(test)]
	{
		let params = Params::new(1024, 1, 1, None).expect("valid Argon2 params for tests");
		Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
	}

	#[cfg(not(test))]
	{
		Argon2::default()
	}
}
