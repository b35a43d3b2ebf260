// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication for the Till server.
//!
//! This crate owns the API credential lifecycle end to end:
//!
//! - [`token`] - opaque `exp_` bearer tokens: generation, positional
//!   parsing, Argon2 hashing and verification
//! - [`service`] - key management: create with a one-time-visible token,
//!   list, revoke-or-delete
//! - [`resolver`] - per-request principal resolution for API keys and
//!   browser sessions, including scope and lifecycle enforcement
//! - [`rate_limit`] - process-local fixed-window throttling
//!
//! Session issuance itself lives elsewhere; the resolver consumes it
//! through the [`SessionSource`] trait.

pub mod error;
pub mod rate_limit;
pub mod resolver;
pub mod service;
pub mod token;

pub use error::{AuthError, Result};
pub use rate_limit::{RateLimitError, RateLimiter};
pub use resolver::{
	AuthContext, AuthResolver, AuthSource, SessionPrincipal, SessionSource, API_KEY_HEADER,
};
pub use service::{ApiKeyService, ApiKeyServiceError, CreatedApiKey, RevokeOutcome};
pub use token::{
	generate_token, hash_secret, parse_token, verify_secret, GeneratedToken, ParsedToken,
	TOKEN_PREFIX,
};
