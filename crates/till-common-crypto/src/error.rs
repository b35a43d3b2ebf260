// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the field encryption boundary.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur constructing a cipher or encrypting a value.
///
/// Decryption deliberately has no error path: it falls back to the
/// caller-supplied default on any failure.
#[derive(Debug, Error)]
pub enum CryptoError {
	#[error("encryption key must decode to {expected} bytes, got {actual}")]
	InvalidKeyLength { expected: usize, actual: usize },

	#[error("encryption key is not valid base64: {0}")]
	KeyDecode(#[from] base64::DecodeError),

	#[error("encryption failed: {0}")]
	Encryption(String),
}
