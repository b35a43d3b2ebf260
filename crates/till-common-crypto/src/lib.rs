// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Field-level encryption for ledger records.
//!
//! Monetary amounts and descriptions are stored as opaque JSON payloads
//! (`{iv, tag, cipher, type}`, all base64) produced by AES-256-GCM. The rest
//! of the system round-trips these payloads through the [`RecordCipher`]
//! trait and never inspects their internals.
//!
//! Decryption is fail-closed: any malformed, tampered, or undecryptable
//! payload yields the caller-supplied fallback value rather than an error, so
//! a corrupt row degrades to an empty description or zero amount instead of
//! breaking whole list responses.

pub mod cipher;
pub mod error;
pub mod payload;

pub use cipher::{AesGcmCipher, RecordCipher, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use payload::{parse_payload, EncryptedPayload, PayloadKind};
