// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! AES-256-GCM implementation of the record cipher boundary.

use aes_gcm::{
	aead::{Aead, KeyInit, OsRng},
	Aes256Gcm, Key, Nonce,
};
use base64::prelude::*;
use rand::RngCore;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::payload::{parse_payload, EncryptedPayload, PayloadKind};

/// Size of the encryption key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Encrypts and decrypts the opaque amount/description fields on ledger
/// records.
///
/// Encryption can fail (and the caller must handle it — a write with an
/// unencryptable field must not proceed); decryption never fails, it returns
/// the supplied fallback for anything it cannot recover.
pub trait RecordCipher: Send + Sync {
	fn encrypt_string(&self, value: &str) -> CryptoResult<EncryptedPayload>;
	fn encrypt_amount(&self, value: Decimal) -> CryptoResult<EncryptedPayload>;
	fn decrypt_string(&self, payload: &Value, fallback: &str) -> String;
	fn decrypt_amount(&self, payload: &Value, fallback: Decimal) -> Decimal;
}

/// AES-256-GCM cipher with a process-wide key.
///
/// The key is normally supplied base64-encoded through configuration and must
/// decode to exactly [`KEY_SIZE`] bytes.
pub struct AesGcmCipher {
	key: Zeroizing<[u8; KEY_SIZE]>,
}

impl AesGcmCipher {
	pub fn new(key: [u8; KEY_SIZE]) -> Self {
		Self {
			key: Zeroizing::new(key),
		}
	}

	/// Builds a cipher from a base64-encoded key, validating its length.
	pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
		let decoded = BASE64_STANDARD.decode(encoded.trim())?;
		if decoded.len() != KEY_SIZE {
			return Err(CryptoError::InvalidKeyLength {
				expected: KEY_SIZE,
				actual: decoded.len(),
			});
		}
		let mut key = Zeroizing::new([0u8; KEY_SIZE]);
		key.copy_from_slice(&decoded);
		Ok(Self { key })
	}

	fn encrypt_value(&self, plaintext: &str, kind: PayloadKind) -> CryptoResult<EncryptedPayload> {
		let key = Key::<Aes256Gcm>::from_slice(self.key.as_ref());
		let cipher = Aes256Gcm::new(key);

		let mut nonce_bytes = [0u8; NONCE_SIZE];
		OsRng.fill_bytes(&mut nonce_bytes);
		let nonce = Nonce::from_slice(&nonce_bytes);

		let mut sealed = cipher
			.encrypt(nonce, plaintext.as_bytes())
			.map_err(|e| CryptoError::Encryption(format!("field encryption failed: {e}")))?;

		// the aead output is ciphertext || tag; store the tag separately
		let tag = sealed.split_off(sealed.len() - TAG_SIZE);

		Ok(EncryptedPayload {
			iv: BASE64_STANDARD.encode(nonce_bytes),
			tag: BASE64_STANDARD.encode(&tag),
			cipher: BASE64_STANDARD.encode(&sealed),
			kind,
		})
	}

	fn decrypt_value(&self, payload: &EncryptedPayload) -> Option<String> {
		let nonce_bytes = BASE64_STANDARD.decode(&payload.iv).ok()?;
		if nonce_bytes.len() != NONCE_SIZE {
			return None;
		}
		let tag = BASE64_STANDARD.decode(&payload.tag).ok()?;
		let mut sealed = BASE64_STANDARD.decode(&payload.cipher).ok()?;
		sealed.extend_from_slice(&tag);

		let key = Key::<Aes256Gcm>::from_slice(self.key.as_ref());
		let cipher = Aes256Gcm::new(key);
		let nonce = Nonce::from_slice(&nonce_bytes);

		let plaintext = cipher.decrypt(nonce, sealed.as_slice()).ok()?;
		String::from_utf8(plaintext).ok()
	}
}

impl RecordCipher for AesGcmCipher {
	fn encrypt_string(&self, value: &str) -> CryptoResult<EncryptedPayload> {
		self.encrypt_value(value, PayloadKind::String)
	}

	fn encrypt_amount(&self, value: Decimal) -> CryptoResult<EncryptedPayload> {
		self.encrypt_value(&value.to_string(), PayloadKind::Number)
	}

	fn decrypt_string(&self, payload: &Value, fallback: &str) -> String {
		let decrypted = parse_payload(payload).and_then(|parsed| self.decrypt_value(&parsed));
		match decrypted {
			Some(text) if !text.is_empty() => text,
			_ => fallback.to_string(),
		}
	}

	fn decrypt_amount(&self, payload: &Value, fallback: Decimal) -> Decimal {
		parse_payload(payload)
			.and_then(|parsed| self.decrypt_value(&parsed))
			.and_then(|text| Decimal::from_str(text.trim()).ok())
			.unwrap_or(fallback)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use serde_json::json;

	fn cipher() -> AesGcmCipher {
		AesGcmCipher::new([7u8; KEY_SIZE])
	}

	#[test]
	fn string_roundtrip() {
		let c = cipher();
		let payload = c.encrypt_string("Groceries at the market").unwrap();
		let value = payload.to_value();
		assert_eq!(
			c.decrypt_string(&value, ""),
			"Groceries at the market"
		);
	}

	#[test]
	fn amount_roundtrip_preserves_scale() {
		let c = cipher();
		let amount = Decimal::new(125099, 2); // 1250.99
		let payload = c.encrypt_amount(amount).unwrap();
		assert_eq!(c.decrypt_amount(&payload.to_value(), Decimal::ZERO), amount);
	}

	#[test]
	fn decrypt_falls_back_on_garbage_values() {
		let c = cipher();
		assert_eq!(c.decrypt_string(&json!(null), "fallback"), "fallback");
		assert_eq!(c.decrypt_string(&json!({"iv": "x"}), "fallback"), "fallback");
		assert_eq!(
			c.decrypt_amount(&json!("not a payload"), Decimal::ONE),
			Decimal::ONE
		);
	}

	#[test]
	fn decrypt_falls_back_on_tampered_ciphertext() {
		let c = cipher();
		let mut payload = c.encrypt_string("original").unwrap();
		let mut raw = BASE64_STANDARD.decode(&payload.cipher).unwrap();
		raw[0] ^= 0xFF;
		payload.cipher = BASE64_STANDARD.encode(&raw);
		assert_eq!(c.decrypt_string(&payload.to_value(), "fallback"), "fallback");
	}

	#[test]
	fn decrypt_falls_back_on_wrong_key() {
		let payload = cipher().encrypt_string("hidden").unwrap();
		let other = AesGcmCipher::new([9u8; KEY_SIZE]);
		assert_eq!(other.decrypt_string(&payload.to_value(), ""), "");
	}

	#[test]
	fn empty_plaintext_decrypts_to_fallback() {
		let c = cipher();
		let payload = c.encrypt_string("").unwrap();
		assert_eq!(c.decrypt_string(&payload.to_value(), "(none)"), "(none)");
	}

	#[test]
	fn unparseable_amount_decrypts_to_fallback() {
		let c = cipher();
		let payload = c.encrypt_string("not a number").unwrap();
		assert_eq!(
			c.decrypt_amount(&payload.to_value(), Decimal::new(42, 0)),
			Decimal::new(42, 0)
		);
	}

	#[test]
	fn from_base64_validates_key() {
		let key = BASE64_STANDARD.encode([1u8; KEY_SIZE]);
		assert!(AesGcmCipher::from_base64(&key).is_ok());

		let short = BASE64_STANDARD.encode([1u8; 16]);
		assert!(matches!(
			AesGcmCipher::from_base64(&short),
			Err(CryptoError::InvalidKeyLength { expected: 32, actual: 16 })
		));

		assert!(matches!(
			AesGcmCipher::from_base64("%%% not base64 %%%"),
			Err(CryptoError::KeyDecode(_))
		));
	}

	#[test]
	fn nonces_are_unique_per_encryption() {
		let c = cipher();
		let a = c.encrypt_string("same value").unwrap();
		let b = c.encrypt_string("same value").unwrap();
		assert_ne!(a.iv, b.iv);
		assert_ne!(a.cipher, b.cipher);
	}

	proptest! {
		#[test]
		fn prop_string_roundtrip(value in "\\PC{1,200}") {
			let c = cipher();
			let payload = c.encrypt_string(&value).unwrap();
			prop_assert_eq!(c.decrypt_string(&payload.to_value(), "fallback"), value);
		}

		#[test]
		fn prop_amount_roundtrip(units in -1_000_000_000i64..1_000_000_000, scale in 0u32..=4) {
			let c = cipher();
			let amount = Decimal::new(units, scale);
			let payload = c.encrypt_amount(amount).unwrap();
			prop_assert_eq!(c.decrypt_amount(&payload.to_value(), Decimal::ZERO), amount);
		}
	}
}
