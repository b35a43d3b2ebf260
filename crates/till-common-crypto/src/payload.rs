// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The on-disk shape of an encrypted field.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// What the plaintext inside a payload represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
	String,
	Number,
}

impl FromStr for PayloadKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"string" => Ok(PayloadKind::String),
			"number" => Ok(PayloadKind::Number),
			_ => Err(format!("invalid payload kind: {}", s)),
		}
	}
}

/// An encrypted field as stored in the database.
///
/// `iv`, `tag`, and `cipher` are base64. The auth tag is kept separate from
/// the ciphertext so tampering with either is detectable on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
	pub iv: String,
	pub tag: String,
	pub cipher: String,
	#[serde(rename = "type")]
	pub kind: PayloadKind,
}

impl EncryptedPayload {
	/// Renders the payload as the JSON value persisted in a record column.
	pub fn to_value(&self) -> Value {
		serde_json::json!({
			"iv": self.iv,
			"tag": self.tag,
			"cipher": self.cipher,
			"type": match self.kind {
				PayloadKind::String => "string",
				PayloadKind::Number => "number",
			},
		})
	}
}

/// Reads a stored JSON value back into a payload.
///
/// Returns `None` for anything that is not an object carrying non-empty
/// `iv`/`tag`/`cipher` strings. A missing or unknown `type` is tolerated and
/// treated as `string`; decrypt paths do not branch on it.
pub fn parse_payload(value: &Value) -> Option<EncryptedPayload> {
	let record = value.as_object()?;
	let iv = non_empty(record.get("iv"))?;
	let tag = non_empty(record.get("tag"))?;
	let cipher = non_empty(record.get("cipher"))?;
	let kind = record
		.get("type")
		.and_then(Value::as_str)
		.and_then(|s| s.parse().ok())
		.unwrap_or(PayloadKind::String);
	Some(EncryptedPayload {
		iv: iv.to_string(),
		tag: tag.to_string(),
		cipher: cipher.to_string(),
		kind,
	})
}

fn non_empty(value: Option<&Value>) -> Option<&str> {
	match value.and_then(Value::as_str) {
		Some(s) if !s.is_empty() => Some(s),
		_ => None,
	}
}
