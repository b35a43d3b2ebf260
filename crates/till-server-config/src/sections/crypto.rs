// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Field-encryption configuration.

use serde::{Deserialize, Serialize};

/// Crypto configuration (runtime, fully resolved).
///
/// The key is base64 and must decode to 32 bytes; that check belongs to the
/// cipher constructor, not the config layer. A missing key is allowed here so
/// read-only tooling can load configuration without one.
#[derive(Debug, Clone, Default)]
pub struct CryptoConfig {
	pub encryption_key: Option<String>,
}

/// Crypto configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CryptoConfigLayer {
	#[serde(default)]
	pub encryption_key: Option<String>,
}

impl CryptoConfigLayer {
	pub fn merge(&mut self, other: CryptoConfigLayer) {
		if other.encryption_key.is_some() {
			self.encryption_key = other.encryption_key;
		}
	}

	pub fn finalize(self) -> CryptoConfig {
		CryptoConfig {
			encryption_key: self.encryption_key,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_has_no_key() {
		let config = CryptoConfigLayer::default().finalize();
		assert!(config.encryption_key.is_none());
	}

	#[test]
	fn test_merge_keeps_existing_when_overlay_empty() {
		let mut base = CryptoConfigLayer {
			encryption_key: Some("a2V5".to_string()),
		};
		base.merge(CryptoConfigLayer::default());
		assert_eq!(base.encryption_key.as_deref(), Some("a2V5"));
	}
}
