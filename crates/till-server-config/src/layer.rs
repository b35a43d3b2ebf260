// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Mergeable configuration layer.
//!
//! A layer holds whatever values a single source provided; later sources
//! overwrite earlier ones field by field rather than section by section, so
//! setting one environment variable does not discard the rest of a section
//! loaded from the config file.

use serde::{Deserialize, Serialize};

use crate::sections::{
	AutomationConfigLayer, CryptoConfigLayer, DatabaseConfigLayer, LoggingConfigLayer,
	RateLimitConfigLayer,
};

/// Partial server configuration from a single source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub crypto: Option<CryptoConfigLayer>,
	#[serde(default)]
	pub rate_limit: Option<RateLimitConfigLayer>,
	#[serde(default)]
	pub automation: Option<AutomationConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl ServerConfigLayer {
	/// Merge another layer into this one. Values in `other` win.
	pub fn merge(&mut self, other: Self) {
		merge_section(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_section(&mut self.crypto, other.crypto, CryptoConfigLayer::merge);
		merge_section(
			&mut self.rate_limit,
			other.rate_limit,
			RateLimitConfigLayer::merge,
		);
		merge_section(
			&mut self.automation,
			other.automation,
			AutomationConfigLayer::merge,
		);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(base), Some(other)) => merge(base, other),
		(None, Some(other)) => *base = Some(other),
		(_, None) => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge_fills_missing_sections() {
		let mut base = ServerConfigLayer::default();
		base.merge(ServerConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: Some("sqlite:/tmp/till.db".to_string()),
			}),
			..Default::default()
		});
		assert_eq!(
			base.database.unwrap().url,
			Some("sqlite:/tmp/till.db".to_string())
		);
		assert!(base.logging.is_none());
	}

	#[test]
	fn test_merge_is_field_level() {
		let mut base = ServerConfigLayer {
			rate_limit: Some(RateLimitConfigLayer {
				window_ms: Some(30_000),
				max_requests: Some(50),
			}),
			..Default::default()
		};
		base.merge(ServerConfigLayer {
			rate_limit: Some(RateLimitConfigLayer {
				window_ms: None,
				max_requests: Some(200),
			}),
			..Default::default()
		});
		let rate_limit = base.rate_limit.unwrap();
		assert_eq!(rate_limit.window_ms, Some(30_000));
		assert_eq!(rate_limit.max_requests, Some(200));
	}

	#[test]
	fn test_layer_round_trips_through_toml() {
		// Exercises Serialize + PartialEq across every section, database and
		// crypto included.
		let layer = ServerConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: Some("sqlite:/var/lib/till/data.db".to_string()),
			}),
			crypto: Some(CryptoConfigLayer {
				encryption_key: Some("a2V5".to_string()),
			}),
			rate_limit: Some(RateLimitConfigLayer {
				window_ms: Some(30_000),
				max_requests: Some(50),
			}),
			automation: Some(AutomationConfigLayer {
				interval_ms: Some(60_000),
				restart_delay_ms: Some(5_000),
				disabled: Some(false),
			}),
			logging: Some(LoggingConfigLayer {
				level: Some("debug".to_string()),
				json: Some(true),
			}),
		};
		let rendered = toml::to_string(&layer).unwrap();
		let reparsed: ServerConfigLayer = toml::from_str(&rendered).unwrap();
		assert_eq!(reparsed, layer);
	}

	#[test]
	fn test_toml_deserialize_partial() {
		let layer: ServerConfigLayer = toml::from_str(
			r#"
			[automation]
			interval_ms = 60000

			[logging]
			level = "debug"
			"#,
		)
		.unwrap();
		assert_eq!(layer.automation.unwrap().interval_ms, Some(60_000));
		assert_eq!(layer.logging.unwrap().level, Some("debug".to_string()));
		assert!(layer.database.is_none());
	}
}
