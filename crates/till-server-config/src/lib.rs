// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for the Till server processes.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`TILL_SERVER_*`)
//!
//! # Usage
//!
//! ```ignore
//! use till_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Database at {}", config.database.url);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	pub crypto: CryptoConfig,
	pub rate_limit: RateLimitConfig,
	pub automation: AutomationConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`TILL_SERVER_*`)
/// 2. Config file (`/etc/till/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	let mut sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	];

	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	let mut merged = ServerConfigLayer::default();
	merged.merge(EnvSource.load()?);
	finalize(merged)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	let mut sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	];

	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let crypto = layer.crypto.unwrap_or_default().finalize();
	let rate_limit = layer.rate_limit.unwrap_or_default().finalize();
	let automation = layer.automation.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&rate_limit, &automation)?;

	info!(
		database = %database.url,
		rate_limit_window_ms = rate_limit.window_ms,
		rate_limit_max_requests = rate_limit.max_requests,
		automation_interval_ms = automation.interval_ms,
		automation_disabled = automation.disabled,
		encryption_key_configured = crypto.encryption_key.is_some(),
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		database,
		crypto,
		rate_limit,
		automation,
		logging,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(
	rate_limit: &RateLimitConfig,
	automation: &AutomationConfig,
) -> Result<(), ConfigError> {
	if rate_limit.window_ms == 0 {
		return Err(ConfigError::Validation(
			"TILL_SERVER_RATE_LIMIT_WINDOW_MS must be greater than zero. A zero-length \
			 window would reject every request."
				.to_string(),
		));
	}

	if rate_limit.max_requests == 0 {
		return Err(ConfigError::Validation(
			"TILL_SERVER_RATE_LIMIT_MAX_REQUESTS must be greater than zero. Use the \
			 automation kill switch or remove API keys to block access entirely."
				.to_string(),
		));
	}

	if automation.interval_ms == 0 {
		return Err(ConfigError::Validation(
			"TILL_SERVER_AUTOMATION_INTERVAL_MS must be greater than zero. Set \
			 TILL_SERVER_AUTOMATION_DISABLED=1 to turn the scheduler off instead."
				.to_string(),
		));
	}

	Ok(())
}
