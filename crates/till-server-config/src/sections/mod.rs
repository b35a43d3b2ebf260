// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.
//!
//! Each section owns one concern and comes in two flavours: the resolved
//! `XxxConfig` used at runtime and the partial `XxxConfigLayer` used while
//! merging sources.

pub mod automation;
pub mod crypto;
pub mod database;
pub mod logging;
pub mod rate_limit;

pub use automation::{AutomationConfig, AutomationConfigLayer};
pub use crypto::{CryptoConfig, CryptoConfigLayer};
pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use rate_limit::{RateLimitConfig, RateLimitConfigLayer};
