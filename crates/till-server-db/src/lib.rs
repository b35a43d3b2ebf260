// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Database layer for the Till server.
//!
//! SQLite-backed repositories for users, recurring templates, ledger entries
//! and API keys. Each repository pairs a concrete `XxxRepository` with an
//! `XxxStore` trait so services can be tested against fakes.
//!
//! Conventions:
//! - ids are UUID TEXT, timestamps RFC 3339 TEXT, calendar dates `YYYY-MM-DD` TEXT
//! - encrypted fields are opaque JSON payload TEXT, never inspected here
//! - booleans are INTEGER 0/1

pub mod api_key;
pub mod entry;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod recurring;
mod row;
pub mod testing;
pub mod user;

pub use api_key::{ApiKeyRepository, ApiKeyStore};
pub use entry::{EntryFilter, EntryRepository, EntryStore, DEFAULT_LIST_LIMIT};
pub use error::{DbError, Result};
pub use migrations::run_migrations;
pub use pool::create_pool;
pub use recurring::{RecurringRepository, RecurringStore};
pub use user::{UserRepository, UserStore};
