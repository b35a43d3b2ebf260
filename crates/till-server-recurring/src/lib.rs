// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Recurring-transaction materialization and ledger services for Till.
//!
//! - [`materializer`] - converts recurring templates into dated ledger
//!   entries, exactly once per owed month, resumable after interruption
//! - [`service`] - entry and template CRUD over the encrypted-field
//!   boundary, with the materialize-before-list read path that keeps
//!   listings fresh without depending on the background scheduler
//!
//! The materializer is invoked from two places: inline on every entry
//! listing, and periodically by `till-server-automation`. Both run the same
//! pure projection over committed watermarks, which is what makes the double
//! invocation safe.

pub mod error;
pub mod materializer;
pub mod service;

pub use error::{LedgerServiceError, Result};
pub use materializer::{MaterializeOutcome, Materializer};
pub use service::{EntryQuery, EntryView, LedgerService, TemplateView};
