// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background automation for Till.
//!
//! Runs in its own process, separate from request serving:
//!
//! - [`worker`] - one cycle = materialize recurring templates for every
//!   user with active templates, then revoke expired API keys
//! - [`supervisor`] - owns the worker task, restarts it after a panic,
//!   drains the in-flight cycle on graceful shutdown
//!
//! The scheduler is a freshness optimization, not a correctness dependency:
//! read paths in `till-server-recurring` materialize inline, so a stopped
//! scheduler only delays postings until the next read.

pub mod supervisor;
pub mod worker;

pub use supervisor::AutomationSupervisor;
pub use worker::{AutomationWorker, CycleOutcome};
