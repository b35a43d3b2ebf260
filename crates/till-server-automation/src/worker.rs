// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! One automation cycle: materialize every user, sweep expired keys.
//!
//! A cycle walks the work list of users owning active templates, runs the
//! materializer for both ledger kinds per user, then revokes API keys whose
//! expiry has passed. Failures are contained at the user level; one broken
//! user never blocks recurring postings for the rest.
//!
//! Cycles are reentrancy-guarded: if a tick fires while the previous cycle
//! is still running, the new cycle is skipped rather than run concurrently.
//! Cycles therefore execute in wall-clock sequence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;

use till_ledger_core::{LedgerKind, UserId};
use till_server_db::{ApiKeyStore, DbError, UserStore};
use till_server_recurring::Materializer;

/// What one scheduler cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
	/// True when the cycle was skipped because the previous one was still
	/// running.
	pub skipped: bool,
	pub users_processed: usize,
	/// Users whose materialization could not even start.
	pub users_failed: usize,
	pub entries_created: usize,
	/// Templates that aborted mid-catch-up across all users.
	pub templates_failed: usize,
	pub keys_revoked: u64,
}

impl CycleOutcome {
	fn skipped() -> Self {
		Self {
			skipped: true,
			..Self::default()
		}
	}
}

/// Runs automation cycles over the shared stores.
pub struct AutomationWorker {
	users: Arc<dyn UserStore>,
	api_keys: Arc<dyn ApiKeyStore>,
	materializer: Materializer,
	running: AtomicBool,
}

/// Clears the running flag when a cycle ends, however it ends.
struct CycleGuard<'a> {
	flag: &'a AtomicBool,
}

impl<'a> CycleGuard<'a> {
	fn acquire(flag: &'a AtomicBool) -> Option<Self> {
		flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
			.ok()
			.map(|_| Self { flag })
	}
}

impl Drop for CycleGuard<'_> {
	fn drop(&mut self) {
		self.flag.store(false, Ordering::SeqCst);
	}
}

impl AutomationWorker {
	pub fn new(
		users: Arc<dyn UserStore>,
		api_keys: Arc<dyn ApiKeyStore>,
		materializer: Materializer,
	) -> Self {
		Self {
			users,
			api_keys,
			materializer,
			running: AtomicBool::new(false),
		}
	}

	/// Runs one cycle, or skips it if the previous one is still running.
	#[tracing::instrument(skip(self))]
	pub async fn run_cycle(&self) -> CycleOutcome {
		let Some(_guard) = CycleGuard::acquire(&self.running) else {
			tracing::warn!("previous automation cycle still running, skipping this one");
			return CycleOutcome::skipped();
		};

		let mut outcome = CycleOutcome::default();

		match self.users.users_with_active_templates().await {
			Ok(users) => {
				for user_id in &users {
					match self.materialize_user(user_id).await {
						Ok((created, failed)) => {
							outcome.users_processed += 1;
							outcome.entries_created += created;
							outcome.templates_failed += failed;
						}
						Err(error) => {
							outcome.users_failed += 1;
							tracing::error!(
								user_id = %user_id,
								error = %error,
								"materialization failed for user, continuing with the rest"
							);
						}
					}
				}
			}
			Err(error) => {
				tracing::error!(error = %error, "failed to enumerate users with active templates");
			}
		}

		match self.api_keys.revoke_expired_api_keys(Utc::now()).await {
			Ok(revoked) => {
				outcome.keys_revoked = revoked;
				if revoked > 0 {
					tracing::info!(revoked, "revoked expired API keys");
				}
			}
			Err(error) => {
				tracing::error!(error = %error, "expired API key sweep failed");
			}
		}

		tracing::debug!(
			users_processed = outcome.users_processed,
			users_failed = outcome.users_failed,
			entries_created = outcome.entries_created,
			keys_revoked = outcome.keys_revoked,
			"automation cycle finished"
		);
		outcome
	}

	/// Materializes both ledger kinds for one user, sequentially.
	async fn materialize_user(&self, user_id: &UserId) -> Result<(usize, usize), DbError> {
		let mut created = 0;
		let mut failed = 0;
		for kind in [LedgerKind::Expense, LedgerKind::Income] {
			let outcome = self.materializer.materialize(user_id, kind).await?;
			created += outcome.entries_created;
			failed += outcome.templates_failed;
		}
		Ok((created, failed))
	}
}
