// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Supervision of the automation worker loop.
//!
//! The supervisor owns the worker task handle. The worker loop wakes on a
//! fixed interval and runs one cycle per tick; if the loop panics, the
//! supervisor respawns it after the configured delay. Graceful shutdown
//! never restarts: the loop stops accepting ticks, any in-flight cycle runs
//! to completion, and the supervisor task exits.
//!
//! ```text
//! supervisor task
//!    │ spawn
//!    ▼
//! worker loop ── tick ──▶ run_cycle ──▶ tick ──▶ …
//!    │ panic                                │ shutdown signal
//!    ▼                                      ▼
//! sleep(restart_delay), respawn          drain + exit
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use till_server_config::AutomationConfig;

use crate::worker::AutomationWorker;

/// Owns and supervises the background worker task.
pub struct AutomationSupervisor {
	worker: Arc<AutomationWorker>,
	interval: Duration,
	restart_delay: Duration,
	shutdown_tx: broadcast::Sender<()>,
	handle: Mutex<Option<JoinHandle<()>>>,
}

impl AutomationSupervisor {
	pub fn new(worker: Arc<AutomationWorker>, config: &AutomationConfig) -> Self {
		let (shutdown_tx, _) = broadcast::channel(1);
		Self {
			worker,
			interval: Duration::from_millis(config.interval_ms),
			restart_delay: Duration::from_millis(config.restart_delay_ms),
			shutdown_tx,
			handle: Mutex::new(None),
		}
	}

	/// Spawns the supervised worker loop.
	///
	/// Starting an already-started supervisor is a no-op, so there is never
	/// more than one supervision chain.
	///
	/// # Returns
	/// `false` if the supervisor was already running.
	#[tracing::instrument(skip(self))]
	pub async fn start(&self) -> bool {
		let mut handle = self.handle.lock().await;
		if handle.is_some() {
			warn!("automation supervisor already started, ignoring");
			return false;
		}

		let worker = Arc::clone(&self.worker);
		let interval = self.interval;
		let restart_delay = self.restart_delay;
		let shutdown_tx = self.shutdown_tx.clone();
		// subscribe before spawning: a shutdown sent right after start() must
		// land in an existing receiver, not race the first poll of the task
		let mut supervisor_rx = self.shutdown_tx.subscribe();
		let first_rx = self.shutdown_tx.subscribe();

		*handle = Some(tokio::spawn(async move {
			let mut next_rx = Some(first_rx);
			loop {
				let shutdown_rx = match next_rx.take() {
					Some(rx) => rx,
					None => {
						// respawn path: subscribe first, then drain the
						// long-lived receiver. A shutdown sent before this
						// point is buffered there; one sent after is seen by
						// the fresh subscription. No window is unobserved.
						let rx = shutdown_tx.subscribe();
						match supervisor_rx.try_recv() {
							Err(broadcast::error::TryRecvError::Empty) => rx,
							_ => break,
						}
					}
				};
				let run = tokio::spawn(worker_loop(Arc::clone(&worker), interval, shutdown_rx));
				match run.await {
					Ok(()) => break,
					Err(join_error) if join_error.is_panic() => {
						error!(
							restart_delay_ms = restart_delay.as_millis() as u64,
							"automation worker panicked, restarting after delay"
						);
						tokio::select! {
							_ = tokio::time::sleep(restart_delay) => {}
							_ = supervisor_rx.recv() => break,
						}
					}
					Err(_) => break,
				}
			}
			info!("automation supervision ended");
		}));

		info!(
			interval_ms = self.interval.as_millis() as u64,
			"automation supervisor started"
		);
		true
	}

	/// Signals shutdown and waits for the worker to drain.
	///
	/// An in-flight cycle finishes; no new cycle starts.
	#[tracing::instrument(skip(self))]
	pub async fn shutdown(&self) {
		let _ = self.shutdown_tx.send(());

		let handle = self.handle.lock().await.take();
		if let Some(handle) = handle {
			let _ = handle.await;
		}
		info!("automation supervisor shut down");
	}
}

/// The worker loop proper: one cycle per tick until shutdown.
async fn worker_loop(
	worker: Arc<AutomationWorker>,
	interval: Duration,
	mut shutdown_rx: broadcast::Receiver<()>,
) {
	let mut ticker = tokio::time::interval(interval);
	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
	// the first tick completes immediately; consume it so the first cycle
	// runs one interval after boot
	ticker.tick().await;

	loop {
		tokio::select! {
			_ = ticker.tick() => {
				// runs to completion before shutdown is observed, which is
				// what drains an in-flight cycle on exit
				let outcome = worker.run_cycle().await;
				if outcome.skipped {
					debug!("cycle skipped, previous still running");
				}
			}
			_ = shutdown_rx.recv() => {
				info!("automation worker shutting down");
				break;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::sync::atomic::{AtomicUsize, Ordering};

	use async_trait::async_trait;

	use till_ledger_core::{User, UserId};
	use till_server_db::testing::create_migrated_pool;
	use till_server_db::{ApiKeyRepository, DbError, EntryRepository, RecurringRepository, UserStore};
	use till_server_recurring::Materializer;

	fn test_config(interval_ms: u64, restart_delay_ms: u64) -> AutomationConfig {
		AutomationConfig {
			interval_ms,
			restart_delay_ms,
			disabled: false,
		}
	}

	/// Counts enumeration calls; panics on calls where `panic_on` matches.
	struct CountingUserStore {
		calls: Arc<AtomicUsize>,
		panic_on: Option<usize>,
	}

	#[async_trait]
	impl UserStore for CountingUserStore {
		async fn get_user(&self, _id: &UserId) -> Result<Option<User>, DbError> {
			Ok(None)
		}

		async fn users_with_active_templates(&self) -> Result<Vec<UserId>, DbError> {
			let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
			if self.panic_on == Some(call) {
				panic!("simulated worker crash");
			}
			Ok(Vec::new())
		}

		async fn create_user(
			&self,
			_display_name: &str,
			_email: &str,
			_default_currency: Option<&str>,
		) -> Result<User, DbError> {
			Err(DbError::Internal("not supported".to_string()))
		}
	}

	async fn supervisor_with(
		calls: Arc<AtomicUsize>,
		panic_on: Option<usize>,
		config: AutomationConfig,
	) -> AutomationSupervisor {
		let pool = create_migrated_pool().await;
		let worker = Arc::new(AutomationWorker::new(
			Arc::new(CountingUserStore { calls, panic_on }),
			Arc::new(ApiKeyRepository::new(pool.clone())),
			Materializer::new(
				Arc::new(RecurringRepository::new(pool.clone())),
				Arc::new(EntryRepository::new(pool)),
			),
		));
		AutomationSupervisor::new(worker, &config)
	}

	#[tokio::test]
	async fn cycles_run_on_the_interval_until_shutdown() {
		let calls = Arc::new(AtomicUsize::new(0));
		let supervisor = supervisor_with(Arc::clone(&calls), None, test_config(10, 5)).await;

		assert!(supervisor.start().await);
		tokio::time::sleep(Duration::from_millis(55)).await;
		supervisor.shutdown().await;

		let ran = calls.load(Ordering::SeqCst);
		assert!(ran >= 2, "expected at least two cycles, got {ran}");

		// No further cycles after shutdown.
		tokio::time::sleep(Duration::from_millis(30)).await;
		assert_eq!(calls.load(Ordering::SeqCst), ran);
	}

	#[tokio::test]
	async fn starting_twice_is_a_no_op() {
		let calls = Arc::new(AtomicUsize::new(0));
		let supervisor = supervisor_with(calls, None, test_config(10_000, 5)).await;

		assert!(supervisor.start().await);
		assert!(!supervisor.start().await);
		supervisor.shutdown().await;
	}

	#[tokio::test]
	async fn panicked_worker_is_restarted_after_the_delay() {
		let calls = Arc::new(AtomicUsize::new(0));
		// The very first cycle panics; later cycles succeed.
		let supervisor = supervisor_with(Arc::clone(&calls), Some(1), test_config(10, 10)).await;

		assert!(supervisor.start().await);
		tokio::time::sleep(Duration::from_millis(80)).await;
		supervisor.shutdown().await;

		// The first call panicked, so anything beyond one call proves the
		// loop was respawned.
		assert!(
			calls.load(Ordering::SeqCst) >= 2,
			"worker was not restarted after panic"
		);
	}

	#[tokio::test]
	async fn shutdown_right_after_start_is_not_lost() {
		let calls = Arc::new(AtomicUsize::new(0));
		let supervisor = supervisor_with(Arc::clone(&calls), None, test_config(10_000, 5)).await;

		// No yield between start and shutdown: on a current-thread runtime
		// the supervision task has not been polled yet when the signal is
		// sent, so the signal must be buffered, not dropped.
		assert!(supervisor.start().await);
		tokio::time::timeout(Duration::from_secs(5), supervisor.shutdown())
			.await
			.expect("shutdown did not complete");
		assert_eq!(calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn shutdown_before_start_is_harmless() {
		let calls = Arc::new(AtomicUsize::new(0));
		let supervisor = supervisor_with(Arc::clone(&calls), None, test_config(10, 5)).await;

		supervisor.shutdown().await;
		assert_eq!(calls.load(Ordering::SeqCst), 0);
	}
}
