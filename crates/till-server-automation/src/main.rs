// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Till automation scheduler binary.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use till_server_automation::{AutomationSupervisor, AutomationWorker};
use till_server_db::{
	create_pool, run_migrations, ApiKeyRepository, EntryRepository, RecurringRepository,
	UserRepository,
};
use till_server_recurring::Materializer;

/// Till automation - background scheduler for recurring postings and API
/// key expiry.
#[derive(Parser, Debug)]
#[command(name = "till-automation", about = "Till automation scheduler", version)]
struct Args {
	/// Path to a server.toml config file (defaults to the system path).
	#[arg(long, env = "TILL_SERVER_CONFIG")]
	config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	// Load .env file if present
	dotenvy::dotenv().ok();

	let config = match args.config {
		Some(path) => till_server_config::load_config_with_file(path)?,
		None => till_server_config::load_config()?,
	};

	let filter = tracing_subscriber::EnvFilter::try_from_env("TILL_LOG")
		.unwrap_or_else(|_| config.logging.level.clone().into());
	if config.logging.json {
		tracing_subscriber::fmt().with_env_filter(filter).json().init();
	} else {
		tracing_subscriber::fmt().with_env_filter(filter).init();
	}

	// Kill switch: a disabled scheduler exits before touching the database.
	if config.automation.disabled {
		tracing::warn!("automation is disabled by configuration, exiting");
		return Ok(());
	}

	tracing::info!(
		database = %config.database.url,
		interval_ms = config.automation.interval_ms,
		"starting till-automation"
	);

	let pool = create_pool(&config.database.url).await?;
	run_migrations(&pool).await?;

	let worker = Arc::new(AutomationWorker::new(
		Arc::new(UserRepository::new(pool.clone())),
		Arc::new(ApiKeyRepository::new(pool.clone())),
		Materializer::new(
			Arc::new(RecurringRepository::new(pool.clone())),
			Arc::new(EntryRepository::new(pool)),
		),
	));

	let supervisor = AutomationSupervisor::new(worker, &config.automation);
	supervisor.start().await;

	tokio::signal::ctrl_c().await?;
	tracing::info!("shutdown signal received");
	supervisor.shutdown().await;

	Ok(())
}
