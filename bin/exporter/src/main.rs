// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Exports deletions from a directory of change stream partition files into a
//! local archive directory.
//!
//! Configuration comes from the JSON file named by the first argument or by
//! `TOMBSTONE_CONFIG`, then `TOMBSTONE_*` overrides. `streamName` is the
//! stream directory and `sinkTarget` the archive directory.

use std::{env, path::PathBuf, process::ExitCode, sync::Arc};

use tombstone_cdc::{FileChangeStream, FileCheckpointStore};
use tombstone_export::{ExportConfig, Exporter};
use tombstone_sink::DirectorySink;
use tombstone_type::Result;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

const CONFIG_VAR: &str = "TOMBSTONE_CONFIG";
const LOG_FORMAT_VAR: &str = "TOMBSTONE_LOG_FORMAT";
const DEFAULT_CHECKPOINT_FILE: &str = "tombstone-checkpoints.json";

fn init_logging() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let builder = fmt().with_env_filter(filter).with_target(false);

	match env::var(LOG_FORMAT_VAR).as_deref() {
		Ok("json") => builder.json().init(),
		_ => builder.init(),
	}
}

fn load_config() -> Result<ExportConfig> {
	let path = env::args().nth(1).or_else(|| env::var(CONFIG_VAR).ok());
	let config = match path {
		Some(path) => {
			info!(path = %path, "loading configuration");
			ExportConfig::from_file(path)?
		}
		None => ExportConfig::default(),
	};

	let config = config.with_env_overrides()?;
	config.validate()?;
	Ok(config)
}

async fn run() -> Result<bool> {
	let config = load_config()?;
	let checkpoint_path = config.checkpoint_path.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CHECKPOINT_FILE));

	let stream = Arc::new(FileChangeStream::new(&config.stream_name));
	let sink = Arc::new(DirectorySink::new(&config.sink_target));
	let checkpoints = Arc::new(FileCheckpointStore::open(&checkpoint_path).await?);
	info!(
		stream = %config.stream_name,
		sink = %config.sink_target,
		checkpoints = %checkpoint_path.display(),
		"exporter configured"
	);

	let exporter = Exporter::new(config, stream, sink, checkpoints);

	let shutdown = exporter.shutdown_token();
	tokio::spawn(async move {
		match tokio::signal::ctrl_c().await {
			Ok(()) => {
				info!("interrupt received, draining");
				shutdown.cancel();
			}
			Err(err) => warn!(error = %err, "cannot listen for interrupts"),
		}
	});

	let report = exporter.run().await?;
	for (partition, err) in report.failed() {
		error!(alert = true, partition = %partition, code = err.code(), error = %err, "partition requires attention");
	}
	for (partition, metrics) in &report.metrics {
		info!(partition = %partition, metrics = ?metrics, "partition summary");
	}

	Ok(report.is_clean())
}

#[tokio::main]
async fn main() -> ExitCode {
	init_logging();

	match run().await {
		Ok(true) => ExitCode::SUCCESS,
		Ok(false) => ExitCode::FAILURE,
		Err(err) => {
			error!(code = err.code(), error = %err, "exporter failed");
			ExitCode::FAILURE
		}
	}
}
