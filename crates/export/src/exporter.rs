// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	collections::{BTreeMap, HashMap},
	sync::Arc,
	time::Duration,
};

use tokio::{
	select,
	sync::watch,
	task::JoinSet,
	time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tombstone_cdc::{ChangeStream, CheckpointStore};
use tombstone_sink::{Sink, SinkAdapter};
use tombstone_type::{Error, PartitionId, Result, SharedClock, SystemClock};
use tracing::{debug, error, info, instrument};

use crate::{ExportConfig, ExportCoordinator, ExportMetrics, MetricsSnapshot};

/// Runs one [`ExportCoordinator`] per stream partition, plus the shared tick
/// timer, until shutdown or until every partition has closed.
///
/// A partition that fails is reported in the [`ExportReport`]; the others
/// keep running.
pub struct Exporter {
	config: ExportConfig,
	stream: Arc<dyn ChangeStream>,
	adapter: SinkAdapter,
	checkpoints: Arc<dyn CheckpointStore>,
	clock: SharedClock,
	metrics: Arc<ExportMetrics>,
	shutdown: CancellationToken,
}

impl Exporter {
	pub fn new(
		config: ExportConfig,
		stream: Arc<dyn ChangeStream>,
		sink: Arc<dyn Sink>,
		checkpoints: Arc<dyn CheckpointStore>,
	) -> Self {
		let clock: SharedClock = Arc::new(SystemClock);
		let adapter = SinkAdapter::new(sink, config.delivery_mode)
			.with_retry(config.retry_policy())
			.with_layout(config.object_layout())
			.with_max_record_bytes(config.max_record_bytes)
			.with_clock(clock.clone());

		Self {
			config,
			stream,
			adapter,
			checkpoints,
			clock,
			metrics: Arc::new(ExportMetrics::new()),
			shutdown: CancellationToken::new(),
		}
	}

	pub fn with_clock(mut self, clock: SharedClock) -> Self {
		self.adapter = self.adapter.with_clock(clock.clone());
		self.clock = clock;
		self
	}

	pub fn config(&self) -> &ExportConfig {
		&self.config
	}

	pub fn metrics(&self) -> Arc<ExportMetrics> {
		self.metrics.clone()
	}

	/// Token that stops the exporter when cancelled. Every coordinator drains
	/// its open batch before stopping.
	pub fn shutdown_token(&self) -> CancellationToken {
		self.shutdown.clone()
	}

	pub fn shutdown(&self) {
		self.shutdown.cancel();
	}

	pub fn coordinator(&self, partition: PartitionId) -> ExportCoordinator {
		let metrics = self.metrics.partition(&partition);
		ExportCoordinator::new(partition, self.stream.clone(), self.adapter.clone(), self.checkpoints.clone(), &self.config)
			.with_clock(self.clock.clone())
			.with_metrics(metrics)
	}

	#[instrument(name = "exporter::run", level = "info", skip_all, fields(
		stream = %self.config.stream_name,
		sink = %self.config.sink_target,
	))]
	pub async fn run(&self) -> Result<ExportReport> {
		self.config.validate()?;

		let partitions = self.stream.partitions().await?;
		info!(
			partitions = partitions.len(),
			mode = ?self.config.delivery_mode,
			starting_position = ?self.config.starting_position,
			"exporter started"
		);

		let (tick_tx, tick_rx) = watch::channel(());
		let ticker_shutdown = CancellationToken::new();
		let ticker = tokio::spawn(ticker(self.config.tick_interval(), tick_tx, ticker_shutdown.clone()));

		let mut tasks = JoinSet::new();
		let mut task_partitions = HashMap::new();
		for partition in partitions {
			let mut coordinator = self.coordinator(partition.clone());
			let ticks = tick_rx.clone();
			let shutdown = self.shutdown.child_token();

			let handle = tasks.spawn(async move { coordinator.run(ticks, shutdown).await });
			task_partitions.insert(handle.id(), partition);
		}
		drop(tick_rx);

		let mut outcomes = BTreeMap::new();
		while let Some(joined) = tasks.join_next_with_id().await {
			let (id, result) = match joined {
				Ok((id, result)) => (id, result),
				Err(err) => (err.id(), Err(Error::Internal(format!("coordinator task failed: {}", err)))),
			};
			let Some(partition) = task_partitions.remove(&id) else {
				continue;
			};

			match &result {
				Ok(()) => debug!(partition = %partition, "partition export finished"),
				Err(err) => error!(
					alert = true,
					partition = %partition,
					code = err.code(),
					error = %err,
					"partition export failed"
				),
			}
			outcomes.insert(partition, result);
		}

		ticker_shutdown.cancel();
		let _ = ticker.await;

		let report = ExportReport {
			outcomes,
			metrics: self.metrics.snapshots(),
		};
		info!(partitions = report.outcomes.len(), failed = report.failed().count(), "exporter stopped");
		Ok(report)
	}
}

/// Publish a tick every `period` until shutdown or until no coordinator
/// listens any more.
async fn ticker(period: Duration, ticks: watch::Sender<()>, shutdown: CancellationToken) {
	let mut interval = interval(period);
	interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
	interval.tick().await;

	loop {
		select! {
			_ = shutdown.cancelled() => break,
			_ = interval.tick() => {
				if ticks.send(()).is_err() {
					break;
				}
			}
		}
	}
}

/// Final state of every partition.
#[derive(Debug)]
pub struct ExportReport {
	pub outcomes: BTreeMap<PartitionId, Result<()>>,
	pub metrics: BTreeMap<PartitionId, MetricsSnapshot>,
}

impl ExportReport {
	pub fn is_clean(&self) -> bool {
		self.outcomes.values().all(Result::is_ok)
	}

	pub fn failed(&self) -> impl Iterator<Item = (&PartitionId, &Error)> {
		self.outcomes.iter().filter_map(|(partition, result)| result.as_ref().err().map(|err| (partition, err)))
	}
}
