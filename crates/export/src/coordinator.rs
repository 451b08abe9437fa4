// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Per-partition export state machine.

use std::{
	collections::{HashSet, VecDeque},
	sync::Arc,
	time::Duration,
};

use tokio::{
	select,
	sync::watch,
	time::{Instant, sleep, sleep_until},
};
use tokio_util::sync::CancellationToken;
use tombstone_cdc::{
	ChangeStream, CheckpointStore, EventFilter, RawChangeRecord, StartingPosition, StreamBatch, StreamPosition, decode,
};
use tombstone_sink::{Batch, RetryPolicy, SinkAdapter};
use tombstone_type::{Error, PartitionId, Result, SequenceToken, SharedClock, SystemClock};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::{BatchAccumulator, CheckpointLedger, ExportConfig, PartitionMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
	/// Nothing pulled yet.
	Idle,
	Consuming,
	/// A delivery is in flight.
	Flushing,
	/// Shutting down: no more pulls, the open batch is being flushed.
	Draining,
	Stopped,
	/// Halted by a fatal partition error.
	Failed,
}

impl CoordinatorState {
	pub fn is_terminal(&self) -> bool {
		matches!(self, CoordinatorState::Stopped | CoordinatorState::Failed)
	}
}

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
	pub starting_position: StartingPosition,
	pub pull_limit: usize,
	pub poll_interval: Duration,
	pub flush_retry_attempts: u32,
	pub flush_on_pull_end: bool,
	/// Delays between whole-flush retries.
	pub backoff: RetryPolicy,
}

impl From<&ExportConfig> for CoordinatorSettings {
	fn from(config: &ExportConfig) -> Self {
		Self {
			starting_position: config.starting_position,
			pull_limit: config.pull_limit,
			poll_interval: config.poll_interval(),
			flush_retry_attempts: config.flush_retry_attempts,
			flush_on_pull_end: config.flush_on_pull_end,
			backoff: config.retry_policy(),
		}
	}
}

/// Exports the deletions of one stream partition.
///
/// Processing is strictly sequential: pull, decode and filter, accumulate,
/// flush, advance the checkpoint. At most one delivery is in flight, and the
/// checkpoint only moves past events the sink has accepted.
///
/// The coordinator can run its own polling loop ([`ExportCoordinator::run`])
/// or be driven by an external scheduler through [`ExportCoordinator::handle`],
/// [`ExportCoordinator::tick`] and [`ExportCoordinator::drain`].
pub struct ExportCoordinator {
	partition: PartitionId,
	stream: Arc<dyn ChangeStream>,
	adapter: SinkAdapter,
	checkpoints: Arc<dyn CheckpointStore>,
	clock: SharedClock,
	metrics: Arc<PartitionMetrics>,
	settings: CoordinatorSettings,

	filter: EventFilter,
	accumulator: BatchAccumulator,
	ledger: CheckpointLedger,

	state: CoordinatorState,
	position: StreamPosition,
	checkpoint: Option<SequenceToken>,
	consecutive_failures: u32,
}

enum LoopEvent {
	Shutdown,
	Tick,
	TimerClosed,
	Pulled(Result<StreamBatch>),
}

impl ExportCoordinator {
	pub fn new(
		partition: PartitionId,
		stream: Arc<dyn ChangeStream>,
		adapter: SinkAdapter,
		checkpoints: Arc<dyn CheckpointStore>,
		config: &ExportConfig,
	) -> Self {
		Self {
			partition,
			stream,
			adapter,
			checkpoints,
			clock: Arc::new(SystemClock),
			metrics: Arc::new(PartitionMetrics::default()),
			settings: CoordinatorSettings::from(config),
			filter: config.event_filter(),
			accumulator: BatchAccumulator::new(config.accumulator_limits())
				.with_partition_by(config.object_partition_by),
			ledger: CheckpointLedger::new(),
			state: CoordinatorState::Idle,
			position: StreamPosition::Latest,
			checkpoint: None,
			consecutive_failures: 0,
		}
	}

	pub fn with_clock(mut self, clock: SharedClock) -> Self {
		self.clock = clock;
		self
	}

	pub fn with_metrics(mut self, metrics: Arc<PartitionMetrics>) -> Self {
		self.metrics = metrics;
		self
	}

	pub fn partition(&self) -> &PartitionId {
		&self.partition
	}

	pub fn state(&self) -> CoordinatorState {
		self.state
	}

	/// Last checkpoint written by this coordinator, or loaded at start.
	pub fn checkpoint(&self) -> Option<&SequenceToken> {
		self.checkpoint.as_ref()
	}

	/// Events accepted but not yet covered by the checkpoint.
	pub fn pending(&self) -> usize {
		self.ledger.len()
	}

	/// Events waiting in the open batch.
	pub fn buffered(&self) -> usize {
		self.accumulator.len()
	}

	pub fn metrics(&self) -> Arc<PartitionMetrics> {
		self.metrics.clone()
	}

	/// Load the checkpoint and pick the stream position. Does nothing unless
	/// the coordinator is idle.
	pub async fn start(&mut self) -> Result<()> {
		if self.state != CoordinatorState::Idle {
			return Ok(());
		}

		let checkpoint = self.checkpoints.load(&self.partition).await?;
		self.position = StreamPosition::initial(checkpoint.clone(), self.settings.starting_position);
		info!(
			partition = %self.partition,
			checkpoint = ?checkpoint,
			position = ?self.position,
			"coordinator started"
		);

		self.checkpoint = checkpoint;
		self.state = CoordinatorState::Consuming;
		Ok(())
	}

	/// Process one stream batch: decode, filter and accumulate its records,
	/// flushing whatever batches seal along the way.
	pub async fn handle(&mut self, records: Vec<RawChangeRecord>) -> Result<()> {
		self.start().await?;
		self.ensure_active()?;

		let now = self.clock.now();
		let decoded = records.iter().map(|record| decode(record, now)).collect();
		let (events, summary) = self.filter.filter(decoded);
		self.metrics.record_filter(&summary);
		trace!(
			partition = %self.partition,
			records = records.len(),
			events = events.len(),
			dropped = summary.dropped(),
			"filtered stream batch"
		);

		for event in events {
			self.ledger.track(event.sequence.clone());
			if let Some(batch) = self.accumulator.append(event, now)? {
				self.flush(batch).await?;
			}
		}

		if self.settings.flush_on_pull_end {
			if let Some(batch) = self.accumulator.flush() {
				self.flush(batch).await?;
			}
			return Ok(());
		}

		self.tick().await
	}

	/// Flush the open batch if it has hit its age or size bound.
	pub async fn tick(&mut self) -> Result<()> {
		self.ensure_active()?;

		if let Some(batch) = self.accumulator.tick(self.clock.now()) {
			self.flush(batch).await?;
		}
		Ok(())
	}

	/// Stop consuming and flush everything still buffered, including events
	/// requeued by partial deliveries, then stop.
	pub async fn drain(&mut self) -> Result<()> {
		if self.state == CoordinatorState::Stopped {
			return Ok(());
		}
		self.ensure_active()?;

		self.state = CoordinatorState::Draining;
		info!(partition = %self.partition, buffered = self.accumulator.len(), "draining");

		while let Some(batch) = self.accumulator.flush() {
			self.flush(batch).await?;
			if !self.accumulator.is_empty() {
				sleep(self.settings.backoff.delay(self.consecutive_failures.max(1))).await;
			}
		}

		self.state = CoordinatorState::Stopped;
		info!(
			partition = %self.partition,
			checkpoint = ?self.checkpoint,
			pending = self.ledger.len(),
			metrics = ?self.metrics.snapshot(),
			"coordinator stopped"
		);
		Ok(())
	}

	/// Poll the stream until shutdown or until the partition closes, then
	/// drain.
	///
	/// Shutdown and ticks are only observed between steps. A delivery that
	/// has started always runs to completion. After an empty pull the next
	/// pull waits for the poll interval; ticks in between do not push that
	/// deadline back.
	#[instrument(name = "coordinator::run", level = "info", skip_all, fields(partition = %self.partition))]
	pub async fn run(&mut self, mut ticks: watch::Receiver<()>, shutdown: CancellationToken) -> Result<()> {
		self.start().await?;

		let mut ticks_open = true;
		let mut next_pull = Instant::now();

		loop {
			let event = select! {
				biased;

				_ = shutdown.cancelled() => LoopEvent::Shutdown,

				changed = ticks.changed(), if ticks_open => match changed {
					Ok(()) => LoopEvent::Tick,
					Err(_) => LoopEvent::TimerClosed,
				},

				pulled = pull(self.stream.as_ref(), &self.partition, &self.position, self.settings.pull_limit, next_pull) => {
					LoopEvent::Pulled(pulled)
				}
			};

			match event {
				LoopEvent::Shutdown => {
					debug!(partition = %self.partition, "shutdown signal received");
					break;
				}
				LoopEvent::Tick => self.tick().await?,
				LoopEvent::TimerClosed => {
					debug!(partition = %self.partition, "tick timer closed");
					ticks_open = false;
				}
				LoopEvent::Pulled(Ok(batch)) => {
					let closed = batch.is_closed();
					next_pull = if batch.records.is_empty() {
						Instant::now() + self.settings.poll_interval
					} else {
						Instant::now()
					};
					self.apply(batch).await?;

					if closed {
						info!(partition = %self.partition, "partition closed");
						break;
					}
				}
				LoopEvent::Pulled(Err(err)) => {
					warn!(partition = %self.partition, error = %err, "stream pull failed");
					next_pull = Instant::now() + self.settings.poll_interval;
				}
			}
		}

		self.drain().await
	}

	async fn apply(&mut self, batch: StreamBatch) -> Result<()> {
		self.metrics.record_pull(batch.records.len(), batch.unparseable);
		if let Some(continuation) = batch.continuation {
			self.position = StreamPosition::Continue(continuation);
		}
		self.handle(batch.records).await
	}

	fn ensure_active(&self) -> Result<()> {
		if self.state.is_terminal() {
			return Err(Error::Internal(format!(
				"coordinator for partition {} is {:?}",
				self.partition, self.state
			)));
		}
		Ok(())
	}

	/// Deliver `batch`, and any batch displaced by requeued events, one at a
	/// time.
	async fn flush(&mut self, batch: Batch) -> Result<()> {
		let previous = self.state;
		self.state = CoordinatorState::Flushing;

		let mut queue = VecDeque::from([batch]);
		while let Some(batch) = queue.pop_front() {
			match self.deliver(batch).await {
				Ok(Some(displaced)) => queue.push_back(displaced),
				Ok(None) => {}
				Err(err) => {
					if self.state != CoordinatorState::Failed {
						self.state = CoordinatorState::Failed;
						error!(alert = true, partition = %self.partition, code = err.code(), error = %err, "partition halted");
					}
					return Err(err);
				}
			}
		}

		self.state = previous;
		Ok(())
	}

	/// Deliver one batch, retrying it whole while nothing gets through.
	/// Returns a batch the requeue displaced, if any.
	async fn deliver(&mut self, batch: Batch) -> Result<Option<Batch>> {
		let mut attempt = 0;
		let receipt = loop {
			let receipt = self.adapter.deliver(&self.partition, &batch).await?;
			self.metrics.record_delivery(&receipt);

			if !receipt.is_total_failure() {
				break receipt;
			}

			attempt += 1;
			let reason = failure_reason(receipt.error.as_ref());
			if attempt > self.settings.flush_retry_attempts {
				return Err(self.fail(attempt as usize, reason));
			}

			let delay = self.settings.backoff.delay(attempt);
			warn!(
				partition = %self.partition,
				attempt,
				max_attempts = self.settings.flush_retry_attempts + 1,
				delay_ms = delay.as_millis() as u64,
				events = batch.len(),
				error = %reason,
				"batch delivery failed, retrying flush"
			);
			sleep(delay).await;
		};

		let retry: HashSet<&SequenceToken> = receipt.retry.iter().map(|event| &event.sequence).collect();
		for event in batch.events() {
			if !retry.contains(&event.sequence) {
				self.ledger.resolve(&event.sequence);
			}
		}
		self.advance_checkpoint().await?;

		if receipt.success {
			self.consecutive_failures = 0;
			return Ok(None);
		}

		self.consecutive_failures += 1;
		if self.consecutive_failures > self.settings.flush_retry_attempts {
			return Err(self.fail(self.consecutive_failures as usize, failure_reason(receipt.error.as_ref())));
		}

		warn!(
			partition = %self.partition,
			delivered = receipt.delivered_count,
			retry = receipt.retry.len(),
			rejected = receipt.rejected.len(),
			consecutive_failures = self.consecutive_failures,
			"partial delivery, requeueing failed events"
		);
		self.accumulator.requeue(receipt.retry, self.clock.now())
	}

	/// Move the checkpoint to the end of the resolved prefix.
	async fn advance_checkpoint(&mut self) -> Result<()> {
		let Some(token) = self.ledger.resolved_prefix_end().cloned() else {
			return Ok(());
		};

		if self.checkpoint.as_ref().is_none_or(|current| &token > current) {
			self.checkpoints.advance(&self.partition, token.clone()).await?;
			self.metrics.record_checkpoint();
			debug!(partition = %self.partition, checkpoint = %token, "checkpoint advanced");
			self.checkpoint = Some(token.clone());
		}

		self.ledger.commit(&token);
		Ok(())
	}

	fn fail(&mut self, attempts: usize, reason: String) -> Error {
		self.state = CoordinatorState::Failed;
		let err = Error::FatalPartition {
			partition: self.partition.clone(),
			attempts,
			reason,
		};
		error!(
			alert = true,
			partition = %self.partition,
			code = err.code(),
			checkpoint = ?self.checkpoint,
			pending = self.ledger.len(),
			error = %err,
			"partition halted, operator intervention required"
		);
		err
	}
}

async fn pull(
	stream: &dyn ChangeStream,
	partition: &PartitionId,
	position: &StreamPosition,
	limit: usize,
	ready_at: Instant,
) -> Result<StreamBatch> {
	sleep_until(ready_at).await;
	stream.pull(partition, position, limit).await
}

fn failure_reason(error: Option<&tombstone_sink::SinkError>) -> String {
	error.map(ToString::to_string).unwrap_or_else(|| "delivery failed".to_string())
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use tombstone_cdc::{CheckpointStore, MemoryChangeStream, MemoryCheckpointStore, StartingPosition};
	use tombstone_sink::{DeliveryMode, MemorySink, SinkAdapter, SinkError};
	use tombstone_testing::record;
	use tombstone_type::{Error, MockClock, PartitionId, SequenceToken};

	use crate::{CoordinatorState, ExportConfig, ExportCoordinator};

	fn config() -> ExportConfig {
		ExportConfig::default().starting_position(StartingPosition::Earliest).retry(3, 1, 2).batch_max_events(10)
	}

	fn coordinator(config: &ExportConfig, sink: &MemorySink, checkpoints: &MemoryCheckpointStore) -> ExportCoordinator {
		let clock = Arc::new(MockClock::default());
		let adapter = SinkAdapter::new(Arc::new(sink.clone()), config.delivery_mode)
			.with_retry(config.retry_policy())
			.with_layout(config.object_layout())
			.with_clock(clock.clone());

		ExportCoordinator::new(
			PartitionId::new("p0"),
			Arc::new(MemoryChangeStream::new()),
			adapter,
			Arc::new(checkpoints.clone()),
			config,
		)
		.with_clock(clock)
	}

	mod start {
		use super::*;

		#[tokio::test]
		async fn test_loads_checkpoint() {
			let checkpoints =
				MemoryCheckpointStore::with_checkpoints([(PartitionId::new("p0"), SequenceToken::from(42))]);
			let mut coordinator = coordinator(&config(), &MemorySink::new(), &checkpoints);

			assert_eq!(coordinator.state(), CoordinatorState::Idle);
			coordinator.start().await.unwrap();

			assert_eq!(coordinator.state(), CoordinatorState::Consuming);
			assert_eq!(coordinator.checkpoint(), Some(&SequenceToken::from(42)));
		}
	}

	mod handle {
		use super::*;

		#[tokio::test]
		async fn test_buffers_until_bound() {
			let sink = MemorySink::new();
			let checkpoints = MemoryCheckpointStore::new();
			let mut coordinator = coordinator(&config(), &sink, &checkpoints);

			coordinator.handle(vec![record::remove("a", "user", 1), record::insert("b", "user", 2)]).await.unwrap();

			assert_eq!(coordinator.buffered(), 1);
			assert_eq!(coordinator.pending(), 1);
			assert!(sink.objects().is_empty());
			assert_eq!(checkpoints.get(&PartitionId::new("p0")), None);
		}

		#[tokio::test]
		async fn test_flush_on_pull_end() {
			let sink = MemorySink::new();
			let checkpoints = MemoryCheckpointStore::new();
			let mut coordinator = coordinator(&config().flush_on_pull_end(true), &sink, &checkpoints);

			coordinator.handle(vec![record::remove("a", "user", 1), record::remove("b", "user", 2)]).await.unwrap();

			assert_eq!(sink.objects().len(), 1);
			assert_eq!(checkpoints.get(&PartitionId::new("p0")), Some(SequenceToken::from(2)));
			assert_eq!(coordinator.pending(), 0);
		}

		#[tokio::test]
		async fn test_sealed_batches_flush_inline() {
			let sink = MemorySink::new();
			let checkpoints = MemoryCheckpointStore::new();
			let mut coordinator = coordinator(&config().batch_max_events(2), &sink, &checkpoints);

			let records = (1..=5).map(|seq| record::remove(&format!("id-{}", seq), "user", seq)).collect();
			coordinator.handle(records).await.unwrap();

			assert_eq!(sink.objects().len(), 2);
			assert_eq!(coordinator.buffered(), 1);
			assert_eq!(checkpoints.get(&PartitionId::new("p0")), Some(SequenceToken::from(4)));
		}
	}

	mod drain {
		use super::*;

		#[tokio::test]
		async fn test_flushes_and_stops() {
			let sink = MemorySink::new();
			let checkpoints = MemoryCheckpointStore::new();
			let mut coordinator = coordinator(&config(), &sink, &checkpoints);

			coordinator.handle(vec![record::remove("a", "user", 7)]).await.unwrap();
			coordinator.drain().await.unwrap();

			assert_eq!(coordinator.state(), CoordinatorState::Stopped);
			assert_eq!(sink.events().len(), 1);
			assert_eq!(checkpoints.load(&PartitionId::new("p0")).await.unwrap(), Some(SequenceToken::from(7)));
		}

		#[tokio::test]
		async fn test_stopped_coordinator_refuses_records() {
			let mut coordinator = coordinator(&config(), &MemorySink::new(), &MemoryCheckpointStore::new());
			coordinator.drain().await.unwrap();

			let err = coordinator.handle(vec![record::remove("a", "user", 1)]).await.unwrap_err();
			assert!(matches!(err, Error::Internal(_)));
		}

		#[tokio::test]
		async fn test_requeued_events_are_retried_until_delivered() {
			let sink = MemorySink::new();
			sink.fail_record("evt-a", SinkError::Rejected("nope".into()), 2);
			let checkpoints = MemoryCheckpointStore::new();
			let mut coordinator = coordinator(&config().delivery_mode(DeliveryMode::Streamed), &sink, &checkpoints);

			coordinator.handle(vec![record::remove("a", "user", 1), record::remove("b", "user", 2)]).await.unwrap();
			coordinator.drain().await.unwrap();

			assert_eq!(coordinator.state(), CoordinatorState::Stopped);
			assert_eq!(checkpoints.get(&PartitionId::new("p0")), Some(SequenceToken::from(2)));
			assert_eq!(checkpoints.history(&PartitionId::new("p0")), vec![SequenceToken::from(2)]);
		}
	}
}
