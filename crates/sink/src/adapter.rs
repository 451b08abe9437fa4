// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tombstone_type::{Error, PartitionId, Result, SharedClock, SystemClock};
use tracing::{debug, error, warn};

use crate::{
	Batch, DeliveryReceipt, ObjectLayout, RetryPolicy, Sink, SinkError, encode_batch, encode_record,
};

/// 1000 KiB, the usual single-record limit of streaming sinks.
pub const DEFAULT_MAX_RECORD_BYTES: usize = 1_024_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
	/// The whole batch as one object write.
	#[default]
	Bulk,
	/// One record append per event.
	Streamed,
}

/// Delivers sealed batches to a [`Sink`] and reports per-event outcomes.
///
/// The adapter is stateless between calls and can be shared by every
/// partition's coordinator.
#[derive(Clone)]
pub struct SinkAdapter {
	sink: Arc<dyn Sink>,
	mode: DeliveryMode,
	retry: RetryPolicy,
	layout: ObjectLayout,
	max_record_bytes: usize,
	clock: SharedClock,
}

impl SinkAdapter {
	pub fn new(sink: Arc<dyn Sink>, mode: DeliveryMode) -> Self {
		Self {
			sink,
			mode,
			retry: RetryPolicy::default(),
			layout: ObjectLayout::default(),
			max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
			clock: Arc::new(SystemClock),
		}
	}

	pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;
		self
	}

	pub fn with_layout(mut self, layout: ObjectLayout) -> Self {
		self.layout = layout;
		self
	}

	pub fn with_max_record_bytes(mut self, max_record_bytes: usize) -> Self {
		self.max_record_bytes = max_record_bytes;
		self
	}

	pub fn with_clock(mut self, clock: SharedClock) -> Self {
		self.clock = clock;
		self
	}

	pub fn mode(&self) -> DeliveryMode {
		self.mode
	}

	pub fn layout(&self) -> &ObjectLayout {
		&self.layout
	}

	/// Deliver `batch`, read from stream partition `partition`.
	///
	/// Sink failures are reported in the receipt, not as `Err`. `Err` means the
	/// batch could not be delivered at all: it is unsealed or cannot be
	/// encoded.
	pub async fn deliver(&self, partition: &PartitionId, batch: &Batch) -> Result<DeliveryReceipt> {
		if !batch.is_sealed() {
			return Err(Error::BatchNotSealed);
		}
		if batch.is_empty() {
			return Ok(DeliveryReceipt::empty());
		}

		match self.mode {
			DeliveryMode::Bulk => self.deliver_bulk(partition, batch).await,
			DeliveryMode::Streamed => self.deliver_streamed(partition, batch).await,
		}
	}

	async fn deliver_bulk(&self, partition: &PartitionId, batch: &Batch) -> Result<DeliveryReceipt> {
		let body = encode_batch(batch.events(), self.layout.format)?;
		let name = self.layout.object_name(self.clock.now(), partition, batch);
		let bytes = body.len();

		let result = self
			.retry
			.run(|| {
				let body = body.clone();
				let name = name.as_str();
				async move { self.sink.put_object(name, body).await }
			})
			.await;

		match result {
			Ok(()) => {
				debug!(partition = %partition, object = %name, events = batch.len(), bytes, "delivered batch object");
				Ok(DeliveryReceipt::delivered(batch.len(), Some(name)))
			}
			Err(err) => {
				warn!(partition = %partition, object = %name, events = batch.len(), error = %err, "batch object write failed");
				Ok(DeliveryReceipt::failed(batch.events().to_vec(), err))
			}
		}
	}

	async fn deliver_streamed(&self, partition: &PartitionId, batch: &Batch) -> Result<DeliveryReceipt> {
		let mut receipt = DeliveryReceipt::delivered(0, None);

		for event in batch.events() {
			let record = encode_record(event)?;

			if record.len() > self.max_record_bytes {
				error!(
					partition = %partition,
					source_event_id = %event.source_event_id,
					bytes = record.len(),
					max_record_bytes = self.max_record_bytes,
					"record exceeds sink record limit, rejecting"
				);
				receipt.error = Some(SinkError::MalformedPayload(format!(
					"record of {} bytes exceeds limit of {} bytes",
					record.len(),
					self.max_record_bytes
				)));
				receipt.rejected.push(event.clone());
				continue;
			}

			let result = self
				.retry
				.run(|| {
					let record = record.clone();
					async move { self.sink.put_record(record).await }
				})
				.await;

			match result {
				Ok(()) => receipt.delivered_count += 1,
				Err(err) if err.is_malformed() => {
					error!(partition = %partition, source_event_id = %event.source_event_id, error = %err, "sink rejected record as malformed");
					receipt.rejected.push(event.clone());
					receipt.error = Some(err);
				}
				Err(err) => {
					warn!(partition = %partition, source_event_id = %event.source_event_id, error = %err, "record write failed");
					receipt.retry.push(event.clone());
					receipt.error = Some(err);
				}
			}
		}

		receipt.success = receipt.retry.is_empty();
		debug!(
			partition = %partition,
			delivered = receipt.delivered_count,
			retry = receipt.retry.len(),
			rejected = receipt.rejected.len(),
			"delivered batch records"
		);
		Ok(receipt)
	}
}
