// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::time::Duration;

use chrono::{DateTime, Utc};
use tombstone_cdc::ExportableEvent;
use tombstone_sink::{Batch, PartitionField, encoded_len};
use tombstone_type::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccumulatorLimits {
	pub max_events: usize,
	pub max_bytes: usize,
	pub max_age: Duration,
}

impl Default for AccumulatorLimits {
	fn default() -> Self {
		Self {
			max_events: 500,
			max_bytes: 4 * 1024 * 1024,
			max_age: Duration::from_secs(60),
		}
	}
}

/// Groups events into batches under count, size and age bounds.
///
/// At most one batch is open at a time. The accumulator has no clock of its
/// own: callers pass the current time, and the age bound is only checked by
/// [`BatchAccumulator::tick`].
#[derive(Debug)]
pub struct BatchAccumulator {
	limits: AccumulatorLimits,
	partition_by: Option<PartitionField>,
	open: Option<Batch>,
}

impl BatchAccumulator {
	pub fn new(limits: AccumulatorLimits) -> Self {
		Self {
			limits,
			partition_by: None,
			open: None,
		}
	}

	/// Keep each batch to one value of `field`, so it maps to one object path.
	pub fn with_partition_by(mut self, field: Option<PartitionField>) -> Self {
		self.partition_by = field;
		self
	}

	/// Append `event`, returning a batch if one was sealed.
	///
	/// The open batch is sealed before the event when it is already full, when
	/// the event would push it past the byte bound, or when the event belongs
	/// to another object partition. Otherwise it is sealed after the event
	/// once a bound is reached. When both happen the second batch stays open
	/// and full, and is returned by the next `append`, `tick` or `flush`.
	pub fn append(&mut self, event: ExportableEvent, now: DateTime<Utc>) -> Result<Option<Batch>> {
		let value = self.partition_by.map(|field| field.value(&event).to_string());

		let mut sealed = None;
		if let Some(open) = &self.open {
			let overflows = !open.is_empty() && open.byte_size() + event.encoded_len()? > self.limits.max_bytes;
			if self.is_full(open) || overflows || open.partition_value() != value.as_deref() {
				sealed = self.take_sealed();
			}
		}

		let open = self.open.get_or_insert_with(|| Batch::open(now, value));
		open.push(event)?;

		if sealed.is_none() && self.open.as_ref().is_some_and(|open| self.is_full(open)) {
			sealed = self.take_sealed();
		}
		Ok(sealed)
	}

	/// Seal the open batch if it is full or older than the age bound.
	pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Batch> {
		let open = self.open.as_ref()?;
		let age = now.signed_duration_since(open.opened_at()).to_std().unwrap_or(Duration::ZERO);
		if self.is_full(open) || (!open.is_empty() && age >= self.limits.max_age) {
			return self.take_sealed();
		}
		None
	}

	/// Seal and return the open batch regardless of bounds, unless it is empty.
	pub fn flush(&mut self) -> Option<Batch> {
		self.take_sealed()
	}

	/// Put `events`, the undelivered part of a flushed batch, back at the front
	/// of the open batch.
	///
	/// If the open batch cannot take them, because it belongs to another object
	/// partition or the result would exceed a bound, it is sealed and
	/// returned, and `events` start a new open batch.
	pub fn requeue(&mut self, events: Vec<ExportableEvent>, now: DateTime<Utc>) -> Result<Option<Batch>> {
		let Some(first) = events.first() else {
			return Ok(None);
		};
		let value = self.partition_by.map(|field| field.value(first).to_string());

		let mut displaced = None;
		if let Some(open) = &self.open {
			let count = open.len() + events.len();
			let bytes = open.byte_size() + encoded_len(&events)?;
			if open.partition_value() != value.as_deref()
				|| count > self.limits.max_events
				|| bytes > self.limits.max_bytes
			{
				displaced = self.take_sealed();
			}
		}

		self.open.get_or_insert_with(|| Batch::open(now, value)).prepend(events)?;
		Ok(displaced)
	}

	pub fn is_empty(&self) -> bool {
		self.open.as_ref().is_none_or(Batch::is_empty)
	}

	/// Number of events in the open batch.
	pub fn len(&self) -> usize {
		self.open.as_ref().map_or(0, Batch::len)
	}

	pub fn opened_at(&self) -> Option<DateTime<Utc>> {
		self.open.as_ref().map(Batch::opened_at)
	}

	fn is_full(&self, batch: &Batch) -> bool {
		batch.len() >= self.limits.max_events || batch.byte_size() >= self.limits.max_bytes
	}

	fn take_sealed(&mut self) -> Option<Batch> {
		let mut batch = self.open.take()?;
		if batch.is_empty() {
			return None;
		}
		batch.seal();
		Some(batch)
	}
}
