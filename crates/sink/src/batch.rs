// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use chrono::{DateTime, Utc};
use tombstone_cdc::ExportableEvent;
use tombstone_type::{Result, SequenceToken};

/// Ordered run of events delivered together.
///
/// Events keep the order they were pushed in. Once sealed a batch accepts no
/// further events, and only sealed batches can be delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
	events: Vec<ExportableEvent>,
	opened_at: DateTime<Utc>,
	byte_size: usize,
	sealed: bool,
	partition_value: Option<String>,
}

impl Batch {
	pub fn open(opened_at: DateTime<Utc>, partition_value: Option<String>) -> Self {
		Self {
			events: Vec::new(),
			opened_at,
			byte_size: 0,
			sealed: false,
			partition_value,
		}
	}

	/// Append `event`. Returns `false`, leaving the batch untouched, when the
	/// batch is sealed.
	pub fn push(&mut self, event: ExportableEvent) -> Result<bool> {
		if self.sealed {
			return Ok(false);
		}
		self.byte_size += event.encoded_len()?;
		self.events.push(event);
		Ok(true)
	}

	/// Put `events` ahead of the current contents, keeping their order.
	pub fn prepend(&mut self, events: Vec<ExportableEvent>) -> Result<bool> {
		if self.sealed {
			return Ok(false);
		}
		self.byte_size += encoded_len(&events)?;
		self.events.splice(0..0, events);
		Ok(true)
	}

	pub fn seal(&mut self) {
		self.sealed = true;
	}

	pub fn is_sealed(&self) -> bool {
		self.sealed
	}

	pub fn events(&self) -> &[ExportableEvent] {
		&self.events
	}

	pub fn into_events(self) -> Vec<ExportableEvent> {
		self.events
	}

	pub fn len(&self) -> usize {
		self.events.len()
	}

	pub fn is_empty(&self) -> bool {
		self.events.is_empty()
	}

	pub fn opened_at(&self) -> DateTime<Utc> {
		self.opened_at
	}

	/// Running estimate of the serialized payload size.
	pub fn byte_size(&self) -> usize {
		self.byte_size
	}

	pub fn partition_value(&self) -> Option<&str> {
		self.partition_value.as_deref()
	}

	pub fn first_sequence(&self) -> Option<&SequenceToken> {
		self.events.first().map(|e| &e.sequence)
	}

	pub fn last_sequence(&self) -> Option<&SequenceToken> {
		self.events.iter().map(|e| &e.sequence).max()
	}
}

/// Serialized size of `events` as newline-terminated lines.
pub fn encoded_len(events: &[ExportableEvent]) -> Result<usize> {
	events.iter().map(ExportableEvent::encoded_len).sum()
}
