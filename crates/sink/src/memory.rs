// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	collections::{HashMap, VecDeque},
	sync::Arc,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tombstone_cdc::ExportableEvent;

use crate::{Sink, SinkError, SinkResult};

/// In-memory sink with scriptable failures.
///
/// Clones share the same state, so a test can keep one handle and give the
/// adapter another.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
	state: Arc<Mutex<MemorySinkState>>,
}

#[derive(Debug, Default)]
struct MemorySinkState {
	objects: Vec<(String, Vec<u8>)>,
	records: Vec<Vec<u8>>,
	object_attempts: usize,
	record_attempts: usize,
	object_faults: VecDeque<SinkError>,
	record_faults: HashMap<String, RecordFault>,
}

#[derive(Debug)]
struct RecordFault {
	error: SinkError,
	remaining: usize,
}

impl MemorySink {
	pub fn new() -> Self {
		Self::default()
	}

	/// Fail the next object write with `error`. Faults queue up in order.
	pub fn fail_next_object(&self, error: SinkError) {
		self.state.lock().object_faults.push_back(error);
	}

	/// Fail the next `times` object writes with `error`.
	pub fn fail_objects(&self, error: SinkError, times: usize) {
		let mut state = self.state.lock();
		for _ in 0..times {
			state.object_faults.push_back(error.clone());
		}
	}

	/// Fail the next `times` record writes of the event with
	/// `source_event_id`. Use `usize::MAX` to fail it for good.
	pub fn fail_record(&self, source_event_id: &str, error: SinkError, times: usize) {
		self.state.lock().record_faults.insert(
			source_event_id.to_string(),
			RecordFault {
				error,
				remaining: times,
			},
		);
	}

	/// Stop failing any writes.
	pub fn heal(&self) {
		let mut state = self.state.lock();
		state.object_faults.clear();
		state.record_faults.clear();
	}

	pub fn objects(&self) -> Vec<(String, Vec<u8>)> {
		self.state.lock().objects.clone()
	}

	pub fn records(&self) -> Vec<Vec<u8>> {
		self.state.lock().records.clone()
	}

	pub fn object_attempts(&self) -> usize {
		self.state.lock().object_attempts
	}

	pub fn record_attempts(&self) -> usize {
		self.state.lock().record_attempts
	}

	/// Every event that reached the sink, objects first, in write order.
	/// Lines that are not JSON events (such as a CSV header) are skipped.
	pub fn events(&self) -> Vec<ExportableEvent> {
		let state = self.state.lock();
		let objects = state.objects.iter().map(|(_, body)| body.as_slice());
		let records = state.records.iter().map(Vec::as_slice);

		objects
			.chain(records)
			.flat_map(|body| body.split(|b| *b == b'\n'))
			.filter(|line| !line.is_empty())
			.filter_map(|line| serde_json::from_slice(line).ok())
			.collect()
	}
}

#[async_trait]
impl Sink for MemorySink {
	async fn put_object(&self, name: &str, body: Vec<u8>) -> SinkResult<()> {
		let mut state = self.state.lock();
		state.object_attempts += 1;
		if let Some(error) = state.object_faults.pop_front() {
			return Err(error);
		}
		state.objects.push((name.to_string(), body));
		Ok(())
	}

	async fn put_record(&self, record: Vec<u8>) -> SinkResult<()> {
		let mut state = self.state.lock();
		state.record_attempts += 1;

		let source_event_id = serde_json::from_slice::<ExportableEvent>(record.trim_ascii_end())
			.map(|event| event.source_event_id)
			.ok();
		if let Some(id) = source_event_id {
			if let Some(fault) = state.record_faults.get_mut(&id) {
				if fault.remaining > 0 {
					fault.remaining -= 1;
					return Err(fault.error.clone());
				}
			}
		}

		state.records.push(record);
		Ok(())
	}
}
