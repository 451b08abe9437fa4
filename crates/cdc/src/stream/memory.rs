// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;
use tombstone_type::{Error, PartitionId, Result};

use super::{ChangeStream, ContinuationToken, StreamBatch, StreamPosition};
use crate::RawChangeRecord;

#[derive(Debug, Default)]
struct PartitionLog {
	records: Vec<RawChangeRecord>,
	closed: bool,
}

/// In-memory change stream. Continuation tokens are record offsets.
#[derive(Debug, Clone, Default)]
pub struct MemoryChangeStream {
	partitions: Arc<RwLock<BTreeMap<PartitionId, PartitionLog>>>,
}

impl MemoryChangeStream {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_partition(&self, partition: impl Into<PartitionId>) {
		self.partitions.write().entry(partition.into()).or_default();
	}

	pub fn push(&self, partition: impl Into<PartitionId>, record: RawChangeRecord) {
		self.partitions.write().entry(partition.into()).or_default().records.push(record);
	}

	pub fn extend(&self, partition: impl Into<PartitionId>, records: impl IntoIterator<Item = RawChangeRecord>) {
		self.partitions.write().entry(partition.into()).or_default().records.extend(records);
	}

	/// Mark the partition closed: once its records are read, pulls return no
	/// continuation.
	pub fn close(&self, partition: impl Into<PartitionId>) {
		self.partitions.write().entry(partition.into()).or_default().closed = true;
	}
}

#[async_trait]
impl ChangeStream for MemoryChangeStream {
	async fn partitions(&self) -> Result<Vec<PartitionId>> {
		Ok(self.partitions.read().keys().cloned().collect())
	}

	async fn pull(&self, partition: &PartitionId, position: &StreamPosition, limit: usize) -> Result<StreamBatch> {
		let partitions = self.partitions.read();
		let log = partitions.get(partition).ok_or_else(|| Error::Stream {
			partition: partition.clone(),
			message: "unknown partition".to_string(),
		})?;

		let start = match position {
			StreamPosition::Earliest => 0,
			StreamPosition::Latest => log.records.len(),
			StreamPosition::After(token) => log.records.partition_point(|r| &r.sequence <= token),
			StreamPosition::Continue(ContinuationToken(offset)) => {
				offset.parse::<usize>().map_err(|_| Error::Stream {
					partition: partition.clone(),
					message: format!("invalid continuation token `{}`", offset),
				})?
			}
		};

		let start = start.min(log.records.len());
		let end = start.saturating_add(limit).min(log.records.len());
		let records = log.records[start..end].to_vec();

		let continuation = if log.closed && end == log.records.len() {
			None
		} else {
			Some(ContinuationToken(end.to_string()))
		};

		Ok(StreamBatch {
			records,
			continuation,
			unparseable: 0,
		})
	}
}
