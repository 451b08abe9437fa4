// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tombstone_type::{PartitionId, Result, SequenceToken};

use super::{CheckpointStore, check_monotonic};

/// In-memory checkpoint store that also remembers every advance, so tests can
/// assert on the full history.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
	checkpoints: Arc<DashMap<PartitionId, Vec<SequenceToken>>>,
}

impl MemoryCheckpointStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Store pre-seeded with the given checkpoints.
	pub fn with_checkpoints(checkpoints: impl IntoIterator<Item = (PartitionId, SequenceToken)>) -> Self {
		let store = Self::new();
		for (partition, token) in checkpoints {
			store.checkpoints.insert(partition, vec![token]);
		}
		store
	}

	pub fn get(&self, partition: &PartitionId) -> Option<SequenceToken> {
		self.checkpoints.get(partition).and_then(|history| history.last().cloned())
	}

	/// Every value the checkpoint of `partition` has held, oldest first.
	pub fn history(&self, partition: &PartitionId) -> Vec<SequenceToken> {
		self.checkpoints.get(partition).map(|history| history.value().clone()).unwrap_or_default()
	}
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
	async fn load(&self, partition: &PartitionId) -> Result<Option<SequenceToken>> {
		Ok(self.get(partition))
	}

	async fn advance(&self, partition: &PartitionId, token: SequenceToken) -> Result<()> {
		let mut history = self.checkpoints.entry(partition.clone()).or_default();
		if check_monotonic(partition, history.last(), &token)? {
			history.push(token);
		}
		Ok(())
	}
}
