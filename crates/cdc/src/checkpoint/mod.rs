// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Checkpoint persistence.
//!
//! A checkpoint is the highest sequence token of a partition whose REMOVE
//! events are all durably delivered. Stores only ever move it forward.

mod file;
mod memory;

use async_trait::async_trait;
pub use file::FileCheckpointStore;
pub use memory::MemoryCheckpointStore;
use tombstone_type::{Error, PartitionId, Result, SequenceToken};

#[async_trait]
pub trait CheckpointStore: Send + Sync {
	async fn load(&self, partition: &PartitionId) -> Result<Option<SequenceToken>>;

	/// Move the checkpoint of `partition` to `token`.
	///
	/// Advancing to the current value is a no-op; moving backwards fails with
	/// [`Error::CheckpointRegression`].
	async fn advance(&self, partition: &PartitionId, token: SequenceToken) -> Result<()>;
}

pub(crate) fn check_monotonic(
	partition: &PartitionId,
	current: Option<&SequenceToken>,
	proposed: &SequenceToken,
) -> Result<bool> {
	match current {
		Some(current) if proposed < current => Err(Error::CheckpointRegression {
			partition: partition.clone(),
			current: current.clone(),
			proposed: proposed.clone(),
		}),
		Some(current) if proposed == current => Ok(false),
		_ => Ok(true),
	}
}
