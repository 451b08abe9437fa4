// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Pull interface to the change stream.

mod file;
mod memory;

use std::fmt::{Display, Formatter};

use async_trait::async_trait;
pub use file::FileChangeStream;
pub use memory::MemoryChangeStream;
use serde::{Deserialize, Serialize};
use tombstone_type::{PartitionId, Result, SequenceToken};

use crate::RawChangeRecord;

/// Where to begin reading a partition that has no checkpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartingPosition {
	Earliest,
	#[default]
	Latest,
}

/// Opaque cursor handed out by the stream, valid only for the partition that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken(pub String);

impl Display for ContinuationToken {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamPosition {
	Earliest,
	Latest,
	/// Strictly after the given sequence token, used when resuming from a
	/// checkpoint.
	After(SequenceToken),
	Continue(ContinuationToken),
}

impl StreamPosition {
	pub fn initial(checkpoint: Option<SequenceToken>, starting: StartingPosition) -> Self {
		match (checkpoint, starting) {
			(Some(token), _) => StreamPosition::After(token),
			(None, StartingPosition::Earliest) => StreamPosition::Earliest,
			(None, StartingPosition::Latest) => StreamPosition::Latest,
		}
	}
}

/// One pull result, in stream order.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamBatch {
	pub records: Vec<RawChangeRecord>,
	/// `None` once the partition is closed and fully read.
	pub continuation: Option<ContinuationToken>,
	/// Lines consumed but skipped because they could not be parsed.
	pub unparseable: usize,
}

impl StreamBatch {
	pub fn is_closed(&self) -> bool {
		self.continuation.is_none()
	}
}

#[async_trait]
pub trait ChangeStream: Send + Sync {
	async fn partitions(&self) -> Result<Vec<PartitionId>>;

	/// Read at most `limit` records of `partition` from `position`.
	async fn pull(&self, partition: &PartitionId, position: &StreamPosition, limit: usize) -> Result<StreamBatch>;
}
