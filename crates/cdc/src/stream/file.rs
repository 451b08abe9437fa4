// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Change stream backed by a directory of newline-delimited JSON files.
//!
//! Each `<partition>.jsonl` file is one partition holding one wire-format
//! record per line, in sequence order. A sibling `<partition>.closed` file
//! marks the partition as closed. Continuation tokens are byte offsets just
//! past the last consumed line; a trailing line without a newline is treated
//! as still being written and is not consumed.

use std::{
	io::SeekFrom,
	path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::{
	fs,
	io::{AsyncReadExt, AsyncSeekExt},
};
use tombstone_type::{Error, PartitionId, Result, SequenceToken};
use tracing::warn;

use super::{ChangeStream, ContinuationToken, StreamBatch, StreamPosition};
use crate::RawChangeRecord;

const RECORD_EXTENSION: &str = "jsonl";
const CLOSED_EXTENSION: &str = "closed";

#[derive(Debug, Clone)]
pub struct FileChangeStream {
	dir: PathBuf,
}

impl FileChangeStream {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self {
			dir: dir.into(),
		}
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	fn records_path(&self, partition: &PartitionId) -> PathBuf {
		self.dir.join(format!("{}.{}", partition, RECORD_EXTENSION))
	}

	fn closed_path(&self, partition: &PartitionId) -> PathBuf {
		self.dir.join(format!("{}.{}", partition, CLOSED_EXTENSION))
	}

	async fn read_from(&self, partition: &PartitionId, offset: u64) -> Result<Vec<u8>> {
		let mut file = fs::File::open(self.records_path(partition)).await.map_err(|e| Error::Stream {
			partition: partition.clone(),
			message: e.to_string(),
		})?;
		file.seek(SeekFrom::Start(offset)).await?;
		let mut buffer = Vec::new();
		file.read_to_end(&mut buffer).await?;
		Ok(buffer)
	}
}

#[async_trait]
impl ChangeStream for FileChangeStream {
	async fn partitions(&self) -> Result<Vec<PartitionId>> {
		let mut entries = fs::read_dir(&self.dir).await?;
		let mut partitions = Vec::new();

		while let Some(entry) = entries.next_entry().await? {
			let path = entry.path();
			if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
				continue;
			}
			if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
				partitions.push(PartitionId::new(stem));
			}
		}

		partitions.sort();
		Ok(partitions)
	}

	async fn pull(&self, partition: &PartitionId, position: &StreamPosition, limit: usize) -> Result<StreamBatch> {
		let (offset, after) = match position {
			StreamPosition::Earliest => (0, None),
			StreamPosition::After(token) => (0, Some(token)),
			StreamPosition::Continue(ContinuationToken(offset)) => {
				let offset = offset.parse::<u64>().map_err(|_| Error::Stream {
					partition: partition.clone(),
					message: format!("invalid continuation token `{}`", offset),
				})?;
				(offset, None)
			}
			StreamPosition::Latest => {
				let content = self.read_from(partition, 0).await?;
				let end = complete_len(&content) as u64;
				return Ok(StreamBatch {
					records: Vec::new(),
					continuation: Some(ContinuationToken(end.to_string())),
					unparseable: 0,
				});
			}
		};

		let content = self.read_from(partition, offset).await?;
		let complete = &content[..complete_len(&content)];

		let Parsed {
			records,
			consumed,
			unparseable,
		} = parse_lines(partition, complete, after, limit);
		let next = offset + consumed as u64;

		let exhausted = consumed == complete.len() && complete.len() == content.len();
		let closed = exhausted && fs::try_exists(self.closed_path(partition)).await.unwrap_or(false);

		Ok(StreamBatch {
			records,
			continuation: if closed {
				None
			} else {
				Some(ContinuationToken(next.to_string()))
			},
			unparseable,
		})
	}
}

/// Length of the prefix made of newline-terminated lines.
fn complete_len(content: &[u8]) -> usize {
	content.iter().rposition(|&b| b == b'\n').map(|i| i + 1).unwrap_or(0)
}

struct Parsed {
	records: Vec<RawChangeRecord>,
	/// Bytes of `content` read, always whole lines.
	consumed: usize,
	unparseable: usize,
}

fn parse_lines(partition: &PartitionId, content: &[u8], after: Option<&SequenceToken>, limit: usize) -> Parsed {
	let mut records = Vec::new();
	let mut consumed = 0;
	let mut unparseable = 0;

	for line in content.split_inclusive(|&b| b == b'\n') {
		if records.len() >= limit {
			break;
		}
		consumed += line.len();

		let text = String::from_utf8_lossy(line);
		let text = text.trim();
		if text.is_empty() {
			continue;
		}

		match RawChangeRecord::from_json(text) {
			Ok(record) if after.is_some_and(|token| &record.sequence <= token) => {}
			Ok(record) => records.push(record),
			Err(err) => {
				unparseable += 1;
				warn!(partition = %partition, error = %err, "skipping unparseable stream line");
			}
		}
	}

	Parsed {
		records,
		consumed,
		unparseable,
	}
}

#[cfg(test)]
mod tests {
	use tombstone_testing::TempDir;
	use tombstone_type::{PartitionId, SequenceToken};

	use crate::{ChangeStream, FileChangeStream, MutationKind, RawChangeRecord, StreamPosition};

	fn line(seq: u64) -> String {
		let record = RawChangeRecord::new(format!("e{}", seq), SequenceToken::from(seq), Some(MutationKind::Remove));
		format!("{}\n", record.to_json().unwrap())
	}

	#[tokio::test]
	async fn test_partitions_from_files() {
		let dir = TempDir::new().unwrap();
		std::fs::write(dir.join("shard-b.jsonl"), "").unwrap();
		std::fs::write(dir.join("shard-a.jsonl"), "").unwrap();
		std::fs::write(dir.join("notes.txt"), "").unwrap();

		let partitions = FileChangeStream::new(dir.path()).partitions().await.unwrap();
		assert_eq!(partitions, vec![PartitionId::new("shard-a"), PartitionId::new("shard-b")]);
	}

	#[tokio::test]
	async fn test_pull_skips_partial_and_garbage_lines() {
		let dir = TempDir::new().unwrap();
		let content = format!("{}not json\n{}{{\"eventID\":\"partial", line(1), line(2));
		std::fs::write(dir.join("p.jsonl"), content).unwrap();

		let stream = FileChangeStream::new(dir.path());
		let p = PartitionId::new("p");
		let batch = stream.pull(&p, &StreamPosition::Earliest, 10).await.unwrap();
		let seqs: Vec<_> = batch.records.iter().map(|r| r.sequence.to_string()).collect();
		assert_eq!(seqs, vec!["1", "2"]);
		assert_eq!(batch.unparseable, 1);

		let next = StreamPosition::Continue(batch.continuation.unwrap());
		assert!(stream.pull(&p, &next, 10).await.unwrap().records.is_empty());
	}

	#[tokio::test]
	async fn test_limit_and_resume_after_checkpoint() {
		let dir = TempDir::new().unwrap();
		std::fs::write(dir.join("p.jsonl"), (1..=4).map(line).collect::<String>()).unwrap();

		let stream = FileChangeStream::new(dir.path());
		let p = PartitionId::new("p");

		let batch = stream.pull(&p, &StreamPosition::After(SequenceToken::from(2)), 1).await.unwrap();
		assert_eq!(batch.records.len(), 1);
		assert_eq!(batch.records[0].sequence, SequenceToken::from(3));

		let next = StreamPosition::Continue(batch.continuation.unwrap());
		let batch = stream.pull(&p, &next, 10).await.unwrap();
		assert_eq!(batch.records[0].sequence, SequenceToken::from(4));
	}

	#[tokio::test]
	async fn test_closed_marker() {
		let dir = TempDir::new().unwrap();
		std::fs::write(dir.join("p.jsonl"), line(1)).unwrap();
		std::fs::write(dir.join("p.closed"), "").unwrap();

		let batch = FileChangeStream::new(dir.path()).pull(&PartitionId::new("p"), &StreamPosition::Earliest, 10).await.unwrap();
		assert_eq!(batch.records.len(), 1);
		assert!(batch.is_closed());
	}

	#[tokio::test]
	async fn test_latest_starts_at_end() {
		let dir = TempDir::new().unwrap();
		std::fs::write(dir.join("p.jsonl"), line(1)).unwrap();

		let stream = FileChangeStream::new(dir.path());
		let p = PartitionId::new("p");
		let batch = stream.pull(&p, &StreamPosition::Latest, 10).await.unwrap();
		assert!(batch.records.is_empty());

		let mut content = line(1);
		content.push_str(&line(2));
		std::fs::write(dir.join("p.jsonl"), content).unwrap();

		let next = StreamPosition::Continue(batch.continuation.unwrap());
		let batch = stream.pull(&p, &next, 10).await.unwrap();
		assert_eq!(batch.records.len(), 1);
		assert_eq!(batch.records[0].sequence, SequenceToken::from(2));
	}
}
