// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{collections::BTreeMap, path::PathBuf};

use async_trait::async_trait;
use tokio::{fs, sync::Mutex};
use tombstone_type::{Error, PartitionId, Result, SequenceToken};
use tracing::debug;

use super::{CheckpointStore, check_monotonic};

/// Checkpoints kept in one JSON document, `{ "<partition>": "<sequence>" }`.
///
/// Every advance rewrites the document through a temporary file and a rename,
/// so a crash leaves either the old or the new document on disk.
pub struct FileCheckpointStore {
	path: PathBuf,
	checkpoints: Mutex<BTreeMap<PartitionId, SequenceToken>>,
}

impl FileCheckpointStore {
	pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
		let path = path.into();

		let checkpoints = match fs::read(&path).await {
			Ok(content) => serde_json::from_slice(&content)
				.map_err(|e| Error::Checkpoint(format!("{}: {}", path.display(), e)))?,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
			Err(err) => return Err(err.into()),
		};

		debug!(path = %path.display(), partitions = checkpoints.len(), "loaded checkpoints");

		Ok(Self {
			path,
			checkpoints: Mutex::new(checkpoints),
		})
	}

	async fn persist(&self, checkpoints: &BTreeMap<PartitionId, SequenceToken>) -> Result<()> {
		let content = serde_json::to_vec_pretty(checkpoints).map_err(|e| Error::Checkpoint(e.to_string()))?;

		if let Some(parent) = self.path.parent() {
			fs::create_dir_all(parent).await?;
		}

		let tmp = self.path.with_extension("tmp");
		fs::write(&tmp, content).await?;
		fs::rename(&tmp, &self.path).await?;
		Ok(())
	}
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
	async fn load(&self, partition: &PartitionId) -> Result<Option<SequenceToken>> {
		Ok(self.checkpoints.lock().await.get(partition).cloned())
	}

	async fn advance(&self, partition: &PartitionId, token: SequenceToken) -> Result<()> {
		let mut checkpoints = self.checkpoints.lock().await;
		if !check_monotonic(partition, checkpoints.get(partition), &token)? {
			return Ok(());
		}

		let previous = checkpoints.insert(partition.clone(), token);
		if let Err(err) = self.persist(&checkpoints).await {
			match previous {
				Some(previous) => checkpoints.insert(partition.clone(), previous),
				None => checkpoints.remove(partition),
			};
			return Err(err);
		}
		Ok(())
	}
}
