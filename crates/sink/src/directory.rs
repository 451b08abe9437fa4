// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};
use tracing::trace;

use crate::{Sink, SinkError, SinkResult};

const RECORD_FILE: &str = "records.ndjson";

/// Sink backed by a local directory.
///
/// Objects become files under `root`, written to a temporary file first and
/// renamed into place so readers never see a partial object. Records are
/// appended to `root/records.ndjson`.
#[derive(Debug)]
pub struct DirectorySink {
	root: PathBuf,
	records: Mutex<()>,
}

impl DirectorySink {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			records: Mutex::new(()),
		}
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn object_path(&self, name: &str) -> SinkResult<PathBuf> {
		let relative = Path::new(name);
		let valid = !name.is_empty() && relative.components().all(|c| matches!(c, Component::Normal(_)));
		if !valid {
			return Err(SinkError::MalformedPayload(format!("invalid object name '{}'", name)));
		}
		Ok(self.root.join(relative))
	}
}

#[async_trait]
impl Sink for DirectorySink {
	async fn put_object(&self, name: &str, body: Vec<u8>) -> SinkResult<()> {
		let path = self.object_path(name)?;
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).await?;
		}

		let mut tmp = path.clone().into_os_string();
		tmp.push(".tmp");
		let tmp = PathBuf::from(tmp);

		fs::write(&tmp, &body).await?;
		fs::rename(&tmp, &path).await?;
		trace!(object = %path.display(), bytes = body.len(), "wrote object");
		Ok(())
	}

	async fn put_record(&self, record: Vec<u8>) -> SinkResult<()> {
		let _guard = self.records.lock().await;
		fs::create_dir_all(&self.root).await?;

		let mut file = fs::OpenOptions::new().create(true).append(true).open(self.root.join(RECORD_FILE)).await?;
		file.write_all(&record).await?;
		file.flush().await?;
		Ok(())
	}
}
