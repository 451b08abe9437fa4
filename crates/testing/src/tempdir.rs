// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	env, fs, io,
	path::{Path, PathBuf},
};

use uuid::Uuid;

/// Uniquely named directory under the system temp dir, removed on drop.
#[derive(Debug)]
pub struct TempDir {
	path: PathBuf,
}

impl TempDir {
	pub fn new() -> io::Result<Self> {
		let path = env::temp_dir().join(format!("tombstone-{}", Uuid::new_v4()));
		fs::create_dir(&path)?;
		Ok(Self {
			path,
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
		self.path.join(relative)
	}
}

impl Drop for TempDir {
	fn drop(&mut self) {
		let _ = fs::remove_dir_all(&self.path);
	}
}

/// Run `f` with a fresh temporary directory that is removed afterwards.
pub fn temp_dir<F>(f: F) -> io::Result<()>
where
	F: FnOnce(&Path) -> io::Result<()>,
{
	let dir = TempDir::new()?;
	f(dir.path())
}
