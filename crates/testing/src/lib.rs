// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Test fixtures shared by the tombstone crates.

pub mod record;
pub mod tempdir;
pub mod util;

pub use tempdir::{TempDir, temp_dir};
