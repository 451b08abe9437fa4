// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use async_trait::async_trait;

use crate::SinkResult;

/// Durable, append-only archival sink.
///
/// One client is shared by every partition's coordinator, so implementations
/// must be safe for concurrent use.
#[async_trait]
pub trait Sink: Send + Sync {
	/// Write one named object atomically. Used by bulk delivery.
	async fn put_object(&self, name: &str, body: Vec<u8>) -> SinkResult<()>;

	/// Append one record. Used by streamed delivery, once per event.
	async fn put_record(&self, record: Vec<u8>) -> SinkResult<()>;
}
