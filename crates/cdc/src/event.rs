// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tombstone_type::{Error, SequenceToken};

/// A deleted item, ready for export.
///
/// Only [`crate::decode`] builds these, and only from REMOVE records whose old
/// image carries both key attributes. The serialized form is the archival
/// record: one self-describing JSON object with stable field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportableEvent {
	pub id: String,
	pub data_type: String,
	/// Idempotency token for downstream deduplication.
	pub source_event_id: String,
	pub observed_at: DateTime<Utc>,
	#[serde(rename = "sequenceNumber")]
	pub sequence: SequenceToken,
}

impl ExportableEvent {
	pub fn to_json(&self) -> tombstone_type::Result<Vec<u8>> {
		serde_json::to_vec(self).map_err(|e| Error::Codec(e.to_string()))
	}

	/// Serialized size of this event as one newline-terminated line.
	pub fn encoded_len(&self) -> tombstone_type::Result<usize> {
		Ok(self.to_json()?.len() + 1)
	}
}
