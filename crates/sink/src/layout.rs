// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Object naming for bulk delivery.
//!
//! Objects are named
//! `<prefix>/[<field>=<value>/]<timestamp>_<partition>_<first sequence>.<ext>`,
//! e.g. `data/dataType=user/2024-01-01T00:00:00.000Z_shard-0001_4421.ndjson`.
//! The catalog crawls `<prefix>/`; the optional `<field>=<value>` segment
//! becomes a catalog partition column.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tombstone_cdc::ExportableEvent;
use tombstone_type::PartitionId;

use crate::{Batch, PayloadFormat};

/// Event attribute used to partition objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionField {
	#[serde(rename = "id")]
	Id,
	#[serde(rename = "dataType")]
	DataType,
}

impl PartitionField {
	pub fn name(&self) -> &'static str {
		match self {
			PartitionField::Id => "id",
			PartitionField::DataType => "dataType",
		}
	}

	pub fn value<'a>(&self, event: &'a ExportableEvent) -> &'a str {
		match self {
			PartitionField::Id => &event.id,
			PartitionField::DataType => &event.data_type,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLayout {
	pub prefix: String,
	pub partition_by: Option<PartitionField>,
	pub format: PayloadFormat,
}

impl ObjectLayout {
	pub fn new(prefix: impl Into<String>) -> Self {
		Self {
			prefix: prefix.into(),
			partition_by: None,
			format: PayloadFormat::default(),
		}
	}

	pub fn partition_by(mut self, field: PartitionField) -> Self {
		self.partition_by = Some(field);
		self
	}

	pub fn format(mut self, format: PayloadFormat) -> Self {
		self.format = format;
		self
	}

	/// The object partition value of `event`, if objects are partitioned.
	pub fn partition_value(&self, event: &ExportableEvent) -> Option<String> {
		self.partition_by.map(|field| field.value(event).to_string())
	}

	pub fn object_name(&self, delivered_at: DateTime<Utc>, partition: &PartitionId, batch: &Batch) -> String {
		let mut name = String::new();

		let prefix = self.prefix.trim_matches('/');
		if !prefix.is_empty() {
			for segment in prefix.split('/').filter(|s| !s.is_empty()) {
				name.push_str(&sanitize_segment(segment));
				name.push('/');
			}
		}

		if let (Some(field), Some(value)) = (self.partition_by, batch.partition_value()) {
			name.push_str(field.name());
			name.push('=');
			name.push_str(&sanitize_segment(value));
			name.push('/');
		}

		name.push_str(&delivered_at.to_rfc3339_opts(SecondsFormat::Millis, true));
		name.push('_');
		name.push_str(&sanitize_segment(partition.as_str()));
		if let Some(first) = batch.first_sequence() {
			name.push('_');
			name.push_str(first.as_str());
		}
		name.push('.');
		name.push_str(self.format.extension());
		name
	}
}

impl Default for ObjectLayout {
	fn default() -> Self {
		Self::new("data")
	}
}

/// Make `value` safe to use as a single path segment.
fn sanitize_segment(value: &str) -> String {
	let cleaned: String = value
		.chars()
		.map(|c| {
			if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':') {
				c
			} else {
				'_'
			}
		})
		.collect();

	if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
		"_".to_string()
	} else {
		cleaned
	}
}
