// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Payload encoding for delivered events.

use chrono::SecondsFormat;
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use tombstone_cdc::ExportableEvent;
use tombstone_type::{Error, Result};

/// Format of bulk objects. Streamed records are always JSON lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
	#[default]
	Ndjson,
	Csv,
}

impl PayloadFormat {
	pub fn extension(&self) -> &'static str {
		match self {
			PayloadFormat::Ndjson => "ndjson",
			PayloadFormat::Csv => "csv",
		}
	}
}

const CSV_HEADER: [&str; 4] = ["id", "dataType", "sourceEventId", "observedAt"];

/// One event as a newline-terminated JSON line.
pub fn encode_record(event: &ExportableEvent) -> Result<Vec<u8>> {
	let mut line = event.to_json()?;
	line.push(b'\n');
	Ok(line)
}

pub fn encode_batch(events: &[ExportableEvent], format: PayloadFormat) -> Result<Vec<u8>> {
	match format {
		PayloadFormat::Ndjson => {
			let mut body = Vec::new();
			for event in events {
				body.extend(encode_record(event)?);
			}
			Ok(body)
		}
		PayloadFormat::Csv => encode_csv(events),
	}
}

fn encode_csv(events: &[ExportableEvent]) -> Result<Vec<u8>> {
	let mut writer = WriterBuilder::new().from_writer(Vec::new());
	writer.write_record(CSV_HEADER).map_err(codec_error)?;
	for event in events {
		let observed_at = event.observed_at.to_rfc3339_opts(SecondsFormat::Millis, true);
		writer.write_record([
			event.id.as_str(),
			event.data_type.as_str(),
			event.source_event_id.as_str(),
			observed_at.as_str(),
		])
		.map_err(codec_error)?;
	}
	writer.into_inner().map_err(|err| Error::Codec(err.to_string()))
}

fn codec_error(err: csv::Error) -> Error {
	Error::Codec(err.to_string())
}
