// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Exporter configuration.
//!
//! Loaded from a JSON document with camelCase keys, then overridden by
//! `TOMBSTONE_*` environment variables (`batchMaxEvents` becomes
//! `TOMBSTONE_BATCH_MAX_EVENTS`). Every field has a default.

use std::{
	fs,
	path::{Path, PathBuf},
	str::FromStr,
	time::Duration,
};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tombstone_cdc::{EventFilter, StartingPosition};
use tombstone_sink::{
	DEFAULT_MAX_RECORD_BYTES, DeliveryMode, ObjectLayout, PartitionField, PayloadFormat, RetryPolicy,
};
use tombstone_type::{Error, Result};

use crate::AccumulatorLimits;

pub const ENV_PREFIX: &str = "TOMBSTONE_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ExportConfig {
	pub stream_name: String,
	pub sink_target: String,

	pub batch_max_events: usize,
	pub batch_max_bytes: usize,
	pub batch_max_age_seconds: u64,

	pub delivery_mode: DeliveryMode,
	pub retry_max_attempts: u32,
	pub retry_base_delay_ms: u64,
	pub retry_max_delay_ms: u64,
	pub max_record_bytes: usize,

	pub starting_position: StartingPosition,
	pub pull_limit: usize,
	pub poll_interval_ms: u64,
	pub tick_interval_ms: u64,

	/// Whole-flush retries after a delivery fails completely.
	pub flush_retry_attempts: u32,
	/// Flush the open batch after every pulled stream batch.
	pub flush_on_pull_end: bool,

	pub payload_format: PayloadFormat,
	pub object_prefix: String,
	pub object_partition_by: Option<PartitionField>,
	pub data_type_allow_list: Option<Vec<String>>,

	pub checkpoint_path: Option<PathBuf>,
}

impl Default for ExportConfig {
	fn default() -> Self {
		Self {
			stream_name: "deletions".to_string(),
			sink_target: "archive".to_string(),
			batch_max_events: 500,
			batch_max_bytes: 4 * 1024 * 1024,
			batch_max_age_seconds: 60,
			delivery_mode: DeliveryMode::Bulk,
			retry_max_attempts: 3,
			retry_base_delay_ms: 100,
			retry_max_delay_ms: 5_000,
			max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
			starting_position: StartingPosition::Latest,
			pull_limit: 1_000,
			poll_interval_ms: 1_000,
			tick_interval_ms: 1_000,
			flush_retry_attempts: 3,
			flush_on_pull_end: false,
			payload_format: PayloadFormat::Ndjson,
			object_prefix: "data".to_string(),
			object_partition_by: None,
			data_type_allow_list: None,
			checkpoint_path: None,
		}
	}
}

impl ExportConfig {
	pub fn from_json(json: &str) -> Result<Self> {
		serde_json::from_str(json).map_err(|e| Error::Config(format!("invalid configuration: {}", e)))
	}

	pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let json = fs::read_to_string(path)
			.map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
		Self::from_json(&json)
	}

	/// Apply `TOMBSTONE_*` overrides from the process environment.
	pub fn with_env_overrides(self) -> Result<Self> {
		self.with_overrides(std::env::vars())
	}

	/// Apply `TOMBSTONE_*` overrides from `vars`. Variables without the prefix,
	/// and prefixed ones naming no setting, are ignored.
	pub fn with_overrides<I, K, V>(mut self, vars: I) -> Result<Self>
	where
		I: IntoIterator<Item = (K, V)>,
		K: AsRef<str>,
		V: AsRef<str>,
	{
		for (key, value) in vars {
			let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
				continue;
			};
			let value = value.as_ref().trim();

			match name {
				"STREAM_NAME" => self.stream_name = value.to_string(),
				"SINK_TARGET" => self.sink_target = value.to_string(),
				"BATCH_MAX_EVENTS" => self.batch_max_events = parse_number(name, value)?,
				"BATCH_MAX_BYTES" => self.batch_max_bytes = parse_number(name, value)?,
				"BATCH_MAX_AGE_SECONDS" => self.batch_max_age_seconds = parse_number(name, value)?,
				"DELIVERY_MODE" => self.delivery_mode = parse_variant(name, value)?,
				"RETRY_MAX_ATTEMPTS" => self.retry_max_attempts = parse_number(name, value)?,
				"RETRY_BASE_DELAY_MS" => self.retry_base_delay_ms = parse_number(name, value)?,
				"RETRY_MAX_DELAY_MS" => self.retry_max_delay_ms = parse_number(name, value)?,
				"MAX_RECORD_BYTES" => self.max_record_bytes = parse_number(name, value)?,
				"STARTING_POSITION" => self.starting_position = parse_variant(name, value)?,
				"PULL_LIMIT" => self.pull_limit = parse_number(name, value)?,
				"POLL_INTERVAL_MS" => self.poll_interval_ms = parse_number(name, value)?,
				"TICK_INTERVAL_MS" => self.tick_interval_ms = parse_number(name, value)?,
				"FLUSH_RETRY_ATTEMPTS" => self.flush_retry_attempts = parse_number(name, value)?,
				"FLUSH_ON_PULL_END" => self.flush_on_pull_end = parse_number(name, value)?,
				"PAYLOAD_FORMAT" => self.payload_format = parse_variant(name, value)?,
				"OBJECT_PREFIX" => self.object_prefix = value.to_string(),
				"OBJECT_PARTITION_BY" => {
					self.object_partition_by = if value.is_empty() {
						None
					} else {
						Some(parse_variant(name, value)?)
					};
				}
				"DATA_TYPE_ALLOW_LIST" => {
					let types: Vec<String> = value
						.split(',')
						.map(str::trim)
						.filter(|s| !s.is_empty())
						.map(str::to_string)
						.collect();
					self.data_type_allow_list = if types.is_empty() {
						None
					} else {
						Some(types)
					};
				}
				"CHECKPOINT_PATH" => {
					self.checkpoint_path = if value.is_empty() {
						None
					} else {
						Some(PathBuf::from(value))
					};
				}
				_ => {}
			}
		}
		Ok(self)
	}

	pub fn validate(&self) -> Result<()> {
		let positive = [
			("batchMaxEvents", self.batch_max_events as u64),
			("batchMaxBytes", self.batch_max_bytes as u64),
			("batchMaxAgeSeconds", self.batch_max_age_seconds),
			("retryMaxAttempts", self.retry_max_attempts as u64),
			("maxRecordBytes", self.max_record_bytes as u64),
			("pullLimit", self.pull_limit as u64),
			("tickIntervalMs", self.tick_interval_ms),
		];
		for (name, value) in positive {
			if value == 0 {
				return Err(Error::Config(format!("{} must be greater than zero", name)));
			}
		}

		if self.retry_base_delay_ms > self.retry_max_delay_ms {
			return Err(Error::Config(format!(
				"retryBaseDelayMs ({}) exceeds retryMaxDelayMs ({})",
				self.retry_base_delay_ms, self.retry_max_delay_ms
			)));
		}

		if matches!(&self.data_type_allow_list, Some(types) if types.is_empty()) {
			return Err(Error::Config("dataTypeAllowList must not be empty when set".to_string()));
		}

		Ok(())
	}

	pub fn stream_name(mut self, name: impl Into<String>) -> Self {
		self.stream_name = name.into();
		self
	}

	pub fn sink_target(mut self, target: impl Into<String>) -> Self {
		self.sink_target = target.into();
		self
	}

	pub fn batch_max_events(mut self, max: usize) -> Self {
		self.batch_max_events = max;
		self
	}

	pub fn batch_max_bytes(mut self, max: usize) -> Self {
		self.batch_max_bytes = max;
		self
	}

	pub fn batch_max_age_seconds(mut self, seconds: u64) -> Self {
		self.batch_max_age_seconds = seconds;
		self
	}

	pub fn delivery_mode(mut self, mode: DeliveryMode) -> Self {
		self.delivery_mode = mode;
		self
	}

	pub fn retry(mut self, max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
		self.retry_max_attempts = max_attempts;
		self.retry_base_delay_ms = base_delay_ms;
		self.retry_max_delay_ms = max_delay_ms;
		self
	}

	pub fn max_record_bytes(mut self, max: usize) -> Self {
		self.max_record_bytes = max;
		self
	}

	pub fn starting_position(mut self, position: StartingPosition) -> Self {
		self.starting_position = position;
		self
	}

	pub fn pull_limit(mut self, limit: usize) -> Self {
		self.pull_limit = limit;
		self
	}

	pub fn poll_interval_ms(mut self, ms: u64) -> Self {
		self.poll_interval_ms = ms;
		self
	}

	pub fn tick_interval_ms(mut self, ms: u64) -> Self {
		self.tick_interval_ms = ms;
		self
	}

	pub fn flush_retry_attempts(mut self, attempts: u32) -> Self {
		self.flush_retry_attempts = attempts;
		self
	}

	pub fn flush_on_pull_end(mut self, enabled: bool) -> Self {
		self.flush_on_pull_end = enabled;
		self
	}

	pub fn payload_format(mut self, format: PayloadFormat) -> Self {
		self.payload_format = format;
		self
	}

	pub fn object_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.object_prefix = prefix.into();
		self
	}

	pub fn object_partition_by(mut self, field: PartitionField) -> Self {
		self.object_partition_by = Some(field);
		self
	}

	pub fn data_type_allow_list<I, S>(mut self, data_types: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.data_type_allow_list = Some(data_types.into_iter().map(Into::into).collect());
		self
	}

	pub fn checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.checkpoint_path = Some(path.into());
		self
	}

	pub fn retry_policy(&self) -> RetryPolicy {
		RetryPolicy::new(
			self.retry_max_attempts,
			Duration::from_millis(self.retry_base_delay_ms),
			Duration::from_millis(self.retry_max_delay_ms),
		)
	}

	pub fn accumulator_limits(&self) -> AccumulatorLimits {
		AccumulatorLimits {
			max_events: self.batch_max_events,
			max_bytes: self.batch_max_bytes,
			max_age: Duration::from_secs(self.batch_max_age_seconds),
		}
	}

	pub fn object_layout(&self) -> ObjectLayout {
		let layout = ObjectLayout::new(self.object_prefix.clone()).format(self.payload_format);
		match self.object_partition_by {
			Some(field) => layout.partition_by(field),
			None => layout,
		}
	}

	pub fn event_filter(&self) -> EventFilter {
		match &self.data_type_allow_list {
			Some(types) => EventFilter::with_allowed_data_types(types.iter().cloned()),
			None => EventFilter::new(),
		}
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}

	pub fn tick_interval(&self) -> Duration {
		Duration::from_millis(self.tick_interval_ms)
	}
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T>
where
	T::Err: std::fmt::Display,
{
	value.parse().map_err(|e| Error::Config(format!("{}{}: invalid value `{}`: {}", ENV_PREFIX, name, value, e)))
}

fn parse_variant<T: DeserializeOwned>(name: &str, value: &str) -> Result<T> {
	serde_json::from_value(serde_json::Value::String(value.to_string()))
		.map_err(|e| Error::Config(format!("{}{}: invalid value `{}`: {}", ENV_PREFIX, name, value, e)))
}
