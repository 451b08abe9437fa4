// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Exporter error type and diagnostic codes.

use crate::{PartitionId, SequenceToken};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
	#[error("invalid sequence token `{0}`: expected decimal digits")]
	InvalidSequence(String),

	#[error("invalid configuration: {0}")]
	Config(String),

	#[error("codec error: {0}")]
	Codec(String),

	#[error("stream error on partition {partition}: {message}")]
	Stream {
		partition: PartitionId,
		message: String,
	},

	#[error("checkpoint store error: {0}")]
	Checkpoint(String),

	#[error("checkpoint for partition {partition} cannot move back from {current} to {proposed}")]
	CheckpointRegression {
		partition: PartitionId,
		current: SequenceToken,
		proposed: SequenceToken,
	},

	#[error("batch must be sealed before it is delivered")]
	BatchNotSealed,

	#[error("delivery failed: {0}")]
	Delivery(String),

	#[error("partition {partition} halted after {attempts} failed flush attempts: {reason}")]
	FatalPartition {
		partition: PartitionId,
		attempts: usize,
		reason: String,
	},

	#[error("io error: {0}")]
	Io(String),

	#[error("internal error: {0}")]
	Internal(String),
}

impl Error {
	/// Stable diagnostic code, suitable for alert routing.
	pub fn code(&self) -> &'static str {
		match self {
			Error::InvalidSequence(_) => "EXPORT_001",
			Error::Config(_) => "EXPORT_002",
			Error::Codec(_) => "EXPORT_003",
			Error::Stream {
				..
			} => "EXPORT_004",
			Error::Checkpoint(_) => "EXPORT_005",
			Error::CheckpointRegression {
				..
			} => "EXPORT_006",
			Error::BatchNotSealed => "EXPORT_007",
			Error::Delivery(_) => "EXPORT_008",
			Error::FatalPartition {
				..
			} => "EXPORT_009",
			Error::Io(_) => "EXPORT_010",
			Error::Internal(_) => "EXPORT_011",
		}
	}

	pub fn help(&self) -> Option<&'static str> {
		match self {
			Error::Config(_) => Some("Check the exporter configuration file and TOMBSTONE_* variables"),
			Error::CheckpointRegression {
				..
			} => Some("Another process may be writing checkpoints for the same partition"),
			Error::FatalPartition {
				..
			} => Some("Operator intervention required: inspect the sink, then restart the partition"),
			_ => None,
		}
	}

	/// Whether this error halts a partition for good.
	pub fn is_fatal(&self) -> bool {
		matches!(
			self,
			Error::FatalPartition { .. } | Error::CheckpointRegression { .. } | Error::BatchNotSealed
		)
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Error::Io(err.to_string())
	}
}

pub type Result<T> = std::result::Result<T, Error>;
