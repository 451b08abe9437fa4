// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Sink error types.

/// Error reported by a [`crate::Sink`] for one write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
	#[error("sink throttled the write: {0}")]
	Throttled(String),

	#[error("sink write timed out: {0}")]
	Timeout(String),

	#[error("sink unavailable: {0}")]
	Unavailable(String),

	#[error("sink denied the write: {0}")]
	PermissionDenied(String),

	/// The payload itself is unacceptable, e.g. larger than the sink's record
	/// limit. Retrying the same bytes can never succeed.
	#[error("sink rejected malformed payload: {0}")]
	MalformedPayload(String),

	#[error("sink rejected the write: {0}")]
	Rejected(String),
}

impl SinkError {
	/// Transient errors are retried locally with backoff.
	pub fn is_transient(&self) -> bool {
		matches!(self, SinkError::Throttled(_) | SinkError::Timeout(_) | SinkError::Unavailable(_))
	}

	pub fn is_malformed(&self) -> bool {
		matches!(self, SinkError::MalformedPayload(_))
	}
}

impl From<std::io::Error> for SinkError {
	fn from(err: std::io::Error) -> Self {
		use std::io::ErrorKind;

		match err.kind() {
			ErrorKind::PermissionDenied | ErrorKind::ReadOnlyFilesystem => {
				SinkError::PermissionDenied(err.to_string())
			}
			ErrorKind::TimedOut => SinkError::Timeout(err.to_string()),
			ErrorKind::InvalidInput | ErrorKind::InvalidFilename => SinkError::MalformedPayload(err.to_string()),
			_ => SinkError::Unavailable(err.to_string()),
		}
	}
}

impl From<SinkError> for tombstone_type::Error {
	fn from(err: SinkError) -> Self {
		tombstone_type::Error::Delivery(err.to_string())
	}
}

/// Result type for sink writes.
pub type SinkResult<T> = Result<T, SinkError>;
