// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Stream sequence tokens.
//!
//! Sequence numbers assigned by the change stream are decimal strings that can
//! be wider than 128 bits. They are stored without leading zeros and ordered
//! numerically: a shorter token is always smaller, tokens of equal length
//! compare byte-wise.

use std::{
	cmp::Ordering,
	fmt::{Display, Formatter},
	str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SequenceToken(String);

impl SequenceToken {
	pub fn parse(raw: &str) -> crate::Result<Self> {
		if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
			return Err(Error::InvalidSequence(raw.to_string()));
		}

		let trimmed = raw.trim_start_matches('0');
		let normalized = if trimmed.is_empty() {
			"0"
		} else {
			trimmed
		};

		Ok(Self(normalized.to_string()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl Ord for SequenceToken {
	fn cmp(&self, other: &Self) -> Ordering {
		self.0.len().cmp(&other.0.len()).then_with(|| self.0.cmp(&other.0))
	}
}

impl PartialOrd for SequenceToken {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Display for SequenceToken {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for SequenceToken {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

impl TryFrom<String> for SequenceToken {
	type Error = Error;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse(&value)
	}
}

impl From<SequenceToken> for String {
	fn from(value: SequenceToken) -> Self {
		value.0
	}
}

impl From<u64> for SequenceToken {
	fn from(value: u64) -> Self {
		Self(value.to_string())
	}
}
