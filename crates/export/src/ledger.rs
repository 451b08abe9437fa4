// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::collections::BTreeMap;

use tombstone_type::SequenceToken;

/// Sequence tokens accepted for export but not yet checkpointed.
///
/// A token is resolved once its event was delivered or permanently rejected.
/// The checkpoint may move to the last token of the resolved prefix, so it
/// never passes an event that still awaits delivery.
#[derive(Debug, Default)]
pub struct CheckpointLedger {
	pending: BTreeMap<SequenceToken, bool>,
}

impl CheckpointLedger {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn track(&mut self, token: SequenceToken) {
		self.pending.entry(token).or_insert(false);
	}

	pub fn resolve(&mut self, token: &SequenceToken) {
		if let Some(resolved) = self.pending.get_mut(token) {
			*resolved = true;
		}
	}

	/// Highest token such that it and every token before it are resolved.
	pub fn resolved_prefix_end(&self) -> Option<&SequenceToken> {
		self.pending.iter().take_while(|(_, resolved)| **resolved).map(|(token, _)| token).last()
	}

	/// Forget every token up to and including `through`.
	pub fn commit(&mut self, through: &SequenceToken) {
		self.pending = self.pending.split_off(through);
		self.pending.remove(through);
	}

	pub fn len(&self) -> usize {
		self.pending.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pending.is_empty()
	}
}
