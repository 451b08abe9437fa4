// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	collections::BTreeMap,
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
};

use dashmap::DashMap;
use serde::Serialize;
use tombstone_cdc::FilterSummary;
use tombstone_sink::DeliveryReceipt;
use tombstone_type::PartitionId;

/// Export counters for every partition.
#[derive(Debug, Default)]
pub struct ExportMetrics {
	partitions: DashMap<PartitionId, Arc<PartitionMetrics>>,
}

impl ExportMetrics {
	pub fn new() -> Self {
		Self::default()
	}

	/// Counters of `partition`, created on first use.
	pub fn partition(&self, partition: &PartitionId) -> Arc<PartitionMetrics> {
		self.partitions.entry(partition.clone()).or_default().value().clone()
	}

	pub fn snapshot(&self, partition: &PartitionId) -> Option<MetricsSnapshot> {
		self.partitions.get(partition).map(|metrics| metrics.snapshot())
	}

	pub fn snapshots(&self) -> BTreeMap<PartitionId, MetricsSnapshot> {
		self.partitions.iter().map(|entry| (entry.key().clone(), entry.value().snapshot())).collect()
	}
}

#[derive(Debug, Default)]
pub struct PartitionMetrics {
	records_pulled: AtomicU64,
	records_unparseable: AtomicU64,
	events_decoded: AtomicU64,
	not_applicable: AtomicU64,
	missing_fields: AtomicU64,
	malformed: AtomicU64,
	excluded: AtomicU64,
	events_delivered: AtomicU64,
	events_rejected: AtomicU64,
	flushes: AtomicU64,
	failed_flushes: AtomicU64,
	checkpoint_advances: AtomicU64,
}

impl PartitionMetrics {
	pub fn record_pull(&self, records: usize, unparseable: usize) {
		self.records_pulled.fetch_add(records as u64, Ordering::Relaxed);
		self.records_unparseable.fetch_add(unparseable as u64, Ordering::Relaxed);
	}

	pub fn record_filter(&self, summary: &FilterSummary) {
		self.events_decoded.fetch_add(summary.passed as u64, Ordering::Relaxed);
		self.not_applicable.fetch_add(summary.not_applicable as u64, Ordering::Relaxed);
		self.missing_fields.fetch_add(summary.missing_fields as u64, Ordering::Relaxed);
		self.malformed.fetch_add(summary.malformed as u64, Ordering::Relaxed);
		self.excluded.fetch_add(summary.excluded as u64, Ordering::Relaxed);
	}

	pub fn record_delivery(&self, receipt: &DeliveryReceipt) {
		self.flushes.fetch_add(1, Ordering::Relaxed);
		self.events_delivered.fetch_add(receipt.delivered_count as u64, Ordering::Relaxed);
		self.events_rejected.fetch_add(receipt.rejected.len() as u64, Ordering::Relaxed);
		if !receipt.success {
			self.failed_flushes.fetch_add(1, Ordering::Relaxed);
		}
	}

	pub fn record_checkpoint(&self) {
		self.checkpoint_advances.fetch_add(1, Ordering::Relaxed);
	}

	pub fn snapshot(&self) -> MetricsSnapshot {
		MetricsSnapshot {
			records_pulled: self.records_pulled.load(Ordering::Relaxed),
			records_unparseable: self.records_unparseable.load(Ordering::Relaxed),
			events_decoded: self.events_decoded.load(Ordering::Relaxed),
			not_applicable: self.not_applicable.load(Ordering::Relaxed),
			missing_fields: self.missing_fields.load(Ordering::Relaxed),
			malformed: self.malformed.load(Ordering::Relaxed),
			excluded: self.excluded.load(Ordering::Relaxed),
			events_delivered: self.events_delivered.load(Ordering::Relaxed),
			events_rejected: self.events_rejected.load(Ordering::Relaxed),
			flushes: self.flushes.load(Ordering::Relaxed),
			failed_flushes: self.failed_flushes.load(Ordering::Relaxed),
			checkpoint_advances: self.checkpoint_advances.load(Ordering::Relaxed),
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
	pub records_pulled: u64,
	/// Stream lines skipped because they could not be parsed.
	pub records_unparseable: u64,
	pub events_decoded: u64,
	pub not_applicable: u64,
	pub missing_fields: u64,
	pub malformed: u64,
	pub excluded: u64,
	pub events_delivered: u64,
	/// Events permanently rejected by the sink.
	pub events_rejected: u64,
	pub flushes: u64,
	pub failed_flushes: u64,
	pub checkpoint_advances: u64,
}
