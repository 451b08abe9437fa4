// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use tombstone_cdc::ExportableEvent;

use crate::SinkError;

/// Outcome of delivering one batch.
///
/// `retry` holds the events the sink did not accept, in batch order. A receipt
/// is successful exactly when nothing needs retrying. Events listed in
/// `rejected` can never be delivered and are not retried.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReceipt {
	pub success: bool,
	pub delivered_count: usize,
	pub retry: Vec<ExportableEvent>,
	pub rejected: Vec<ExportableEvent>,
	/// Last error the sink reported, if any.
	pub error: Option<SinkError>,
	/// Name of the written object, for bulk delivery.
	pub object_name: Option<String>,
}

impl DeliveryReceipt {
	pub fn empty() -> Self {
		Self {
			success: true,
			delivered_count: 0,
			retry: Vec::new(),
			rejected: Vec::new(),
			error: None,
			object_name: None,
		}
	}

	pub fn delivered(count: usize, object_name: Option<String>) -> Self {
		Self {
			success: true,
			delivered_count: count,
			retry: Vec::new(),
			rejected: Vec::new(),
			error: None,
			object_name,
		}
	}

	pub fn failed(retry: Vec<ExportableEvent>, error: SinkError) -> Self {
		Self {
			success: false,
			delivered_count: 0,
			retry,
			rejected: Vec::new(),
			error: Some(error),
			object_name: None,
		}
	}

	/// Nothing from the batch reached the sink and nothing was rejected.
	pub fn is_total_failure(&self) -> bool {
		!self.success && self.delivered_count == 0 && self.rejected.is_empty()
	}

	pub fn is_partial(&self) -> bool {
		!self.success && !self.is_total_failure()
	}
}
