// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::collections::HashSet;

use tracing::{trace, warn};

use crate::{Decoded, DecodeRejection, ExportableEvent};

/// Tally of what a [`EventFilter::filter`] call dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterSummary {
	pub passed: usize,
	pub not_applicable: usize,
	pub missing_fields: usize,
	pub malformed: usize,
	/// Decoded events outside the data type allow-list.
	pub excluded: usize,
}

impl FilterSummary {
	pub fn dropped(&self) -> usize {
		self.not_applicable + self.missing_fields + self.malformed + self.excluded
	}
}

/// Keeps successfully decoded events and drops every rejection.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
	allowed_data_types: Option<HashSet<String>>,
}

impl EventFilter {
	pub fn new() -> Self {
		Self::default()
	}

	/// Only pass events whose `dataType` is in `data_types`.
	pub fn with_allowed_data_types<I, S>(data_types: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			allowed_data_types: Some(data_types.into_iter().map(Into::into).collect()),
		}
	}

	pub fn filter(&self, decoded: Vec<Decoded>) -> (Vec<ExportableEvent>, FilterSummary) {
		let mut summary = FilterSummary::default();
		let mut events = Vec::with_capacity(decoded.len());

		for item in decoded {
			match item {
				Ok(event) if self.allows(&event) => {
					summary.passed += 1;
					events.push(event);
				}
				Ok(event) => {
					trace!(id = %event.id, data_type = %event.data_type, "event outside data type allow-list");
					summary.excluded += 1;
				}
				Err(rejection @ DecodeRejection::NotApplicable {
					..
				}) => {
					trace!(event_id = rejection.event_id(), "{}", rejection);
					summary.not_applicable += 1;
				}
				Err(rejection @ DecodeRejection::MissingFields {
					..
				}) => {
					warn!(event_id = rejection.event_id(), "skipping record: {}", rejection);
					summary.missing_fields += 1;
				}
				Err(rejection @ DecodeRejection::Malformed {
					..
				}) => {
					warn!(event_id = rejection.event_id(), "skipping record: {}", rejection);
					summary.malformed += 1;
				}
			}
		}

		(events, summary)
	}

	fn allows(&self, event: &ExportableEvent) -> bool {
		match &self.allowed_data_types {
			Some(allowed) => allowed.contains(&event.data_type),
			None => true,
		}
	}
}

#[cfg(test)]
mod tests {
	use chrono::{TimeZone, Utc};
	use tombstone_type::SequenceToken;

	use crate::{DecodeRejection, EventFilter, ExportableEvent, MutationKind};

	fn event(id: &str, data_type: &str) -> ExportableEvent {
		ExportableEvent {
			id: id.to_string(),
			data_type: data_type.to_string(),
			source_event_id: format!("evt-{}", id),
			observed_at: Utc.timestamp_millis_opt(0).unwrap(),
			sequence: SequenceToken::from(1),
		}
	}

	#[test]
	fn test_drops_rejections_keeps_order() {
		let decoded = vec![
			Ok(event("a", "user")),
			Err(DecodeRejection::NotApplicable {
				event_id: "x".to_string(),
				kind: MutationKind::Insert,
			}),
			Ok(event("b", "user")),
			Err(DecodeRejection::MissingFields {
				event_id: "y".to_string(),
				missing: vec!["id"],
			}),
			Err(DecodeRejection::Malformed {
				event_id: "z".to_string(),
				reason: "missing mutation kind".to_string(),
			}),
			Ok(event("c", "order")),
		];

		let (events, summary) = EventFilter::new().filter(decoded);

		let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
		assert_eq!(ids, vec!["a", "b", "c"]);
		assert_eq!(summary.passed, 3);
		assert_eq!(summary.not_applicable, 1);
		assert_eq!(summary.missing_fields, 1);
		assert_eq!(summary.malformed, 1);
		assert_eq!(summary.dropped(), 3);
	}

	#[test]
	fn test_allow_list() {
		let filter = EventFilter::with_allowed_data_types(["user"]);
		let (events, summary) = filter.filter(vec![Ok(event("a", "user")), Ok(event("b", "order"))]);

		assert_eq!(events.len(), 1);
		assert_eq!(events[0].id, "a");
		assert_eq!(summary.excluded, 1);
	}

	#[test]
	fn test_empty_input() {
		let (events, summary) = EventFilter::new().filter(vec![]);
		assert!(events.is_empty());
		assert_eq!(summary.dropped(), 0);
	}
}
