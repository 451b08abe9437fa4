// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use chrono::{DateTime, Utc};

use crate::{ExportableEvent, MutationKind, RawChangeRecord};

pub const ID_ATTRIBUTE: &str = "id";
pub const DATA_TYPE_ATTRIBUTE: &str = "dataType";

/// Why a raw record did not become an [`ExportableEvent`].
///
/// Rejections are expected outcomes: they are counted and skipped, never
/// retried and never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeRejection {
	#[error("record {event_id} is malformed: {reason}")]
	Malformed {
		event_id: String,
		reason: String,
	},

	#[error("record {event_id} is a {kind}, only REMOVE is exported")]
	NotApplicable {
		event_id: String,
		kind: MutationKind,
	},

	#[error("REMOVE record {event_id} lacks {missing:?} in its old image")]
	MissingFields {
		event_id: String,
		missing: Vec<&'static str>,
	},
}

impl DecodeRejection {
	pub fn event_id(&self) -> &str {
		match self {
			DecodeRejection::Malformed {
				event_id,
				..
			}
			| DecodeRejection::NotApplicable {
				event_id,
				..
			}
			| DecodeRejection::MissingFields {
				event_id,
				..
			} => event_id,
		}
	}
}

pub type Decoded = Result<ExportableEvent, DecodeRejection>;

/// Decode one raw record.
///
/// `observed_at` is the wall-clock time of decoding, supplied by the caller.
pub fn decode(raw: &RawChangeRecord, observed_at: DateTime<Utc>) -> Decoded {
	let Some(kind) = raw.kind else {
		return Err(DecodeRejection::Malformed {
			event_id: raw.event_id.clone(),
			reason: "missing mutation kind".to_string(),
		});
	};

	if kind != MutationKind::Remove {
		return Err(DecodeRejection::NotApplicable {
			event_id: raw.event_id.clone(),
			kind,
		});
	}

	let key = |name: &str| raw.old_image.as_ref().and_then(|image| image.get(name)).and_then(|v| v.as_key());

	match (key(ID_ATTRIBUTE), key(DATA_TYPE_ATTRIBUTE)) {
		(Some(id), Some(data_type)) => Ok(ExportableEvent {
			id: id.to_string(),
			data_type: data_type.to_string(),
			source_event_id: raw.event_id.clone(),
			observed_at,
			sequence: raw.sequence.clone(),
		}),
		(id, data_type) => {
			let mut missing = Vec::with_capacity(2);
			if id.is_none() {
				missing.push(ID_ATTRIBUTE);
			}
			if data_type.is_none() {
				missing.push(DATA_TYPE_ATTRIBUTE);
			}
			Err(DecodeRejection::MissingFields {
				event_id: raw.event_id.clone(),
				missing,
			})
		}
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use chrono::{DateTime, TimeZone, Utc};
	use tombstone_type::SequenceToken;

	use crate::{AttributeValue, Image, MutationKind, RawChangeRecord};

	fn now() -> DateTime<Utc> {
		Utc.timestamp_millis_opt(1_704_067_200_000).unwrap()
	}

	fn image(pairs: &[(&str, AttributeValue)]) -> Image {
		pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect::<BTreeMap<_, _>>()
	}

	fn s(value: &str) -> AttributeValue {
		AttributeValue::String(value.to_string())
	}

	fn record(kind: Option<MutationKind>) -> RawChangeRecord {
		RawChangeRecord::new("evt-1", SequenceToken::from(10), kind)
	}

	mod decode {
		use super::*;
		use crate::{DecodeRejection, decode};

		#[test]
		fn test_ok() {
			let raw = record(Some(MutationKind::Remove))
				.with_old_image(image(&[("id", s("a")), ("dataType", s("user")), ("name", s("Ann"))]));

			let event = decode(&raw, now()).unwrap();
			assert_eq!(event.id, "a");
			assert_eq!(event.data_type, "user");
			assert_eq!(event.source_event_id, "evt-1");
			assert_eq!(event.sequence, SequenceToken::from(10));
			assert_eq!(event.observed_at, now());
		}

		#[test]
		fn test_numeric_key_keeps_its_text() {
			let raw = record(Some(MutationKind::Remove))
				.with_old_image(image(&[("id", AttributeValue::Number("0042".to_string())), ("dataType", s("t"))]));

			assert_eq!(decode(&raw, now()).unwrap().id, "0042");
		}

		#[test]
		fn test_non_remove_is_not_applicable() {
			for kind in [MutationKind::Insert, MutationKind::Modify] {
				let raw = record(Some(kind))
					.with_old_image(image(&[("id", s("a")), ("dataType", s("user"))]))
					.with_new_image(image(&[("id", s("a")), ("dataType", s("user"))]));

				assert_eq!(
					decode(&raw, now()),
					Err(DecodeRejection::NotApplicable {
						event_id: "evt-1".to_string(),
						kind,
					})
				);
			}
		}

		#[test]
		fn test_missing_kind_is_malformed() {
			let raw = record(None).with_old_image(image(&[("id", s("a")), ("dataType", s("user"))]));
			assert!(matches!(decode(&raw, now()), Err(DecodeRejection::Malformed { .. })));
		}

		#[test]
		fn test_missing_data_type() {
			let raw = record(Some(MutationKind::Remove)).with_old_image(image(&[("id", s("a"))]));
			assert_eq!(
				decode(&raw, now()),
				Err(DecodeRejection::MissingFields {
					event_id: "evt-1".to_string(),
					missing: vec!["dataType"],
				})
			);
		}

		#[test]
		fn test_missing_old_image() {
			let raw = record(Some(MutationKind::Remove));
			assert_eq!(
				decode(&raw, now()),
				Err(DecodeRejection::MissingFields {
					event_id: "evt-1".to_string(),
					missing: vec!["id", "dataType"],
				})
			);
		}

		#[test]
		fn test_non_scalar_key_counts_as_missing() {
			let raw = record(Some(MutationKind::Remove))
				.with_old_image(image(&[("id", AttributeValue::List(vec![s("a")])), ("dataType", s("user"))]));
			assert!(matches!(decode(&raw, now()), Err(DecodeRejection::MissingFields { missing, .. }) if missing == vec!["id"]));
		}

		#[test]
		fn test_new_image_is_ignored() {
			let raw = record(Some(MutationKind::Remove))
				.with_new_image(image(&[("id", s("a")), ("dataType", s("user"))]));
			assert!(decode(&raw, now()).is_err());
		}
	}
}
