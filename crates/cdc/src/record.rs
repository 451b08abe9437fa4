// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Raw change stream records.
//!
//! A [`RawChangeRecord`] mirrors one entry of the key-value store's change
//! stream. On the wire it looks like:
//!
//! ```json
//! {
//!   "eventID": "1f0e...",
//!   "eventName": "REMOVE",
//!   "dynamodb": {
//!     "SequenceNumber": "4421584500000000017450439091",
//!     "ApproximateCreationDateTime": 1704067200,
//!     "OldImage": { "id": { "S": "a" }, "dataType": { "S": "user" } }
//!   }
//! }
//! ```

use std::{
	collections::BTreeMap,
	fmt::{Display, Formatter},
	str::FromStr,
};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tombstone_type::{Error, SequenceToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
	Insert,
	Modify,
	Remove,
}

impl MutationKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			MutationKind::Insert => "INSERT",
			MutationKind::Modify => "MODIFY",
			MutationKind::Remove => "REMOVE",
		}
	}
}

impl Display for MutationKind {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for MutationKind {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"INSERT" => Ok(MutationKind::Insert),
			"MODIFY" => Ok(MutationKind::Modify),
			"REMOVE" => Ok(MutationKind::Remove),
			other => Err(Error::Codec(format!("unknown mutation kind `{}`", other))),
		}
	}
}

/// Typed attribute value of an item image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
	#[serde(rename = "S")]
	String(String),
	/// Numbers travel as decimal strings and are kept that way.
	#[serde(rename = "N")]
	Number(String),
	/// Base64 text.
	#[serde(rename = "B")]
	Binary(String),
	#[serde(rename = "BOOL")]
	Bool(bool),
	#[serde(rename = "NULL")]
	Null(bool),
	#[serde(rename = "L")]
	List(Vec<AttributeValue>),
	#[serde(rename = "M")]
	Map(BTreeMap<String, AttributeValue>),
	#[serde(rename = "SS")]
	StringSet(Vec<String>),
	#[serde(rename = "NS")]
	NumberSet(Vec<String>),
	#[serde(rename = "BS")]
	BinarySet(Vec<String>),
}

impl AttributeValue {
	/// Textual form of a scalar key attribute.
	pub fn as_key(&self) -> Option<&str> {
		match self {
			AttributeValue::String(value) | AttributeValue::Number(value) => Some(value),
			_ => None,
		}
	}
}

/// Snapshot of an item, attribute name to value.
pub type Image = BTreeMap<String, AttributeValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireRecord", into = "WireRecord")]
pub struct RawChangeRecord {
	/// Stream-assigned record identifier.
	pub event_id: String,
	pub sequence: SequenceToken,
	/// `None` when the stream sent no kind, or one this exporter does not know.
	pub kind: Option<MutationKind>,
	pub old_image: Option<Image>,
	pub new_image: Option<Image>,
	pub created_at: Option<DateTime<Utc>>,
}

impl RawChangeRecord {
	pub fn new(event_id: impl Into<String>, sequence: SequenceToken, kind: Option<MutationKind>) -> Self {
		Self {
			event_id: event_id.into(),
			sequence,
			kind,
			old_image: None,
			new_image: None,
			created_at: None,
		}
	}

	pub fn with_old_image(mut self, image: Image) -> Self {
		self.old_image = Some(image);
		self
	}

	pub fn with_new_image(mut self, image: Image) -> Self {
		self.new_image = Some(image);
		self
	}

	pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
		self.created_at = Some(created_at);
		self
	}

	/// Parse one record in the stream's JSON wire format.
	pub fn from_json(raw: &str) -> tombstone_type::Result<Self> {
		serde_json::from_str(raw).map_err(|e| Error::Codec(e.to_string()))
	}

	pub fn to_json(&self) -> tombstone_type::Result<String> {
		serde_json::to_string(self).map_err(|e| Error::Codec(e.to_string()))
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireRecord {
	#[serde(rename = "eventID")]
	event_id: String,
	#[serde(rename = "eventName", default, skip_serializing_if = "Option::is_none")]
	event_name: Option<String>,
	dynamodb: WireStreamRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireStreamRecord {
	sequence_number: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	approximate_creation_date_time: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	old_image: Option<Image>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	new_image: Option<Image>,
}

impl TryFrom<WireRecord> for RawChangeRecord {
	type Error = Error;

	fn try_from(wire: WireRecord) -> Result<Self, Self::Error> {
		let sequence = SequenceToken::parse(&wire.dynamodb.sequence_number)?;
		let kind = wire.event_name.as_deref().and_then(|name| name.parse().ok());
		let created_at = wire
			.dynamodb
			.approximate_creation_date_time
			.and_then(|seconds| Utc.timestamp_millis_opt((seconds * 1000.0) as i64).single());

		Ok(Self {
			event_id: wire.event_id,
			sequence,
			kind,
			old_image: wire.dynamodb.old_image,
			new_image: wire.dynamodb.new_image,
			created_at,
		})
	}
}

impl From<RawChangeRecord> for WireRecord {
	fn from(record: RawChangeRecord) -> Self {
		Self {
			event_id: record.event_id,
			event_name: record.kind.map(|kind| kind.as_str().to_string()),
			dynamodb: WireStreamRecord {
				sequence_number: record.sequence.into(),
				approximate_creation_date_time: record
					.created_at
					.map(|at| at.timestamp_millis() as f64 / 1000.0),
				old_image: record.old_image,
				new_image: record.new_image,
			},
		}
	}
}

#[cfg(test)]
mod tests {

	mod from_json {
		use crate::{AttributeValue, MutationKind, RawChangeRecord};

		#[test]
		fn test_remove_record() {
			let raw = r#"{
				"eventID": "c4ca4238a0b92382",
				"eventName": "REMOVE",
				"eventVersion": "1.1",
				"eventSource": "aws:dynamodb",
				"dynamodb": {
					"ApproximateCreationDateTime": 1704067200,
					"Keys": { "id": { "S": "a" }, "dataType": { "S": "user" } },
					"OldImage": {
						"id": { "S": "a" },
						"dataType": { "S": "user" },
						"timestamp": { "N": "1704067100" },
						"tags": { "SS": ["x", "y"] }
					},
					"SequenceNumber": "4421584500000000017450439091",
					"SizeBytes": 59,
					"StreamViewType": "NEW_AND_OLD_IMAGES"
				}
			}"#;

			let record = RawChangeRecord::from_json(raw).unwrap();
			assert_eq!(record.event_id, "c4ca4238a0b92382");
			assert_eq!(record.kind, Some(MutationKind::Remove));
			assert_eq!(record.sequence.as_str(), "4421584500000000017450439091");
			assert_eq!(record.created_at.unwrap().timestamp(), 1_704_067_200);

			let old = record.old_image.unwrap();
			assert_eq!(old.get("id"), Some(&AttributeValue::String("a".to_string())));
			assert_eq!(old.get("timestamp"), Some(&AttributeValue::Number("1704067100".to_string())));
			assert!(record.new_image.is_none());
		}

		#[test]
		fn test_unknown_event_name_has_no_kind() {
			let raw = r#"{"eventID":"1","eventName":"TRUNCATE","dynamodb":{"SequenceNumber":"7"}}"#;
			let record = RawChangeRecord::from_json(raw).unwrap();
			assert_eq!(record.kind, None);
		}

		#[test]
		fn test_missing_event_name_has_no_kind() {
			let raw = r#"{"eventID":"1","dynamodb":{"SequenceNumber":"7"}}"#;
			let record = RawChangeRecord::from_json(raw).unwrap();
			assert_eq!(record.kind, None);
		}

		#[test]
		fn test_missing_sequence_is_codec_error() {
			let raw = r#"{"eventID":"1","eventName":"REMOVE","dynamodb":{}}"#;
			assert!(RawChangeRecord::from_json(raw).is_err());
		}

		#[test]
		fn test_non_numeric_sequence_is_codec_error() {
			let raw = r#"{"eventID":"1","eventName":"REMOVE","dynamodb":{"SequenceNumber":"abc"}}"#;
			assert!(RawChangeRecord::from_json(raw).is_err());
		}
	}

	mod to_json {
		use std::collections::BTreeMap;

		use tombstone_type::SequenceToken;

		use crate::{AttributeValue, MutationKind, RawChangeRecord};

		#[test]
		fn test_wire_shape() {
			let record = RawChangeRecord::new("e1", SequenceToken::from(42), Some(MutationKind::Insert))
				.with_new_image(BTreeMap::from([(
					"id".to_string(),
					AttributeValue::String("a".to_string()),
				)]));

			let json: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
			assert_eq!(json["eventID"], "e1");
			assert_eq!(json["eventName"], "INSERT");
			assert_eq!(json["dynamodb"]["SequenceNumber"], "42");
			assert_eq!(json["dynamodb"]["NewImage"]["id"]["S"], "a");
			assert!(json["dynamodb"].get("OldImage").is_none());
		}
	}
}
