// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Change record builders.
//!
//! Every record built here has event id `evt-<id>`, so the exported event's
//! `sourceEventId` is predictable in assertions.

use tombstone_cdc::{AttributeValue, DATA_TYPE_ATTRIBUTE, ID_ATTRIBUTE, Image, MutationKind, RawChangeRecord};
use tombstone_type::SequenceToken;

pub fn image(id: &str, data_type: &str) -> Image {
	Image::from([
		(ID_ATTRIBUTE.to_string(), AttributeValue::String(id.to_string())),
		(DATA_TYPE_ATTRIBUTE.to_string(), AttributeValue::String(data_type.to_string())),
	])
}

/// A deletion of item `id`, exported by the pipeline.
pub fn remove(id: &str, data_type: &str, sequence: u64) -> RawChangeRecord {
	RawChangeRecord::new(source_event_id(id), SequenceToken::from(sequence), Some(MutationKind::Remove))
		.with_old_image(image(id, data_type))
}

pub fn insert(id: &str, data_type: &str, sequence: u64) -> RawChangeRecord {
	RawChangeRecord::new(source_event_id(id), SequenceToken::from(sequence), Some(MutationKind::Insert))
		.with_new_image(image(id, data_type))
}

pub fn modify(id: &str, data_type: &str, sequence: u64) -> RawChangeRecord {
	RawChangeRecord::new(source_event_id(id), SequenceToken::from(sequence), Some(MutationKind::Modify))
		.with_old_image(image(id, data_type))
		.with_new_image(image(id, data_type))
}

/// A deletion whose old image lacks `dataType`.
pub fn remove_without_data_type(id: &str, sequence: u64) -> RawChangeRecord {
	let mut old_image = image(id, "");
	old_image.remove(DATA_TYPE_ATTRIBUTE);
	RawChangeRecord::new(source_event_id(id), SequenceToken::from(sequence), Some(MutationKind::Remove))
		.with_old_image(old_image)
}

/// Deletions of `ids` with consecutive sequence numbers from `first_sequence`.
pub fn removes(ids: &[&str], data_type: &str, first_sequence: u64) -> Vec<RawChangeRecord> {
	ids.iter().zip(first_sequence..).map(|(id, sequence)| remove(id, data_type, sequence)).collect()
}

pub fn source_event_id(id: &str) -> String {
	format!("evt-{}", id)
}
