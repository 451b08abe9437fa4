// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Change data capture side of the exporter.
//!
//! This crate provides:
//! - The raw change stream record model and its JSON wire format
//! - The record decoder and the event filter
//! - The pull interface to the change stream, with memory and file backends
//! - Checkpoint stores tracking per-partition export progress

pub mod checkpoint;
mod decode;
mod event;
mod filter;
mod record;
pub mod stream;

pub use checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use decode::{DATA_TYPE_ATTRIBUTE, DecodeRejection, Decoded, ID_ATTRIBUTE, decode};
pub use event::ExportableEvent;
pub use filter::{EventFilter, FilterSummary};
pub use record::{AttributeValue, Image, MutationKind, RawChangeRecord};
pub use stream::{
	ChangeStream, ContinuationToken, FileChangeStream, MemoryChangeStream, StartingPosition, StreamBatch,
	StreamPosition,
};
