// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Delivery side of the exporter.
//!
//! This crate provides:
//! - The [`Batch`] handed from the accumulator to the sink
//! - The [`Sink`] seam with memory and directory backends
//! - The [`SinkAdapter`], delivering batches in bulk or streamed mode with
//!   bounded local retries, and its [`DeliveryReceipt`]

mod adapter;
mod batch;
mod directory;
mod encode;
mod error;
mod layout;
mod memory;
mod receipt;
mod retry;
mod sink;

pub use adapter::{DEFAULT_MAX_RECORD_BYTES, DeliveryMode, SinkAdapter};
pub use batch::{Batch, encoded_len};
pub use directory::DirectorySink;
pub use encode::{PayloadFormat, encode_batch, encode_record};
pub use error::{SinkError, SinkResult};
pub use layout::{ObjectLayout, PartitionField};
pub use memory::MemorySink;
pub use receipt::DeliveryReceipt;
pub use retry::RetryPolicy;
pub use sink::Sink;
