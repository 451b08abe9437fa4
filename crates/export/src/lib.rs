// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Export side of the exporter.
//!
//! This crate provides:
//! - [`ExportConfig`], loaded from JSON and `TOMBSTONE_*` environment variables
//! - The [`BatchAccumulator`], grouping events under count, size and age bounds
//! - The [`ExportCoordinator`] state machine, one per stream partition
//! - The [`Exporter`], supervising every partition's coordinator

mod accumulator;
mod config;
mod coordinator;
mod exporter;
mod ledger;
mod metrics;

pub use accumulator::{AccumulatorLimits, BatchAccumulator};
pub use config::{ENV_PREFIX, ExportConfig};
pub use coordinator::{CoordinatorSettings, CoordinatorState, ExportCoordinator};
pub use exporter::{ExportReport, Exporter};
pub use ledger::CheckpointLedger;
pub use metrics::{ExportMetrics, MetricsSnapshot, PartitionMetrics};
