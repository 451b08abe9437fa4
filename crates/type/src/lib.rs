// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Types shared by every tombstone crate.

pub mod clock;
pub mod error;
pub mod partition;
pub mod sequence;

pub use clock::{Clock, MockClock, SharedClock, SystemClock};
pub use error::{Error, Result};
pub use partition::PartitionId;
pub use sequence::SequenceToken;
