// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::{
	Arc,
	atomic::{AtomicI64, Ordering},
};

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Source of wall-clock time.
///
/// Every timestamp the exporter assigns (`observedAt`, batch `openedAt`, object
/// names) is read through a clock so tests can pin time.
pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

pub type SharedClock = Arc<dyn Clock>;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// Manually driven clock with millisecond resolution.
#[derive(Debug, Clone)]
pub struct MockClock {
	millis: Arc<AtomicI64>,
}

impl MockClock {
	pub fn new(millis: i64) -> Self {
		Self {
			millis: Arc::new(AtomicI64::new(millis)),
		}
	}

	pub fn set(&self, millis: i64) {
		self.millis.store(millis, Ordering::SeqCst);
	}

	pub fn advance(&self, by: Duration) {
		self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
	}
}

impl Default for MockClock {
	fn default() -> Self {
		// 2024-01-01T00:00:00Z
		Self::new(1_704_067_200_000)
	}
}

impl Clock for MockClock {
	fn now(&self) -> DateTime<Utc> {
		let millis = self.millis.load(Ordering::SeqCst);
		Utc.timestamp_millis_opt(millis).single().unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
	}
}

#[cfg(test)]
mod tests {
	use chrono::Duration;

	use crate::{Clock, MockClock};

	#[test]
	fn test_mock_clock_advances() {
		let clock = MockClock::new(1_000);
		let before = clock.now();
		clock.advance(Duration::seconds(60));
		assert_eq!(clock.now() - before, Duration::seconds(60));
	}

	#[test]
	fn test_mock_clock_clones_share_time() {
		let clock = MockClock::new(0);
		let other = clock.clone();
		other.set(5_000);
		assert_eq!(clock.now().timestamp_millis(), 5_000);
	}
}
