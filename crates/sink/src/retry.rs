// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Bounded exponential backoff.

use std::{future::Future, time::Duration};

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{SinkError, SinkResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Total attempts, the first one included.
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
}

impl RetryPolicy {
	pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
		Self {
			max_attempts,
			base_delay,
			max_delay,
		}
	}

	/// Policy that never retries.
	pub fn none() -> Self {
		Self::new(1, Duration::ZERO, Duration::ZERO)
	}

	/// Delay before retry number `retry` (1-based): `base * 2^(retry - 1)`,
	/// capped at `max_delay`.
	pub fn delay(&self, retry: u32) -> Duration {
		let exponent = retry.saturating_sub(1).min(31);
		self.base_delay.saturating_mul(1u32 << exponent).min(self.max_delay)
	}

	/// Run `op`, retrying transient [`SinkError`]s until the attempt budget is
	/// spent. Non-transient errors are returned immediately.
	pub async fn run<T, F, Fut>(&self, mut op: F) -> SinkResult<T>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, SinkError>>,
	{
		let mut attempt = 1;
		loop {
			match op().await {
				Ok(value) => {
					if attempt > 1 {
						debug!(attempt, "sink write succeeded after retry");
					}
					return Ok(value);
				}
				Err(err) if err.is_transient() && attempt < self.max_attempts => {
					let delay = self.delay(attempt);
					warn!(attempt, max_attempts = self.max_attempts, delay_ms = delay.as_millis() as u64, error = %err, "transient sink error, backing off");
					sleep(delay).await;
					attempt += 1;
				}
				Err(err) => return Err(err),
			}
		}
	}
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self::new(3, Duration::from_millis(100), Duration::from_secs(5))
	}
}
