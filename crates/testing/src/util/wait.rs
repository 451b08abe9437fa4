// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Waiting on conditions in tests without fixed sleeps.
//!
//! Exporter tests run coordinators as background tasks; these helpers poll
//! observable state (sink contents, checkpoints) until it settles.

use std::time::{Duration, Instant};

use tokio::time::sleep;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Poll `condition` every `poll_interval` until it holds.
///
/// # Panics
/// Panics with `timeout_message` if the condition does not hold within
/// `timeout`.
pub async fn wait_for_condition<F>(condition: F, timeout: Duration, poll_interval: Duration, timeout_message: &str)
where
	F: Fn() -> bool,
{
	let start = Instant::now();
	let mut polls = 0u64;

	while !condition() {
		if start.elapsed() > timeout {
			panic!("Timeout after {:?} ({} polls): {}", timeout, polls, timeout_message);
		}
		polls += 1;
		sleep(poll_interval).await;
	}
}

/// [`wait_for_condition`] with a 5 second timeout and 1 ms poll interval.
pub async fn wait_for<F>(condition: F, message: &str)
where
	F: Fn() -> bool,
{
	wait_for_condition(condition, DEFAULT_TIMEOUT, DEFAULT_POLL_INTERVAL, message).await;
}

#[cfg(test)]
mod tests {
	use std::{
		sync::{
			Arc,
			atomic::{AtomicUsize, Ordering},
		},
		time::Duration,
	};

	use crate::util::{wait_for, wait_for_condition};

	#[tokio::test]
	async fn test_wait_for_immediate() {
		wait_for(|| true, "should not time out").await;
	}

	#[tokio::test]
	async fn test_wait_for_becomes_true() {
		let counter = Arc::new(AtomicUsize::new(0));
		let writer = counter.clone();

		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(20)).await;
			writer.store(5, Ordering::SeqCst);
		});

		wait_for(|| counter.load(Ordering::SeqCst) == 5, "counter should reach 5").await;
	}

	#[tokio::test]
	#[should_panic(expected = "Timeout after")]
	async fn test_wait_for_timeout() {
		wait_for_condition(|| false, Duration::from_millis(10), Duration::from_millis(1), "never true").await;
	}
}
