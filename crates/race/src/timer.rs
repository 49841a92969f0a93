// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot timers on the monotonic clock.
//!
//! `schedule_at` arms a timer whose job runs on the scheduler when the
//! deadline passes. The returned token cancels it: after a successful
//! cancel the job is guaranteed not to run; a cancel that loses the race
//! to the deadline reports `Late`. A fired/cancelled claim decides the
//! winner, so the two outcomes are mutually exclusive.

use pylon_core::clock::Clock;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

/// What a `cancel` call achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job had not started and never will.
    Cancelled,
    /// The job already claimed its deadline; it has run or is running.
    Late,
}

/// Handle to a scheduled timer.
pub struct TimerToken {
    token: CancellationToken,
    claim: Arc<AtomicU8>,
}

impl TimerToken {
    /// Cancel the timer. `Cancelled` is a hard guarantee that the job will
    /// not be invoked after this returns.
    pub fn cancel(&self) -> CancelOutcome {
        self.token.cancel();
        match self.claim.compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => CancelOutcome::Cancelled,
            Err(_) => CancelOutcome::Late,
        }
    }

}

/// Single source of monotonic time plus one-shot timer scheduling.
pub struct TimerService<C: Clock> {
    clock: C,
}

impl<C: Clock> TimerService<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Milliseconds since the clock's origin; the timestamp carried in
    /// event payloads.
    pub fn monotonic_ms(&self) -> u64 {
        self.clock.monotonic_ms()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Arm a one-shot timer for `fires_at`. The job receives a clone of the
    /// cancellation token so it can keep observing cancellation across any
    /// further waits of its own.
    pub fn schedule_at<F, Fut>(&self, fires_at: Instant, job: F) -> TimerToken
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let claim = Arc::new(AtomicU8::new(PENDING));
        let delay = fires_at.saturating_duration_since(self.clock.now());

        let task_token = token.clone();
        let task_claim = Arc::clone(&claim);
        tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            // Claim the deadline; a concurrent cancel that got here first
            // wins and the job must not run.
            if task_claim
                .compare_exchange(PENDING, FIRED, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
            job(task_token).await;
        });

        TimerToken { token, claim }
    }

    /// Wait out a duration, returning `false` if cancelled first.
    pub async fn wait(&self, duration: Duration, token: &CancellationToken) -> bool {
        tokio::select! {
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
