// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The race sequence manager.
//!
//! One manager drives one race at a time through
//! scheduled → staging → racing → (overtime) → stopped on the monotonic
//! clock, publishing an instant event at each transition. At most one
//! deferred transition (the "program") is armed at any moment; an operator
//! stop cancels it at any point in the sequence.
//!
//! Every state read and write happens under one exclusive lock. Timer jobs
//! carry the generation that armed them: a stop bumps the generation, so a
//! job that lost the cancellation race observes the mismatch under the lock
//! and backs out without acting.

use crate::error::RaceError;
use crate::timer::{TimerService, TimerToken};
use parking_lot::Mutex;
use pylon_bus::EventBus;
use pylon_core::clock::Clock;
use pylon_core::event::{EventDescriptor, RACE_FINISH, RACE_STAGE, RACE_START, RACE_STOP};
use pylon_core::race::{RaceSchedule, RaceStatus};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Payload published with every race transition event.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionPayload {
    pub previous_status: RaceStatus,
    pub new_status: RaceStatus,
    pub schedule: RaceSchedule,
    pub monotonic_ms: u64,
}

struct ProgramState {
    status: RaceStatus,
    schedule: Option<RaceSchedule>,
    program: Option<TimerToken>,
    generation: u64,
}

/// Drives the race sequence state machine. Cheap to clone; all clones share
/// one state.
pub struct RaceManager<C: Clock> {
    bus: EventBus,
    timers: Arc<TimerService<C>>,
    state: Arc<Mutex<ProgramState>>,
}

impl<C: Clock> Clone for RaceManager<C> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
            timers: Arc::clone(&self.timers),
            state: Arc::clone(&self.state),
        }
    }
}

impl<C: Clock> RaceManager<C> {
    pub fn new(bus: EventBus, timers: Arc<TimerService<C>>) -> Self {
        Self {
            bus,
            timers,
            state: Arc::new(Mutex::new(ProgramState {
                status: RaceStatus::Ready,
                schedule: None,
                program: None,
                generation: 0,
            })),
        }
    }

    pub fn status(&self) -> RaceStatus {
        self.state.lock().status
    }

    pub fn schedule(&self) -> Option<RaceSchedule> {
        self.state.lock().schedule
    }

    /// True while a deferred transition is armed.
    pub fn has_pending_transition(&self) -> bool {
        self.state.lock().program.is_some()
    }

    /// Arm the sequence: at `assigned_start` the race enters staging and
    /// the remaining transitions chain from there.
    ///
    /// Fails with `InvalidState` unless the manager is `Ready`, and with
    /// `InvalidArgument` if `assigned_start` is not in the future.
    pub fn schedule_race(
        &self,
        schedule: RaceSchedule,
        assigned_start: Instant,
    ) -> Result<(), RaceError> {
        let mut st = self.state.lock();
        if st.status != RaceStatus::Ready {
            return Err(RaceError::InvalidState(st.status));
        }
        if assigned_start <= self.timers.now() {
            return Err(RaceError::InvalidArgument("assigned start time is in the past"));
        }
        if let Some(program) = st.program.take() {
            program.cancel();
        }
        st.generation += 1;
        let generation = st.generation;
        st.status = RaceStatus::Scheduled;
        st.schedule = Some(schedule);

        let manager = self.clone();
        st.program = Some(self.timers.schedule_at(assigned_start, move |cancel| {
            manager.run_program(generation, schedule, cancel)
        }));
        info!(
            stage_sec = schedule.stage_time_sec,
            race_sec = schedule.race_time_sec,
            overtime_sec = schedule.overtime_sec,
            unlimited = schedule.unlimited,
            "race scheduled"
        );
        Ok(())
    }

    /// Stop whatever is in flight. Idempotent; the program handle is always
    /// gone when this returns.
    ///
    /// Before the race starts (`Scheduled`/`Staging`) cancellation is
    /// silent and the manager returns to `Ready`. A live race
    /// (`Racing`/`Overtime`) moves to `Stopped` and publishes the stop
    /// event.
    pub async fn stop_race(&self) {
        let stopped = {
            let mut st = self.state.lock();
            match st.status {
                RaceStatus::Ready | RaceStatus::Stopped => None,
                RaceStatus::Scheduled | RaceStatus::Staging => {
                    if let Some(program) = st.program.take() {
                        program.cancel();
                    }
                    st.generation += 1;
                    let previous = st.status;
                    st.status = RaceStatus::Ready;
                    st.schedule = None;
                    info!(from = %previous, "race cancelled before start");
                    None
                }
                RaceStatus::Racing | RaceStatus::Overtime => {
                    if let Some(program) = st.program.take() {
                        program.cancel();
                    }
                    st.generation += 1;
                    let previous = st.status;
                    st.status = RaceStatus::Stopped;
                    info!(from = %previous, "race stopped");
                    st.schedule.map(|schedule| (previous, schedule))
                }
            }
        };
        if let Some((previous, schedule)) = stopped {
            self.emit(&RACE_STOP, previous, RaceStatus::Stopped, &schedule).await;
        }
    }

    /// The full deferred sequence, run on the timer task armed by
    /// `schedule_race`. Each wait observes the cancellation token; each
    /// transition re-checks the generation under the lock.
    async fn run_program(self, generation: u64, schedule: RaceSchedule, cancel: CancellationToken) {
        let Some(previous) = self.advance(generation, RaceStatus::Staging, false) else {
            return;
        };
        self.emit(&RACE_STAGE, previous, RaceStatus::Staging, &schedule).await;

        if !self.timers.wait(schedule.stage_time(), &cancel).await {
            return;
        }
        let Some(previous) = self.advance(generation, RaceStatus::Racing, false) else {
            return;
        };
        self.emit(&RACE_START, previous, RaceStatus::Racing, &schedule).await;

        if !self.timers.wait(schedule.race_time(), &cancel).await {
            return;
        }

        if schedule.unlimited {
            // The finish marker fires on time, but the race runs until an
            // operator stop.
            let Some(previous) = self.advance(generation, RaceStatus::Racing, true) else {
                return;
            };
            self.emit(&RACE_FINISH, previous, RaceStatus::Racing, &schedule).await;
            return;
        }

        if schedule.overtime_sec > 0.0 {
            let Some(previous) = self.advance(generation, RaceStatus::Overtime, false) else {
                return;
            };
            self.emit(&RACE_FINISH, previous, RaceStatus::Overtime, &schedule).await;

            if !self.timers.wait(schedule.overtime(), &cancel).await {
                return;
            }
            let Some(previous) = self.advance(generation, RaceStatus::Stopped, true) else {
                return;
            };
            self.emit(&RACE_STOP, previous, RaceStatus::Stopped, &schedule).await;
        } else {
            let Some(previous) = self.advance(generation, RaceStatus::Stopped, true) else {
                return;
            };
            self.emit(&RACE_FINISH, previous, RaceStatus::Stopped, &schedule).await;
            self.emit(&RACE_STOP, previous, RaceStatus::Stopped, &schedule).await;
        }
    }

    /// Apply one transition under the lock. Returns the previous status,
    /// or `None` when this job's generation has been superseded by a stop.
    fn advance(
        &self,
        generation: u64,
        next: RaceStatus,
        end_of_program: bool,
    ) -> Option<RaceStatus> {
        let mut st = self.state.lock();
        if st.generation != generation {
            return None;
        }
        let previous = st.status;
        st.status = next;
        if end_of_program {
            st.program = None;
        }
        info!(from = %previous, to = %next, "race transition");
        Some(previous)
    }

    async fn emit(
        &self,
        descriptor: &'static EventDescriptor,
        previous: RaceStatus,
        new: RaceStatus,
        schedule: &RaceSchedule,
    ) {
        let payload = TransitionPayload {
            previous_status: previous,
            new_status: new,
            schedule: *schedule,
            monotonic_ms: self.timers.monotonic_ms(),
        };
        let value = match serde_json::to_value(&payload) {
            Ok(value) => value,
            Err(e) => {
                warn!(event = descriptor.id, error = %e, "payload serialization failed");
                serde_json::Value::Null
            }
        };
        if let Err(e) = self.bus.publish_instant(descriptor, value).await {
            warn!(event = descriptor.id, error = %e, "race event publish failed");
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
