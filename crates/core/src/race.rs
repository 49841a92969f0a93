// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Race schedule and sequence status.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// A rejected schedule.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidSchedule {
    #[error("{0} must be a non-negative number of seconds")]
    NegativeDuration(&'static str),
}

/// Timing plan for a single race.
///
/// Durations are wall seconds. `unlimited` races have no automatic
/// termination: the race-finish event still fires at `race_time_sec`, but
/// only an operator stop ends the race.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RaceSchedule {
    pub stage_time_sec: f64,
    pub race_time_sec: f64,
    pub overtime_sec: f64,
    pub unlimited: bool,
}

impl RaceSchedule {
    pub fn new(
        stage_time_sec: f64,
        race_time_sec: f64,
        overtime_sec: f64,
        unlimited: bool,
    ) -> Result<Self, InvalidSchedule> {
        for (name, value) in [
            ("stage_time_sec", stage_time_sec),
            ("race_time_sec", race_time_sec),
            ("overtime_sec", overtime_sec),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(InvalidSchedule::NegativeDuration(name));
            }
        }
        Ok(Self { stage_time_sec, race_time_sec, overtime_sec, unlimited })
    }

    pub fn stage_time(&self) -> Duration {
        Duration::from_secs_f64(self.stage_time_sec)
    }

    pub fn race_time(&self) -> Duration {
        Duration::from_secs_f64(self.race_time_sec)
    }

    pub fn overtime(&self) -> Duration {
        Duration::from_secs_f64(self.overtime_sec)
    }
}

/// Where the race sequence currently is.
///
/// In-memory only; a process restart always begins at `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceStatus {
    Ready,
    Scheduled,
    Staging,
    Racing,
    Overtime,
    Stopped,
}

impl RaceStatus {
    /// A live race is one an operator stop must end with a stop event.
    pub fn is_live(&self) -> bool {
        matches!(self, RaceStatus::Racing | RaceStatus::Overtime)
    }
}

crate::simple_display! {
    RaceStatus {
        Ready => "ready",
        Scheduled => "scheduled",
        Staging => "staging",
        Racing => "racing",
        Overtime => "overtime",
        Stopped => "stopped",
    }
}

#[cfg(test)]
#[path = "race_tests.rs"]
mod tests;
