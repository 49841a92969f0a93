// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Race manager error types.

use pylon_core::race::RaceStatus;
use thiserror::Error;

/// Errors surfaced by the race sequence manager.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RaceError {
    /// The request itself is malformed (start time in the past, bad
    /// durations). Maps to HTTP 400.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The manager is not in a state that allows the operation. Maps to
    /// HTTP 409.
    #[error("cannot schedule a race while {0}")]
    InvalidState(RaceStatus),
}
