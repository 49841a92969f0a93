// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bus error types.

use thiserror::Error;

/// Errors surfaced to publishers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("event bus is closed")]
    Closed,

    #[error("instant event '{0}' must be published with publish_instant")]
    InstantOnQueue(&'static str),
}

/// A failure inside a subscriber's handler.
///
/// Never propagated to the publisher; the dispatcher logs it and moves on
/// to the next subscriber.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
