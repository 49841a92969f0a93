// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pylon-store: SQLite-backed persistence for users, roles, and pilots.
//!
//! Two separate databases back the server: the user database (identity,
//! roles, permissions) and the race database (pilots). Each store opens its
//! schema on startup; `":memory:"` gives an ephemeral store for tests.

mod db;
mod error;
mod hasher;
mod pilots;
mod roles;
mod users;

#[cfg(test)]
pub(crate) mod test_support;

pub use db::{RaceDatabase, UserDatabase, MEMORY, SYSTEM_ADMIN_ROLE};
pub use error::StoreError;
pub use hasher::HasherPool;
pub use pilots::{NewPilot, Pilot, PilotStore};
pub use roles::{PermissionStore, RoleStore};
pub use users::{NewUser, UserStore};
