// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for store tests.

use crate::{HasherPool, RaceDatabase, UserDatabase, MEMORY};

/// Hasher with cheap parameters so tests do not pay real argon2 costs.
pub(crate) fn cheap_hasher() -> HasherPool {
    let params = argon2::Params::new(64, 1, 1, None).unwrap();
    HasherPool::with_params(2, params)
}

pub(crate) async fn memory_user_db() -> UserDatabase {
    UserDatabase::open(MEMORY, cheap_hasher()).await.unwrap()
}

pub(crate) async fn memory_race_db() -> RaceDatabase {
    RaceDatabase::open(MEMORY).await.unwrap()
}
