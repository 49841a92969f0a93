// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store error types and the transient-retry helper.

use std::future::Future;
use thiserror::Error;

/// Errors raised by the stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record already exists")]
    AlreadyExists,

    #[error("record not found")]
    NotFound,

    #[error("{kind} '{name}' is persistent and cannot be modified")]
    Persistent { kind: &'static str, name: String },

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("fatal storage error: {0}")]
    Fatal(String),
}

impl StoreError {
    /// Map a database error, folding unique-constraint violations into
    /// `AlreadyExists` so `ensure_*` wrappers can swallow them.
    pub(crate) fn from_insert(e: sqlx::Error) -> StoreError {
        if is_unique_violation(&e) {
            StoreError::AlreadyExists
        } else {
            StoreError::Storage(e)
        }
    }
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// SQLITE_BUSY (5) and SQLITE_LOCKED (6), plus pool/IO hiccups.
fn is_transient(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db) => {
            matches!(db.code().as_deref(), Some("5") | Some("6"))
        }
        _ => false,
    }
}

/// Run a storage operation, retrying once on a transient failure. The
/// second failure surfaces as-is.
pub(crate) async fn retry_once<T, F, Fut>(op: F) -> Result<T, sqlx::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    match op().await {
        Err(e) if is_transient(&e) => {
            tracing::warn!(error = %e, "transient storage error, retrying once");
            op().await
        }
        other => other,
    }
}
