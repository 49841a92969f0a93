// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Password hashing on a bounded worker pool.
//!
//! Argon2id is CPU- and memory-hard; running it inline would stall the
//! scheduler for tens of milliseconds per login. Every hash and verify is
//! offloaded to the blocking pool, with a semaphore bounding concurrency so
//! a login storm backpressures callers instead of spawning unbounded
//! threads. Verification is constant-time against the stored hash (argon2
//! crate guarantee).

use crate::error::StoreError;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, warn};

/// Bounded pool of password-hashing workers.
///
/// Cheap to clone; all clones share one semaphore. The parameter policy is
/// fixed at construction; hashes produced under an older policy are caught
/// by [`HasherPool::needs_rehash`].
#[derive(Clone)]
pub struct HasherPool {
    permits: Arc<Semaphore>,
    params: Params,
}

impl HasherPool {
    /// Create a pool allowing at most `workers` concurrent hash operations,
    /// using the argon2 crate's recommended parameters.
    pub fn new(workers: usize) -> Self {
        Self { permits: Arc::new(Semaphore::new(workers.max(1))), params: Params::default() }
    }

    /// Create a pool with an explicit parameter policy (tests use cheap
    /// parameters to keep hashing fast).
    pub fn with_params(workers: usize, params: Params) -> Self {
        Self { permits: Arc::new(Semaphore::new(workers.max(1))), params }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password. Suspends while waiting for a worker slot.
    pub async fn hash(&self, password: String) -> Result<String, StoreError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| StoreError::Hash("hasher pool closed".to_string()))?;
        let argon2 = self.argon2();
        let joined = tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2.hash_password(password.as_bytes(), &salt).map(|h| h.to_string())
        })
        .await;
        match joined {
            Ok(Ok(hash)) => Ok(hash),
            Ok(Err(e)) => {
                error!(error = %e, "failed to hash password");
                Err(StoreError::Hash(e.to_string()))
            }
            Err(e) => Err(StoreError::Hash(e.to_string())),
        }
    }

    /// Verify a candidate password against a stored hash.
    ///
    /// Mismatches log a warning keyed by username; an unparseable stored
    /// hash logs an error. Both return `false` so callers cannot tell the
    /// cases apart.
    pub async fn verify(&self, stored_hash: String, candidate: String, username: String) -> bool {
        let Ok(_permit) = self.permits.acquire().await else {
            return false;
        };
        let argon2 = self.argon2();
        let joined = tokio::task::spawn_blocking(move || {
            let parsed = match PasswordHash::new(&stored_hash) {
                Ok(parsed) => parsed,
                Err(e) => {
                    error!(%username, error = %e, "invalid stored password hash");
                    return false;
                }
            };
            match argon2.verify_password(candidate.as_bytes(), &parsed) {
                Ok(()) => true,
                Err(argon2::password_hash::Error::Password) => {
                    warn!(%username, "failed password attempt");
                    false
                }
                Err(e) => {
                    error!(%username, error = %e, "password verification error");
                    false
                }
            }
        })
        .await;
        joined.unwrap_or(false)
    }

    /// True when the stored hash was produced under parameters weaker than
    /// (or simply different from) the current policy, or cannot be parsed.
    pub fn needs_rehash(&self, stored_hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored_hash) else {
            return true;
        };
        if parsed.algorithm.as_str() != Algorithm::Argon2id.as_str() {
            return true;
        }
        match Params::try_from(&parsed) {
            Ok(params) => {
                params.m_cost() != self.params.m_cost()
                    || params.t_cost() != self.params.t_cost()
                    || params.p_cost() != self.params.p_cost()
            }
            Err(_) => true,
        }
    }
}

#[cfg(test)]
#[path = "hasher_tests.rs"]
mod tests;
