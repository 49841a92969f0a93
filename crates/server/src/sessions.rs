// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory session registry for the HTTP and websocket surfaces.
//!
//! Sessions are keyed by an opaque bearer token carried in a cookie and
//! hold the permission set loaded at login time. They reference users by
//! `auth_id`, which stays stable across password changes.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use pylon_core::auth::Permission;
use rand::RngCore;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Cookie the session token travels in.
pub const SESSION_COOKIE: &str = "pylon_session";

/// An authenticated operator session.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub auth_id: Uuid,
    pub username: String,
    pub permissions: HashSet<Permission>,
}

/// Generate an unguessable session token: 24 bytes of CSPRNG entropy,
/// base64url-encoded.
fn generate_token() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Registry of live sessions. Not persisted: a restart logs everyone out.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &self,
        auth_id: Uuid,
        username: String,
        permissions: HashSet<Permission>,
    ) -> Session {
        let session = Session { token: generate_token(), auth_id, username, permissions };
        self.sessions.lock().insert(session.token.clone(), session.clone());
        session
    }

    pub fn get(&self, token: &str) -> Option<Session> {
        self.sessions.lock().get(token).cloned()
    }

    pub fn remove(&self, token: &str) {
        self.sessions.lock().remove(token);
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
