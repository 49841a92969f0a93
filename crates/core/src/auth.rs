// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Users, roles, and the closed permission set.
//!
//! A user's effective permission set is the union of permissions across
//! their roles. It is always computed by the store (`load_permissions`),
//! never cached on the record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Closed enumeration of everything a role can grant.
///
/// The string form is the canonical name persisted in the user database and
/// sent over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    ReadPilots,
    RaceEvents,
    EventWebsocket,
    ResetPassword,
    SystemControl,
}

impl Permission {
    /// Every known permission, in a stable order.
    pub const ALL: [Permission; 5] = [
        Permission::ReadPilots,
        Permission::RaceEvents,
        Permission::EventWebsocket,
        Permission::ResetPassword,
        Permission::SystemControl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ReadPilots => "READ_PILOTS",
            Permission::RaceEvents => "RACE_EVENTS",
            Permission::EventWebsocket => "EVENT_WEBSOCKET",
            Permission::ResetPassword => "RESET_PASSWORD",
            Permission::SystemControl => "SYSTEM_CONTROL",
        }
    }

    /// Parse a canonical permission name.
    ///
    /// Returns `None` for names not in the closed set, which lets callers
    /// skip rows written by a newer schema instead of failing the query.
    pub fn parse(s: &str) -> Option<Permission> {
        match s {
            "READ_PILOTS" => Some(Permission::ReadPilots),
            "RACE_EVENTS" => Some(Permission::RaceEvents),
            "EVENT_WEBSOCKET" => Some(Permission::EventWebsocket),
            "RESET_PASSWORD" => Some(Permission::ResetPassword),
            "SYSTEM_CONTROL" => Some(Permission::SystemControl),
            _ => None,
        }
    }
}

crate::simple_display! {
    Permission {
        ReadPilots => "READ_PILOTS",
        RaceEvents => "RACE_EVENTS",
        EventWebsocket => "EVENT_WEBSOCKET",
        ResetPassword => "RESET_PASSWORD",
        SystemControl => "SYSTEM_CONTROL",
    }
}

/// A named bundle of permissions.
///
/// Roles marked persistent are bootstrap defaults and cannot be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub permissions: HashSet<Permission>,
    pub persistent: bool,
}

/// A user record as stored in the user database.
///
/// `auth_id` is the opaque identifier carried in sessions; it stays stable
/// across password changes so a reset never invalidates unrelated logins.
/// Role membership is loaded separately by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub auth_id: Uuid,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub reset_required: bool,
    pub persistent: bool,
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
