// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Database handles, schema creation, and the persistent-defaults bootstrap.

use crate::error::StoreError;
use crate::hasher::HasherPool;
use crate::pilots::PilotStore;
use crate::roles::{PermissionStore, RoleStore};
use crate::users::UserStore;
use pylon_core::auth::Permission;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

/// Filename that selects an ephemeral store.
pub const MEMORY: &str = ":memory:";

/// Role granted every permission by the bootstrap.
pub const SYSTEM_ADMIN_ROLE: &str = "SYSTEM_ADMIN";

const USER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS permissions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS roles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    persistent INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS role_permissions (
    role_id INTEGER NOT NULL REFERENCES roles(id),
    permission_id INTEGER NOT NULL REFERENCES permissions(id),
    PRIMARY KEY (role_id, permission_id)
);
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    auth_id TEXT NOT NULL UNIQUE,
    username TEXT NOT NULL UNIQUE,
    first_name TEXT,
    last_name TEXT,
    password_hash TEXT,
    last_login TEXT,
    reset_required INTEGER NOT NULL DEFAULT 1,
    persistent INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS user_roles (
    user_id INTEGER NOT NULL REFERENCES users(id),
    role_id INTEGER NOT NULL REFERENCES roles(id),
    PRIMARY KEY (user_id, role_id)
);
"#;

const RACE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS pilots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    callsign TEXT NOT NULL UNIQUE,
    name TEXT,
    phonetic TEXT
);
"#;

async fn open_pool(filename: &str) -> Result<SqlitePool, StoreError> {
    // In-memory databases exist per connection; a single-connection pool
    // keeps every caller on the same store.
    let (options, max_connections) = if filename == MEMORY {
        (SqliteConnectOptions::new().in_memory(true), 1)
    } else {
        (SqliteConnectOptions::new().filename(filename).create_if_missing(true), 5)
    };
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(|e| StoreError::Fatal(format!("failed to open database '{filename}': {e}")))
}

async fn create_schema(pool: &SqlitePool, schema: &str) -> Result<(), StoreError> {
    for statement in schema.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| StoreError::Fatal(format!("schema creation failed: {e}")))?;
    }
    Ok(())
}

/// Handle to the user database: users, roles, permissions.
#[derive(Clone)]
pub struct UserDatabase {
    pool: SqlitePool,
    pub users: UserStore,
    pub roles: RoleStore,
    pub permissions: PermissionStore,
}

impl UserDatabase {
    /// Open (creating the schema if needed). Fails fatally: a server without
    /// its user database cannot start.
    pub async fn open(filename: &str, hasher: HasherPool) -> Result<Self, StoreError> {
        let pool = open_pool(filename).await?;
        create_schema(&pool, USER_SCHEMA).await?;
        Ok(Self {
            users: UserStore::new(pool.clone(), hasher),
            roles: RoleStore::new(pool.clone()),
            permissions: PermissionStore::new(pool.clone()),
            pool,
        })
    }

    /// Idempotent bootstrap of the persistent defaults: the full permission
    /// set, the system admin role holding all of them, and the default admin
    /// user (flagged for password reset).
    pub async fn ensure_defaults(&self, username: &str, password: &str) -> Result<(), StoreError> {
        self.permissions.ensure_persistent(&Permission::ALL).await?;
        let all = self.permissions.get_all().await?;
        self.roles.ensure_persistent_role(SYSTEM_ADMIN_ROLE, &all).await?;

        let role = self
            .roles
            .role_by_name(SYSTEM_ADMIN_ROLE)
            .await?
            .ok_or_else(|| StoreError::Fatal("bootstrap role missing after ensure".to_string()))?;

        self.users.ensure_persistent_user(username, password, &[role.name.as_str()]).await?;
        info!(username, "persistent defaults verified");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Handle to the race database: pilots (and, later, results).
#[derive(Clone)]
pub struct RaceDatabase {
    pool: SqlitePool,
    pub pilots: PilotStore,
}

impl RaceDatabase {
    pub async fn open(filename: &str) -> Result<Self, StoreError> {
        let pool = open_pool(filename).await?;
        create_schema(&pool, RACE_SCHEMA).await?;
        Ok(Self { pilots: PilotStore::new(pool.clone()), pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
