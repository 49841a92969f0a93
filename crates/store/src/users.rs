// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User records, password verification, and login bookkeeping.

use crate::error::{retry_once, StoreError};
use crate::hasher::HasherPool;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use pylon_core::auth::{Permission, Role, User};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::collections::HashSet;
use tracing::{info, warn};
use uuid::Uuid;

const SELECT_USER: &str = "SELECT id, auth_id, username, first_name, last_name, \
                           password_hash, last_login, reset_required, persistent FROM users";

/// Fields for a new user record. `auth_id` and `reset_required` are always
/// store-assigned.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub roles: Vec<String>,
    pub persistent: bool,
}

/// User record store.
#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
    hasher: HasherPool,
}

impl UserStore {
    pub(crate) fn new(pool: SqlitePool, hasher: HasherPool) -> Self {
        Self { pool, hasher }
    }

    pub async fn by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = retry_once(|| async {
            sqlx::query(&format!("{SELECT_USER} WHERE username = ?1"))
                .bind(username)
                .fetch_optional(&self.pool)
                .await
        })
        .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    pub async fn by_auth_id(&self, auth_id: Uuid) -> Result<Option<User>, StoreError> {
        let row = retry_once(|| async {
            sqlx::query(&format!("{SELECT_USER} WHERE auth_id = ?1"))
                .bind(auth_id.to_string())
                .fetch_optional(&self.pool)
                .await
        })
        .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    /// Create a user with no password set. Role membership is linked by
    /// role name; unknown names link nothing.
    pub async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let auth_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "INSERT INTO users (auth_id, username, first_name, last_name, \
             reset_required, persistent) VALUES (?1, ?2, ?3, ?4, 1, ?5)",
        )
        .bind(auth_id.to_string())
        .bind(&new.username)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(new.persistent)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from_insert)?;
        let user_id = result.last_insert_rowid();
        for role in &new.roles {
            sqlx::query(
                "INSERT INTO user_roles (user_id, role_id) \
                 SELECT ?1, id FROM roles WHERE name = ?2",
            )
            .bind(user_id)
            .bind(role)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(User {
            id: user_id,
            auth_id,
            username: new.username,
            first_name: new.first_name,
            last_name: new.last_name,
            password_hash: None,
            last_login: None,
            reset_required: true,
            persistent: new.persistent,
        })
    }

    /// Idempotent bootstrap: create the user as persistent with the default
    /// password and a forced reset if the username does not exist.
    pub async fn ensure_persistent_user(
        &self,
        username: &str,
        default_password: &str,
        roles: &[&str],
    ) -> Result<(), StoreError> {
        if self.by_username(username).await?.is_some() {
            return Ok(());
        }
        let hash = self.hasher.hash(default_password.to_string()).await?;
        let auth_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(
            "INSERT INTO users (auth_id, username, password_hash, reset_required, persistent) \
             VALUES (?1, ?2, ?3, 1, 1)",
        )
        .bind(auth_id.to_string())
        .bind(username)
        .bind(&hash)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from_insert);
        let user_id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            // Lost the race to a concurrent bootstrap; the record exists.
            Err(StoreError::AlreadyExists) => return Ok(()),
            Err(e) => return Err(e),
        };
        for role in roles {
            sqlx::query(
                "INSERT INTO user_roles (user_id, role_id) \
                 SELECT ?1, id FROM roles WHERE name = ?2",
            )
            .bind(user_id)
            .bind(role)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Check a candidate password. Users without a stored hash never verify.
    pub async fn verify_password(&self, user: &User, candidate: &str) -> bool {
        let Some(hash) = &user.password_hash else {
            warn!(username = %user.username, "login attempt for user with no password set");
            return false;
        };
        self.hasher
            .verify(hash.clone(), candidate.to_string(), user.username.clone())
            .await
    }

    /// Hash and store a new password. The auth_id stays stable, so existing
    /// sessions for the user survive the change.
    pub async fn update_password(&self, user: &User, new_password: &str) -> Result<(), StoreError> {
        let hash = self.hasher.hash(new_password.to_string()).await?;
        retry_once(|| async {
            sqlx::query("UPDATE users SET password_hash = ?1 WHERE id = ?2")
                .bind(&hash)
                .bind(user.id)
                .execute(&self.pool)
                .await
        })
        .await?;
        Ok(())
    }

    /// True when the stored hash predates the current parameter policy.
    pub fn needs_rehash(&self, user: &User) -> bool {
        match &user.password_hash {
            Some(hash) => self.hasher.needs_rehash(hash),
            None => true,
        }
    }

    /// Background task run after a successful login: upgrade the stored
    /// hash to the current policy using the password the user just
    /// presented. Non-fatal errors are logged and swallowed.
    pub async fn check_for_rehash(&self, user: &User, presented: &str) {
        if !self.needs_rehash(user) {
            return;
        }
        if let Err(e) = self.update_password(user, presented).await {
            warn!(username = %user.username, error = %e, "password rehash failed");
            return;
        }
        info!(username = %user.username, "password rehashed under current policy");
    }

    pub async fn update_last_login(&self, user: &User) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        retry_once(|| async {
            sqlx::query("UPDATE users SET last_login = ?1 WHERE id = ?2")
                .bind(&now)
                .bind(user.id)
                .execute(&self.pool)
                .await
        })
        .await?;
        Ok(())
    }

    pub async fn set_reset_required(&self, user: &User, required: bool) -> Result<(), StoreError> {
        retry_once(|| async {
            sqlx::query("UPDATE users SET reset_required = ?1 WHERE id = ?2")
                .bind(required)
                .bind(user.id)
                .execute(&self.pool)
                .await
        })
        .await?;
        Ok(())
    }

    /// Delete a non-persistent user and their role links.
    pub async fn delete(&self, user: &User) -> Result<(), StoreError> {
        if user.persistent {
            return Err(StoreError::Persistent { kind: "user", name: user.username.clone() });
        }
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM user_roles WHERE user_id = ?1")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM users WHERE id = ?1").bind(user.id).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Lazily stream every user record. Role membership is not loaded here;
    /// use `roles_of` per record where it is needed.
    pub fn stream_all(&self) -> impl Stream<Item = Result<User, StoreError>> + '_ {
        sqlx::query(
            "SELECT id, auth_id, username, first_name, last_name, password_hash, \
             last_login, reset_required, persistent FROM users ORDER BY id",
        )
        .fetch(&self.pool)
        .map(|row| row.map_err(StoreError::Storage).and_then(|r| row_to_user(&r)))
    }

    /// The roles a user belongs to, permissions included.
    pub async fn roles_of(&self, user: &User) -> Result<Vec<Role>, StoreError> {
        let rows = retry_once(|| async {
            sqlx::query(
                "SELECT r.id, r.name, r.persistent, p.name AS permission \
                 FROM roles r \
                 JOIN user_roles ur ON ur.role_id = r.id \
                 LEFT JOIN role_permissions rp ON rp.role_id = r.id \
                 LEFT JOIN permissions p ON p.id = rp.permission_id \
                 WHERE ur.user_id = ?1 ORDER BY r.id",
            )
            .bind(user.id)
            .fetch_all(&self.pool)
            .await
        })
        .await?;
        let mut roles: Vec<Role> = Vec::new();
        for row in rows {
            let id: i64 = row.try_get("id")?;
            if roles.last().map(|r| r.id) != Some(id) {
                roles.push(Role {
                    id,
                    name: row.try_get("name")?,
                    persistent: row.try_get("persistent")?,
                    permissions: HashSet::new(),
                });
            }
            let permission: Option<String> = row.try_get("permission")?;
            if let (Some(role), Some(name)) = (roles.last_mut(), permission) {
                if let Some(p) = Permission::parse(&name) {
                    role.permissions.insert(p);
                }
            }
        }
        Ok(roles)
    }

    /// A user's effective permissions: the union across their roles.
    /// Always computed, never stored.
    pub async fn load_permissions(&self, user: &User) -> Result<HashSet<Permission>, StoreError> {
        let rows = retry_once(|| async {
            sqlx::query(
                "SELECT DISTINCT p.name FROM permissions p \
                 JOIN role_permissions rp ON rp.permission_id = p.id \
                 JOIN user_roles ur ON ur.role_id = rp.role_id \
                 WHERE ur.user_id = ?1",
            )
            .bind(user.id)
            .fetch_all(&self.pool)
            .await
        })
        .await?;
        let mut permissions = HashSet::new();
        for row in rows {
            let name: String = row.try_get("name")?;
            if let Some(p) = Permission::parse(&name) {
                permissions.insert(p);
            }
        }
        Ok(permissions)
    }
}

#[cfg(test)]
#[path = "users_tests.rs"]
mod tests;

fn row_to_user(row: &SqliteRow) -> Result<User, StoreError> {
    let auth_id: String = row.try_get("auth_id")?;
    let auth_id = Uuid::parse_str(&auth_id)
        .map_err(|e| StoreError::Corrupt(format!("invalid auth_id: {e}")))?;
    let last_login: Option<String> = row.try_get("last_login")?;
    let last_login = last_login
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| StoreError::Corrupt(format!("invalid last_login: {e}")))
        })
        .transpose()?;
    Ok(User {
        id: row.try_get("id")?,
        auth_id,
        username: row.try_get("username")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        password_hash: row.try_get("password_hash")?,
        last_login,
        reset_required: row.try_get("reset_required")?,
        persistent: row.try_get("persistent")?,
    })
}
