// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Permission and role stores.

use crate::error::{retry_once, StoreError};
use pylon_core::auth::{Permission, Role};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::collections::HashSet;

/// Canonical set of permissions known to this deployment.
///
/// Permission rows are persistent once created and never mutated.
#[derive(Clone)]
pub struct PermissionStore {
    pool: SqlitePool,
}

impl PermissionStore {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All permissions currently in the store. Rows with names outside the
    /// closed enumeration are skipped.
    pub async fn get_all(&self) -> Result<HashSet<Permission>, StoreError> {
        let rows = retry_once(|| async {
            sqlx::query("SELECT name FROM permissions").fetch_all(&self.pool).await
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

    /// Insert any of `wanted` that are missing. Idempotent: duplicate
    /// inserts fail with `AlreadyExists`, which is swallowed here.
    pub async fn ensure_persistent(&self, wanted: &[Permission]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for permission in wanted {
            let inserted = sqlx::query("INSERT INTO permissions (name) VALUES (?1)")
                .bind(permission.as_str())
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from_insert);
            match inserted {
                Ok(_) | Err(StoreError::AlreadyExists) => {}
                Err(e) => return Err(e),
            }
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Role records and their permission assignments.
#[derive(Clone)]
pub struct RoleStore {
    pool: SqlitePool,
}

impl RoleStore {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch a role with its permission set.
    pub async fn role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        let row = retry_once(|| async {
            sqlx::query("SELECT id, name, persistent FROM roles WHERE name = ?1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
        })
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let id: i64 = row.try_get("id")?;
        Ok(Some(Role {
            id,
            name: row.try_get("name")?,
            persistent: row.try_get("persistent")?,
            permissions: self.permissions_of(id).await?,
        }))
    }

    /// Create the role as persistent if no role with that name exists;
    /// leave an existing role alone. Idempotent.
    pub async fn ensure_persistent_role(
        &self,
        name: &str,
        permissions: &HashSet<Permission>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query("INSERT INTO roles (name, persistent) VALUES (?1, 1)")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from_insert);
        let role_id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            // A concurrent (or prior) bootstrap won the insert; leave alone.
            Err(StoreError::AlreadyExists) => return Ok(()),
            Err(e) => return Err(e),
        };
        for permission in permissions {
            sqlx::query(
                "INSERT INTO role_permissions (role_id, permission_id) \
                 SELECT ?1, id FROM permissions WHERE name = ?2",
            )
            .bind(role_id)
            .bind(permission.as_str())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Create an ordinary (deletable) role.
    pub async fn create(
        &self,
        name: &str,
        permissions: &HashSet<Permission>,
    ) -> Result<Role, StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("INSERT INTO roles (name, persistent) VALUES (?1, 0)")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from_insert)?;
        let role_id = result.last_insert_rowid();
        for permission in permissions {
            sqlx::query(
                "INSERT INTO role_permissions (role_id, permission_id) \
                 SELECT ?1, id FROM permissions WHERE name = ?2",
            )
            .bind(role_id)
            .bind(permission.as_str())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(Role {
            id: role_id,
            name: name.to_string(),
            permissions: permissions.clone(),
            persistent: false,
        })
    }

    /// Grant a permission to a non-persistent role.
    pub async fn add_permission(&self, role: &Role, permission: Permission) -> Result<(), StoreError> {
        self.guard_mutable(role)?;
        let result = sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id) \
             SELECT ?1, id FROM permissions WHERE name = ?2",
        )
        .bind(role.id)
        .bind(permission.as_str())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_insert);
        match result {
            Ok(_) | Err(StoreError::AlreadyExists) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Revoke a permission from a non-persistent role.
    pub async fn remove_permission(
        &self,
        role: &Role,
        permission: Permission,
    ) -> Result<(), StoreError> {
        self.guard_mutable(role)?;
        sqlx::query(
            "DELETE FROM role_permissions WHERE role_id = ?1 \
             AND permission_id = (SELECT id FROM permissions WHERE name = ?2)",
        )
        .bind(role.id)
        .bind(permission.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete a non-persistent role and its assignments.
    pub async fn delete(&self, role: &Role) -> Result<(), StoreError> {
        self.guard_mutable(role)?;
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM role_permissions WHERE role_id = ?1")
            .bind(role.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM user_roles WHERE role_id = ?1")
            .bind(role.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM roles WHERE id = ?1").bind(role.id).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    fn guard_mutable(&self, role: &Role) -> Result<(), StoreError> {
        if role.persistent {
            return Err(StoreError::Persistent { kind: "role", name: role.name.clone() });
        }
        Ok(())
    }

    async fn permissions_of(&self, role_id: i64) -> Result<HashSet<Permission>, StoreError> {
        let rows = retry_once(|| async {
            sqlx::query(
                "SELECT p.name FROM permissions p \
                 JOIN role_permissions rp ON rp.permission_id = p.id \
                 WHERE rp.role_id = ?1",
            )
            .bind(role_id)
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
#[path = "roles_tests.rs"]
mod tests;
