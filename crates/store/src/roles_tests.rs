// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::test_support::memory_user_db;
use crate::StoreError;
use pylon_core::auth::Permission;
use std::collections::HashSet;

#[tokio::test]
async fn ensure_persistent_permissions_is_idempotent() {
    let db = memory_user_db().await;
    db.permissions.ensure_persistent(&Permission::ALL).await.unwrap();
    db.permissions.ensure_persistent(&Permission::ALL).await.unwrap();
    db.permissions.ensure_persistent(&[Permission::RaceEvents]).await.unwrap();

    let all = db.permissions.get_all().await.unwrap();
    assert_eq!(all.len(), Permission::ALL.len());
}

#[tokio::test]
async fn role_lookup_misses_return_none() {
    let db = memory_user_db().await;
    assert!(db.roles.role_by_name("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn ensure_persistent_role_creates_once_then_leaves_alone() {
    let db = memory_user_db().await;
    db.permissions.ensure_persistent(&Permission::ALL).await.unwrap();

    let wanted: HashSet<Permission> = [Permission::RaceEvents].into();
    db.roles.ensure_persistent_role("RACE_DIRECTOR", &wanted).await.unwrap();

    // Second ensure with a different permission set must not touch the role.
    let other: HashSet<Permission> = Permission::ALL.iter().copied().collect();
    db.roles.ensure_persistent_role("RACE_DIRECTOR", &other).await.unwrap();

    let role = db.roles.role_by_name("RACE_DIRECTOR").await.unwrap().unwrap();
    assert!(role.persistent);
    assert_eq!(role.permissions, wanted);
}

#[tokio::test]
async fn permissions_can_be_assigned_and_revoked_on_ordinary_roles() {
    let db = memory_user_db().await;
    db.permissions.ensure_persistent(&Permission::ALL).await.unwrap();
    let role = db.roles.create("spotter", &[Permission::ReadPilots].into()).await.unwrap();

    db.roles.add_permission(&role, Permission::EventWebsocket).await.unwrap();
    // Re-adding an already-granted permission is a no-op.
    db.roles.add_permission(&role, Permission::EventWebsocket).await.unwrap();

    let role = db.roles.role_by_name("spotter").await.unwrap().unwrap();
    assert_eq!(role.permissions, [Permission::ReadPilots, Permission::EventWebsocket].into());

    db.roles.remove_permission(&role, Permission::ReadPilots).await.unwrap();
    let role = db.roles.role_by_name("spotter").await.unwrap().unwrap();
    assert_eq!(role.permissions, [Permission::EventWebsocket].into());
}

#[tokio::test]
async fn persistent_roles_reject_modification_and_deletion() {
    let db = memory_user_db().await;
    db.permissions.ensure_persistent(&Permission::ALL).await.unwrap();
    db.roles
        .ensure_persistent_role("SYSTEM_ADMIN", &Permission::ALL.iter().copied().collect())
        .await
        .unwrap();
    let role = db.roles.role_by_name("SYSTEM_ADMIN").await.unwrap().unwrap();

    assert!(matches!(
        db.roles.delete(&role).await.unwrap_err(),
        StoreError::Persistent { kind: "role", .. }
    ));
    assert!(matches!(
        db.roles.add_permission(&role, Permission::ReadPilots).await.unwrap_err(),
        StoreError::Persistent { .. }
    ));
    assert!(matches!(
        db.roles.remove_permission(&role, Permission::ReadPilots).await.unwrap_err(),
        StoreError::Persistent { .. }
    ));
}

#[tokio::test]
async fn deleting_a_role_removes_its_assignments() {
    let db = memory_user_db().await;
    db.permissions.ensure_persistent(&Permission::ALL).await.unwrap();
    let role = db.roles.create("temp", &[Permission::ReadPilots].into()).await.unwrap();

    db.roles.delete(&role).await.unwrap();
    assert!(db.roles.role_by_name("temp").await.unwrap().is_none());

    // Role names are reusable after deletion.
    db.roles.create("temp", &HashSet::new()).await.unwrap();
}

#[tokio::test]
async fn duplicate_role_name_is_rejected() {
    let db = memory_user_db().await;
    db.roles.create("spotter", &HashSet::new()).await.unwrap();
    let err = db.roles.create("spotter", &HashSet::new()).await.unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists));
}
