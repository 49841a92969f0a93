// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{cheap_hasher, memory_user_db};
use crate::{StoreError, UserDatabase};
use futures::StreamExt;
use pylon_core::auth::Permission;

fn new_user(username: &str) -> NewUser {
    NewUser { username: username.to_string(), ..NewUser::default() }
}

#[tokio::test]
async fn create_and_fetch_round_trip() {
    let db = memory_user_db().await;
    let created = db
        .users
        .create(NewUser {
            username: "ace".to_string(),
            first_name: Some("Amelia".to_string()),
            ..NewUser::default()
        })
        .await
        .unwrap();
    assert!(created.reset_required);
    assert!(created.password_hash.is_none());

    let by_name = db.users.by_username("ace").await.unwrap().unwrap();
    assert_eq!(by_name, created);

    let by_auth = db.users.by_auth_id(created.auth_id).await.unwrap().unwrap();
    assert_eq!(by_auth.username, "ace");
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let db = memory_user_db().await;
    db.users.create(new_user("ace")).await.unwrap();
    let err = db.users.create(new_user("ace")).await.unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists));
}

#[tokio::test]
async fn missing_user_is_none() {
    let db = memory_user_db().await;
    assert!(db.users.by_username("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn password_update_and_verify() {
    let db = memory_user_db().await;
    let user = db.users.create(new_user("ace")).await.unwrap();

    // No password set yet: nothing verifies.
    assert!(!db.users.verify_password(&user, "anything").await);

    db.users.update_password(&user, "s3cret").await.unwrap();
    let user = db.users.by_username("ace").await.unwrap().unwrap();
    assert!(db.users.verify_password(&user, "s3cret").await);
    assert!(!db.users.verify_password(&user, "wrong").await);
}

#[tokio::test]
async fn last_login_and_reset_flag_bookkeeping() {
    let db = memory_user_db().await;
    let user = db.users.create(new_user("ace")).await.unwrap();
    assert!(user.last_login.is_none());

    db.users.update_last_login(&user).await.unwrap();
    db.users.set_reset_required(&user, false).await.unwrap();

    let user = db.users.by_username("ace").await.unwrap().unwrap();
    assert!(user.last_login.is_some());
    assert!(!user.reset_required);
}

#[tokio::test]
async fn persistent_user_cannot_be_deleted() {
    let db = memory_user_db().await;
    db.users.ensure_persistent_user("admin", "pw", &[]).await.unwrap();
    let admin = db.users.by_username("admin").await.unwrap().unwrap();

    let err = db.users.delete(&admin).await.unwrap_err();
    assert!(matches!(err, StoreError::Persistent { kind: "user", .. }));

    let casual = db.users.create(new_user("casual")).await.unwrap();
    db.users.delete(&casual).await.unwrap();
    assert!(db.users.by_username("casual").await.unwrap().is_none());
}

#[tokio::test]
async fn stream_all_yields_every_user_in_order() {
    let db = memory_user_db().await;
    for name in ["a", "b", "c"] {
        db.users.create(new_user(name)).await.unwrap();
    }
    let names: Vec<String> = db
        .users
        .stream_all()
        .map(|u| u.unwrap().username)
        .collect()
        .await;
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn effective_permissions_are_the_union_across_roles() {
    let db = memory_user_db().await;
    db.permissions.ensure_persistent(&Permission::ALL).await.unwrap();
    db.roles
        .create("spotter", &[Permission::ReadPilots, Permission::EventWebsocket].into())
        .await
        .unwrap();
    db.roles
        .create("starter", &[Permission::RaceEvents, Permission::EventWebsocket].into())
        .await
        .unwrap();

    let user = db
        .users
        .create(NewUser {
            username: "ace".to_string(),
            roles: vec!["spotter".to_string(), "starter".to_string()],
            ..NewUser::default()
        })
        .await
        .unwrap();

    let roles = db.users.roles_of(&user).await.unwrap();
    assert_eq!(roles.len(), 2);

    let effective = db.users.load_permissions(&user).await.unwrap();
    assert_eq!(
        effective,
        [Permission::ReadPilots, Permission::EventWebsocket, Permission::RaceEvents].into()
    );
}

#[tokio::test]
async fn rehash_check_upgrades_stale_hashes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.db");
    let filename = path.to_string_lossy().into_owned();

    // Hash under the old (weaker) policy.
    let old = UserDatabase::open(&filename, cheap_hasher()).await.unwrap();
    let user = old.users.create(new_user("ace")).await.unwrap();
    old.users.update_password(&user, "pw").await.unwrap();
    old.close().await;

    // Reopen under a stronger policy: the stored hash is stale.
    let params = argon2::Params::new(128, 2, 1, None).unwrap();
    let new = UserDatabase::open(&filename, crate::HasherPool::with_params(2, params)).await.unwrap();
    let user = new.users.by_username("ace").await.unwrap().unwrap();
    assert!(new.users.needs_rehash(&user));

    new.users.check_for_rehash(&user, "pw").await;
    let user = new.users.by_username("ace").await.unwrap().unwrap();
    assert!(!new.users.needs_rehash(&user));
    assert!(new.users.verify_password(&user, "pw").await);
}
