// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end exercises of the HTTP surface against in-memory stores.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use pylon_server::{routes, App, Config};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

async fn test_app() -> (Arc<App>, Router) {
    let config = Config {
        user_db: ":memory:".to_string(),
        race_db: ":memory:".to_string(),
        heartbeat_secs: 60,
        ..Config::default()
    };
    let app = App::startup(config).await.expect("startup");
    let router = routes::router(Arc::clone(&app));
    (app, router)
}

async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.expect("request")
}

async fn post_json(
    router: &Router,
    uri: &str,
    body: Value,
    cookie: Option<&str>,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = builder.body(Body::from(body.to_string())).expect("request body");
    send(router, request).await
}

async fn get(router: &Router, uri: &str, cookie: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    send(router, builder.body(Body::empty()).expect("request")).await
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn session_cookie(response: &Response<Body>) -> String {
    let raw = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("set-cookie header")
        .to_str()
        .expect("cookie str");
    raw.split(';').next().expect("cookie pair").to_string()
}

async fn login_admin(router: &Router) -> String {
    let response = post_json(
        router,
        "/login",
        json!({"username": "admin", "password": "pylon"}),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    cookie
}

#[tokio::test]
async fn login_succeeds_and_flags_password_reset() {
    let (_app, router) = test_app().await;
    let response =
        post_json(&router, "/login", json!({"username": "admin", "password": "pylon"}), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).starts_with("pylon_session="));
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["reset_required"], true);
}

#[tokio::test]
async fn bad_credentials_and_unknown_users_are_indistinguishable() {
    let (_app, router) = test_app().await;

    let wrong_password =
        post_json(&router, "/login", json!({"username": "admin", "password": "nope"}), None).await;
    let unknown_user =
        post_json(&router, "/login", json!({"username": "ghost", "password": "nope"}), None).await;

    assert_eq!(wrong_password.status(), StatusCode::OK);
    assert_eq!(unknown_user.status(), StatusCode::OK);
    let a = body_json(wrong_password).await;
    let b = body_json(unknown_user).await;
    assert_eq!(a, b);
    assert_eq!(a, json!({"success": false}));
}

#[tokio::test]
async fn login_updates_last_login_in_the_background() {
    let (app, router) = test_app().await;
    login_admin(&router).await;

    let mut last_login = None;
    for _ in 0..50 {
        let user = app.users.users.by_username("admin").await.expect("query").expect("admin");
        if user.last_login.is_some() {
            last_login = user.last_login;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(last_login.is_some(), "background task never stamped last_login");
}

#[tokio::test]
async fn reset_password_requires_a_session() {
    let (_app, router) = test_app().await;
    let response = post_json(
        &router,
        "/reset-password",
        json!({"password": "pylon", "new_password": "better"}),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn reset_password_verifies_the_current_password() {
    let (app, router) = test_app().await;
    let cookie = login_admin(&router).await;

    let rejected = post_json(
        &router,
        "/reset-password",
        json!({"password": "wrong", "new_password": "better"}),
        Some(&cookie),
    )
    .await;
    assert_eq!(body_json(rejected).await["success"], false);

    let accepted = post_json(
        &router,
        "/reset-password",
        json!({"password": "pylon", "new_password": "better"}),
        Some(&cookie),
    )
    .await;
    assert_eq!(body_json(accepted).await["success"], true);

    let user = app.users.users.by_username("admin").await.expect("query").expect("admin");
    assert!(app.users.users.verify_password(&user, "better").await);
    assert!(!app.users.users.verify_password(&user, "pylon").await);
}

#[tokio::test]
async fn pilots_endpoint_requires_permission_and_streams_ndjson() {
    let (app, router) = test_app().await;

    let anonymous = get(&router, "/pilots", None).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    for callsign in ["ACE", "BLUR"] {
        app.races
            .pilots
            .create(pylon_store::NewPilot { callsign: callsign.to_string(), ..Default::default() })
            .await
            .expect("seed pilot");
    }

    let cookie = login_admin(&router).await;
    let response = get(&router, "/pilots", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let lines: Vec<Value> = bytes
        .split(|b| *b == b'\n')
        .filter(|l| !l.is_empty())
        .map(|l| serde_json::from_slice(l).expect("pilot line"))
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["callsign"], "ACE");
    assert_eq!(lines[1]["callsign"], "BLUR");
}

#[tokio::test]
async fn race_can_be_scheduled_and_silently_cancelled_over_http() {
    let (_app, router) = test_app().await;
    let cookie = login_admin(&router).await;

    let schedule = json!({
        "stage_time_sec": 2.0,
        "race_time_sec": 3.0,
        "overtime_sec": 1.0,
        "start_delay_sec": 60.0,
    });
    let response = post_json(&router, "/race/schedule", schedule.clone(), Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "scheduled");

    // Scheduling again without stopping first is a state conflict.
    let conflict = post_json(&router, "/race/schedule", schedule.clone(), Some(&cookie)).await;
    assert_eq!(conflict.status(), StatusCode::CONFLICT);

    // Stop before start returns to ready without a stop event.
    let stopped = post_json(&router, "/race/stop", json!({}), Some(&cookie)).await;
    assert_eq!(body_json(stopped).await["status"], "ready");

    let status = get(&router, "/race/status", Some(&cookie)).await;
    let body = body_json(status).await;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["pending_transition"], false);
}

#[tokio::test]
async fn invalid_schedules_are_rejected_with_bad_request() {
    let (_app, router) = test_app().await;
    let cookie = login_admin(&router).await;

    let negative = json!({
        "stage_time_sec": -1.0,
        "race_time_sec": 3.0,
        "overtime_sec": 0.0,
        "start_delay_sec": 60.0,
    });
    let response = post_json(&router, "/race/schedule", negative, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn race_endpoints_require_a_session() {
    let (_app, router) = test_app().await;
    let response = post_json(&router, "/race/stop", json!({}), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = get(&router, "/race/status", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unauthorized_websocket_is_redirected_to_index() {
    let (_app, router) = test_app().await;
    let response = get(&router, "/ws", None).await;
    assert!(response.status().is_redirection());
    assert_eq!(response.headers().get(header::LOCATION).expect("location"), "/");
}

#[tokio::test]
async fn logout_invalidates_the_session() {
    let (_app, router) = test_app().await;
    let cookie = login_admin(&router).await;

    let response = get(&router, "/logout", Some(&cookie)).await;
    assert_eq!(body_json(response).await["success"], true);

    let after = get(&router, "/race/status", Some(&cookie)).await;
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn shutdown_stops_cleanly_with_a_race_in_flight() {
    let (app, router) = test_app().await;
    let cookie = login_admin(&router).await;

    let schedule = json!({
        "stage_time_sec": 2.0,
        "race_time_sec": 3.0,
        "overtime_sec": 1.0,
        "start_delay_sec": 60.0,
    });
    let response = post_json(&router, "/race/schedule", schedule, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    app.shutdown().await;
    assert!(!app.manager.has_pending_transition());
}
