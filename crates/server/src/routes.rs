// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP surface: a thin adapter over the stores and the race manager.
//!
//! Error mapping follows the store/manager taxonomy: `InvalidArgument` is
//! 400, `InvalidState` is 409, storage failures are 500. Login failures are
//! deliberately indistinguishable: unknown user and wrong password both
//! return `{"success": false}`.

use crate::app::App;
use crate::sessions::{Session, SESSION_COOKIE};
use crate::ws;
use axum::body::Body;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use futures::StreamExt;
use pylon_core::auth::Permission;
use pylon_core::race::RaceSchedule;
use pylon_race::RaceError;
use pylon_store::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

pub fn router(app: Arc<App>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/reset-password", post(reset_password))
        .route("/pilots", get(pilots))
        .route("/race/status", get(race_status))
        .route("/race/schedule", post(race_schedule))
        .route("/race/stop", post(race_stop))
        .route("/ws", get(websocket))
        .with_state(app)
}

fn session_of(app: &App, jar: &CookieJar) -> Option<Session> {
    jar.get(SESSION_COOKIE).and_then(|cookie| app.sessions.get(cookie.value()))
}

fn storage_failure(e: StoreError) -> Response {
    error!(error = %e, "request failed on storage");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"success": false}))).into_response()
}

async fn index() -> Html<&'static str> {
    Html("<body><h1>Pylon race timing</h1></body>")
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reset_required: Option<bool>,
}

async fn login(
    State(app): State<Arc<App>>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Response {
    let failure = || Json(LoginResponse { success: false, reset_required: None }).into_response();

    let user = match app.users.users.by_username(&body.username).await {
        Ok(Some(user)) => user,
        // Unknown user and wrong password answer identically.
        Ok(None) => return failure(),
        Err(e) => return storage_failure(e),
    };
    if !app.users.users.verify_password(&user, &body.password).await {
        return failure();
    }
    let permissions = match app.users.users.load_permissions(&user).await {
        Ok(permissions) => permissions,
        Err(e) => return storage_failure(e),
    };
    let session = app.sessions.create(user.auth_id, user.username.clone(), permissions);

    // Login bookkeeping runs off the request path; failures only log.
    let store = app.users.users.clone();
    let background_user = user.clone();
    tokio::spawn(async move {
        if let Err(e) = store.update_last_login(&background_user).await {
            warn!(username = %background_user.username, error = %e, "last-login update failed");
        }
    });
    let store = app.users.users.clone();
    let background_user = user.clone();
    let presented = body.password.clone();
    tokio::spawn(async move {
        store.check_for_rehash(&background_user, &presented).await;
    });

    let jar = jar.add(
        Cookie::build((SESSION_COOKIE, session.token.clone())).path("/").http_only(true).build(),
    );
    (jar, Json(LoginResponse { success: true, reset_required: Some(user.reset_required) }))
        .into_response()
}

async fn logout(State(app): State<Arc<App>>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        app.sessions.remove(cookie.value());
    }
    (jar.remove(Cookie::from(SESSION_COOKIE)), Json(json!({"success": true}))).into_response()
}

#[derive(Deserialize)]
struct ResetPasswordRequest {
    password: String,
    new_password: String,
}

async fn reset_password(
    State(app): State<Arc<App>>,
    jar: CookieJar,
    Json(body): Json<ResetPasswordRequest>,
) -> Response {
    let Some(session) = session_of(&app, &jar) else {
        // Resetting a password requires a logged-in session.
        return (StatusCode::CONFLICT, Json(json!({"success": false}))).into_response();
    };
    if !session.permissions.contains(&Permission::ResetPassword) {
        return (StatusCode::FORBIDDEN, Json(json!({"success": false}))).into_response();
    }

    let user = match app.users.users.by_auth_id(session.auth_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return Json(json!({"success": false})).into_response(),
        Err(e) => return storage_failure(e),
    };
    if !app.users.users.verify_password(&user, &body.password).await {
        return Json(json!({"success": false})).into_response();
    }
    if let Err(e) = app.users.users.update_password(&user, &body.new_password).await {
        return storage_failure(e);
    }

    let store = app.users.users.clone();
    tokio::spawn(async move {
        if let Err(e) = store.set_reset_required(&user, false).await {
            warn!(username = %user.username, error = %e, "reset flag clear failed");
        }
    });

    Json(json!({"success": true})).into_response()
}

async fn pilots(State(app): State<Arc<App>>, jar: CookieJar) -> Response {
    let Some(session) = session_of(&app, &jar) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    if !session.permissions.contains(&Permission::ReadPilots) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let lines = app.races.pilots.stream_owned().map(|pilot| pilot.and_then(|p| p.to_line()));
    ([(header::CONTENT_TYPE, "application/x-ndjson")], Body::from_stream(lines)).into_response()
}

async fn race_status(State(app): State<Arc<App>>, jar: CookieJar) -> Response {
    let Some(session) = session_of(&app, &jar) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    if !session.permissions.contains(&Permission::RaceEvents) {
        return StatusCode::FORBIDDEN.into_response();
    }
    Json(json!({
        "status": app.manager.status(),
        "schedule": app.manager.schedule(),
        "pending_transition": app.manager.has_pending_transition(),
    }))
    .into_response()
}

#[derive(Deserialize)]
struct ScheduleRequest {
    stage_time_sec: f64,
    race_time_sec: f64,
    overtime_sec: f64,
    #[serde(default)]
    unlimited: bool,
    /// Seconds from now until the assigned start.
    start_delay_sec: f64,
}

async fn race_schedule(
    State(app): State<Arc<App>>,
    jar: CookieJar,
    Json(body): Json<ScheduleRequest>,
) -> Response {
    let Some(session) = session_of(&app, &jar) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    if !session.permissions.contains(&Permission::SystemControl) {
        return StatusCode::FORBIDDEN.into_response();
    }

    let schedule = match RaceSchedule::new(
        body.stage_time_sec,
        body.race_time_sec,
        body.overtime_sec,
        body.unlimited,
    ) {
        Ok(schedule) => schedule,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(json!({"success": false, "error": e.to_string()})))
                .into_response();
        }
    };
    if !body.start_delay_sec.is_finite() || body.start_delay_sec < 0.0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "start_delay_sec must be non-negative"})),
        )
            .into_response();
    }

    let assigned_start = app.timers.now() + Duration::from_secs_f64(body.start_delay_sec);
    match app.manager.schedule_race(schedule, assigned_start) {
        Ok(()) => Json(json!({"success": true, "status": app.manager.status()})).into_response(),
        Err(e @ RaceError::InvalidArgument(_)) => {
            (StatusCode::BAD_REQUEST, Json(json!({"success": false, "error": e.to_string()})))
                .into_response()
        }
        Err(e @ RaceError::InvalidState(_)) => {
            (StatusCode::CONFLICT, Json(json!({"success": false, "error": e.to_string()})))
                .into_response()
        }
    }
}

async fn race_stop(State(app): State<Arc<App>>, jar: CookieJar) -> Response {
    let Some(session) = session_of(&app, &jar) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    if !session.permissions.contains(&Permission::SystemControl) {
        return StatusCode::FORBIDDEN.into_response();
    }
    app.manager.stop_race().await;
    Json(json!({"success": true, "status": app.manager.status()})).into_response()
}

async fn websocket(
    State(app): State<Arc<App>>,
    jar: CookieJar,
    upgrade: WebSocketUpgrade,
) -> Response {
    // Unauthorized websocket connections go back to the index page.
    let Some(session) = session_of(&app, &jar) else {
        return Redirect::to("/").into_response();
    };
    if !session.permissions.contains(&Permission::EventWebsocket) {
        return Redirect::to("/").into_response();
    }
    upgrade.on_upgrade(move |socket| ws::serve_socket(app, session, socket))
}
