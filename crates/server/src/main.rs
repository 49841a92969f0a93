// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! pylond: the Pylon race-timing server binary.

use pylon_server::app::AppError;
use pylon_server::{App, Config};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run().await {
        error!(error = %e, "fatal startup error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let config = Config::load()?;
    let app = App::startup(config).await?;

    let listener = tokio::net::TcpListener::bind(&app.config.listen)
        .await
        .map_err(|e| AppError::Bind { addr: app.config.listen.clone(), source: e })?;
    info!(addr = %app.config.listen, "listening");

    let router = pylon_server::routes::router(Arc::clone(&app));
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

    app.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
