// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! BIM-FM web front-end server.

use anyhow::Context;
use bimfm_web::{router, AppState, Config};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,tower_http=debug,bimfm_web=debug,bimfm_client=debug".into());
    if std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).pretty().init();
    }

    let config = Config::from_env();

    tracing::info!(
        port = config.port,
        api_url = %config.api_url,
        max_upload_size_mb = config.max_upload_size_mb,
        request_timeout_secs = config.request_timeout_secs,
        cache_grace_secs = config.cache_grace_secs,
        cache_stale_secs = config.cache_stale_secs,
        "Starting BIM-FM web front-end"
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::new(config).context("Failed to build backend client")?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
