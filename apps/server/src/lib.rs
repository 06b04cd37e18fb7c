// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! BIM-FM web front-end.
//!
//! Server-rendered pages over the BIM-FM backend. Every page reads through
//! one shared [`QueryCache`]; form posts run mutations that invalidate the
//! cache entries they change and redirect with `303 See Other`.
//!
//! # Pages
//!
//! - `GET /` - Dashboard
//! - `GET /viewer`, `GET /viewer/:file_id` - 3D viewer scaffold, `POST /viewer/upload`
//! - `GET /assets` - Assets, filterable by `condition_status`
//! - `GET /assets/:id` - Asset detail, `POST` to update
//! - `GET /inspections` - Inspections, `POST` to create
//! - `GET /inspections/new` - New inspection form
//! - `GET /inspections/:id` - Inspection detail, `POST` to update,
//!   `POST /inspections/:id/delete` to delete
//! - `GET /health` - Health check (JSON)

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use bimfm_client::{ApiClient, QueryCache};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod routes;
pub mod views;

pub use config::Config;
pub use error::WebError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub api: ApiClient,
    pub cache: QueryCache,
    pub config: Arc<Config>,
}

impl AppState {
    /// Connect to the backend at `config.api_url` with an empty cache.
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("bimfm-web/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            api: ApiClient::with_http(&config.api_url, http),
            cache: QueryCache::with_stale_time(config.cache_grace(), config.cache_stale_time()),
            config: Arc::new(config),
        })
    }
}

/// Build the router with all pages and middleware.
pub fn router(state: AppState) -> Router {
    let config = Arc::clone(&state.config);

    Router::new()
        .route("/", get(routes::dashboard::page))
        .route("/health", get(routes::health::check))
        // Viewer
        .route("/viewer", get(routes::viewer::index))
        .route("/viewer/upload", post(routes::viewer::upload))
        .route("/viewer/:file_id", get(routes::viewer::page))
        // Assets
        .route("/assets", get(routes::assets::list))
        .route("/assets/:id", get(routes::assets::detail).post(routes::assets::update))
        // Inspections
        .route(
            "/inspections",
            get(routes::inspections::list).post(routes::inspections::create),
        )
        .route("/inspections/new", get(routes::inspections::new_form))
        .route(
            "/inspections/:id",
            get(routes::inspections::detail).post(routes::inspections::update),
        )
        .route("/inspections/:id/delete", post(routes::inspections::delete))
        .fallback(routes::not_found)
        // Middleware
        .layer(DefaultBodyLimit::max(config.max_upload_bytes())) // Model files and photos
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
