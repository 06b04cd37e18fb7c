// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Page handlers.

pub mod assets;
pub mod dashboard;
pub mod health;
pub mod inspections;
pub mod viewer;

use crate::error::WebError;
use axum::http::Uri;
use bimfm_client::{Query, QueryCache};
use std::sync::Arc;

/// Fetch a read the page can render without. Failures are logged and
/// yield `None`.
pub(crate) async fn secondary<T: Send + Sync + 'static>(cache: &QueryCache, query: Query<T>) -> Option<Arc<T>> {
    match cache.fetch(&query).await {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(key = %query.key(), error = %err, "Secondary read failed");
            None
        }
    }
}

/// Borrow a fetched list, empty when it could not be loaded.
pub(crate) fn slice<T>(list: &Option<Arc<Vec<T>>>) -> &[T] {
    list.as_deref().map(Vec::as_slice).unwrap_or(&[])
}

/// Fallback for unknown paths.
pub async fn not_found(uri: Uri) -> WebError {
    WebError::NotFound(format!("Página não encontrada: {}", uri.path()))
}
