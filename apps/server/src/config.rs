// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Server configuration loaded from environment variables.

use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on.
    pub port: u16,
    /// Base URL of the BIM-FM backend.
    pub api_url: String,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Maximum upload size in MB (model files, inspection photos).
    pub max_upload_size_mb: usize,
    /// Seconds an unobserved cache entry is kept.
    pub cache_grace_secs: u64,
    /// Seconds a cached value is served before the next use refreshes it.
    pub cache_stale_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()
                .unwrap_or(3000),
            api_url: std::env::var("BIMFM_API_URL").unwrap_or_else(|_| "http://localhost:8000".into()),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "300".into())
                .parse()
                .unwrap_or(300),
            max_upload_size_mb: std::env::var("MAX_UPLOAD_SIZE_MB")
                .unwrap_or_else(|_| "500".into())
                .parse()
                .unwrap_or(500),
            cache_grace_secs: std::env::var("QUERY_CACHE_GRACE_SECS")
                .unwrap_or_else(|_| "300".into())
                .parse()
                .unwrap_or(300),
            cache_stale_secs: std::env::var("QUERY_CACHE_STALE_SECS")
                .unwrap_or_else(|_| "0".into())
                .parse()
                .unwrap_or(0),
        }
    }

    pub fn cache_stale_time(&self) -> Duration {
        Duration::from_secs(self.cache_stale_secs)
    }

    pub fn cache_grace(&self) -> Duration {
        Duration::from_secs(self.cache_grace_secs)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_size_mb * 1024 * 1024
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
