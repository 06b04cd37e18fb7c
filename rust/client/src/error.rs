// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for backend calls and submission flows.

use bimfm_core::ValidationErrors;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// A failed backend call: non-2xx response, network failure or an
/// undecodable body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    /// HTTP status, absent when no response was received.
    pub status: Option<u16>,
    pub message: String,
}

/// FastAPI error body.
#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

impl TransportError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Build from a non-2xx response body, preferring the `detail` field.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = match serde_json::from_str::<ErrorBody>(body) {
            Ok(ErrorBody {
                detail: serde_json::Value::String(detail),
            }) => detail,
            Ok(ErrorBody { detail }) => detail.to_string(),
            Err(_) if body.trim().is_empty() => format!("HTTP {}", status),
            Err(_) => body.trim().to_string(),
        };
        Self::new(Some(status), message)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        if err.is_decode() {
            Self::new(status, format!("invalid response body: {}", err))
        } else {
            Self::new(status, err.to_string())
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "backend returned {}: {}", status, self.message),
            None => write!(f, "backend unreachable: {}", self.message),
        }
    }
}

impl std::error::Error for TransportError {}

/// Why a form submission did not reach a `Done` state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmissionError {
    #[error("invalid form: {0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("submission already in progress or finished")]
    InvalidTransition,
}
