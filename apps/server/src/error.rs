// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Page-level errors rendered as HTML.

use crate::views;
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bimfm_client::TransportError;
use thiserror::Error;

/// Errors a page handler can end with.
#[derive(Debug, Error)]
pub enum WebError {
    /// The page's primary record does not exist.
    #[error("{0}")]
    NotFound(String),

    #[error("Requisição inválida: {0}")]
    BadRequest(String),

    #[error("Erro no envio do formulário: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Erro ao comunicar com o servidor: {0}")]
    Backend(#[from] TransportError),

    /// A fault in this server, not in the request or the backend.
    #[error("Erro interno: {0}")]
    Internal(String),
}

impl WebError {
    /// Classify the failure of a page's primary read: a 404 becomes
    /// `NotFound(not_found)`, anything else a backend error.
    pub fn primary(err: TransportError, not_found: &str) -> Self {
        if err.is_not_found() {
            WebError::NotFound(not_found.to_string())
        } else {
            WebError::Backend(err)
        }
    }

    /// Classify the failure of a form post: the backend's 4xx rejections
    /// are shown as bad input with its message.
    pub fn mutation(err: TransportError, not_found: &str) -> Self {
        match err.status {
            Some(404) => WebError::NotFound(not_found.to_string()),
            Some(status) if (400..500).contains(&status) => WebError::BadRequest(err.message),
            _ => WebError::Backend(err),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            WebError::NotFound(_) => StatusCode::NOT_FOUND,
            WebError::BadRequest(_) | WebError::Multipart(_) => StatusCode::BAD_REQUEST,
            WebError::Backend(_) => StatusCode::BAD_GATEWAY,
            WebError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            WebError::Backend(err) => tracing::error!(error = %err, "Backend request failed"),
            WebError::Internal(message) => tracing::error!(error = %message, "Page rendering failed"),
            other => tracing::debug!(status = status.as_u16(), error = %other, "Page error"),
        }

        let body = format!(
            "<div class=\"error\"><h1>{}</h1><p>{}</p></div>\n<p><a href=\"/\">← Voltar ao Dashboard</a></p>",
            status.as_u16(),
            views::escape(&self.to_string())
        );
        (status, views::layout("Erro", "", &body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_read_classification() {
        let missing = WebError::primary(TransportError::new(Some(404), "Asset not found"), "Ativo não encontrado");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.to_string(), "Ativo não encontrado");

        let down = WebError::primary(TransportError::new(None, "connection refused"), "Ativo não encontrado");
        assert_eq!(down.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_internal_fault_is_a_server_error() {
        let err = WebError::Internal("scene config: key must be a string".into());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let rejected = WebError::mutation(TransportError::new(Some(400), "Inspection code already exists"), "x");
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
    }
}
