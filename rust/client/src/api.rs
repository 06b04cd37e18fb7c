// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! BIM-FM backend REST client.
//!
//! A thin transport shim: one request per call, no retries, no caching.
//! Caching lives in [`crate::query`].

use crate::error::TransportError;
use bimfm_core::{
    AnalysisResult, Asset, AssetStatistics, AssetUpdate, ConditionStatus, Inspection,
    InspectionUpdate, ModelFile, NewInspection,
};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

/// Multipart field carrying inspection photos on create.
pub const PHOTOS_FIELD: &str = "photos";
/// Multipart field carrying images for analysis.
pub const IMAGES_FIELD: &str = "images";
/// Multipart field carrying an uploaded model file.
pub const MODEL_FILE_FIELD: &str = "file";

/// A file attached to a multipart request.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, content_type: Option<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            data: data.into(),
        }
    }

    fn to_part(&self) -> Result<Part, TransportError> {
        let part = Part::bytes(self.data.to_vec()).file_name(self.file_name.clone());
        match &self.content_type {
            Some(content_type) => part.mime_str(content_type).map_err(|e| {
                TransportError::new(None, format!("invalid content type {}: {}", content_type, e))
            }),
            None => Ok(part),
        }
    }
}

/// Filters of `GET /api/assets/`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AssetFilter {
    pub ifc_file_id: Option<i64>,
    pub condition_status: Option<ConditionStatus>,
}

impl AssetFilter {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(id) = self.ifc_file_id {
            pairs.push(("ifc_file_id", id.to_string()));
        }
        if let Some(status) = self.condition_status {
            pairs.push(("condition_status", status.as_str().to_string()));
        }
        pairs
    }
}

/// Filters of `GET /api/inspections/`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct InspectionFilter {
    pub asset_id: Option<i64>,
}

impl InspectionFilter {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        self.asset_id
            .map(|id| vec![("asset_id", id.to_string())])
            .unwrap_or_default()
    }
}

/// Typed client for the backend's four resource groups.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    /// Create a client for the backend at `base_url`.
    pub fn new(base_url: &str) -> Self {
        Self::with_http(base_url, reqwest::Client::new())
    }

    /// Create a client reusing a configured `reqwest::Client`.
    pub fn with_http(base_url: &str, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    /// Send and turn non-2xx responses into [`TransportError`].
    async fn execute(&self, method: Method, path: &str, request: RequestBuilder) -> Result<Response, TransportError> {
        tracing::debug!(method = %method, path = %path, "Backend request");

        let resp = request.send().await.map_err(|e| {
            tracing::debug!(method = %method, path = %path, error = %e, "Backend unreachable");
            TransportError::from(e)
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(method = %method, path = %path, status = status.as_u16(), "Backend error");
            return Err(TransportError::from_response(status.as_u16(), &body));
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&'static str, String)]) -> Result<T, TransportError> {
        let request = self.request(Method::GET, path).query(query);
        let resp = self.execute(Method::GET, path, request).await?;
        Ok(resp.json().await?)
    }

    // ---- IFC model files ----

    /// GET /api/ifc/
    pub async fn list_model_files(&self) -> Result<Vec<ModelFile>, TransportError> {
        self.get_json("/api/ifc/", &[]).await
    }

    /// GET /api/ifc/{id}
    pub async fn get_model_file(&self, id: i64) -> Result<ModelFile, TransportError> {
        self.get_json(&format!("/api/ifc/{}", id), &[]).await
    }

    /// POST /api/ifc/upload
    pub async fn upload_model_file(&self, file: &Attachment) -> Result<ModelFile, TransportError> {
        let path = "/api/ifc/upload";
        let form = Form::new().part(MODEL_FILE_FIELD, file.to_part()?);
        let request = self.request(Method::POST, path).multipart(form);
        let resp = self.execute(Method::POST, path, request).await?;
        let created: ModelFile = resp.json().await?;
        tracing::info!(id = created.id, filename = %created.filename, "Uploaded model file");
        Ok(created)
    }

    /// GET /api/ifc/{id}/elements
    ///
    /// Element records are passed through undecoded.
    pub async fn model_elements(&self, id: i64) -> Result<Vec<serde_json::Value>, TransportError> {
        self.get_json(&format!("/api/ifc/{}/elements", id), &[]).await
    }

    /// GET /api/ifc/{id}/assets
    pub async fn model_assets(&self, id: i64) -> Result<Vec<Asset>, TransportError> {
        self.get_json(&format!("/api/ifc/{}/assets", id), &[]).await
    }

    // ---- Assets ----

    /// GET /api/assets/
    pub async fn list_assets(&self, filter: &AssetFilter) -> Result<Vec<Asset>, TransportError> {
        self.get_json("/api/assets/", &filter.query_pairs()).await
    }

    /// GET /api/assets/{id}
    pub async fn get_asset(&self, id: i64) -> Result<Asset, TransportError> {
        self.get_json(&format!("/api/assets/{}", id), &[]).await
    }

    /// PUT /api/assets/{id}
    pub async fn update_asset(&self, id: i64, update: &AssetUpdate) -> Result<Asset, TransportError> {
        let path = format!("/api/assets/{}", id);
        let request = self.request(Method::PUT, &path).json(update);
        let resp = self.execute(Method::PUT, &path, request).await?;
        Ok(resp.json().await?)
    }

    /// GET /api/assets/{id}/inspections
    pub async fn asset_inspections(&self, id: i64) -> Result<Vec<Inspection>, TransportError> {
        self.get_json(&format!("/api/assets/{}/inspections", id), &[]).await
    }

    /// GET /api/assets/{id}/statistics
    pub async fn asset_statistics(&self, id: i64) -> Result<AssetStatistics, TransportError> {
        self.get_json(&format!("/api/assets/{}/statistics", id), &[]).await
    }

    // ---- Inspections ----

    /// GET /api/inspections/
    pub async fn list_inspections(&self, filter: &InspectionFilter) -> Result<Vec<Inspection>, TransportError> {
        self.get_json("/api/inspections/", &filter.query_pairs()).await
    }

    /// GET /api/inspections/{id}
    pub async fn get_inspection(&self, id: i64) -> Result<Inspection, TransportError> {
        self.get_json(&format!("/api/inspections/{}", id), &[]).await
    }

    /// POST /api/inspections/
    ///
    /// Text fields first, then one `photos` part per attachment.
    pub async fn create_inspection(
        &self,
        inspection: &NewInspection,
        photos: &[Attachment],
    ) -> Result<Inspection, TransportError> {
        let path = "/api/inspections/";
        let mut form = Form::new();
        for (name, value) in inspection.form_fields() {
            form = form.text(name, value);
        }
        for photo in photos {
            form = form.part(PHOTOS_FIELD, photo.to_part()?);
        }

        let request = self.request(Method::POST, path).multipart(form);
        let resp = self.execute(Method::POST, path, request).await?;
        let created: Inspection = resp.json().await?;
        tracing::info!(
            id = created.id,
            code = %created.code,
            asset_id = created.asset_id,
            photos = photos.len(),
            "Created inspection"
        );
        Ok(created)
    }

    /// PUT /api/inspections/{id}
    pub async fn update_inspection(&self, id: i64, update: &InspectionUpdate) -> Result<Inspection, TransportError> {
        let path = format!("/api/inspections/{}", id);
        let request = self.request(Method::PUT, &path).json(update);
        let resp = self.execute(Method::PUT, &path, request).await?;
        Ok(resp.json().await?)
    }

    /// DELETE /api/inspections/{id}
    ///
    /// Any 2xx counts as success; the body is ignored.
    pub async fn delete_inspection(&self, id: i64) -> Result<(), TransportError> {
        let path = format!("/api/inspections/{}", id);
        let request = self.request(Method::DELETE, &path);
        self.execute(Method::DELETE, &path, request).await?;
        tracing::info!(id, "Deleted inspection");
        Ok(())
    }

    // ---- AI analysis ----

    /// POST /api/ai/analyze
    pub async fn analyze_photos(
        &self,
        photos: &[Attachment],
        asset_id: Option<i64>,
        inspection_id: Option<i64>,
    ) -> Result<AnalysisResult, TransportError> {
        let path = "/api/ai/analyze";
        let mut form = Form::new();
        for photo in photos {
            form = form.part(IMAGES_FIELD, photo.to_part()?);
        }
        if let Some(asset_id) = asset_id {
            form = form.text("asset_id", asset_id.to_string());
        }
        if let Some(inspection_id) = inspection_id {
            form = form.text("inspection_id", inspection_id.to_string());
        }

        let request = self.request(Method::POST, path).multipart(form);
        let resp = self.execute(Method::POST, path, request).await?;
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_skip_unset_params() {
        assert!(AssetFilter::default().query_pairs().is_empty());
        let filter = AssetFilter {
            ifc_file_id: Some(3),
            condition_status: Some(ConditionStatus::Critical),
        };
        assert_eq!(
            filter.query_pairs(),
            vec![("ifc_file_id", "3".to_string()), ("condition_status", "Critical".to_string())]
        );
        assert!(InspectionFilter::default().query_pairs().is_empty());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        assert_eq!(ApiClient::new("http://localhost:8000/").base_url(), "http://localhost:8000");
    }
}
