// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 3D viewer page and model upload.
//!
//! The page ships the scene setup (background, camera, lights, grid, axes)
//! as JSON for the client-side renderer. Model geometry is not loaded; the
//! scene only shows a placeholder for it.

use super::secondary;
use crate::error::WebError;
use crate::views::{self, escape};
use crate::AppState;
use axum::{
    extract::{Multipart, Path, State},
    response::{Html, Redirect},
};
use bimfm_client::queries::{self, IFC_FILES};
use bimfm_client::{Attachment, FetchStatus, Invalidation, Mutation};
use bimfm_core::time::format_datetime;
use bimfm_core::validate_model_filename;
use serde::Serialize;
use std::fmt::Write;

/// Scene setup consumed by the client-side renderer.
#[derive(Debug, Clone, Serialize)]
pub struct SceneConfig {
    pub background: u32,
    pub camera: CameraConfig,
    pub ambient_light: Light,
    pub directional_light: Light,
    pub grid: GridConfig,
    pub axes_size: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CameraConfig {
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
}

#[derive(Debug, Clone, Serialize)]
pub struct Light {
    pub color: u32,
    pub intensity: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<[f32; 3]>,
    pub cast_shadow: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridConfig {
    pub size: u32,
    pub divisions: u32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            background: 0xf0f0f0,
            camera: CameraConfig {
                fov: 75.0,
                near: 0.1,
                far: 1000.0,
                position: [10.0, 10.0, 10.0],
            },
            ambient_light: Light {
                color: 0xffffff,
                intensity: 0.6,
                position: None,
                cast_shadow: false,
            },
            directional_light: Light {
                color: 0xffffff,
                intensity: 0.8,
                position: Some([10.0, 10.0, 5.0]),
                cast_shadow: true,
            },
            grid: GridConfig {
                size: 20,
                divisions: 20,
            },
            axes_size: 5.0,
        }
    }
}

/// GET /viewer - Viewer without a selected model.
pub async fn index(State(state): State<AppState>) -> Result<Html<String>, WebError> {
    render(&state, None).await
}

/// GET /viewer/:file_id - Viewer for one model file.
pub async fn page(State(state): State<AppState>, Path(file_id): Path<i64>) -> Result<Html<String>, WebError> {
    render(&state, Some(file_id)).await
}

async fn render(state: &AppState, file_id: Option<i64>) -> Result<Html<String>, WebError> {
    let files = secondary(&state.cache, queries::model_files(&state.api)).await;

    let mut body = String::from("<div class=\"ifc-viewer\">\n<div class=\"viewer-header\">\n<h1>Visualizador 3D IFC</h1>\n");

    if let Some(files) = &files {
        let entries = files.iter().map(|f| (f.id.to_string(), f.filename.clone()));
        let selected = file_id.map(|id| id.to_string()).unwrap_or_default();
        let _ = writeln!(
            body,
            "<select id=\"model-select\" onchange=\"if(this.value)location.href='/viewer/'+this.value\">\
             <option value=\"\">Selecione um arquivo IFC</option>{}</select>",
            views::options(entries, &selected)
        );
    }
    body.push_str(
        "<form method=\"post\" action=\"/viewer/upload\" enctype=\"multipart/form-data\" class=\"upload-form\">\
         <input type=\"file\" name=\"file\" accept=\".ifc\" required> <button type=\"submit\">Enviar IFC</button></form>\n</div>\n",
    );

    if let Some(file_id) = file_id {
        let file = state
            .cache
            .fetch(&queries::model_file(&state.api, file_id))
            .await
            .map_err(|e| WebError::primary(e, "Arquivo IFC não encontrado"))?;

        // Counts are informative only; render whatever the cache holds right now.
        let assets = state.cache.read(&queries::model_assets(&state.api, file_id));
        let elements = state.cache.read(&queries::model_elements(&state.api, file_id));
        let count = |data: Option<usize>, status: FetchStatus, what: &str| match (data, status) {
            (Some(n), _) => n.to_string(),
            (None, FetchStatus::Error) => "indisponível".to_string(),
            (None, _) => views::loading(what),
        };

        let _ = writeln!(
            body,
            "<div class=\"card model-info\"><h2>{}</h2><ul>\
             <li><strong>Projeto:</strong> {}</li>\
             <li><strong>Schema:</strong> {}</li>\
             <li><strong>Status:</strong> {}</li>\
             <li><strong>Enviado em:</strong> {}</li>\
             <li><strong>Ativos:</strong> {}</li>\
             <li><strong>Elementos:</strong> {}</li></ul></div>",
            escape(&file.filename),
            escape(file.project_name.as_deref().unwrap_or("N/A")),
            escape(file.ifc_schema.as_deref().unwrap_or("N/A")),
            escape(file.processing_status.as_deref().unwrap_or("N/A")),
            file.uploaded_at.as_ref().map(format_datetime).unwrap_or_else(|| "N/A".into()),
            count(assets.data.as_ref().map(|a| a.len()), assets.status, "ativos"),
            count(elements.data.as_ref().map(|e| e.len()), elements.status, "elementos"),
        );
    }

    let scene = serde_json::to_string(&SceneConfig::default()).map_err(|e| WebError::Internal(e.to_string()))?;
    let _ = writeln!(
        body,
        "<div id=\"viewer-container\" class=\"viewer-container\" data-file-id=\"{}\" style=\"height:600px;background:#f0f0f0\">\
         <p class=\"loading\">{}</p></div>\n<script type=\"application/json\" id=\"scene-config\">{}</script>\n</div>",
        file_id.map(|id| id.to_string()).unwrap_or_default(),
        if file_id.is_some() {
            "A geometria do modelo ainda não é carregada neste visualizador."
        } else {
            "Selecione um arquivo IFC para visualizar."
        },
        scene
    );

    Ok(views::layout("Visualizador 3D", "/viewer", &body))
}

/// POST /viewer/upload - Upload a model file.
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Result<Redirect, WebError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await?;
        upload = Some(Attachment::new(file_name, content_type, data));
    }
    let upload = upload.ok_or_else(|| WebError::BadRequest("Nenhum arquivo enviado".into()))?;

    if let Err(errors) = validate_model_filename(&upload.file_name) {
        return Err(WebError::BadRequest(errors.to_string()));
    }

    let mut mutation = Mutation::new("upload_model_file", vec![Invalidation::Resource(IFC_FILES)]);
    let created = mutation
        .run(&state.cache, state.api.upload_model_file(&upload))
        .await
        .map_err(|e| WebError::mutation(e, "Arquivo IFC não encontrado"))?;

    Ok(Redirect::to(&format!("/viewer/{}", created.id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_defaults() {
        let json = serde_json::to_value(SceneConfig::default()).unwrap();
        assert_eq!(json["background"], 0xf0f0f0);
        assert_eq!(json["camera"]["position"], serde_json::json!([10.0, 10.0, 10.0]));
        assert_eq!(json["grid"]["divisions"], 20);
        assert!(json["ambient_light"].get("position").is_none());
        assert_eq!(json["directional_light"]["cast_shadow"], true);
    }
}
