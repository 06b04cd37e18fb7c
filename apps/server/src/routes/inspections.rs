// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inspection list, creation form, detail, edit and delete.

use super::{secondary, slice};
use crate::error::WebError;
use crate::views::{self, escape};
use crate::AppState;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use bimfm_client::queries::{self, ASSETS, ASSET_INSPECTIONS, ASSET_STATISTICS, IFC_FILE_ASSETS, INSPECTIONS};
use bimfm_client::{
    AssetFilter, Attachment, InspectionFilter, InspectionSubmission, Invalidation, Mutation, SubmissionError,
};
use bimfm_core::time::{format_date, format_datetime};
use bimfm_core::{
    unnamed_asset, Asset, Inspection, InspectionDraft, InspectionUpdateDraft, Severity, ValidationErrors,
};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::fmt::Write;

/// GET /inspections - All inspections, newest first.
pub async fn list(State(state): State<AppState>) -> Result<Html<String>, WebError> {
    let inspections_query = queries::inspections(&state.api, InspectionFilter::default());
    let (inspections, assets) = tokio::join!(
        state.cache.fetch(&inspections_query),
        secondary(&state.cache, queries::assets(&state.api, AssetFilter::default())),
    );
    let inspections = inspections?;
    let names: FxHashMap<i64, String> = slice(&assets).iter().map(|a| (a.id, a.display_name())).collect();

    let mut body = String::from(
        "<div class=\"inspections\">\n<div class=\"inspections-header\"><h1>Inspeções</h1>\
         <a href=\"/inspections/new\" class=\"btn-primary\">+ Nova Inspeção</a></div>\n",
    );

    if inspections.is_empty() {
        body.push_str(
            "<div class=\"empty-state\"><p>Nenhuma inspeção cadastrada.</p>\
             <a href=\"/inspections/new\" class=\"btn-primary\">Criar Primeira Inspeção</a></div>\n</div>",
        );
        return Ok(views::layout("Inspeções", "/inspections", &body));
    }

    body.push_str(
        "<table class=\"inspections-table\"><thead><tr><th>Código</th><th>Ativo</th><th>Data</th>\
         <th>Local</th><th>Status</th><th>Ações</th></tr></thead><tbody>\n",
    );
    for inspection in inspections.iter() {
        let asset_name = names
            .get(&inspection.asset_id)
            .cloned()
            .unwrap_or_else(|| unnamed_asset(inspection.asset_id));
        let mut status = String::new();
        if inspection.has_pathology {
            status.push_str(&views::badge("Patologia", "#e74c3c"));
            status.push(' ');
            status.push_str(&views::severity_badge(inspection.severity));
        } else {
            status.push_str(&views::badge("OK", "#27ae60"));
        }
        if inspection.ai_analysis_performed {
            status.push(' ');
            status.push_str(&views::badge("IA", "#8e44ad"));
        }
        let _ = writeln!(
            body,
            "<tr><td><a href=\"/inspections/{id}\" class=\"inspection-code\">{code}</a></td>\
             <td><a href=\"/assets/{asset_id}\">{asset}</a></td><td>{date}</td><td>{location}</td><td>{status}</td>\
             <td><a href=\"/inspections/{id}\">Ver</a> \
             <form method=\"post\" action=\"/inspections/{id}/delete\" class=\"inline-form\" \
             onsubmit=\"return confirm('Excluir esta inspeção?')\"><button type=\"submit\" class=\"btn-danger\">Excluir</button></form></td></tr>",
            id = inspection.id,
            code = escape(&inspection.code),
            asset_id = inspection.asset_id,
            asset = escape(&asset_name),
            date = format_date(&inspection.inspection_date),
            location = escape(&inspection.location),
            status = status,
        );
    }
    body.push_str("</tbody></table>\n</div>");

    Ok(views::layout("Inspeções", "/inspections", &body))
}

#[derive(Debug, Deserialize)]
pub struct NewParams {
    #[serde(default)]
    pub asset_id: String,
}

/// GET /inspections/new - Creation form, optionally with a preselected asset.
pub async fn new_form(State(state): State<AppState>, Query(params): Query<NewParams>) -> Html<String> {
    let asset_id = params.asset_id.trim().parse::<i64>().ok();
    render_form(&state, &InspectionDraft::new(asset_id), None, None).await
}

/// POST /inspections - Create an inspection, then analyze its photos.
pub async fn create(State(state): State<AppState>, mut multipart: Multipart) -> Result<Response, WebError> {
    let mut draft = InspectionDraft::default();
    let mut photos = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "photos" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await?;
            // Browsers send an empty part when no file was picked.
            if file_name.is_empty() || data.is_empty() {
                continue;
            }
            photos.push(Attachment::new(file_name, content_type, data));
            continue;
        }

        let value = field.text().await?;
        match name.as_str() {
            "code" => draft.code = value,
            "asset_id" => draft.asset_id = value,
            "inspection_date" => draft.inspection_date = value,
            "has_pathology" => draft.has_pathology = !matches!(value.as_str(), "" | "false" | "off"),
            "severity" => draft.severity = value,
            "location" => draft.location = value,
            "observations" => draft.observations = value,
            "pathology_type" => draft.pathology_type = value,
            _ => {}
        }
    }

    let mut submission = InspectionSubmission::new();
    match submission.submit(&state.api, &state.cache, &draft, &photos).await {
        Ok(created) => {
            tracing::info!(
                id = created.id,
                state = submission.state().name(),
                "Inspection submitted"
            );
            // The backend grades the asset from a pathology's severity.
            state.cache.invalidate_resource(ASSETS);
            state.cache.invalidate_resource(IFC_FILE_ASSETS);
            state.cache.invalidate_resource(ASSET_INSPECTIONS);
            state.cache.invalidate_resource(ASSET_STATISTICS);
            state
                .cache
                .invalidate(queries::asset(&state.api, created.asset_id).key());
            Ok(Redirect::to("/inspections").into_response())
        }
        Err(SubmissionError::Validation(errors)) => {
            let page = render_form(&state, &draft, Some(&errors), None).await;
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
        Err(SubmissionError::Transport(err)) => {
            let status = err
                .status
                .filter(|s| (400..500).contains(s))
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            let message = format!("Erro ao criar inspeção: {}", err.message);
            let page = render_form(&state, &draft, None, Some(&message)).await;
            Ok((status, page).into_response())
        }
        Err(err @ SubmissionError::InvalidTransition) => Err(WebError::BadRequest(err.to_string())),
    }
}

async fn render_form(
    state: &AppState,
    draft: &InspectionDraft,
    errors: Option<&ValidationErrors>,
    failure: Option<&str>,
) -> Html<String> {
    let assets = secondary(&state.cache, queries::assets(&state.api, AssetFilter::default())).await;

    let mut body = String::from(
        "<div class=\"inspection-form\">\n<a href=\"/inspections\" class=\"back-link\">← Voltar para Inspeções</a>\n\
         <h1>Nova Inspeção</h1>\n",
    );
    if let Some(failure) = failure {
        let _ = writeln!(body, "<div class=\"error\">{}</div>", escape(failure));
    }

    let asset_field = match &assets {
        Some(assets) => format!(
            "<select name=\"asset_id\" required><option value=\"\">Selecione um ativo</option>{}</select>",
            views::options(asset_options(assets), &draft.asset_id)
        ),
        None => format!(
            "<input type=\"number\" name=\"asset_id\" min=\"1\" value=\"{}\" required>",
            escape(&draft.asset_id)
        ),
    };
    let severities = Severity::ALL
        .into_iter()
        .map(|s| (s.to_string(), format!("{} - {}", s.value(), s.label())));

    let _ = write!(
        body,
        "<form method=\"post\" action=\"/inspections\" enctype=\"multipart/form-data\" class=\"card\">\
         <label>Código * <input type=\"text\" name=\"code\" value=\"{code}\" required></label>{code_err}\
         <label>Ativo * {asset_field}</label>{asset_err}\
         <label>Data da Inspeção * <input type=\"datetime-local\" name=\"inspection_date\" value=\"{date}\" required></label>{date_err}\
         <label>Localização * <input type=\"text\" name=\"location\" value=\"{location}\" required></label>{location_err}\
         <label><input type=\"checkbox\" name=\"has_pathology\" value=\"true\"{checked}> Possui patologia</label>\
         <fieldset class=\"pathology-fields\"><label>Severidade <select name=\"severity\"><option value=\"\">Selecione</option>{severities}</select></label>{severity_err}\
         <label>Tipo de Patologia <input type=\"text\" name=\"pathology_type\" value=\"{pathology_type}\"></label></fieldset>\
         <label>Observações <textarea name=\"observations\" rows=\"4\">{observations}</textarea></label>\
         <label>Fotos <input type=\"file\" name=\"photos\" accept=\"image/*\" multiple></label>\
         <p class=\"hint\">As fotos enviadas são analisadas automaticamente após a criação da inspeção.</p>\
         <div class=\"form-actions\"><a href=\"/inspections\">Cancelar</a> <button type=\"submit\" class=\"btn-primary\">Criar Inspeção</button></div>\
         </form>\n</div>",
        code = escape(&draft.code),
        code_err = views::field_error(errors, "code"),
        asset_field = asset_field,
        asset_err = views::field_error(errors, "asset_id"),
        date = escape(&draft.inspection_date),
        date_err = views::field_error(errors, "inspection_date"),
        location = escape(&draft.location),
        location_err = views::field_error(errors, "location"),
        checked = if draft.has_pathology { " checked" } else { "" },
        severities = views::options(severities, &draft.severity),
        severity_err = views::field_error(errors, "severity"),
        pathology_type = escape(&draft.pathology_type),
        observations = escape(&draft.observations),
    );

    views::layout("Nova Inspeção", "/inspections", &body)
}

fn asset_options(assets: &[Asset]) -> impl Iterator<Item = (String, String)> + '_ {
    assets.iter().map(|a| {
        let label = match a.location() {
            Some(location) => format!("{} ({})", a.display_name(), location),
            None => a.display_name(),
        };
        (a.id.to_string(), label)
    })
}

/// GET /inspections/:id - Inspection detail with its asset, photos and AI results.
pub async fn detail(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Html<String>, WebError> {
    render_detail(&state, id, None, None).await
}

/// POST /inspections/:id - Update observations, and severity when the inspection found a pathology.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(mut draft): Form<InspectionUpdateDraft>,
) -> Result<Response, WebError> {
    let inspection_query = queries::inspection(&state.api, id);
    let inspection = state
        .cache
        .fetch(&inspection_query)
        .await
        .map_err(|e| WebError::primary(e, "Inspeção não encontrada"))?;
    if !inspection.has_pathology {
        draft.severity.clear();
    }

    let update = match draft.validate() {
        Ok(update) => update,
        Err(errors) => {
            let page = render_detail(&state, id, Some(&draft), Some(&errors)).await?;
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
        }
    };

    let mut mutation = Mutation::new(
        "update_inspection",
        vec![
            Invalidation::Key(inspection_query.key().clone()),
            Invalidation::Resource(INSPECTIONS),
            Invalidation::Resource(ASSET_INSPECTIONS),
        ],
    );
    mutation
        .run(&state.cache, state.api.update_inspection(id, &update))
        .await
        .map_err(|e| WebError::mutation(e, "Inspeção não encontrada"))?;

    Ok(Redirect::to(&format!("/inspections/{}", id)).into_response())
}

/// POST /inspections/:id/delete - Delete an inspection.
pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Redirect, WebError> {
    let mut mutation = Mutation::new(
        "delete_inspection",
        vec![
            Invalidation::Resource(INSPECTIONS),
            Invalidation::Key(queries::inspection(&state.api, id).key().clone()),
            Invalidation::Resource(ASSET_INSPECTIONS),
            Invalidation::Resource(ASSET_STATISTICS),
        ],
    );
    mutation
        .run(&state.cache, state.api.delete_inspection(id))
        .await
        .map_err(|e| WebError::mutation(e, "Inspeção não encontrada"))?;

    Ok(Redirect::to("/inspections"))
}

/// Absolute URL of a file the backend serves, given its stored path.
fn media_url(backend: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!("{}/{}", backend.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn draft_from(inspection: &Inspection) -> InspectionUpdateDraft {
    InspectionUpdateDraft {
        observations: inspection.observations.clone().unwrap_or_default(),
        severity: inspection.severity.map(|s| s.to_string()).unwrap_or_default(),
    }
}

async fn render_detail(
    state: &AppState,
    id: i64,
    draft: Option<&InspectionUpdateDraft>,
    errors: Option<&ValidationErrors>,
) -> Result<Html<String>, WebError> {
    let api = &state.api;
    let loaded = state
        .cache
        .fetch_dependent(&queries::inspection(api, id), |inspection: &Inspection| {
            Some(queries::asset(api, inspection.asset_id))
        })
        .await
        .map_err(|e| WebError::primary(e, "Inspeção não encontrada"))?;
    let inspection = loaded.parent;
    let asset_name = match loaded.child {
        Some(Ok(asset)) => asset.display_name(),
        Some(Err(err)) => {
            tracing::warn!(asset_id = inspection.asset_id, error = %err, "Asset read failed");
            unnamed_asset(inspection.asset_id)
        }
        None => unnamed_asset(inspection.asset_id),
    };
    let backend = api.base_url();

    let mut body = format!(
        "<div class=\"inspection-detail\">\n<div class=\"detail-header\">\
         <a href=\"/inspections\" class=\"back-link\">← Voltar para Inspeções</a><h1>{code}</h1>\
         <form method=\"post\" action=\"/inspections/{id}/delete\" class=\"inline-form\" \
         onsubmit=\"return confirm('Excluir esta inspeção?')\"><button type=\"submit\" class=\"btn-danger\">Excluir</button></form></div>\n",
        code = escape(&inspection.code),
        id = inspection.id,
    );

    let _ = write!(
        body,
        "<section class=\"card\"><h2>Informações</h2><ul class=\"info-grid\">\
         <li><strong>Ativo:</strong> <a href=\"/assets/{asset_id}\">{asset}</a></li>\
         <li><strong>Data:</strong> {date}</li>\
         <li><strong>Localização:</strong> {location}</li>\
         <li><strong>Patologia:</strong> {pathology}</li>",
        asset_id = inspection.asset_id,
        asset = escape(&asset_name),
        date = format_datetime(&inspection.inspection_date),
        location = escape(&inspection.location),
        pathology = if inspection.has_pathology { "Sim" } else { "Não" },
    );
    if inspection.has_pathology {
        let _ = write!(
            body,
            "<li><strong>Severidade:</strong> {}</li>",
            views::severity_badge(inspection.severity)
        );
    }
    if let Some(pathology_type) = &inspection.pathology_type {
        let _ = write!(body, "<li><strong>Tipo de Patologia:</strong> {}</li>", escape(pathology_type));
    }
    if let Some(observations) = inspection.observations.as_deref().filter(|o| !o.is_empty()) {
        let _ = write!(body, "<li><strong>Observações:</strong> {}</li>", escape(observations));
    }
    body.push_str("</ul></section>\n");

    if inspection.ai_analysis_performed {
        body.push_str("<section class=\"card ai-analysis\"><h2>Análise por IA</h2><ul>");
        if let Some(confidence) = inspection.ai_confidence {
            let _ = write!(body, "<li><strong>Confiança:</strong> {:.1}%</li>", confidence * 100.0);
        }
        if let Some(path) = &inspection.ai_heatmap_path {
            let _ = write!(
                body,
                "<li><a href=\"{}\" target=\"_blank\">Mapa de calor</a></li>",
                escape(&media_url(backend, path))
            );
        }
        if let Some(path) = &inspection.ai_detection_mask_path {
            let _ = write!(
                body,
                "<li><a href=\"{}\" target=\"_blank\">Máscara de detecção</a></li>",
                escape(&media_url(backend, path))
            );
        }
        body.push_str("</ul></section>\n");
    }

    if !inspection.photos.is_empty() {
        let _ = write!(
            body,
            "<section class=\"card\"><h2>Fotos ({})</h2><div class=\"photo-grid\">",
            inspection.photos.len()
        );
        for photo in &inspection.photos {
            let _ = write!(
                body,
                "<figure><img src=\"{src}\" alt=\"{name}\" loading=\"lazy\"><figcaption>{name}{uploaded}</figcaption></figure>",
                src = escape(&media_url(backend, &photo.file_path)),
                name = escape(&photo.file_name),
                uploaded = photo
                    .uploaded_at
                    .as_ref()
                    .map(|at| format!(" ({})", format_date(at)))
                    .unwrap_or_default(),
            );
        }
        body.push_str("</div></section>\n");
    }

    let stored = draft_from(&inspection);
    let form = draft.unwrap_or(&stored);
    let severity_field = if inspection.has_pathology {
        let severities = Severity::ALL
            .into_iter()
            .map(|s| (s.to_string(), format!("{} - {}", s.value(), s.label())));
        format!(
            "<label>Severidade <select name=\"severity\"><option value=\"\">N/A</option>{}</select></label>{}",
            views::options(severities, &form.severity),
            views::field_error(errors, "severity")
        )
    } else {
        String::new()
    };
    let _ = write!(
        body,
        "<section class=\"card\"><h2>Editar Inspeção</h2>\
         <form method=\"post\" action=\"/inspections/{id}\">{severity_field}\
         <label>Observações <textarea name=\"observations\" rows=\"4\">{observations}</textarea></label>\
         <button type=\"submit\">Salvar</button></form></section>\n</div>",
        id = inspection.id,
        severity_field = severity_field,
        observations = escape(&form.observations),
    );

    Ok(views::layout(&inspection.code, "/inspections", &body))
}
