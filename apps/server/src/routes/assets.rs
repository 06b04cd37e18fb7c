// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Asset list, detail and edit.

use super::secondary;
use crate::error::WebError;
use crate::views::{self, escape};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use bimfm_client::queries::{self, ASSETS, IFC_FILE_ASSETS};
use bimfm_client::{AssetFilter, Invalidation, Mutation};
use bimfm_core::time::format_date;
use bimfm_core::{Asset, AssetUpdateDraft, ConditionStatus, ValidationErrors};
use serde::Deserialize;
use std::fmt::Write;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub condition_status: String,
}

/// GET /assets - Assets, optionally filtered by condition.
pub async fn list(State(state): State<AppState>, Query(params): Query<ListParams>) -> Result<Html<String>, WebError> {
    let condition_status = match params.condition_status.trim() {
        "" => None,
        raw => Some(
            raw.parse::<ConditionStatus>()
                .map_err(|_| WebError::BadRequest(format!("Condição inválida: {}", raw)))?,
        ),
    };
    let filter = AssetFilter {
        condition_status,
        ..Default::default()
    };
    let assets = state.cache.fetch(&queries::assets(&state.api, filter)).await?;

    let selected = condition_status.map(ConditionStatus::as_str).unwrap_or_default();
    let statuses = ConditionStatus::GRADES
        .into_iter()
        .map(|s| (s.as_str().to_string(), s.label().to_string()));
    let mut body = format!(
        "<div class=\"assets\">\n<div class=\"assets-header\">\n<h1>Ativos</h1>\n\
         <form method=\"get\" action=\"/assets\" class=\"assets-filters\">\
         <select name=\"condition_status\"><option value=\"\">Todos os status</option>{}</select> \
         <button type=\"submit\">Filtrar</button></form>\n</div>\n<div class=\"assets-grid\">\n",
        views::options(statuses, selected)
    );

    if assets.is_empty() {
        body.push_str("<div class=\"empty-state\"><p>Nenhum ativo cadastrado.</p></div>\n");
    }
    for asset in assets.iter() {
        let _ = write!(
            body,
            "<a href=\"/assets/{}\" class=\"card asset-card\"><div class=\"asset-card-header\"><h3>{}</h3>{}</div>\
             <div class=\"asset-info\"><div><strong>Tipo:</strong> {}</div>",
            asset.id,
            escape(&asset.display_name()),
            views::condition_badge(asset.condition_status),
            escape(&asset.ifc_type)
        );
        if let Some(manufacturer) = &asset.manufacturer {
            let _ = write!(body, "<div><strong>Fabricante:</strong> {}</div>", escape(manufacturer));
        }
        if let Some(serial) = &asset.serial_number {
            let _ = write!(body, "<div><strong>Nº Série:</strong> {}</div>", escape(serial));
        }
        if let Some(location) = asset.location() {
            let _ = write!(body, "<div><strong>Localização:</strong> {}</div>", escape(&location));
        }
        if let Some(score) = asset.condition_score {
            let _ = write!(body, "<div><strong>Score:</strong> {}/4</div>", score);
        }
        body.push_str("</div></a>\n");
    }
    body.push_str("</div>\n</div>");

    Ok(views::layout("Ativos", "/assets", &body))
}

/// GET /assets/:id - Asset detail with statistics and inspection history.
pub async fn detail(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Html<String>, WebError> {
    render_detail(&state, id, None, None).await
}

/// POST /assets/:id - Update an asset.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(draft): Form<AssetUpdateDraft>,
) -> Result<Response, WebError> {
    let update = match draft.validate() {
        Ok(update) => update,
        Err(errors) => {
            let page = render_detail(&state, id, Some(&draft), Some(&errors)).await?;
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
        }
    };

    let mut mutation = Mutation::new(
        "update_asset",
        vec![
            Invalidation::Key(queries::asset(&state.api, id).key().clone()),
            Invalidation::Resource(ASSETS),
            Invalidation::Resource(IFC_FILE_ASSETS),
        ],
    );
    mutation
        .run(&state.cache, state.api.update_asset(id, &update))
        .await
        .map_err(|e| WebError::mutation(e, "Ativo não encontrado"))?;
    tracing::info!(id, "Asset updated");

    Ok(Redirect::to(&format!("/assets/{}", id)).into_response())
}

/// Edit form values from the stored record.
fn draft_from(asset: &Asset) -> AssetUpdateDraft {
    AssetUpdateDraft {
        name: asset.name.clone().unwrap_or_default(),
        description: asset.description.clone().unwrap_or_default(),
        manufacturer: asset.manufacturer.clone().unwrap_or_default(),
        condition_status: asset
            .condition_status
            .filter(|s| *s != ConditionStatus::Unknown)
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        condition_score: asset.condition_score.map(|s| s.to_string()).unwrap_or_default(),
    }
}

async fn render_detail(
    state: &AppState,
    id: i64,
    draft: Option<&AssetUpdateDraft>,
    errors: Option<&ValidationErrors>,
) -> Result<Html<String>, WebError> {
    let asset_query = queries::asset(&state.api, id);
    let (asset, statistics, inspections) = tokio::join!(
        state.cache.fetch(&asset_query),
        secondary(&state.cache, queries::asset_statistics(&state.api, id)),
        secondary(&state.cache, queries::asset_inspections(&state.api, id)),
    );
    let asset = asset.map_err(|e| WebError::primary(e, "Ativo não encontrado"))?;

    let mut body = format!(
        "<div class=\"asset-detail\">\n<div class=\"detail-header\"><a href=\"/assets\" class=\"back-link\">← Voltar para Ativos</a>\
         <h1>{}</h1><a href=\"/inspections/new?asset_id={}\">Nova Inspeção</a></div>\n",
        escape(&asset.display_name()),
        asset.id
    );

    body.push_str("<section class=\"card\"><h2>Informações do Ativo</h2><ul class=\"info-grid\">");
    let _ = write!(
        body,
        "<li><strong>Tipo IFC:</strong> {}</li><li><strong>GUID:</strong> <span class=\"guid\">{}</span></li>",
        escape(&asset.ifc_type),
        escape(&asset.ifc_guid)
    );
    if let Some(description) = &asset.description {
        let _ = write!(body, "<li><strong>Descrição:</strong> {}</li>", escape(description));
    }
    if let Some(manufacturer) = &asset.manufacturer {
        let _ = write!(body, "<li><strong>Fabricante:</strong> {}</li>", escape(manufacturer));
    }
    if let Some(serial) = &asset.serial_number {
        let _ = write!(body, "<li><strong>Nº Série:</strong> {}</li>", escape(serial));
    }
    if let Some(location) = asset.location() {
        let _ = write!(body, "<li><strong>Localização:</strong> {}</li>", escape(&location));
    }
    let _ = write!(
        body,
        "<li><strong>Condição:</strong> {}</li>",
        views::condition_badge(asset.condition_status)
    );
    if let Some(score) = asset.condition_score {
        let _ = write!(body, "<li><strong>Score:</strong> {}/4</li>", score);
    }
    if let Some(date) = &asset.last_inspection_date {
        let _ = write!(body, "<li><strong>Última Inspeção:</strong> {}</li>", format_date(date));
    }
    body.push_str("</ul></section>\n");

    if let Some(statistics) = &statistics {
        let _ = writeln!(
            body,
            "<section class=\"card\"><h2>Estatísticas</h2><ul class=\"stats-grid\">\
             <li><strong>Total de Inspeções:</strong> {}</li>\
             <li><strong>Com Patologia:</strong> {}</li>\
             <li><strong>Última Inspeção:</strong> {}</li></ul></section>",
            statistics.total_inspections,
            statistics.inspections_with_pathology,
            statistics
                .latest_inspection_date
                .as_ref()
                .map(format_date)
                .unwrap_or_else(|| "N/A".into())
        );
    }

    match inspections.as_deref() {
        Some(inspections) if !inspections.is_empty() => {
            let _ = write!(
                body,
                "<section class=\"card\"><h2>Histórico de Inspeções ({})</h2><ul class=\"inspections-list\">",
                inspections.len()
            );
            for inspection in inspections {
                let _ = write!(
                    body,
                    "<li><a href=\"/inspections/{}\"><span class=\"inspection-code\">{}</span></a> {} \
                     <span>{}</span> <span>{}</span></li>",
                    inspection.id,
                    escape(&inspection.code),
                    views::severity_badge(inspection.severity),
                    escape(&inspection.location),
                    format_date(&inspection.inspection_date)
                );
            }
            body.push_str("</ul></section>\n");
        }
        Some(_) => {}
        None => body.push_str("<p class=\"error\">Não foi possível carregar o histórico de inspeções.</p>\n"),
    }

    let stored = draft_from(&asset);
    let form = draft.unwrap_or(&stored);
    let statuses = ConditionStatus::GRADES
        .into_iter()
        .map(|s| (s.as_str().to_string(), s.label().to_string()));
    let scores = (1..=4u8).map(|s| (s.to_string(), s.to_string()));
    let _ = write!(
        body,
        "<section class=\"card\"><h2>Editar Ativo</h2>\
         <form method=\"post\" action=\"/assets/{id}\" class=\"asset-form\">\
         <label>Nome <input type=\"text\" name=\"name\" value=\"{name}\"></label>{name_err}\
         <label>Descrição <textarea name=\"description\" rows=\"3\">{description}</textarea></label>\
         <label>Fabricante <input type=\"text\" name=\"manufacturer\" value=\"{manufacturer}\"></label>\
         <label>Condição <select name=\"condition_status\"><option value=\"\">N/A</option>{statuses}</select></label>{status_err}\
         <label>Score <select name=\"condition_score\"><option value=\"\">N/A</option>{scores}</select></label>{score_err}\
         <button type=\"submit\">Salvar</button></form></section>\n</div>",
        id = asset.id,
        name = escape(&form.name),
        name_err = views::field_error(errors, "name"),
        description = escape(&form.description),
        manufacturer = escape(&form.manufacturer),
        statuses = views::options(statuses, &form.condition_status),
        status_err = views::field_error(errors, "condition_status"),
        scores = views::options(scores, &form.condition_score),
        score_err = views::field_error(errors, "condition_score"),
    );

    Ok(views::layout(&asset.display_name(), "/assets", &body))
}
