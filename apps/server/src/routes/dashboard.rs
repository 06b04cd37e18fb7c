// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dashboard: stat cards, latest inspections, assets per condition.

use super::{secondary, slice};
use crate::views::{self, escape};
use crate::AppState;
use axum::{extract::State, response::Html};
use bimfm_client::{queries, AssetFilter, InspectionFilter};
use bimfm_core::stats::{condition_breakdown, recent_inspections, DashboardStats};
use bimfm_core::time::format_date;
use std::fmt::Write;

/// GET / - Dashboard.
pub async fn page(State(state): State<AppState>) -> Html<String> {
    let (files, inspections, assets) = tokio::join!(
        secondary(&state.cache, queries::model_files(&state.api)),
        secondary(&state.cache, queries::inspections(&state.api, InspectionFilter::default())),
        secondary(&state.cache, queries::assets(&state.api, AssetFilter::default())),
    );
    let stats = DashboardStats::compute(slice(&files), slice(&assets), slice(&inspections));

    let mut body = String::from("<div class=\"dashboard\">\n<h1>Dashboard</h1>\n<div class=\"stats-grid\">\n");
    for (title, value, class) in [
        ("Arquivos IFC", stats.total_model_files, "stat-card"),
        ("Ativos", stats.total_assets, "stat-card"),
        ("Inspeções", stats.total_inspections, "stat-card"),
        ("Patologias Detectadas", stats.inspections_with_pathology, "stat-card critical"),
        ("Ativos Críticos", stats.critical_assets, "stat-card critical"),
    ] {
        let _ = writeln!(
            body,
            "<div class=\"{}\"><h3>{}</h3><p class=\"stat-value\">{}</p></div>",
            class, title, value
        );
    }
    body.push_str("</div>\n<div class=\"dashboard-sections\">\n");

    body.push_str("<section class=\"card\">\n<h2>Últimas Inspeções</h2>\n");
    match &inspections {
        None => body.push_str("<p class=\"error\">Não foi possível carregar as inspeções.</p>\n"),
        Some(inspections) if inspections.is_empty() => {
            body.push_str("<p>Nenhuma inspeção cadastrada.</p>\n")
        }
        Some(inspections) => {
            body.push_str("<ul class=\"inspections-list\">\n");
            for inspection in recent_inspections(inspections) {
                let _ = writeln!(
                    body,
                    "<li><a href=\"/inspections/{}\"><span class=\"inspection-code\">{}</span> {}</a> \
                     <span>{}</span> <span>{}</span></li>",
                    inspection.id,
                    escape(&inspection.code),
                    views::severity_badge(inspection.severity),
                    escape(&inspection.location),
                    format_date(&inspection.inspection_date)
                );
            }
            body.push_str("</ul>\n");
        }
    }
    body.push_str("<a href=\"/inspections\" class=\"view-all-link\">Ver todas as inspeções →</a>\n</section>\n");

    body.push_str("<section class=\"card\">\n<h2>Ativos por Condição</h2>\n");
    if assets.is_none() {
        body.push_str("<p class=\"error\">Não foi possível carregar os ativos.</p>\n");
    }
    for bar in condition_breakdown(slice(&assets)) {
        let _ = writeln!(
            body,
            "<div class=\"condition-item\"><span class=\"condition-label\">{}</span>\
             <div class=\"condition-bar\"><div class=\"condition-fill condition-{}\" \
             style=\"width:{:.0}%;background-color:{}\"></div></div>\
             <span class=\"condition-count\">{}</span></div>",
            bar.status.as_str(),
            bar.status.as_str().to_lowercase(),
            bar.percent,
            bar.status.color(),
            bar.count
        );
    }
    body.push_str("</section>\n</div>\n</div>");

    views::layout("Dashboard", "/", &body)
}
