// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Page handlers against an in-process fake backend.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use bimfm_client::testing::{asset, inspection, model_file, FakeBackend};
use bimfm_core::ConditionStatus;
use bimfm_web::{router, AppState, Config};
use std::time::Duration;
use tower::ServiceExt;

const BOUNDARY: &str = "bimfm-test-boundary";

fn critical_card(count: usize) -> String {
    format!("<h3>Ativos Críticos</h3><p class=\"stat-value\">{}</p>", count)
}

struct Page {
    status: StatusCode,
    location: Option<String>,
    body: String,
}

fn app(backend: &FakeBackend) -> Router {
    let config = Config {
        api_url: backend.url(),
        ..Config::default()
    };
    router(AppState::new(config).unwrap())
}

async fn send(app: &Router, request: Request<Body>) -> Page {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    Page {
        status,
        location,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}

async fn get(app: &Router, uri: &str) -> Page {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_form(app: &Router, uri: &str, body: &str) -> Page {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// Multipart body with text fields and `(field, file name, bytes)` file parts.
fn multipart(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Body {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    for (name, file_name, data) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    Body::from(body)
}

async fn post_multipart(app: &Router, uri: &str, body: Body) -> Page {
    let request = Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(body)
        .unwrap();
    send(app, request).await
}

async fn seeded() -> FakeBackend {
    let backend = FakeBackend::start().await;
    backend.add_file(model_file(1, "edificio.ifc"));
    backend.add_asset(1, asset(1, Some("Parede Norte"), Some(ConditionStatus::Critical), Some(1)));
    backend.add_asset(1, asset(2, None, Some(ConditionStatus::Good), Some(4)));
    backend
}

#[tokio::test]
async fn test_dashboard_aggregates() {
    let backend = seeded().await;
    backend.add_inspection(inspection(10, "INS-10", 1, "2024-05-01T09:00:00"));
    let app = app(&backend);

    let page = get(&app, "/").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page
        .body
        .contains("<h3>Ativos Críticos</h3><p class=\"stat-value\">1</p>"));
    assert!(page.body.contains("<h3>Arquivos IFC</h3><p class=\"stat-value\">1</p>"));
    assert!(page.body.contains("width:50%"));
    assert!(page.body.contains("INS-10"));
    assert!(page.body.contains("<title>Dashboard | BIM-FM Platform</title>"));
}

#[tokio::test]
async fn test_dashboard_picks_up_backend_changes() {
    let backend = seeded().await;
    let app = app(&backend);

    let page = get(&app, "/").await;
    assert!(page.body.contains(&critical_card(1)));

    // Another client records a critical asset; a later render shows it.
    backend.add_asset(1, asset(3, Some("Viga"), Some(ConditionStatus::Critical), Some(1)));
    let mut refreshed = false;
    for _ in 0..50 {
        if get(&app, "/").await.body.contains(&critical_card(2)) {
            refreshed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(refreshed);
    assert!(backend.count("GET /api/assets/") >= 2);
}

#[tokio::test]
async fn test_dashboard_survives_backend_outage() {
    let config = Config {
        api_url: "http://127.0.0.1:1".to_string(),
        ..Config::default()
    };
    let app = router(AppState::new(config).unwrap());

    let page = get(&app, "/").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Não foi possível carregar as inspeções."));
}

#[tokio::test]
async fn test_missing_records_render_not_found() {
    let backend = seeded().await;
    let app = app(&backend);

    let page = get(&app, "/assets/999").await;
    assert_eq!(page.status, StatusCode::NOT_FOUND);
    assert!(page.body.contains("Ativo não encontrado"));

    let page = get(&app, "/inspections/999").await;
    assert_eq!(page.status, StatusCode::NOT_FOUND);
    assert!(page.body.contains("Inspeção não encontrada"));

    let page = get(&app, "/viewer/999").await;
    assert_eq!(page.status, StatusCode::NOT_FOUND);

    let page = get(&app, "/nowhere").await;
    assert_eq!(page.status, StatusCode::NOT_FOUND);
    assert!(page.body.contains("Página não encontrada: /nowhere"));
}

#[tokio::test]
async fn test_health() {
    let backend = seeded().await;
    let app = app(&backend);

    let page = get(&app, "/health").await;
    assert_eq!(page.status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&page.body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "bimfm-web");
    assert_eq!(json["cached_queries"], 0);
}

#[tokio::test]
async fn test_assets_filter() {
    let backend = seeded().await;
    let app = app(&backend);

    let page = get(&app, "/assets").await;
    assert!(page.body.contains("Parede Norte"));
    assert!(page.body.contains("Ativo #2"));

    let page = get(&app, "/assets?condition_status=Critical").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Parede Norte"));
    assert!(!page.body.contains("Ativo #2"));
    assert!(page.body.contains("<option value=\"Critical\" selected>Crítico</option>"));

    let page = get(&app, "/assets?condition_status=Sideways").await;
    assert_eq!(page.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_asset_detail_and_update() {
    let backend = seeded().await;
    backend.add_inspection(inspection(10, "INS-10", 1, "2024-05-01T09:00:00"));
    let app = app(&backend);

    let page = get(&app, "/assets/1").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Histórico de Inspeções (1)"));
    assert!(page.body.contains("<li><strong>Total de Inspeções:</strong> 1</li>"));
    assert!(page.body.contains("/inspections/new?asset_id=1"));

    let page = post_form(&app, "/assets/1", "name=Porta&condition_score=9").await;
    assert_eq!(page.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(page.body.contains("Score deve estar entre 1 e 4"));
    assert_eq!(backend.count("PUT /api/assets/1"), 0);

    let page = post_form(&app, "/assets/1", "name=Porta+Sul&condition_status=Fair&condition_score=3").await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);
    assert_eq!(page.location.as_deref(), Some("/assets/1"));

    let page = get(&app, "/assets/1").await;
    assert!(page.body.contains("<h1>Porta Sul</h1>"));
    let page = get(&app, "/assets").await;
    assert!(page.body.contains("Porta Sul"));
}

#[tokio::test]
async fn test_create_inspection_without_photos() {
    let backend = seeded().await;
    let app = app(&backend);

    let page = get(&app, "/inspections").await;
    assert!(page.body.contains("Nenhuma inspeção cadastrada."));

    let body = multipart(
        &[
            ("code", "INS-01"),
            ("asset_id", "1"),
            ("inspection_date", "2024-05-01T09:00"),
            ("location", "Bloco A"),
            ("observations", ""),
        ],
        &[("photos", "", b"")],
    );
    let page = post_multipart(&app, "/inspections", body).await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);
    assert_eq!(page.location.as_deref(), Some("/inspections"));
    assert_eq!(backend.count("POST /api/ai/analyze"), 0);
    assert!(backend.last_create_photos().is_empty());

    let page = get(&app, "/inspections").await;
    assert!(page.body.contains("INS-01"));
    assert!(page.body.contains("Parede Norte"));
}

#[tokio::test]
async fn test_pathology_regrades_asset_pages() {
    let backend = seeded().await;
    let app = app(&backend);

    assert!(get(&app, "/").await.body.contains(&critical_card(1)));
    let critical = get(&app, "/assets?condition_status=Critical").await;
    assert!(!critical.body.contains("Ativo #2"));

    let body = multipart(
        &[
            ("code", "INS-01"),
            ("asset_id", "2"),
            ("inspection_date", "2024-05-01T09:00"),
            ("has_pathology", "true"),
            ("severity", "1"),
            ("location", "Cobertura"),
        ],
        &[],
    );
    let page = post_multipart(&app, "/inspections", body).await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);

    assert!(get(&app, "/").await.body.contains(&critical_card(2)));
    let critical = get(&app, "/assets?condition_status=Critical").await;
    assert!(critical.body.contains("Ativo #2"));
}

#[tokio::test]
async fn test_create_inspection_analyzes_photos() {
    let backend = seeded().await;
    let app = app(&backend);

    let body = multipart(
        &[
            ("code", "INS-02"),
            ("asset_id", "1"),
            ("inspection_date", "2024-05-02T10:30"),
            ("has_pathology", "true"),
            ("severity", "2"),
            ("location", "Bloco A"),
        ],
        &[("photos", "fissura.jpg", b"\xff\xd8\xff")],
    );
    let page = post_multipart(&app, "/inspections", body).await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);

    let created = backend.inspections();
    assert_eq!(created.len(), 1);
    assert_eq!(backend.last_create_photos(), vec!["fissura.jpg".to_string()]);
    assert_eq!(backend.last_analyze_images(), vec!["fissura.jpg".to_string()]);
    assert!(backend
        .last_analyze_fields()
        .contains(&("inspection_id".to_string(), created[0].id.to_string())));

    let calls = backend.calls();
    let create = calls.iter().position(|c| c == "POST /api/inspections/").unwrap();
    let analyze = calls.iter().position(|c| c == "POST /api/ai/analyze").unwrap();
    assert!(create < analyze);
}

#[tokio::test]
async fn test_analysis_failure_still_redirects() {
    let backend = seeded().await;
    backend.fail_analysis(true);
    let app = app(&backend);

    let body = multipart(
        &[
            ("code", "INS-03"),
            ("asset_id", "1"),
            ("inspection_date", "2024-05-03T08:00"),
            ("location", "Bloco A"),
        ],
        &[("photos", "a.jpg", b"img")],
    );
    let page = post_multipart(&app, "/inspections", body).await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);
    assert_eq!(backend.inspections().len(), 1);
}

#[tokio::test]
async fn test_invalid_inspection_is_not_sent() {
    let backend = seeded().await;
    let app = app(&backend);

    let body = multipart(
        &[
            ("code", ""),
            ("asset_id", "1"),
            ("inspection_date", "2024-05-01T09:00"),
            ("has_pathology", "true"),
            ("location", "Bloco A"),
        ],
        &[],
    );
    let page = post_multipart(&app, "/inspections", body).await;
    assert_eq!(page.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(page.body.contains("field-error"));
    assert!(page.body.contains("value=\"Bloco A\""));
    assert_eq!(backend.count("POST /api/inspections/"), 0);
}

#[tokio::test]
async fn test_duplicate_code_keeps_form_open() {
    let backend = seeded().await;
    backend.add_inspection(inspection(10, "INS-10", 1, "2024-05-01T09:00:00"));
    let app = app(&backend);

    let body = multipart(
        &[
            ("code", "INS-10"),
            ("asset_id", "1"),
            ("inspection_date", "2024-05-01T09:00"),
            ("location", "Bloco A"),
        ],
        &[],
    );
    let page = post_multipart(&app, "/inspections", body).await;
    assert_eq!(page.status, StatusCode::BAD_REQUEST);
    assert!(page.body.contains("Inspection code already exists"));
    assert!(page.body.contains("value=\"INS-10\""));
}

#[tokio::test]
async fn test_new_form_preselects_asset() {
    let backend = seeded().await;
    let app = app(&backend);

    let page = get(&app, "/inspections/new?asset_id=2").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("<option value=\"2\" selected>Ativo #2</option>"));
}

#[tokio::test]
async fn test_inspection_detail_update_and_delete() {
    let backend = seeded().await;
    let mut record = inspection(10, "INS-10", 1, "2024-05-01T09:00:00");
    record.has_pathology = true;
    record.ai_analysis_performed = true;
    record.ai_confidence = Some(0.873);
    backend.add_inspection(record);
    let app = app(&backend);

    let page = get(&app, "/inspections/10").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Parede Norte"));
    assert!(page.body.contains("87.3%"));
    assert!(page.body.contains("name=\"severity\""));

    let page = post_form(&app, "/inspections/10", "severity=7").await;
    assert_eq!(page.status, StatusCode::UNPROCESSABLE_ENTITY);

    let page = post_form(&app, "/inspections/10", "severity=1&observations=Fissura+extensa").await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);
    assert_eq!(page.location.as_deref(), Some("/inspections/10"));
    let page = get(&app, "/inspections/10").await;
    assert!(page.body.contains("Fissura extensa"));

    let page = post_form(&app, "/inspections/10/delete", "").await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);
    assert_eq!(page.location.as_deref(), Some("/inspections"));
    assert!(backend.inspections().is_empty());

    let page = get(&app, "/inspections").await;
    assert!(page.body.contains("Nenhuma inspeção cadastrada."));

    let page = post_form(&app, "/inspections/10/delete", "").await;
    assert_eq!(page.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_edit_without_pathology_clears_observations() {
    let backend = seeded().await;
    let mut record = inspection(11, "INS-11", 2, "2024-05-01T09:00:00");
    record.observations = Some("Pintura descascando".into());
    backend.add_inspection(record);
    let app = app(&backend);

    let page = get(&app, "/inspections/11").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Pintura descascando"));
    assert!(!page.body.contains("name=\"severity\""));

    let page = post_form(&app, "/inspections/11", "severity=1&observations=").await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);
    let stored = backend.inspections();
    assert_eq!(stored[0].observations.as_deref(), Some(""));
    assert_eq!(stored[0].severity, None);

    let page = get(&app, "/inspections/11").await;
    assert!(!page.body.contains("Pintura descascando"));
}

#[tokio::test]
async fn test_viewer_upload() {
    let backend = seeded().await;
    let app = app(&backend);

    let page = post_multipart(&app, "/viewer/upload", multipart(&[], &[("file", "notes.txt", b"x")])).await;
    assert_eq!(page.status, StatusCode::BAD_REQUEST);
    assert_eq!(backend.count("POST /api/ifc/upload"), 0);

    let page = post_multipart(
        &app,
        "/viewer/upload",
        multipart(&[], &[("file", "torre.ifc", b"ISO-10303-21;")]),
    )
    .await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);
    let location = page.location.unwrap();
    assert!(location.starts_with("/viewer/"));

    let page = get(&app, &location).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("torre.ifc"));
    assert!(page.body.contains("id=\"scene-config\""));
}
