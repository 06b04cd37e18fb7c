// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-process fake of the BIM-FM backend for integration tests.
//!
//! Serves the same routes as the real backend from in-memory records on an
//! ephemeral port, and records every call as `"METHOD /path"` so tests can
//! assert on call counts and ordering.

use crate::api::{ApiClient, IMAGES_FIELD, MODEL_FILE_FIELD, PHOTOS_FIELD};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bimfm_core::time::parse_timestamp;
use bimfm_core::{
    AnalysisResult, Asset, AssetStatistics, ConditionStatus, Inspection, ModelFile, Photo, Severity,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

type Shared = Arc<Mutex<FakeState>>;
type Reply<T> = Result<Json<T>, (StatusCode, Json<Value>)>;

#[derive(Default)]
struct FakeState {
    files: Vec<ModelFile>,
    /// `(model file id, asset)`.
    assets: Vec<(i64, Asset)>,
    inspections: Vec<Inspection>,
    next_id: i64,
    calls: Vec<String>,
    fail_analysis: bool,
    create_fields: Vec<(String, String)>,
    create_photos: Vec<String>,
    analyze_fields: Vec<(String, String)>,
    analyze_images: Vec<String>,
}

impl FakeState {
    fn record(&mut self, call: String) {
        self.calls.push(call);
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

fn detail(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "detail": message })))
}

/// A running fake backend. The server stops when this is dropped.
pub struct FakeBackend {
    addr: SocketAddr,
    state: Shared,
    task: JoinHandle<()>,
}

impl FakeBackend {
    /// Bind on `127.0.0.1:0` and serve in a background task.
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState {
            next_id: 100,
            ..Default::default()
        }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake backend");
        let addr = listener.local_addr().expect("fake backend address");
        let app = router(state.clone());
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self { addr, state, task }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::new(&self.url())
    }

    pub fn add_file(&self, file: ModelFile) {
        self.lock().files.push(file);
    }

    /// Register `asset` as extracted from model file `file_id`.
    pub fn add_asset(&self, file_id: i64, asset: Asset) {
        self.lock().assets.push((file_id, asset));
    }

    pub fn add_inspection(&self, inspection: Inspection) {
        self.lock().inspections.push(inspection);
    }

    /// Make `POST /api/ai/analyze` answer 500.
    pub fn fail_analysis(&self, fail: bool) {
        self.lock().fail_analysis = fail;
    }

    /// Every call so far, in arrival order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// How often `call` (e.g. `"GET /api/assets/"`) was received.
    pub fn count(&self, call: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == call).count()
    }

    /// Text fields of the last inspection create.
    pub fn last_create_fields(&self) -> Vec<(String, String)> {
        self.lock().create_fields.clone()
    }

    /// File names of the photos sent with the last inspection create.
    pub fn last_create_photos(&self) -> Vec<String> {
        self.lock().create_photos.clone()
    }

    /// Text fields of the last analysis request.
    pub fn last_analyze_fields(&self) -> Vec<(String, String)> {
        self.lock().analyze_fields.clone()
    }

    pub fn last_analyze_images(&self) -> Vec<String> {
        self.lock().analyze_images.clone()
    }

    pub fn inspections(&self) -> Vec<Inspection> {
        self.lock().inspections.clone()
    }

    pub fn assets(&self) -> Vec<Asset> {
        self.lock().assets.iter().map(|(_, a)| a.clone()).collect()
    }

    pub fn files(&self) -> Vec<ModelFile> {
        self.lock().files.clone()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A model file record with only the required fields set.
pub fn model_file(id: i64, filename: &str) -> ModelFile {
    ModelFile {
        id,
        filename: filename.to_string(),
        project_name: None,
        file_path: None,
        file_size: None,
        ifc_schema: Some("IFC4".to_string()),
        processing_status: Some("completed".to_string()),
        uploaded_at: None,
    }
}

/// An asset record with a name and optional condition.
pub fn asset(id: i64, name: Option<&str>, condition: Option<ConditionStatus>, score: Option<u8>) -> Asset {
    Asset {
        id,
        name: name.map(str::to_string),
        description: None,
        ifc_type: "IfcWall".to_string(),
        ifc_guid: format!("GUID{:04}", id),
        manufacturer: None,
        serial_number: None,
        location_building: None,
        location_floor: None,
        location_room: None,
        condition_status: condition,
        condition_score: score,
        last_inspection_date: None,
    }
}

/// An inspection record without pathology. `date` is an ISO-8601 timestamp.
pub fn inspection(id: i64, code: &str, asset_id: i64, date: &str) -> Inspection {
    Inspection {
        id,
        code: code.to_string(),
        asset_id,
        inspection_date: parse_timestamp(date).expect("valid timestamp"),
        location: "Pavimento 1".to_string(),
        has_pathology: false,
        severity: None,
        pathology_type: None,
        observations: None,
        ai_analysis_performed: false,
        ai_confidence: None,
        ai_heatmap_path: None,
        ai_detection_mask_path: None,
        photos: Vec::new(),
    }
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/ifc/", get(list_files))
        .route("/api/ifc/upload", post(upload_file))
        .route("/api/ifc/:id", get(get_file))
        .route("/api/ifc/:id/elements", get(file_elements))
        .route("/api/ifc/:id/assets", get(file_assets))
        .route("/api/assets/", get(list_assets))
        .route("/api/assets/:id", get(get_asset).put(update_asset))
        .route("/api/assets/:id/inspections", get(asset_inspections))
        .route("/api/assets/:id/statistics", get(asset_statistics))
        .route("/api/inspections/", get(list_inspections).post(create_inspection))
        .route(
            "/api/inspections/:id",
            get(get_inspection).put(update_inspection).delete(delete_inspection),
        )
        .route("/api/ai/analyze", post(analyze))
        .with_state(state)
}

fn lock(state: &Shared) -> MutexGuard<'_, FakeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Text fields and `(field, file name, size)` of file parts.
#[allow(clippy::type_complexity)]
async fn read_multipart(
    mut multipart: Multipart,
) -> Result<(Vec<(String, String)>, Vec<(String, String, usize)>), (StatusCode, Json<Value>)> {
    let mut fields = Vec::new();
    let mut files = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(detail(StatusCode::BAD_REQUEST, &e.to_string())),
        };
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| detail(StatusCode::BAD_REQUEST, &e.to_string()))?;
                files.push((name, file_name, data.len()));
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| detail(StatusCode::BAD_REQUEST, &e.to_string()))?;
                fields.push((name, text));
            }
        }
    }
    Ok((fields, files))
}

fn field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
    fields.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
}

fn sorted_desc(mut inspections: Vec<Inspection>) -> Vec<Inspection> {
    inspections.sort_by(|a, b| b.inspection_date.cmp(&a.inspection_date));
    inspections
}

// ---- IFC model files ----

async fn list_files(State(state): State<Shared>) -> Json<Vec<ModelFile>> {
    let mut state = lock(&state);
    state.record("GET /api/ifc/".into());
    Json(state.files.clone())
}

async fn get_file(State(state): State<Shared>, Path(id): Path<i64>) -> Reply<ModelFile> {
    let mut state = lock(&state);
    state.record(format!("GET /api/ifc/{}", id));
    state
        .files
        .iter()
        .find(|f| f.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, "IFC file not found"))
}

async fn upload_file(State(state): State<Shared>, multipart: Multipart) -> Reply<ModelFile> {
    let (_, files) = read_multipart(multipart).await?;
    let mut state = lock(&state);
    state.record("POST /api/ifc/upload".into());

    let Some((_, filename, size)) = files.into_iter().find(|(name, _, _)| name == MODEL_FILE_FIELD) else {
        return Err(detail(StatusCode::UNPROCESSABLE_ENTITY, "field required"));
    };
    if !filename.to_lowercase().ends_with(".ifc") {
        return Err(detail(StatusCode::BAD_REQUEST, "Only IFC files are allowed"));
    }
    let mut file = model_file(state.next_id(), &filename);
    file.file_size = Some(size as u64);
    state.files.push(file.clone());
    Ok(Json(file))
}

async fn file_elements(State(state): State<Shared>, Path(id): Path<i64>) -> Json<Vec<Value>> {
    let mut state = lock(&state);
    state.record(format!("GET /api/ifc/{}/elements", id));
    Json(
        state
            .assets
            .iter()
            .filter(|(file_id, _)| *file_id == id)
            .map(|(_, a)| json!({ "global_id": a.ifc_guid, "ifc_type": a.ifc_type, "name": a.name }))
            .collect(),
    )
}

async fn file_assets(State(state): State<Shared>, Path(id): Path<i64>) -> Json<Vec<Asset>> {
    let mut state = lock(&state);
    state.record(format!("GET /api/ifc/{}/assets", id));
    Json(
        state
            .assets
            .iter()
            .filter(|(file_id, _)| *file_id == id)
            .map(|(_, a)| a.clone())
            .collect(),
    )
}

// ---- Assets ----

#[derive(Deserialize)]
struct AssetParams {
    ifc_file_id: Option<i64>,
    condition_status: Option<String>,
}

async fn list_assets(State(state): State<Shared>, Query(params): Query<AssetParams>) -> Json<Vec<Asset>> {
    let mut state = lock(&state);
    state.record("GET /api/assets/".into());
    Json(
        state
            .assets
            .iter()
            .filter(|(file_id, _)| params.ifc_file_id.map_or(true, |id| id == *file_id))
            .filter(|(_, a)| {
                params.condition_status.as_deref().map_or(true, |wanted| {
                    a.condition_status.map(ConditionStatus::as_str) == Some(wanted)
                })
            })
            .map(|(_, a)| a.clone())
            .collect(),
    )
}

async fn get_asset(State(state): State<Shared>, Path(id): Path<i64>) -> Reply<Asset> {
    let mut state = lock(&state);
    state.record(format!("GET /api/assets/{}", id));
    state
        .assets
        .iter()
        .find(|(_, a)| a.id == id)
        .map(|(_, a)| Json(a.clone()))
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Asset not found"))
}

/// Merge the JSON body into the stored record, like a partial update.
fn merge<T: serde::Serialize + serde::de::DeserializeOwned>(record: &T, update: &Value) -> Option<T> {
    let mut value = serde_json::to_value(record).ok()?;
    if let (Some(target), Some(changes)) = (value.as_object_mut(), update.as_object()) {
        for (key, change) in changes {
            target.insert(key.clone(), change.clone());
        }
    }
    serde_json::from_value(value).ok()
}

async fn update_asset(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    Json(update): Json<Value>,
) -> Reply<Asset> {
    let mut state = lock(&state);
    state.record(format!("PUT /api/assets/{}", id));
    let Some((_, asset)) = state.assets.iter_mut().find(|(_, a)| a.id == id) else {
        return Err(detail(StatusCode::NOT_FOUND, "Asset not found"));
    };
    let updated = merge(&*asset, &update).ok_or_else(|| detail(StatusCode::UNPROCESSABLE_ENTITY, "invalid update"))?;
    *asset = updated.clone();
    Ok(Json(updated))
}

async fn asset_inspections(State(state): State<Shared>, Path(id): Path<i64>) -> Json<Vec<Inspection>> {
    let mut state = lock(&state);
    state.record(format!("GET /api/assets/{}/inspections", id));
    Json(sorted_desc(
        state.inspections.iter().filter(|i| i.asset_id == id).cloned().collect(),
    ))
}

async fn asset_statistics(State(state): State<Shared>, Path(id): Path<i64>) -> Json<AssetStatistics> {
    let mut state = lock(&state);
    state.record(format!("GET /api/assets/{}/statistics", id));
    let of_asset: Vec<&Inspection> = state.inspections.iter().filter(|i| i.asset_id == id).collect();
    Json(AssetStatistics {
        total_inspections: of_asset.len() as u64,
        inspections_with_pathology: of_asset.iter().filter(|i| i.has_pathology).count() as u64,
        latest_inspection_date: of_asset.iter().map(|i| i.inspection_date).max(),
    })
}

// ---- Inspections ----

#[derive(Deserialize)]
struct InspectionParams {
    asset_id: Option<i64>,
}

async fn list_inspections(
    State(state): State<Shared>,
    Query(params): Query<InspectionParams>,
) -> Json<Vec<Inspection>> {
    let mut state = lock(&state);
    state.record("GET /api/inspections/".into());
    Json(sorted_desc(
        state
            .inspections
            .iter()
            .filter(|i| params.asset_id.map_or(true, |id| id == i.asset_id))
            .cloned()
            .collect(),
    ))
}

async fn get_inspection(State(state): State<Shared>, Path(id): Path<i64>) -> Reply<Inspection> {
    let mut state = lock(&state);
    state.record(format!("GET /api/inspections/{}", id));
    state
        .inspections
        .iter()
        .find(|i| i.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Inspection not found"))
}

async fn create_inspection(State(state): State<Shared>, multipart: Multipart) -> Reply<Inspection> {
    let (fields, files) = read_multipart(multipart).await?;
    let mut state = lock(&state);
    state.record("POST /api/inspections/".into());
    state.create_fields = fields.clone();
    state.create_photos = files
        .iter()
        .filter(|(name, _, _)| name == PHOTOS_FIELD)
        .map(|(_, file_name, _)| file_name.clone())
        .collect();

    let required = |name: &str| {
        field(&fields, name)
            .map(str::to_string)
            .ok_or_else(|| detail(StatusCode::UNPROCESSABLE_ENTITY, &format!("{}: field required", name)))
    };
    let code = required("code")?;
    let asset_id: i64 = required("asset_id")?
        .parse()
        .map_err(|_| detail(StatusCode::UNPROCESSABLE_ENTITY, "asset_id: invalid integer"))?;
    let inspection_date = parse_timestamp(&required("inspection_date")?)
        .map_err(|e| detail(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string()))?;
    let location = required("location")?;
    let has_pathology = field(&fields, "has_pathology") == Some("true");
    let severity = match field(&fields, "severity") {
        Some(raw) => Some(
            raw.parse::<Severity>()
                .map_err(|e| detail(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string()))?,
        ),
        None => None,
    };

    if state.inspections.iter().any(|i| i.code == code) {
        return Err(detail(StatusCode::BAD_REQUEST, "Inspection code already exists"));
    }
    if !state.assets.iter().any(|(_, a)| a.id == asset_id) {
        return Err(detail(StatusCode::NOT_FOUND, "Asset not found"));
    }

    let id = state.next_id();
    let mut created = inspection(id, &code, asset_id, "2000-01-01T00:00:00Z");
    created.inspection_date = inspection_date;
    created.location = location;
    created.has_pathology = has_pathology;
    created.severity = severity;
    created.observations = field(&fields, "observations").map(str::to_string);
    created.pathology_type = field(&fields, "pathology_type").map(str::to_string);
    let photo_names = state.create_photos.clone();
    for file_name in photo_names {
        let photo_id = state.next_id();
        created.photos.push(Photo {
            id: photo_id,
            file_path: format!("uploads/inspections/{}/{}", id, file_name),
            file_name,
            uploaded_at: None,
        });
    }
    if let Some(severity) = severity.filter(|_| has_pathology) {
        if let Some((_, asset)) = state.assets.iter_mut().find(|(_, a)| a.id == asset_id) {
            asset.condition_score = Some(severity.value());
            asset.condition_status = Some(severity.condition());
            asset.last_inspection_date = Some(inspection_date);
        }
    }
    state.inspections.push(created.clone());
    Ok(Json(created))
}

async fn update_inspection(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    Json(update): Json<Value>,
) -> Reply<Inspection> {
    let mut state = lock(&state);
    state.record(format!("PUT /api/inspections/{}", id));
    let Some(inspection) = state.inspections.iter_mut().find(|i| i.id == id) else {
        return Err(detail(StatusCode::NOT_FOUND, "Inspection not found"));
    };
    let updated =
        merge(&*inspection, &update).ok_or_else(|| detail(StatusCode::UNPROCESSABLE_ENTITY, "invalid update"))?;
    *inspection = updated.clone();
    Ok(Json(updated))
}

async fn delete_inspection(State(state): State<Shared>, Path(id): Path<i64>) -> Reply<Value> {
    let mut state = lock(&state);
    state.record(format!("DELETE /api/inspections/{}", id));
    let before = state.inspections.len();
    state.inspections.retain(|i| i.id != id);
    if state.inspections.len() == before {
        return Err(detail(StatusCode::NOT_FOUND, "Inspection not found"));
    }
    Ok(Json(json!({ "message": "Inspection deleted successfully" })))
}

// ---- AI analysis ----

async fn analyze(State(state): State<Shared>, multipart: Multipart) -> Reply<AnalysisResult> {
    let (fields, files) = read_multipart(multipart).await?;
    let mut state = lock(&state);
    state.record("POST /api/ai/analyze".into());
    state.analyze_fields = fields.clone();
    state.analyze_images = files
        .iter()
        .filter(|(name, _, _)| name == IMAGES_FIELD)
        .map(|(_, file_name, _)| file_name.clone())
        .collect();

    if state.fail_analysis {
        return Err(detail(StatusCode::INTERNAL_SERVER_ERROR, "Model not loaded"));
    }
    if state.analyze_images.is_empty() {
        return Err(detail(StatusCode::BAD_REQUEST, "No images provided"));
    }

    let confidence = 0.87;
    if let Some(inspection_id) = field(&fields, "inspection_id").and_then(|raw| raw.parse::<i64>().ok()) {
        if let Some(inspection) = state.inspections.iter_mut().find(|i| i.id == inspection_id) {
            inspection.ai_analysis_performed = true;
            inspection.ai_confidence = Some(confidence);
        }
    }
    Ok(Json(AnalysisResult {
        success: true,
        detections: vec![json!({ "class": "fissura", "confidence": confidence })],
        confidence,
        mask_path: None,
        heatmap_path: None,
        result_path: None,
    }))
}
