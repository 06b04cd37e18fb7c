// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Records owned by the backend.
//!
//! These mirror the backend's JSON responses. Unknown fields are ignored and
//! optional fields default to `None`, so older or newer backends decode.

use crate::condition::ConditionStatus;
use crate::severity::Severity;
use crate::time::{iso, iso_opt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An uploaded building model (IFC file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub id: i64,
    pub filename: String,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub ifc_schema: Option<String>,
    #[serde(default)]
    pub processing_status: Option<String>,
    #[serde(default, with = "iso_opt")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// A physical building element with maintenance attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub ifc_type: String,
    pub ifc_guid: String,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub location_building: Option<String>,
    #[serde(default)]
    pub location_floor: Option<String>,
    #[serde(default)]
    pub location_room: Option<String>,
    #[serde(default)]
    pub condition_status: Option<ConditionStatus>,
    /// 1 (worst) to 4 (best).
    #[serde(default)]
    pub condition_score: Option<u8>,
    #[serde(default, with = "iso_opt")]
    pub last_inspection_date: Option<DateTime<Utc>>,
}

impl Asset {
    /// Name, or `Ativo #<id>` for unnamed assets.
    pub fn display_name(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => unnamed_asset(self.id),
        }
    }

    /// `building - floor - room`, skipping missing parts. `None` without a building.
    pub fn location(&self) -> Option<String> {
        let building = self.location_building.as_deref()?;
        let mut location = building.to_string();
        for part in [&self.location_floor, &self.location_room].into_iter().flatten() {
            location.push_str(" - ");
            location.push_str(part);
        }
        Some(location)
    }

    /// Worst condition score.
    pub fn is_critical(&self) -> bool {
        self.condition_score == Some(1)
    }
}

pub fn unnamed_asset(id: i64) -> String {
    format!("Ativo #{}", id)
}

/// A photo attached to exactly one inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: i64,
    pub file_path: String,
    pub file_name: String,
    #[serde(default, with = "iso_opt")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// A dated condition report for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inspection {
    pub id: i64,
    pub code: String,
    pub asset_id: i64,
    #[serde(with = "iso")]
    pub inspection_date: DateTime<Utc>,
    pub location: String,
    pub has_pathology: bool,
    /// Present whenever `has_pathology` is set.
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub pathology_type: Option<String>,
    #[serde(default)]
    pub observations: Option<String>,
    #[serde(default)]
    pub ai_analysis_performed: bool,
    /// In `[0, 1]`.
    #[serde(default)]
    pub ai_confidence: Option<f64>,
    #[serde(default)]
    pub ai_heatmap_path: Option<String>,
    #[serde(default)]
    pub ai_detection_mask_path: Option<String>,
    #[serde(default)]
    pub photos: Vec<Photo>,
}

/// Server-computed inspection counters for an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetStatistics {
    pub total_inspections: u64,
    pub inspections_with_pathology: u64,
    #[serde(default, with = "iso_opt")]
    pub latest_inspection_date: Option<DateTime<Utc>>,
}

/// Response of the photo analysis endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub success: bool,
    #[serde(default)]
    pub detections: Vec<serde_json::Value>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub mask_path: Option<String>,
    #[serde(default)]
    pub heatmap_path: Option<String>,
    #[serde(default)]
    pub result_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_backend_inspection() {
        let json = r#"{
            "id": 7, "code": "INS-07", "asset_id": 2,
            "inspection_date": "2024-05-01T09:00:00",
            "has_pathology": true, "severity": 2, "location": "Floor 3",
            "observations": null, "pathology_type": "Fissura",
            "ai_analysis_performed": false, "ai_confidence": null,
            "photos": [{"id": 1, "file_name": "a.jpg", "file_path": "/uploads/a.jpg",
                        "uploaded_at": "2024-05-01T09:01:00"}],
            "created_at": "2024-05-01T09:01:00", "updated_at": "2024-05-01T09:01:00"
        }"#;
        let inspection: Inspection = serde_json::from_str(json).unwrap();
        assert_eq!(inspection.severity, Some(Severity::POOR));
        assert_eq!(inspection.photos.len(), 1);
        assert!(inspection.ai_heatmap_path.is_none());
    }

    #[test]
    fn test_asset_display_helpers() {
        let json = r#"{"id": 3, "ifc_type": "IfcDoor", "ifc_guid": "2O2Fr$t4X7Zf8NOew3FLOH",
                       "location_building": "Bloco A", "location_room": "101",
                       "condition_status": "Critical", "condition_score": 1}"#;
        let asset: Asset = serde_json::from_str(json).unwrap();
        assert_eq!(asset.display_name(), "Ativo #3");
        assert_eq!(asset.location().as_deref(), Some("Bloco A - 101"));
        assert!(asset.is_critical());
    }
}
