// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Form drafts and their validated payloads.
//!
//! A draft holds the raw text a user typed so a rejected form can be shown
//! again unchanged. `validate` turns it into the payload sent to the
//! backend, or the list of field errors.

use crate::condition::{parse_condition_score, ConditionStatus};
use crate::error::{ValidationError, ValidationErrors};
use crate::severity::Severity;
use crate::time::{parse_timestamp, to_wire};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw input of the "Nova Inspeção" form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InspectionDraft {
    pub code: String,
    pub asset_id: String,
    pub inspection_date: String,
    pub has_pathology: bool,
    pub severity: String,
    pub location: String,
    pub observations: String,
    pub pathology_type: String,
}

impl InspectionDraft {
    /// Empty draft dated now, optionally preselecting an asset.
    pub fn new(asset_id: Option<i64>) -> Self {
        Self {
            asset_id: asset_id.map(|id| id.to_string()).unwrap_or_default(),
            inspection_date: crate::time::to_input_value(&Utc::now()),
            ..Self::default()
        }
    }

    /// Checks required fields; severity is required iff a pathology is flagged.
    pub fn validate(&self) -> Result<NewInspection, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let code = required(&self.code, "code", &mut errors);
        let asset_id = match self.asset_id.trim() {
            "" => {
                errors.push(ValidationError::required("asset_id"));
                None
            }
            raw => match raw.parse::<i64>() {
                Ok(id) if id > 0 => Some(id),
                _ => {
                    errors.push(ValidationError::new("asset_id", "Ativo inválido"));
                    None
                }
            },
        };
        let inspection_date = match self.inspection_date.trim() {
            "" => {
                errors.push(ValidationError::required("inspection_date"));
                None
            }
            raw => match parse_timestamp(raw) {
                Ok(dt) => Some(dt),
                Err(_) => {
                    errors.push(ValidationError::new("inspection_date", "Data inválida"));
                    None
                }
            },
        };
        let location = required(&self.location, "location", &mut errors);

        let severity = if self.has_pathology {
            match self.severity.trim() {
                "" => {
                    errors.push(ValidationError::required("severity"));
                    None
                }
                raw => match raw.parse::<Severity>() {
                    Ok(severity) => Some(severity),
                    Err(_) => {
                        errors.push(ValidationError::new(
                            "severity",
                            "Severidade deve estar entre 1 e 4",
                        ));
                        None
                    }
                },
            }
        } else {
            None
        };

        match (code, asset_id, inspection_date, location) {
            (Some(code), Some(asset_id), Some(inspection_date), Some(location))
                if errors.is_empty() =>
            {
                Ok(NewInspection {
                    code,
                    asset_id,
                    inspection_date,
                    has_pathology: self.has_pathology,
                    severity,
                    location,
                    observations: optional(&self.observations),
                    pathology_type: optional(&self.pathology_type),
                })
            }
            _ => Err(errors),
        }
    }
}

/// A validated inspection ready to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInspection {
    pub code: String,
    pub asset_id: i64,
    pub inspection_date: DateTime<Utc>,
    pub has_pathology: bool,
    pub severity: Option<Severity>,
    pub location: String,
    pub observations: Option<String>,
    pub pathology_type: Option<String>,
}

impl NewInspection {
    /// Text fields of the multipart create request, in submission order.
    ///
    /// `severity` is only emitted together with `has_pathology = true`.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("code", self.code.clone()),
            ("asset_id", self.asset_id.to_string()),
            ("inspection_date", to_wire(&self.inspection_date)),
            ("has_pathology", self.has_pathology.to_string()),
        ];
        if self.has_pathology {
            if let Some(severity) = self.severity {
                fields.push(("severity", severity.to_string()));
            }
        }
        fields.push(("location", self.location.clone()));
        if let Some(observations) = &self.observations {
            fields.push(("observations", observations.clone()));
        }
        if let Some(pathology_type) = &self.pathology_type {
            fields.push(("pathology_type", pathology_type.clone()));
        }
        fields
    }
}

/// Raw input of the inspection edit form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InspectionUpdateDraft {
    #[serde(default)]
    pub observations: String,
    #[serde(default)]
    pub severity: String,
}

impl InspectionUpdateDraft {
    /// Observations are always sent, so clearing the textarea clears them on the record.
    pub fn validate(&self) -> Result<InspectionUpdate, ValidationErrors> {
        let severity = match self.severity.trim() {
            "" => None,
            raw => Some(raw.parse::<Severity>().map_err(|_| {
                ValidationError::new("severity", "Severidade deve estar entre 1 e 4")
            })?),
        };
        Ok(InspectionUpdate {
            observations: Some(self.observations.trim().to_string()),
            severity,
        })
    }
}

/// Partial inspection update (`PUT /api/inspections/{id}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InspectionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

/// Raw input of the asset edit form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AssetUpdateDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub condition_status: String,
    #[serde(default)]
    pub condition_score: String,
}

impl AssetUpdateDraft {
    pub fn validate(&self) -> Result<AssetUpdate, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let condition_status = match self.condition_status.trim() {
            "" => None,
            raw => match raw.parse::<ConditionStatus>() {
                Ok(status) => Some(status),
                Err(_) => {
                    errors.push(ValidationError::new("condition_status", "Condição inválida"));
                    None
                }
            },
        };
        let condition_score = match self.condition_score.trim() {
            "" => None,
            raw => match parse_condition_score(raw) {
                Ok(score) => Some(score),
                Err(_) => {
                    errors.push(ValidationError::new(
                        "condition_score",
                        "Score deve estar entre 1 e 4",
                    ));
                    None
                }
            },
        };

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(AssetUpdate {
            name: optional(&self.name),
            description: optional(&self.description),
            manufacturer: optional(&self.manufacturer),
            condition_status,
            condition_score,
        })
    }
}

/// Partial asset update (`PUT /api/assets/{id}`). Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssetUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_status: Option<ConditionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_score: Option<u8>,
}

/// Model uploads must carry an `.ifc` extension.
pub fn validate_model_filename(filename: &str) -> Result<(), ValidationErrors> {
    let filename = filename.trim();
    if filename.is_empty() {
        return Err(ValidationError::required("file").into());
    }
    if !filename.to_ascii_lowercase().ends_with(".ifc") {
        return Err(ValidationError::new("file", "O arquivo deve estar no formato .ifc").into());
    }
    Ok(())
}

fn required(value: &str, field: &'static str, errors: &mut ValidationErrors) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        errors.push(ValidationError::required(field));
        None
    } else {
        Some(value.to_string())
    }
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> InspectionDraft {
        InspectionDraft {
            code: "INS-01".into(),
            asset_id: "2".into(),
            inspection_date: "2024-05-01T09:00".into(),
            has_pathology: true,
            severity: "2".into(),
            location: "Floor 3".into(),
            ..InspectionDraft::default()
        }
    }

    fn field<'a>(fields: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
        fields.iter().find(|(n, _)| *n == name).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_pathology_requires_severity() {
        let mut d = draft();
        d.severity.clear();
        let errors = d.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.field("severity").is_some());

        d.severity = "5".into();
        assert!(d.validate().unwrap_err().field("severity").is_some());
    }

    #[test]
    fn test_severity_dropped_without_pathology() {
        let mut d = draft();
        d.has_pathology = false;
        let new = d.validate().unwrap();
        assert_eq!(new.severity, None);
        let fields = new.form_fields();
        assert_eq!(field(&fields, "has_pathology"), Some("false"));
        assert_eq!(field(&fields, "severity"), None);
    }

    #[test]
    fn test_form_fields_wire_shape() {
        let fields = draft().validate().unwrap().form_fields();
        assert_eq!(field(&fields, "severity"), Some("2"));
        assert_eq!(field(&fields, "inspection_date"), Some("2024-05-01T09:00:00.000Z"));
        assert_eq!(field(&fields, "observations"), None);
        assert_eq!(field(&fields, "pathology_type"), None);
    }

    #[test]
    fn test_missing_required_fields_are_all_reported() {
        let errors = InspectionDraft::default().validate().unwrap_err();
        for name in ["code", "asset_id", "inspection_date", "location"] {
            assert!(errors.field(name).is_some(), "missing error for {}", name);
        }
        assert!(errors.field("severity").is_none());
    }

    #[test]
    fn test_blank_observations_clear_the_record() {
        let update = InspectionUpdateDraft {
            observations: "  ".into(),
            severity: String::new(),
        }
        .validate()
        .unwrap();
        assert_eq!(update.observations.as_deref(), Some(""));
        assert_eq!(update.severity, None);
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"observations": ""}));
    }

    #[test]
    fn test_asset_update_omits_blank_fields() {
        let update = AssetUpdateDraft {
            condition_status: "Poor".into(),
            condition_score: "2".into(),
            ..Default::default()
        }
        .validate()
        .unwrap();
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"condition_status": "Poor", "condition_score": 2}));
    }

    #[test]
    fn test_model_filename_extension() {
        assert!(validate_model_filename("Ponte.IFC").is_ok());
        assert!(validate_model_filename("ponte.ifczip").is_err());
        assert!(validate_model_filename("").is_err());
    }
}
