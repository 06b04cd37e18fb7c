// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Two-phase inspection submission.
//!
//! ```text
//! Idle -> Submitting -> Failed
//!                    -> Created -> NoPhotos -> Done
//!                               -> AnalyzingPhotos -> Done
//!                                                  -> DoneWithAnalysisError
//! Idle -> Invalid                       (rejected before dispatch)
//! ```
//!
//! The photo analysis runs strictly after the create call returned an id.
//! Its failure is logged and otherwise swallowed: the inspection already
//! exists and the form closes either way.

use crate::api::{ApiClient, Attachment};
use crate::error::{SubmissionError, TransportError};
use crate::queries::INSPECTIONS;
use crate::query::QueryCache;
use bimfm_core::{AnalysisResult, Inspection, InspectionDraft, NewInspection, ValidationErrors};
use std::future::Future;

/// Backend calls the submission needs.
pub trait InspectionGateway: Send + Sync {
    fn create_inspection(
        &self,
        inspection: &NewInspection,
        photos: &[Attachment],
    ) -> impl Future<Output = Result<Inspection, TransportError>> + Send;

    fn analyze_photos(
        &self,
        photos: &[Attachment],
        asset_id: Option<i64>,
        inspection_id: Option<i64>,
    ) -> impl Future<Output = Result<AnalysisResult, TransportError>> + Send;
}

impl InspectionGateway for ApiClient {
    fn create_inspection(
        &self,
        inspection: &NewInspection,
        photos: &[Attachment],
    ) -> impl Future<Output = Result<Inspection, TransportError>> + Send {
        ApiClient::create_inspection(self, inspection, photos)
    }

    fn analyze_photos(
        &self,
        photos: &[Attachment],
        asset_id: Option<i64>,
        inspection_id: Option<i64>,
    ) -> impl Future<Output = Result<AnalysisResult, TransportError>> + Send {
        ApiClient::analyze_photos(self, photos, asset_id, inspection_id)
    }
}

/// States of an inspection submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionState {
    Idle,
    /// Rejected client-side; nothing was sent.
    Invalid(ValidationErrors),
    Submitting,
    /// The create call failed; the form stays open.
    Failed(TransportError),
    Created { inspection_id: i64 },
    NoPhotos { inspection_id: i64 },
    AnalyzingPhotos { inspection_id: i64, photos: usize },
    Done { inspection_id: i64 },
    /// The inspection exists but the photo analysis failed.
    DoneWithAnalysisError { inspection_id: i64, error: TransportError },
}

impl SubmissionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Invalid(_) => "invalid",
            Self::Submitting => "submitting",
            Self::Failed(_) => "failed",
            Self::Created { .. } => "created",
            Self::NoPhotos { .. } => "no_photos",
            Self::AnalyzingPhotos { .. } => "analyzing_photos",
            Self::Done { .. } => "done",
            Self::DoneWithAnalysisError { .. } => "done_with_analysis_error",
        }
    }

    /// The form closes in these states.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::DoneWithAnalysisError { .. })
    }

    /// States from which the user may (re)submit.
    fn accepts_submit(&self) -> bool {
        matches!(self, Self::Idle | Self::Invalid(_) | Self::Failed(_))
    }
}

/// Drives one "Nova Inspeção" form through its states.
#[derive(Debug)]
pub struct InspectionSubmission {
    state: SubmissionState,
    history: Vec<SubmissionState>,
}

impl Default for InspectionSubmission {
    fn default() -> Self {
        Self::new()
    }
}

impl InspectionSubmission {
    pub fn new() -> Self {
        Self {
            state: SubmissionState::Idle,
            history: vec![SubmissionState::Idle],
        }
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn history(&self) -> &[SubmissionState] {
        &self.history
    }

    fn transition(&mut self, next: SubmissionState) {
        tracing::debug!(from = self.state.name(), to = next.name(), "Inspection submission");
        self.history.push(next.clone());
        self.state = next;
    }

    /// Validate, create, then analyze the photos if there are any.
    ///
    /// Returns the created inspection once a `Done*` state is reached; the
    /// `inspections` cache resource is invalidated at that point.
    pub async fn submit<G: InspectionGateway>(
        &mut self,
        gateway: &G,
        cache: &QueryCache,
        draft: &InspectionDraft,
        photos: &[Attachment],
    ) -> Result<Inspection, SubmissionError> {
        if !self.state.accepts_submit() {
            return Err(SubmissionError::InvalidTransition);
        }

        let new = match draft.validate() {
            Ok(new) => new,
            Err(errors) => {
                self.transition(SubmissionState::Invalid(errors.clone()));
                return Err(errors.into());
            }
        };

        self.transition(SubmissionState::Submitting);
        let created = match gateway.create_inspection(&new, photos).await {
            Ok(created) => created,
            Err(error) => {
                tracing::warn!(code = %new.code, error = %error, "Inspection creation failed");
                self.transition(SubmissionState::Failed(error.clone()));
                return Err(error.into());
            }
        };
        let inspection_id = created.id;
        self.transition(SubmissionState::Created { inspection_id });

        if photos.is_empty() {
            self.transition(SubmissionState::NoPhotos { inspection_id });
            self.transition(SubmissionState::Done { inspection_id });
        } else {
            self.transition(SubmissionState::AnalyzingPhotos {
                inspection_id,
                photos: photos.len(),
            });
            match gateway
                .analyze_photos(photos, Some(new.asset_id), Some(inspection_id))
                .await
            {
                Ok(result) => {
                    tracing::info!(
                        inspection_id,
                        detections = result.detections.len(),
                        confidence = result.confidence,
                        "Photo analysis complete"
                    );
                    self.transition(SubmissionState::Done { inspection_id });
                }
                Err(error) => {
                    tracing::warn!(inspection_id, error = %error, "Photo analysis failed");
                    self.transition(SubmissionState::DoneWithAnalysisError { inspection_id, error });
                }
            }
        }

        cache.invalidate_resource(INSPECTIONS);
        Ok(created)
    }
}
