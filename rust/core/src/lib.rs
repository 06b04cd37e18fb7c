// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # BIM-FM Core
//!
//! Domain types shared by the BIM-FM front-end crates.
//!
//! ## Overview
//!
//! - **Records**: [`ModelFile`], [`Asset`], [`Inspection`], [`Photo`] as the
//!   backend returns them
//! - **Wire values**: [`Severity`] (1 = critical .. 4 = good) and
//!   [`ConditionStatus`], preserved exactly as encoded by the backend
//! - **Forms**: drafts holding raw user input and their validated payloads
//! - **Aggregates**: dashboard counters and condition shares
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bimfm_core::{InspectionDraft, DashboardStats};
//!
//! let mut draft = InspectionDraft::new(Some(2));
//! draft.code = "INS-01".into();
//! draft.location = "Floor 3".into();
//! let payload = draft.validate()?;
//!
//! let stats = DashboardStats::compute(&files, &assets, &inspections);
//! println!("critical assets: {}", stats.critical_assets);
//! ```

pub mod condition;
pub mod error;
pub mod forms;
pub mod model;
pub mod severity;
pub mod stats;
pub mod time;

pub use condition::{condition_color, condition_text, ConditionStatus};
pub use error::{ValidationError, ValidationErrors, ValueError};
pub use forms::{
    validate_model_filename, AssetUpdate, AssetUpdateDraft, InspectionDraft, InspectionUpdate,
    InspectionUpdateDraft, NewInspection,
};
pub use model::{unnamed_asset, AnalysisResult, Asset, AssetStatistics, Inspection, ModelFile, Photo};
pub use severity::{severity_color, severity_label, Severity};
pub use stats::{condition_breakdown, recent_inspections, ConditionBar, DashboardStats};
