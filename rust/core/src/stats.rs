// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Read-only aggregates rendered by the dashboard and detail pages.
//!
//! Everything here is a pure, order-independent reduction over collections
//! that were already fetched.

use crate::condition::ConditionStatus;
use crate::model::{Asset, Inspection, ModelFile};

/// Number of inspections listed under "Últimas Inspeções".
pub const RECENT_INSPECTIONS: usize = 5;

/// Counters shown in the dashboard stat cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_model_files: usize,
    pub total_assets: usize,
    pub total_inspections: usize,
    pub inspections_with_pathology: usize,
    /// Assets with condition score 1.
    pub critical_assets: usize,
}

impl DashboardStats {
    pub fn compute(files: &[ModelFile], assets: &[Asset], inspections: &[Inspection]) -> Self {
        Self {
            total_model_files: files.len(),
            total_assets: assets.len(),
            total_inspections: inspections.len(),
            inspections_with_pathology: inspections.iter().filter(|i| i.has_pathology).count(),
            critical_assets: assets.iter().filter(|a| a.is_critical()).count(),
        }
    }
}

/// One bar of the "Ativos por Condição" chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditionBar {
    pub status: ConditionStatus,
    pub count: usize,
    /// Share of all assets, `0.0..=100.0`.
    pub percent: f64,
}

/// Count and share of assets per known condition, in [`ConditionStatus::GRADES`] order.
///
/// Assets without a known status count towards the total only. With no
/// assets every share is 0.
pub fn condition_breakdown(assets: &[Asset]) -> Vec<ConditionBar> {
    let total = assets.len();
    ConditionStatus::GRADES
        .into_iter()
        .map(|status| {
            let count = assets
                .iter()
                .filter(|a| a.condition_status == Some(status))
                .count();
            ConditionBar {
                status,
                count,
                percent: percent(count, total),
            }
        })
        .collect()
}

/// First [`RECENT_INSPECTIONS`] inspections in backend order (newest first).
pub fn recent_inspections(inspections: &[Inspection]) -> &[Inspection] {
    &inspections[..inspections.len().min(RECENT_INSPECTIONS)]
}

/// `part / total` as a percentage, 0 when `total` is 0.
pub fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}
