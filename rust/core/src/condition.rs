// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Asset condition status and score.

use crate::error::ValueError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Colour for assets without a (known) condition.
pub const NO_CONDITION_COLOR: &str = "#95a5a6";

/// Condition of an asset as reported by the backend.
///
/// The backend stores the status as free text; anything other than the four
/// known grades decodes to [`ConditionStatus::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
    Good,
    Fair,
    Poor,
    Critical,
    #[serde(other)]
    Unknown,
}

impl ConditionStatus {
    /// Known grades in dashboard order.
    pub const GRADES: [ConditionStatus; 4] = [Self::Good, Self::Fair, Self::Poor, Self::Critical];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::Critical => "Critical",
            Self::Unknown => "Unknown",
        }
    }

    /// Portuguese label used by the status filter.
    pub fn label(self) -> &'static str {
        match self {
            Self::Good => "Bom",
            Self::Fair => "Regular",
            Self::Poor => "Ruim",
            Self::Critical => "Crítico",
            Self::Unknown => "N/A",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Self::Good => "#27ae60",
            Self::Fair => "#f1c40f",
            Self::Poor => "#f39c12",
            Self::Critical => "#e74c3c",
            Self::Unknown => NO_CONDITION_COLOR,
        }
    }
}

impl FromStr for ConditionStatus {
    type Err = ValueError;

    /// Parses one of the four known grades; `Unknown` is never produced.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::GRADES
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| ValueError::ConditionStatus(s.to_string()))
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text for an optional status ("N/A" for null or unknown).
pub fn condition_text(status: Option<ConditionStatus>) -> &'static str {
    match status {
        Some(ConditionStatus::Unknown) | None => "N/A",
        Some(status) => status.as_str(),
    }
}

pub fn condition_color(status: Option<ConditionStatus>) -> &'static str {
    status.map_or(NO_CONDITION_COLOR, ConditionStatus::color)
}

/// Parses a condition score (1 = worst, 4 = best).
pub fn parse_condition_score(s: &str) -> Result<u8, ValueError> {
    s.trim()
        .parse::<u8>()
        .ok()
        .filter(|score| (1..=4).contains(score))
        .ok_or_else(|| ValueError::ConditionScore(s.to_string()))
}
