// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pathology severity, encoded 1 (critical) to 4 (good) on the wire.

use crate::condition::ConditionStatus;
use crate::error::ValueError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Badge colour used when no severity is recorded.
pub const NO_SEVERITY_COLOR: &str = "#95a5a6";

/// Severity of an inspection's pathology.
///
/// The ordering is inverted with respect to intuition: `1` is the most
/// serious grade. The numeric encoding is kept as-is for compatibility with
/// the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Severity(u8);

impl Severity {
    pub const CRITICAL: Severity = Severity(1);
    pub const POOR: Severity = Severity(2);
    pub const REGULAR: Severity = Severity(3);
    pub const GOOD: Severity = Severity(4);

    /// All grades, most serious first.
    pub const ALL: [Severity; 4] = [Self::CRITICAL, Self::POOR, Self::REGULAR, Self::GOOD];

    pub fn new(value: u8) -> Option<Self> {
        (1..=4).contains(&value).then_some(Severity(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Portuguese label shown in badges and selects.
    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "Crítico",
            2 => "Ruim",
            3 => "Regular",
            _ => "Bom",
        }
    }

    pub fn color(self) -> &'static str {
        match self.0 {
            1 => "#e74c3c",
            2 => "#f39c12",
            3 => "#f1c40f",
            _ => "#27ae60",
        }
    }

    /// Condition the backend assigns to an asset inspected with this severity.
    pub fn condition(self) -> ConditionStatus {
        match self.0 {
            1 => ConditionStatus::Critical,
            2 => ConditionStatus::Poor,
            3 => ConditionStatus::Fair,
            _ => ConditionStatus::Good,
        }
    }
}

impl TryFrom<u8> for Severity {
    type Error = ValueError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Severity::new(value).ok_or_else(|| ValueError::Severity(value.to_string()))
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> Self {
        severity.0
    }
}

impl FromStr for Severity {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(Severity::new)
            .ok_or_else(|| ValueError::Severity(s.to_string()))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Label for an optional severity ("N/A" when absent).
pub fn severity_label(severity: Option<Severity>) -> &'static str {
    severity.map_or("N/A", Severity::label)
}

pub fn severity_color(severity: Option<Severity>) -> &'static str {
    severity.map_or(NO_SEVERITY_COLOR, Severity::color)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_encoding_is_preserved() {
        let parsed: Severity = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, Severity::CRITICAL);
        assert_eq!(serde_json::to_string(&Severity::GOOD).unwrap(), "4");
        assert!(Severity::CRITICAL < Severity::GOOD);
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        assert!(serde_json::from_str::<Severity>("0").is_err());
        assert!(serde_json::from_str::<Severity>("5").is_err());
        assert!("7".parse::<Severity>().is_err());
        assert!("".parse::<Severity>().is_err());
        assert_eq!(" 2 ".parse::<Severity>().unwrap(), Severity::POOR);
    }

    #[test]
    fn test_condition_follows_grade() {
        assert_eq!(Severity::CRITICAL.condition(), ConditionStatus::Critical);
        assert_eq!(Severity::POOR.condition(), ConditionStatus::Poor);
        assert_eq!(Severity::REGULAR.condition(), ConditionStatus::Fair);
        assert_eq!(Severity::GOOD.condition(), ConditionStatus::Good);
    }

    #[test]
    fn test_labels_and_colors() {
        assert_eq!(Severity::CRITICAL.label(), "Crítico");
        assert_eq!(Severity::REGULAR.color(), "#f1c40f");
        assert_eq!(severity_label(None), "N/A");
        assert_eq!(severity_color(None), NO_SEVERITY_COLOR);
    }
}
