use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::{AppError, Result};

/// Emergency category predicted by the classifier
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmergencyType {
    Fire,
    Accident,
    Medical,
    NaturalDisaster,
    None,
}

impl EmergencyType {
    /// Categories an emergency "hit" is drawn from, with their sampling weights
    pub const WEIGHTED_EMERGENCIES: [(EmergencyType, f64); 4] = [
        (EmergencyType::Fire, 0.4),
        (EmergencyType::Accident, 0.3),
        (EmergencyType::Medical, 0.2),
        (EmergencyType::NaturalDisaster, 0.1),
    ];

    /// Parse a dataset or encoder label; unknown categories are rejected
    pub fn parse(label: &str) -> Result<Self> {
        Self::from_str(label.trim())
            .map_err(|_| AppError::Validation(format!("Unknown emergency type: {:?}", label)))
    }

    pub fn is_emergency(&self) -> bool {
        !matches!(self, EmergencyType::None)
    }
}

/// Rule-derived severity rating
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Severity of a predicted emergency given the classifier's confidence in it
    pub fn derive(emergency_type: EmergencyType, confidence: f64) -> Self {
        match emergency_type {
            EmergencyType::None => Severity::None,
            EmergencyType::Medical if confidence < 0.7 => Severity::Low,
            EmergencyType::Medical => Severity::Medium,
            EmergencyType::Accident if confidence < 0.7 => Severity::Medium,
            EmergencyType::Accident => Severity::High,
            EmergencyType::Fire if confidence < 0.8 => Severity::High,
            EmergencyType::Fire => Severity::Critical,
            EmergencyType::NaturalDisaster => Severity::Critical,
        }
    }

    /// Severity for a raw label; labels outside the known categories rate as none
    pub fn for_label(label: &str, confidence: f64) -> Self {
        EmergencyType::parse(label)
            .map(|emergency_type| Self::derive(emergency_type, confidence))
            .unwrap_or(Severity::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_labels_round_trip_through_strings() {
        for emergency_type in EmergencyType::iter() {
            let label = emergency_type.to_string();
            assert_eq!(EmergencyType::parse(&label).unwrap(), emergency_type);
        }
        assert_eq!(EmergencyType::NaturalDisaster.as_ref(), "natural_disaster");
        assert_eq!(Severity::Critical.to_string(), "critical");
    }

    #[test]
    fn test_unknown_label_rejected() {
        let err = EmergencyType::parse("flood").unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_severity_table() {
        assert_eq!(Severity::derive(EmergencyType::Fire, 0.75), Severity::High);
        assert_eq!(Severity::derive(EmergencyType::Fire, 0.85), Severity::Critical);
        assert_eq!(Severity::derive(EmergencyType::Fire, 0.8), Severity::Critical);
        assert_eq!(
            Severity::derive(EmergencyType::NaturalDisaster, 0.01),
            Severity::Critical
        );
        assert_eq!(Severity::derive(EmergencyType::Medical, 0.69), Severity::Low);
        assert_eq!(Severity::derive(EmergencyType::Medical, 0.7), Severity::Medium);
        assert_eq!(Severity::derive(EmergencyType::Accident, 0.5), Severity::Medium);
        assert_eq!(Severity::derive(EmergencyType::Accident, 0.95), Severity::High);
    }

    #[test]
    fn test_none_is_always_none() {
        for confidence in [0.0, 0.3, 0.7, 0.8, 1.0] {
            assert_eq!(Severity::derive(EmergencyType::None, confidence), Severity::None);
        }
    }

    #[test]
    fn test_unrecognized_label_falls_back_to_none() {
        assert_eq!(Severity::for_label("earthquake", 0.99), Severity::None);
        assert_eq!(Severity::for_label("fire", 0.99), Severity::Critical);
    }

    #[test]
    fn test_emergency_weights_sum_to_one() {
        let total: f64 = EmergencyType::WEIGHTED_EMERGENCIES
            .iter()
            .map(|(_, weight)| weight)
            .sum();
        assert!((total - 1.0).abs() < 1e-12);
    }
}
