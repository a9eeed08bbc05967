use crate::models::{EmergencyType, Severity};

const FIRE: [&str; 5] = [
    "Activate fire alarm system",
    "Evacuate the area immediately",
    "Contact fire department: 911",
    "Close all fire doors and dampers",
    "Shut down HVAC systems if safe to do so",
];

const ACCIDENT: [&str; 5] = [
    "Secure the accident area",
    "Provide first aid if trained",
    "Contact emergency services: 911",
    "Document the incident for investigation",
    "Preserve evidence for investigation",
];

const MEDICAL: [&str; 5] = [
    "Provide first aid assistance",
    "Contact medical services if needed",
    "Keep the person comfortable",
    "Monitor vital signs if trained",
    "Clear area for emergency responders",
];

const NATURAL_DISASTER: [&str; 5] = [
    "Seek immediate shelter",
    "Monitor emergency broadcasts",
    "Follow evacuation routes if advised",
    "Prepare emergency supplies",
    "Check on vulnerable neighbors if safe",
];

const GENERAL: [&str; 5] = [
    "Continue monitoring conditions",
    "Review emergency procedures",
    "Ensure communication systems are operational",
    "Conduct regular safety checks",
    "Update emergency contact information",
];

/// Response actions for a predicted (type, severity) pair
pub fn recommendations(emergency_type: EmergencyType, severity: Severity) -> &'static [&'static str] {
    use EmergencyType as T;
    use Severity as S;

    match (emergency_type, severity) {
        (T::Fire, S::High | S::Critical) => &FIRE,
        (T::Accident, S::Medium | S::High) => &ACCIDENT,
        (T::Medical, S::Low | S::Medium) => &MEDICAL,
        (T::NaturalDisaster, S::High | S::Critical) => &NATURAL_DISASTER,
        _ => &GENERAL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_severities_get_specific_advice() {
        for (emergency_type, confidence) in [
            (EmergencyType::Fire, 0.5),
            (EmergencyType::Fire, 0.9),
            (EmergencyType::Accident, 0.5),
            (EmergencyType::Accident, 0.9),
            (EmergencyType::Medical, 0.5),
            (EmergencyType::Medical, 0.9),
            (EmergencyType::NaturalDisaster, 0.1),
        ] {
            let severity = Severity::derive(emergency_type, confidence);
            assert_ne!(
                recommendations(emergency_type, severity),
                &GENERAL,
                "{} at {}",
                emergency_type,
                confidence
            );
        }
    }

    #[test]
    fn test_fallback_is_general_monitoring() {
        assert_eq!(recommendations(EmergencyType::None, Severity::None), &GENERAL);
        assert_eq!(recommendations(EmergencyType::Fire, Severity::Low), &GENERAL);
        assert_eq!(
            recommendations(EmergencyType::NaturalDisaster, Severity::Medium),
            &GENERAL
        );
    }

    #[test]
    fn test_fire_advice_starts_with_alarm() {
        let advice = recommendations(EmergencyType::Fire, Severity::Critical);
        assert_eq!(advice.len(), 5);
        assert_eq!(advice[0], "Activate fire alarm system");
    }
}
