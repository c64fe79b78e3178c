use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Feature columns in the order every fitted pipeline expects them.
pub const FEATURE_NAMES: [&str; 5] = [
    "engine_temp",
    "brake_health",
    "battery_health",
    "vibration_level",
    "oil_level",
];

/// Default name of the label column in a training table.
pub const TARGET_COLUMN: &str = "failure_risk";

/// Owned copy of [`FEATURE_NAMES`], the schema handed to training.
pub fn feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}

/// Failure risk category
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString,
    Display, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// One set of vehicle telemetry readings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Engine temperature (°C)
    pub engine_temp: f64,

    /// Brake health percentage (0-100)
    pub brake_health: f64,

    /// Battery health percentage (0-100)
    pub battery_health: f64,

    /// Vibration level reading (>= 0)
    pub vibration_level: f64,

    /// Oil level normalized (0.0-1.0)
    pub oil_level: f64,
}

impl FeatureVector {
    pub fn new(
        engine_temp: f64,
        brake_health: f64,
        battery_health: f64,
        vibration_level: f64,
        oil_level: f64,
    ) -> Self {
        Self {
            engine_temp,
            brake_health,
            battery_health,
            vibration_level,
            oil_level,
        }
    }

    /// Values in [`FEATURE_NAMES`] order
    pub fn to_array(&self) -> [f64; 5] {
        [
            self.engine_temp,
            self.brake_health,
            self.battery_health,
            self.vibration_level,
            self.oil_level,
        ]
    }
}

/// Telemetry with its ground-truth risk label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    /// Opaque identifier, never used as a feature
    pub vehicle_id: String,

    #[serde(flatten)]
    pub features: FeatureVector,

    /// Ground-truth risk
    pub failure_risk: RiskLevel,
}

impl LabeledSample {
    pub fn new(vehicle_id: impl Into<String>, features: FeatureVector, failure_risk: RiskLevel) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            features,
            failure_risk,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_risk_level_round_trips_through_strings() {
        for level in RiskLevel::iter() {
            assert_eq!(RiskLevel::from_str(&level.to_string()).unwrap(), level);
        }
        assert_eq!(RiskLevel::High.to_string(), "high");
        assert!(RiskLevel::from_str("critical").is_err());
    }

    #[test]
    fn test_feature_vector_order_matches_names() {
        let v = FeatureVector::new(1.0, 2.0, 3.0, 4.0, 5.0);
        assert_eq!(v.to_array(), [1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(FEATURE_NAMES[4], "oil_level");
    }

    #[test]
    fn test_labeled_sample_serializes_flat() {
        let sample = LabeledSample::new(
            "V0001",
            FeatureVector::new(90.0, 80.0, 75.0, 0.2, 0.8),
            RiskLevel::Low,
        );
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["vehicle_id"], "V0001");
        assert_eq!(json["engine_temp"], 90.0);
        assert_eq!(json["failure_risk"], "low");
    }
}
