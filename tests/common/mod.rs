//! Common test utilities for model training
//!
//! Full grid searches take minutes; these helpers train on the synthetic
//! fleet with a one-point grid so integration tests stay fast.

#![allow(dead_code)]

use std::path::Path;
use vehicle_predictive_maintenance::{
    ml::{ParamGrid, PredictiveMaintenanceModel, TrainingConfig, TrainingOutcome},
    models::{feature_names, FeatureTable, FeatureVector, RiskLevel, TrainingSet, TARGET_COLUMN},
    synthetic,
};

/// One-point grid that still separates the synthetic rule well
pub fn small_grid() -> ParamGrid {
    ParamGrid {
        n_estimators: vec![30],
        max_depth: vec![None],
        min_samples_split: vec![2],
        min_samples_leaf: vec![1],
    }
}

pub fn training_config(seed: u64) -> TrainingConfig {
    TrainingConfig::default()
        .with_seed(seed)
        .with_grid(small_grid())
}

pub fn synthetic_set(n_samples: usize, seed: u64) -> TrainingSet {
    TrainingSet::from_samples(&synthetic::generate(n_samples, seed).unwrap())
}

/// Synthetic rows with exactly the requested number of rows per risk level
pub fn set_with_counts(high: usize, medium: usize, low: usize, seed: u64) -> TrainingSet {
    let pool = synthetic::generate(3000, seed).unwrap();
    let mut picked = Vec::new();
    for (level, wanted) in [
        (RiskLevel::High, high),
        (RiskLevel::Medium, medium),
        (RiskLevel::Low, low),
    ] {
        picked.extend(
            pool.iter()
                .filter(|s| s.failure_risk == level)
                .take(wanted)
                .cloned(),
        );
    }
    TrainingSet::from_samples(&picked)
}

/// Train a model on the synthetic fleet, persisting under `dir`
pub fn train_model(
    dir: &Path,
    n_samples: usize,
    seed: u64,
) -> (PredictiveMaintenanceModel, TrainingOutcome) {
    let mut model = PredictiveMaintenanceModel::new(dir, training_config(seed));
    let outcome = model
        .train(&synthetic_set(n_samples, seed), &feature_names(), TARGET_COLUMN)
        .unwrap();
    (model, outcome)
}

/// Batch of typical readings covering all three risk regimes
pub fn reference_batch() -> FeatureTable {
    FeatureTable::from_vectors(&[
        FeatureVector::new(115.0, 88.0, 92.0, 0.3, 0.2),
        FeatureVector::new(85.0, 95.0, 98.0, 0.1, 0.9),
        FeatureVector::new(92.0, 85.0, 64.0, 0.2, 0.8),
        FeatureVector::new(88.0, 55.0, 90.0, 0.4, 0.7),
        FeatureVector::new(100.0, 75.0, 80.0, 1.5, 0.6),
    ])
}
