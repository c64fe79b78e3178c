/// Integration tests for the failure-risk model
///
/// These tests verify the complete pipeline:
/// - Training with stratified split and grid search
/// - Persistence round trips
/// - Determinism for a fixed seed
/// - Schema enforcement and confidence bounds
/// - Recovery of the synthetic labeling rule

mod common;

use common::{reference_batch, set_with_counts, train_model, training_config};
use serde_json::{json, Map, Value};
use tempfile::TempDir;
use vehicle_predictive_maintenance::{
    ml::{ArtifactStore, PredictiveMaintenanceModel, ServingModel},
    models::{feature_names, FeatureTable, FeatureVector, TrainingSet, TARGET_COLUMN},
    AppError,
};

#[test]
fn test_end_to_end_recovers_rule() {
    let dir = TempDir::new().unwrap();
    let (mut model, outcome) = train_model(dir.path(), 1000, 42);

    assert!(outcome.best_score > 0.8, "cv score {}", outcome.best_score);
    assert!(outcome.test_report.accuracy > 0.8);

    let batch = FeatureTable::from_vectors(&[
        FeatureVector::new(115.0, 88.0, 92.0, 0.3, 0.2),
        FeatureVector::new(85.0, 95.0, 98.0, 0.1, 0.9),
    ]);
    let scored = model.predict(&batch).unwrap();

    assert_eq!(scored.predictions[0].predicted_risk, "high");
    assert!(scored.predictions[0].confidence_score >= 0.5);
    assert_eq!(scored.predictions[1].predicted_risk, "low");
}

#[test]
fn test_save_load_predicts_identically() {
    let dir = TempDir::new().unwrap();
    let (mut model, _) = train_model(dir.path(), 600, 7);
    model.save().unwrap();

    let before = model.predict(&reference_batch()).unwrap();

    let mut reloaded = PredictiveMaintenanceModel::new(dir.path(), training_config(7));
    reloaded.load().unwrap();
    let after = reloaded.predict(&reference_batch()).unwrap();

    for (a, b) in before.predictions.iter().zip(&after.predictions) {
        assert_eq!(a.predicted_risk, b.predicted_risk);
        assert!((a.confidence_score - b.confidence_score).abs() < 1e-9);
    }

    let serving = ServingModel::load(&ArtifactStore::new(dir.path())).unwrap();
    assert_eq!(serving.predict(&reference_batch()).unwrap(), after);
}

#[test]
fn test_training_is_deterministic() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    let (mut a, outcome_a) = train_model(dir_a.path(), 600, 11);
    let (mut b, outcome_b) = train_model(dir_b.path(), 600, 11);

    assert_eq!(outcome_a.best_params, outcome_b.best_params);
    assert_eq!(outcome_a.best_score, outcome_b.best_score);
    assert_eq!(
        a.predict(&reference_batch()).unwrap().predictions,
        b.predict(&reference_batch()).unwrap().predictions
    );
}

#[test]
fn test_confidence_bounds_and_labels() {
    let dir = TempDir::new().unwrap();
    let (mut model, _) = train_model(dir.path(), 600, 3);

    let scored = model.predict(&reference_batch()).unwrap();
    assert_eq!(scored.len(), 5);
    for prediction in &scored.predictions {
        assert!(["low", "medium", "high"].contains(&prediction.predicted_risk.as_str()));
        assert!((0.0..=1.0).contains(&prediction.confidence_score));
        let total: f64 = prediction.probabilities.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    // Output rows keep input order and values.
    assert_eq!(scored.input, reference_batch());
}

#[test]
fn test_missing_column_is_schema_error() {
    let dir = TempDir::new().unwrap();
    let (mut model, _) = train_model(dir.path(), 600, 5);

    let mut columns = feature_names();
    columns.retain(|c| c != "oil_level");
    let mut batch = FeatureTable::new(columns);
    batch
        .push_row(vec![Some(90.0), Some(80.0), Some(85.0), Some(0.2)])
        .unwrap();

    assert!(matches!(model.predict(&batch), Err(AppError::Schema(_))));
}

#[test]
fn test_missing_values_are_imputed() {
    let dir = TempDir::new().unwrap();
    let (mut model, _) = train_model(dir.path(), 600, 5);

    let mut batch = FeatureTable::new(feature_names());
    batch
        .push_row(vec![Some(85.0), None, Some(98.0), Some(0.1), None])
        .unwrap();

    let scored = model.predict(&batch).unwrap();
    assert_eq!(scored.len(), 1);
}

#[test]
fn test_rarest_class_at_fold_count_trains() {
    let dir = TempDir::new().unwrap();
    let mut model = PredictiveMaintenanceModel::new(dir.path(), training_config(1));

    let outcome = model
        .train(&set_with_counts(5, 30, 30, 1), &feature_names(), TARGET_COLUMN)
        .unwrap();

    assert!(model.is_ready());
    assert_eq!(outcome.n_train + outcome.n_test, 65);
}

#[test]
fn test_training_without_enough_rows_per_fold() {
    let dir = TempDir::new().unwrap();
    let mut model = PredictiveMaintenanceModel::new(dir.path(), training_config(1));

    let err = model
        .train(&set_with_counts(4, 30, 30, 1), &feature_names(), TARGET_COLUMN)
        .unwrap_err();

    assert!(matches!(err, AppError::TrainingData(_)));
    assert!(!model.is_ready());
    assert!(matches!(model.save(), Err(AppError::Untrained)));
}

#[test]
fn test_records_with_foreign_labels_are_rejected() {
    let records: Vec<Map<String, Value>> = ["CRITICAL", "Medium", "ok"]
        .iter()
        .map(|label| {
            let row = json!({
                "vehicle_id": "V0001",
                "engine_temp": 115.0,
                "brake_health": 88.0,
                "battery_health": 92.0,
                "vibration_level": 0.3,
                "oil_level": 0.2,
                "failure_risk": label,
            });
            row.as_object().cloned().unwrap()
        })
        .collect();

    assert!(matches!(
        TrainingSet::from_records(&records, TARGET_COLUMN),
        Err(AppError::Schema(_))
    ));
}

#[test]
fn test_load_without_artifacts() {
    let dir = TempDir::new().unwrap();
    let mut model = PredictiveMaintenanceModel::new(dir.path().join("empty"), training_config(1));

    assert!(matches!(model.load(), Err(AppError::ArtifactMissing(_))));
    assert!(matches!(
        model.predict(&reference_batch()),
        Err(AppError::ArtifactMissing(_))
    ));
}
