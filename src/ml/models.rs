use crate::ml::classifier::ForestParams;
use crate::ml::metrics::ClassificationReport;
use crate::ml::search::{CandidateScore, ParamGrid};
use crate::models::FeatureTable;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Model selection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Seed for splitting and tree bootstrap
    pub seed: u64,

    /// Held-out fraction (0.0 - 1.0)
    pub test_size: f64,

    /// Cross-validation folds
    pub cv_folds: usize,

    /// Hyperparameter grid
    pub grid: ParamGrid,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            test_size: 0.2,
            cv_folds: 5,
            grid: ParamGrid::default(),
        }
    }
}

impl TrainingConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_grid(mut self, grid: ParamGrid) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_cv_folds(mut self, cv_folds: usize) -> Self {
        self.cv_folds = cv_folds;
        self
    }
}

/// Model type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Random forest
    RandomForest,
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::RandomForest => write!(f, "Random Forest"),
        }
    }
}

/// Where a fitted pipeline came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Rows the final model was fit on
    pub n_training_samples: usize,

    /// Mean CV score of the winning configuration, when selected by search
    pub cv_score: Option<f64>,
}

/// Summary of a resident model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,

    /// Model version
    pub version: String,

    /// Model type
    pub model_type: ModelType,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Number of training samples
    pub n_training_samples: usize,

    /// Feature schema, in model column order
    pub feature_names: Vec<String>,

    /// Class labels by index
    pub classes: Vec<String>,

    /// Hyperparameters
    pub hyperparameters: ForestParams,

    /// Mean CV score of the hyperparameters
    pub cv_score: Option<f64>,

    /// Normalised importance per feature
    pub feature_importances: BTreeMap<String, f64>,
}

/// Result of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingOutcome {
    /// Winning hyperparameters
    pub best_params: ForestParams,

    /// Mean CV weighted F1 of the winner
    pub best_score: f64,

    /// CV scores of every grid point, in grid order
    pub candidates: Vec<CandidateScore>,

    /// Evaluation on the held-out partition
    pub test_report: ClassificationReport,

    pub n_train: usize,
    pub n_test: usize,
}

/// Prediction for one input row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Predicted risk label
    pub predicted_risk: String,

    /// Maximum class probability (0.0 - 1.0)
    pub confidence_score: f64,

    /// All class probabilities
    pub probabilities: BTreeMap<String, f64>,
}

impl PredictionResult {
    pub fn new(predicted_risk: impl Into<String>, confidence_score: f64) -> Self {
        Self {
            predicted_risk: predicted_risk.into(),
            confidence_score,
            probabilities: BTreeMap::new(),
        }
    }

    pub fn with_probabilities(mut self, probabilities: BTreeMap<String, f64>) -> Self {
        self.probabilities = probabilities;
        self
    }
}

/// Input rows together with their predictions, in input order
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredBatch {
    pub input: FeatureTable,
    pub predictions: Vec<PredictionResult>,
}

impl ScoredBatch {
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    /// Each input row as a JSON object with `predicted_risk` and
    /// `confidence_score` appended
    pub fn to_records(&self) -> Vec<Map<String, Value>> {
        self.input
            .rows()
            .iter()
            .zip(&self.predictions)
            .map(|(row, prediction)| {
                let mut record: Map<String, Value> = self
                    .input
                    .columns()
                    .iter()
                    .zip(row)
                    .map(|(name, cell)| (name.clone(), cell.map_or(Value::Null, Value::from)))
                    .collect();
                record.insert(
                    "predicted_risk".to_string(),
                    Value::from(prediction.predicted_risk.clone()),
                );
                record.insert(
                    "confidence_score".to_string(),
                    Value::from(prediction.confidence_score),
                );
                record
            })
            .collect()
    }
}
