/// Machine learning core for vehicle failure-risk prediction
///
/// This module provides:
/// - Mean imputation and standard scaling stages
/// - A class-weighted random forest classifier
/// - Stratified splitting and cross-validated grid search
/// - Label encoding and artifact persistence
/// - The trainable model and its read-only serving handle

pub mod classifier;
pub mod codec;
pub mod metrics;
pub mod models;
pub mod persistence;
pub mod pipeline;
pub mod preprocessing;
pub mod search;
pub mod service;
pub mod split;

pub use classifier::{Classifier, ForestParams, RandomForestClassifier};
pub use codec::LabelCodec;
pub use metrics::{ClassMetrics, ClassificationReport};
pub use models::{
    ModelMetadata, ModelType, PredictionResult, Provenance, ScoredBatch, TrainingConfig,
    TrainingOutcome,
};
pub use persistence::{ArtifactStore, ENCODER_FILE, PIPELINE_FILE};
pub use pipeline::FittedPipeline;
pub use preprocessing::{MeanImputer, PreprocessStep, StandardScaler, Transformer};
pub use search::{CandidateScore, GridSearch, ParamGrid, SearchResult};
pub use service::{PredictiveMaintenanceModel, ServingModel};
pub use split::{stratified_train_test_split, StratifiedKFold, ValidationSplit};
