use crate::error::{AppError, Result};
use crate::ml::classifier::{argmax, ForestParams};
use crate::ml::codec::LabelCodec;
use crate::ml::metrics::ClassificationReport;
use crate::ml::models::{
    ModelMetadata, ModelType, PredictionResult, ScoredBatch, TrainingConfig, TrainingOutcome,
};
use crate::ml::persistence::ArtifactStore;
use crate::ml::pipeline::FittedPipeline;
use crate::ml::search::GridSearch;
use crate::ml::split::stratified_train_test_split;
use crate::models::{FeatureTable, TrainingSet};
use ndarray::Axis;
use std::path::PathBuf;
use tracing::{debug, info, warn};

const MODEL_NAME: &str = "vehicle-failure-risk";

/// Score a batch against a fitted pipeline and decode the labels
fn score(
    pipeline: &FittedPipeline,
    codec: &LabelCodec,
    batch: &FeatureTable,
) -> Result<ScoredBatch> {
    let proba = pipeline.predict_proba(batch)?;

    let predictions = proba
        .axis_iter(Axis(0))
        .map(|row| -> Result<PredictionResult> {
            let (index, confidence) = argmax(row);
            let probabilities = codec
                .classes()
                .iter()
                .cloned()
                .zip(row.iter().copied())
                .collect();
            Ok(PredictionResult::new(codec.decode(index)?, confidence)
                .with_probabilities(probabilities))
        })
        .collect::<Result<Vec<_>>>()?;

    debug!("Scored {} rows", predictions.len());
    Ok(ScoredBatch {
        input: batch.clone(),
        predictions,
    })
}

fn describe(pipeline: &FittedPipeline, codec: &LabelCodec) -> ModelMetadata {
    let provenance = pipeline.provenance();
    ModelMetadata {
        name: MODEL_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_type: ModelType::RandomForest,
        trained_at: provenance.trained_at,
        n_training_samples: provenance.n_training_samples,
        feature_names: pipeline.feature_names().to_vec(),
        classes: codec.classes().to_vec(),
        hyperparameters: *pipeline.params(),
        cv_score: provenance.cv_score,
        feature_importances: pipeline.feature_importances().into_iter().collect(),
    }
}

/// Failure-risk model: trains, persists, reloads and scores the
/// imputer → scaler → forest pipeline.
///
/// Starts empty; `train` or `load` makes it ready. A failed `train` leaves
/// the previous state untouched.
pub struct PredictiveMaintenanceModel {
    store: ArtifactStore,
    config: TrainingConfig,
    pipeline: Option<FittedPipeline>,
    codec: LabelCodec,
}

impl PredictiveMaintenanceModel {
    /// Create an untrained model that persists under `artifact_dir`
    pub fn new(artifact_dir: impl Into<PathBuf>, config: TrainingConfig) -> Self {
        Self {
            store: ArtifactStore::new(artifact_dir),
            config,
            pipeline: None,
            codec: LabelCodec::new(),
        }
    }

    /// Check if a fitted pipeline is resident
    pub fn is_ready(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn pipeline(&self) -> Option<&FittedPipeline> {
        self.pipeline.as_ref()
    }

    pub fn codec(&self) -> &LabelCodec {
        &self.codec
    }

    pub fn best_params(&self) -> Option<&ForestParams> {
        self.pipeline.as_ref().map(|p| p.params())
    }

    pub fn metadata(&self) -> Option<ModelMetadata> {
        self.pipeline.as_ref().map(|p| describe(p, &self.codec))
    }

    /// Select hyperparameters by cross-validated grid search, refit the
    /// winner on the training partition and evaluate it on the held-out rows.
    pub fn train(
        &mut self,
        data: &TrainingSet,
        feature_cols: &[String],
        target_col: &str,
    ) -> Result<TrainingOutcome> {
        if data.target != target_col {
            return Err(AppError::Schema(format!(
                "label column {} not present (table carries {})",
                target_col, data.target
            )));
        }
        if data.is_empty() {
            return Err(AppError::TrainingData("training set is empty".to_string()));
        }

        info!(
            "🧠 Training on {} rows, {} features, target {}",
            data.len(),
            feature_cols.len(),
            target_col
        );

        let x = data.features.project(feature_cols)?.select(feature_cols)?;
        let mut codec = LabelCodec::new();
        let y = codec.fit_transform(&data.labels)?;
        let n_classes = codec.n_classes();
        if n_classes < 2 {
            return Err(AppError::TrainingData(format!(
                "need at least 2 classes, found {}",
                n_classes
            )));
        }

        let mut class_counts = vec![0usize; n_classes];
        for &c in &y {
            class_counts[c] += 1;
        }
        if let Some((rarest, &count)) = class_counts.iter().enumerate().min_by_key(|&(_, c)| *c) {
            if count < self.config.cv_folds {
                return Err(AppError::TrainingData(format!(
                    "class {} has {} rows; {}-fold cross-validation needs at least {}",
                    codec.decode(rarest)?,
                    count,
                    self.config.cv_folds,
                    self.config.cv_folds
                )));
            }
        }

        let split = stratified_train_test_split(&y, self.config.test_size, self.config.seed)?;
        let x_train = x.select(Axis(0), &split.train);
        let y_train: Vec<usize> = split.train.iter().map(|&i| y[i]).collect();
        let x_test = x.select(Axis(0), &split.test);
        let y_test: Vec<usize> = split.test.iter().map(|&i| y[i]).collect();
        debug!(
            "Stratified split: {} train / {} test rows",
            y_train.len(),
            y_test.len()
        );

        let search = GridSearch::new(
            self.config.grid.clone(),
            self.config.cv_folds,
            self.config.seed,
        );
        let result = search.run(feature_cols, &x_train, &y_train, n_classes)?;
        info!(
            "🏆 Best parameters: {} (CV weighted F1 {:.4})",
            result.best_params, result.best_score
        );

        let pipeline = FittedPipeline::fit(
            feature_cols,
            &x_train,
            &y_train,
            n_classes,
            result.best_params,
            self.config.seed,
        )?
        .with_cv_score(result.best_score);

        let y_pred = pipeline.predict_matrix(&x_test)?;
        let report = ClassificationReport::compute(&y_test, &y_pred, codec.classes());
        info!("📊 Held-out evaluation:\n{}", report.render());

        self.pipeline = Some(pipeline);
        self.codec = codec;

        Ok(TrainingOutcome {
            best_params: result.best_params,
            best_score: result.best_score,
            candidates: result.candidates,
            test_report: report,
            n_train: y_train.len(),
            n_test: y_test.len(),
        })
    }

    /// Persist the resident pipeline and codec
    pub fn save(&self) -> Result<()> {
        let pipeline = self.pipeline.as_ref().ok_or(AppError::Untrained)?;
        self.store.save(pipeline, &self.codec)
    }

    /// Replace the resident state with the persisted artifacts
    pub fn load(&mut self) -> Result<()> {
        let (pipeline, codec) = self.store.load()?;
        self.pipeline = Some(pipeline);
        self.codec = codec;
        Ok(())
    }

    /// Score a batch, loading artifacts first if nothing is resident
    pub fn predict(&mut self, batch: &FeatureTable) -> Result<ScoredBatch> {
        if self.pipeline.is_none() {
            warn!("No resident pipeline, loading from {}", self.store.dir().display());
            self.load()?;
        }
        match self.pipeline.as_ref() {
            Some(pipeline) => score(pipeline, &self.codec, batch),
            None => Err(AppError::Untrained),
        }
    }

    /// Freeze the resident state into a read-only serving handle
    pub fn into_serving(self) -> Result<ServingModel> {
        let pipeline = self.pipeline.ok_or(AppError::Untrained)?;
        Ok(ServingModel::new(pipeline, self.codec))
    }
}

/// Immutable fitted model shared across request handlers
#[derive(Debug, Clone)]
pub struct ServingModel {
    pipeline: FittedPipeline,
    codec: LabelCodec,
    metadata: ModelMetadata,
}

impl ServingModel {
    pub fn new(pipeline: FittedPipeline, codec: LabelCodec) -> Self {
        let metadata = describe(&pipeline, &codec);
        Self {
            pipeline,
            codec,
            metadata,
        }
    }

    /// Load persisted artifacts into a serving handle
    pub fn load(store: &ArtifactStore) -> Result<Self> {
        let (pipeline, codec) = store.load()?;
        Ok(Self::new(pipeline, codec))
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn feature_names(&self) -> &[String] {
        self.pipeline.feature_names()
    }

    pub fn predict(&self, batch: &FeatureTable) -> Result<ScoredBatch> {
        score(&self.pipeline, &self.codec, batch)
    }
}
