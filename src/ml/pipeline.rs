use crate::error::{AppError, Result};
use crate::ml::classifier::{argmax, Classifier, ForestParams, RandomForestClassifier};
use crate::ml::models::Provenance;
use crate::ml::preprocessing::{MeanImputer, PreprocessStep, StandardScaler, Transformer};
use crate::models::FeatureTable;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fitted imputer → scaler → forest chain together with the feature schema
/// it was trained on.
///
/// Produced only by [`FittedPipeline::fit`]; inference replays the stored
/// stage parameters and never refits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    feature_names: Vec<String>,
    steps: Vec<PreprocessStep>,
    classifier: RandomForestClassifier,
    provenance: Provenance,
}

impl FittedPipeline {
    /// Fit every stage in order on `x`, feeding each stage's output forward
    pub fn fit(
        feature_names: &[String],
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
        params: ForestParams,
        seed: u64,
    ) -> Result<Self> {
        if x.ncols() != feature_names.len() {
            return Err(AppError::Schema(format!(
                "{} feature names for a {}-column matrix",
                feature_names.len(),
                x.ncols()
            )));
        }

        let mut steps = vec![
            PreprocessStep::Imputer(MeanImputer::new()),
            PreprocessStep::Scaler(StandardScaler::new()),
        ];
        let mut current = x.to_owned();
        for step in steps.iter_mut() {
            current = step.fit_transform(&current)?;
            debug!("Fitted {} stage on {} rows", step.name(), current.nrows());
        }

        let mut classifier = RandomForestClassifier::new(params, seed);
        classifier.fit(&current, y, n_classes)?;

        Ok(Self {
            feature_names: feature_names.to_vec(),
            steps,
            classifier,
            provenance: Provenance {
                trained_at: chrono::Utc::now(),
                n_training_samples: x.nrows(),
                cv_score: None,
            },
        })
    }

    /// Record the cross-validation score that selected this configuration
    pub fn with_cv_score(mut self, score: f64) -> Self {
        self.provenance.cv_score = Some(score);
        self
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn params(&self) -> &ForestParams {
        self.classifier.params()
    }

    pub fn n_classes(&self) -> usize {
        self.classifier.n_classes()
    }

    pub fn steps(&self) -> &[PreprocessStep] {
        &self.steps
    }

    pub fn classifier(&self) -> &RandomForestClassifier {
        &self.classifier
    }

    /// Run only the preprocessing stages
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let mut current = x.to_owned();
        for step in &self.steps {
            current = step.transform(&current)?;
        }
        Ok(current)
    }

    /// Class probabilities for a matrix already in schema column order
    pub fn predict_proba_matrix(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.feature_names.len() {
            return Err(AppError::Schema(format!(
                "pipeline was fit on {} features but got {}",
                self.feature_names.len(),
                x.ncols()
            )));
        }
        let transformed = self.transform(x)?;
        self.classifier.predict_proba(&transformed)
    }

    pub fn predict_matrix(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba_matrix(x)?;
        Ok(proba.axis_iter(Axis(0)).map(|row| argmax(row).0).collect())
    }

    /// Class probabilities for a named-column batch.
    ///
    /// Columns are matched by name; missing, extra and empty input is a
    /// schema error.
    pub fn predict_proba(&self, batch: &FeatureTable) -> Result<Array2<f64>> {
        if batch.is_empty() {
            return Err(AppError::Schema("prediction batch is empty".to_string()));
        }
        let x = batch.select(&self.feature_names)?;
        self.predict_proba_matrix(&x)
    }

    /// Predicted class index and its probability per row
    pub fn predict(&self, batch: &FeatureTable) -> Result<Vec<(usize, f64)>> {
        let proba = self.predict_proba(batch)?;
        Ok(proba.axis_iter(Axis(0)).map(argmax).collect())
    }

    /// Feature importances keyed by feature name, in schema order
    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        self.feature_names
            .iter()
            .cloned()
            .zip(self.classifier.feature_importances().iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn names() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    fn toy() -> (Array2<f64>, Vec<usize>) {
        let x = array![
            [0.0, 10.0],
            [0.2, 11.0],
            [0.1, f64::NAN],
            [0.3, 12.0],
            [5.0, 50.0],
            [5.2, 51.0],
            [f64::NAN, 52.0],
            [5.3, 53.0],
        ];
        (x, vec![0, 0, 0, 0, 1, 1, 1, 1])
    }

    fn params() -> ForestParams {
        ForestParams {
            n_estimators: 10,
            ..ForestParams::default()
        }
    }

    #[test]
    fn test_fit_and_predict_named_batch() {
        let (x, y) = toy();
        let pipeline = FittedPipeline::fit(&names(), &x, &y, 2, params(), 42).unwrap();

        // Columns given in reverse order are matched by name.
        let mut batch = FeatureTable::new(vec!["b".to_string(), "a".to_string()]);
        batch.push_row(vec![Some(10.5), Some(0.1)]).unwrap();
        batch.push_row(vec![Some(52.0), None]).unwrap();
        let predictions = pipeline.predict(&batch).unwrap();

        assert_eq!(predictions[0].0, 0);
        assert_eq!(predictions[1].0, 1);
        assert!(predictions.iter().all(|(_, p)| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_schema_mismatch() {
        let (x, y) = toy();
        let pipeline = FittedPipeline::fit(&names(), &x, &y, 2, params(), 42).unwrap();

        let mut missing = FeatureTable::new(vec!["a".to_string()]);
        missing.push_row(vec![Some(1.0)]).unwrap();
        assert!(matches!(pipeline.predict(&missing), Err(AppError::Schema(_))));

        let empty = FeatureTable::new(names());
        assert!(matches!(pipeline.predict(&empty), Err(AppError::Schema(_))));

        assert!(pipeline.predict_matrix(&array![[1.0, 2.0, 3.0]]).is_err());
    }

    #[test]
    fn test_stage_order() {
        let (x, y) = toy();
        let pipeline = FittedPipeline::fit(&names(), &x, &y, 2, params(), 42).unwrap();

        let stages: Vec<&str> = pipeline.steps().iter().map(|s| s.name()).collect();
        assert_eq!(stages, vec!["imputer", "scaler"]);
        assert_eq!(pipeline.feature_importances().len(), 2);
        assert_eq!(pipeline.params().n_estimators, 10);
        assert_eq!(pipeline.provenance().n_training_samples, 8);
        assert_eq!(pipeline.with_cv_score(0.9).provenance().cv_score, Some(0.9));
    }

    #[test]
    fn test_name_count_must_match_columns() {
        let (x, y) = toy();
        let result = FittedPipeline::fit(&["a".to_string()], &x, &y, 2, params(), 42);
        assert!(matches!(result, Err(AppError::Schema(_))));
    }
}
