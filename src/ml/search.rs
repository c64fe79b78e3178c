//! Exhaustive hyperparameter search with stratified cross-validation.

use crate::error::{AppError, Result};
use crate::ml::classifier::ForestParams;
use crate::ml::metrics::weighted_f1;
use crate::ml::pipeline::FittedPipeline;
use crate::ml::split::StratifiedKFold;
use ndarray::{Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Candidate values for each forest hyperparameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<Option<usize>>,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200],
            max_depth: vec![None, Some(10), Some(20)],
            min_samples_split: vec![2, 5],
            min_samples_leaf: vec![1, 2],
        }
    }
}

impl ParamGrid {
    /// Small grid for smoke runs
    pub fn quick() -> Self {
        Self {
            n_estimators: vec![50],
            max_depth: vec![None, Some(10)],
            min_samples_split: vec![2],
            min_samples_leaf: vec![1],
        }
    }

    /// Every combination, in a fixed order.
    ///
    /// Parameter names are iterated alphabetically with the last one varying
    /// fastest, so `n_estimators` changes between neighbouring candidates.
    pub fn candidates(&self) -> Vec<ForestParams> {
        let mut out = Vec::with_capacity(self.len());
        for &max_depth in &self.max_depth {
            for &min_samples_leaf in &self.min_samples_leaf {
                for &min_samples_split in &self.min_samples_split {
                    for &n_estimators in &self.n_estimators {
                        out.push(ForestParams {
                            n_estimators,
                            max_depth,
                            min_samples_split,
                            min_samples_leaf,
                        });
                    }
                }
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.n_estimators.len()
            * self.max_depth.len()
            * self.min_samples_split.len()
            * self.min_samples_leaf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cross-validation result of one grid point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: ForestParams,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
}

/// Outcome of a full grid search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub best_params: ForestParams,
    pub best_score: f64,
    /// One entry per grid point, in grid order
    pub candidates: Vec<CandidateScore>,
}

/// Grid search scored by mean weighted F1 over stratified folds
#[derive(Debug, Clone)]
pub struct GridSearch {
    grid: ParamGrid,
    cv: StratifiedKFold,
    seed: u64,
}

impl GridSearch {
    pub fn new(grid: ParamGrid, folds: usize, seed: u64) -> Self {
        Self {
            grid,
            cv: StratifiedKFold::new(folds),
            seed,
        }
    }

    /// Evaluate every grid point on `x`/`y` and pick the best.
    ///
    /// Candidates run in parallel but are reported in grid order; the first
    /// candidate with the highest mean score wins.
    pub fn run(
        &self,
        feature_names: &[String],
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
    ) -> Result<SearchResult> {
        if self.grid.is_empty() {
            return Err(AppError::Configuration(
                "hyperparameter grid has no candidates".to_string(),
            ));
        }

        let splits = self.cv.splits(y)?;
        let candidates = self.grid.candidates();
        info!(
            "Grid search: {} candidates x {} folds",
            candidates.len(),
            splits.len()
        );

        let scores = candidates
            .par_iter()
            .map(|&params| -> Result<CandidateScore> {
                let fold_scores = splits
                    .iter()
                    .map(|split| -> Result<f64> {
                        let x_train = x.select(Axis(0), &split.train);
                        let y_train: Vec<usize> = split.train.iter().map(|&i| y[i]).collect();
                        let x_test = x.select(Axis(0), &split.test);
                        let y_test: Vec<usize> = split.test.iter().map(|&i| y[i]).collect();

                        let pipeline = FittedPipeline::fit(
                            feature_names,
                            &x_train,
                            &y_train,
                            n_classes,
                            params,
                            self.seed,
                        )?;
                        let y_pred = pipeline.predict_matrix(&x_test)?;
                        Ok(weighted_f1(&y_test, &y_pred, n_classes))
                    })
                    .collect::<Result<Vec<f64>>>()?;

                let n = fold_scores.len() as f64;
                let mean_score = fold_scores.iter().sum::<f64>() / n;
                let std_score = (fold_scores
                    .iter()
                    .map(|s| (s - mean_score).powi(2))
                    .sum::<f64>()
                    / n)
                    .sqrt();
                debug!(
                    "CV candidate {}: mean={:.4} std={:.4}",
                    params, mean_score, std_score
                );

                Ok(CandidateScore {
                    params,
                    fold_scores,
                    mean_score,
                    std_score,
                })
            })
            .collect::<Result<Vec<CandidateScore>>>()?;

        let mut best = 0;
        for (i, candidate) in scores.iter().enumerate().skip(1) {
            if candidate.mean_score > scores[best].mean_score {
                best = i;
            }
        }

        Ok(SearchResult {
            best_params: scores[best].params,
            best_score: scores[best].mean_score,
            candidates: scores,
        })
    }
}
