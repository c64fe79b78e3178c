use crate::error::{AppError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Trait for fitted feature transformations
///
/// `fit` learns parameters from training data only; `transform` replays them
/// unchanged on any later batch.
pub trait Transformer: Send + Sync {
    /// Stage name (used in logs)
    fn name(&self) -> &'static str;

    /// Learn parameters from training data
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    /// Apply the fitted parameters
    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Fit then transform the same data
    fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Number of columns seen at fit time
    fn n_features_in(&self) -> Option<usize>;

    /// Check if the stage has been fitted
    fn is_fitted(&self) -> bool {
        self.n_features_in().is_some()
    }
}

fn check_width(stage: &str, expected: Option<usize>, x: &Array2<f64>) -> Result<usize> {
    let expected = expected.ok_or_else(|| {
        AppError::Internal(format!("{} stage used before fit", stage))
    })?;
    if x.ncols() != expected {
        return Err(AppError::Schema(format!(
            "{} was fit on {} features but got {}",
            stage,
            expected,
            x.ncols()
        )));
    }
    Ok(expected)
}

/// Replaces missing (NaN) values with the per-column training mean
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeanImputer {
    statistics: Option<Array1<f64>>,
}

impl MeanImputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill values learned at fit time
    pub fn statistics(&self) -> Option<&Array1<f64>> {
        self.statistics.as_ref()
    }
}

impl Transformer for MeanImputer {
    fn name(&self) -> &'static str {
        "imputer"
    }

    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let mut means = Array1::zeros(x.ncols());
        for (j, column) in x.axis_iter(Axis(1)).enumerate() {
            let (sum, count) = column
                .iter()
                .filter(|v| !v.is_nan())
                .fold((0.0, 0usize), |(s, c), &v| (s + v, c + 1));
            if count == 0 {
                return Err(AppError::Schema(format!(
                    "feature column {} has no numeric values",
                    j
                )));
            }
            means[j] = sum / count as f64;
        }
        self.statistics = Some(means);
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        check_width(self.name(), self.n_features_in(), x)?;
        let Some(means) = self.statistics.as_ref() else {
            return Err(AppError::Internal("imputer used before fit".to_string()));
        };

        let mut out = x.to_owned();
        for (mut column, &fill) in out.axis_iter_mut(Axis(1)).zip(means.iter()) {
            column.mapv_inplace(|v| if v.is_nan() { fill } else { v });
        }
        Ok(out)
    }

    fn n_features_in(&self) -> Option<usize> {
        self.statistics.as_ref().map(|s| s.len())
    }
}

/// Rescales features to zero mean and unit variance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mean(&self) -> Option<&Array1<f64>> {
        self.mean.as_ref()
    }

    pub fn scale(&self) -> Option<&Array1<f64>> {
        self.scale.as_ref()
    }
}

impl Transformer for StandardScaler {
    fn name(&self) -> &'static str {
        "scaler"
    }

    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let mean = x.mean_axis(Axis(0)).ok_or_else(|| {
            AppError::TrainingData("cannot fit scaler on an empty matrix".to_string())
        })?;
        // Constant columns keep their offset but are not divided by zero.
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s < 1e-12 { 1.0 } else { s });

        self.mean = Some(mean);
        self.scale = Some(scale);
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        check_width(self.name(), self.n_features_in(), x)?;
        match (self.mean.as_ref(), self.scale.as_ref()) {
            (Some(mean), Some(scale)) => Ok((x - mean) / scale),
            _ => Err(AppError::Internal("scaler used before fit".to_string())),
        }
    }

    fn n_features_in(&self) -> Option<usize> {
        self.mean.as_ref().map(|m| m.len())
    }
}

/// Preprocessing stage as stored in a fitted pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PreprocessStep {
    Imputer(MeanImputer),
    Scaler(StandardScaler),
}

impl PreprocessStep {
    fn inner(&self) -> &dyn Transformer {
        match self {
            PreprocessStep::Imputer(t) => t,
            PreprocessStep::Scaler(t) => t,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Transformer {
        match self {
            PreprocessStep::Imputer(t) => t,
            PreprocessStep::Scaler(t) => t,
        }
    }
}

impl Transformer for PreprocessStep {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        self.inner_mut().fit(x)
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.inner().transform(x)
    }

    fn n_features_in(&self) -> Option<usize> {
        self.inner().n_features_in()
    }
}
