use crate::error::{AppError, Result};
use crate::models::RiskLevel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Bidirectional mapping between risk labels and class indices.
///
/// Classes are stored sorted, so index assignment is lexical
/// (`high=0, low=1, medium=2` for the risk categories). The table itself is
/// what gets persisted; loading never recomputes the order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCodec {
    classes: Vec<String>,
}

impl LabelCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a codec from an explicit class table (index = position)
    pub fn from_classes(classes: Vec<String>) -> Result<Self> {
        let unique: BTreeSet<&String> = classes.iter().collect();
        if unique.len() != classes.len() {
            return Err(AppError::Serialization(
                "label codec contains duplicate classes".to_string(),
            ));
        }
        Ok(Self { classes })
    }

    /// Learn the class table from raw labels.
    ///
    /// Every label must name a [`RiskLevel`]; anything else is a schema error.
    pub fn fit<S: AsRef<str>>(&mut self, labels: &[S]) -> Result<()> {
        if labels.is_empty() {
            return Err(AppError::TrainingData(
                "cannot fit label codec on an empty label column".to_string(),
            ));
        }
        if let Some(bad) = labels
            .iter()
            .map(|l| l.as_ref())
            .find(|l| RiskLevel::from_str(l).is_err())
        {
            return Err(AppError::Schema(format!(
                "unknown risk label {:?}; expected one of low, medium, high",
                bad
            )));
        }
        let unique: BTreeSet<&str> = labels.iter().map(|l| l.as_ref()).collect();
        self.classes = unique.into_iter().map(str::to_string).collect();
        Ok(())
    }

    /// Fit and encode in one pass
    pub fn fit_transform<S: AsRef<str>>(&mut self, labels: &[S]) -> Result<Vec<usize>> {
        self.fit(labels)?;
        self.transform(labels)
    }

    /// Encode labels into class indices
    pub fn transform<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<usize>> {
        labels.iter().map(|l| self.encode(l.as_ref())).collect()
    }

    pub fn encode(&self, label: &str) -> Result<usize> {
        self.classes
            .iter()
            .position(|c| c == label)
            .ok_or_else(|| AppError::Schema(format!("unknown label: {}", label)))
    }

    pub fn decode(&self, index: usize) -> Result<&str> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| AppError::Internal(format!("class index {} out of range", index)))
    }

    /// Decode class indices back into labels
    pub fn inverse_transform(&self, indices: &[usize]) -> Result<Vec<String>> {
        indices
            .iter()
            .map(|&i| self.decode(i).map(str::to_string))
            .collect()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn is_fitted(&self) -> bool {
        !self.classes.is_empty()
    }
}
