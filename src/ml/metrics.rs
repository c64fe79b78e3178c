use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Per-class evaluation metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Held-out evaluation of a fitted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Class labels in index order
    pub labels: Vec<String>,

    /// Metrics per class, aligned with `labels`
    pub per_class: Vec<ClassMetrics>,

    /// Fraction of correct predictions
    pub accuracy: f64,

    /// Unweighted mean over classes
    pub macro_avg: ClassMetrics,

    /// Support-weighted mean over classes
    pub weighted_avg: ClassMetrics,

    /// Rows are true classes, columns predicted classes
    pub confusion_matrix: Array2<usize>,
}

fn confusion_matrix(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Array2<usize> {
    let mut matrix = Array2::zeros((n_classes, n_classes));
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if t < n_classes && p < n_classes {
            matrix[[t, p]] += 1;
        }
    }
    matrix
}

fn per_class_metrics(matrix: &Array2<usize>) -> Vec<ClassMetrics> {
    let n_classes = matrix.nrows();
    (0..n_classes)
        .map(|c| {
            let tp = matrix[[c, c]];
            let predicted: usize = matrix.column(c).sum();
            let support: usize = matrix.row(c).sum();

            let precision = if predicted > 0 {
                tp as f64 / predicted as f64
            } else {
                0.0
            };
            let recall = if support > 0 {
                tp as f64 / support as f64
            } else {
                0.0
            };
            let f1_score = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            ClassMetrics {
                precision,
                recall,
                f1_score,
                support,
            }
        })
        .collect()
}

fn weighted_average(per_class: &[ClassMetrics]) -> ClassMetrics {
    let total: usize = per_class.iter().map(|m| m.support).sum();
    if total == 0 {
        return ClassMetrics::default();
    }
    let weigh = |f: fn(&ClassMetrics) -> f64| {
        per_class
            .iter()
            .map(|m| f(m) * m.support as f64)
            .sum::<f64>()
            / total as f64
    };
    ClassMetrics {
        precision: weigh(|m| m.precision),
        recall: weigh(|m| m.recall),
        f1_score: weigh(|m| m.f1_score),
        support: total,
    }
}

fn macro_average(per_class: &[ClassMetrics]) -> ClassMetrics {
    let n = per_class.len().max(1) as f64;
    ClassMetrics {
        precision: per_class.iter().map(|m| m.precision).sum::<f64>() / n,
        recall: per_class.iter().map(|m| m.recall).sum::<f64>() / n,
        f1_score: per_class.iter().map(|m| m.f1_score).sum::<f64>() / n,
        support: per_class.iter().map(|m| m.support).sum(),
    }
}

/// Fraction of positions where prediction equals truth
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// F1 averaged over classes, weighted by each class's support
pub fn weighted_f1(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> f64 {
    let matrix = confusion_matrix(y_true, y_pred, n_classes);
    weighted_average(&per_class_metrics(&matrix)).f1_score
}

impl ClassificationReport {
    pub fn compute(y_true: &[usize], y_pred: &[usize], labels: &[String]) -> Self {
        let matrix = confusion_matrix(y_true, y_pred, labels.len());
        let per_class = per_class_metrics(&matrix);

        Self {
            labels: labels.to_vec(),
            accuracy: accuracy(y_true, y_pred),
            macro_avg: macro_average(&per_class),
            weighted_avg: weighted_average(&per_class),
            per_class,
            confusion_matrix: matrix,
        }
    }

    /// Plain-text table in the familiar precision/recall/f1/support layout
    pub fn render(&self) -> String {
        let width = self
            .labels
            .iter()
            .map(|l| l.len())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(12);

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}\n",
            "", "precision", "recall", "f1-score", "support"
        );
        for (label, m) in self.labels.iter().zip(&self.per_class) {
            let _ = writeln!(
                out,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                label, m.precision, m.recall, m.f1_score, m.support
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.weighted_avg.support
        );
        for (name, m) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            let _ = writeln!(
                out,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, m.precision, m.recall, m.f1_score, m.support
            );
        }
        out
    }
}
