//! Stratified partitioning of labeled rows.
//!
//! Both splitters keep each class's share of rows (up to rounding) in every
//! partition. Everything is index based so callers slice features and labels
//! themselves.

use crate::error::{AppError, Result};
use rand::prelude::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::warn;

/// Row indices of one train/validation partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Row indices of each class, in order of appearance
fn class_members(y: &[usize], n_classes: usize) -> Vec<Vec<usize>> {
    let mut members = vec![Vec::new(); n_classes];
    for (i, &c) in y.iter().enumerate() {
        members[c].push(i);
    }
    members
}

fn n_classes_of(y: &[usize]) -> usize {
    y.iter().max().map_or(0, |m| m + 1)
}

/// Spread `total` draws over classes proportionally to `counts`.
///
/// Floors first, then hands the remainder to the largest fractional parts
/// (lower class index first on ties).
fn allocate(counts: &[usize], total: usize) -> Vec<usize> {
    let n: usize = counts.iter().sum();
    if n == 0 {
        return vec![0; counts.len()];
    }
    let exact: Vec<f64> = counts
        .iter()
        .map(|&c| c as f64 * total as f64 / n as f64)
        .collect();
    let mut alloc: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();

    let mut remaining = total.saturating_sub(alloc.iter().sum());
    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = exact[a] - exact[a].floor();
        let fb = exact[b] - exact[b].floor();
        fb.total_cmp(&fa).then(a.cmp(&b))
    });
    for &c in order.iter().cycle() {
        if remaining == 0 {
            break;
        }
        if alloc[c] < counts[c] {
            alloc[c] += 1;
            remaining -= 1;
        }
    }
    alloc
}

/// Stratified shuffled train/test split.
///
/// The test partition holds `ceil(test_size * n)` rows. Deterministic for a
/// given `seed`.
pub fn stratified_train_test_split(
    y: &[usize],
    test_size: f64,
    seed: u64,
) -> Result<ValidationSplit> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(AppError::Configuration(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }

    let n = y.len();
    let n_classes = n_classes_of(y);
    let members = class_members(y, n_classes);
    let counts: Vec<usize> = members.iter().map(Vec::len).collect();

    if let Some(min) = counts.iter().filter(|&&c| c > 0).min() {
        if *min < 2 {
            return Err(AppError::TrainingData(
                "the least populated class has only 1 member; stratified splitting needs at least 2"
                    .to_string(),
            ));
        }
    }

    let present = counts.iter().filter(|&&c| c > 0).count();
    let n_test = (test_size * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);
    if n_test < present || n_train < present {
        return Err(AppError::TrainingData(format!(
            "{} rows cannot be split into train ({}) and test ({}) partitions covering {} classes",
            n, n_train, n_test, present
        )));
    }

    let test_alloc = allocate(&counts, n_test);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(n_test);

    for (mut rows, take) in members.into_iter().zip(test_alloc) {
        rows.shuffle(&mut rng);
        test.extend_from_slice(&rows[..take]);
        train.extend_from_slice(&rows[take..]);
    }
    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    Ok(ValidationSplit { train, test })
}

/// Stratified K-fold cross-validator (no shuffling)
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    folds: usize,
}

impl StratifiedKFold {
    pub fn new(folds: usize) -> Self {
        Self { folds }
    }

    pub fn folds(&self) -> usize {
        self.folds
    }

    /// Each class's rows are cut into `folds` contiguous chunks in order of
    /// appearance; fold `f` validates on chunk `f` of every class.
    pub fn splits(&self, y: &[usize]) -> Result<Vec<ValidationSplit>> {
        if self.folds < 2 {
            return Err(AppError::Configuration("folds must be >= 2".into()));
        }

        let members = class_members(y, n_classes_of(y));
        let sizes: Vec<usize> = members.iter().map(Vec::len).filter(|&c| c > 0).collect();
        let (Some(&min), Some(&max)) = (sizes.iter().min(), sizes.iter().max()) else {
            return Err(AppError::TrainingData("no rows to cross-validate".into()));
        };
        if max < self.folds {
            return Err(AppError::TrainingData(format!(
                "{} folds exceed the size of every class (largest has {} members)",
                self.folds, max
            )));
        }
        if min < self.folds {
            warn!(
                "The least populated class has {} members, fewer than {} folds; some folds will not see it",
                min, self.folds
            );
        }

        let mut fold_of = vec![0usize; y.len()];
        for rows in &members {
            let base = rows.len() / self.folds;
            let extra = rows.len() % self.folds;
            let mut start = 0;
            for fold in 0..self.folds {
                let size = base + usize::from(fold < extra);
                for &row in &rows[start..start + size] {
                    fold_of[row] = fold;
                }
                start += size;
            }
        }

        Ok((0..self.folds)
            .map(|fold| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..y.len()).partition(|&i| fold_of[i] == fold);
                ValidationSplit { train, test }
            })
            .collect())
    }
}
