use crate::error::{AppError, Result};
use ndarray::{Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trait for classifiers
pub trait Classifier: Send + Sync {
    /// Train on a feature matrix and class indices in `0..n_classes`
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()>;

    /// Predict class probabilities (n_samples × n_classes)
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Predict class indices (arg-max of the probabilities)
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.axis_iter(Axis(0)).map(|row| argmax(row).0).collect())
    }

    /// Check if model is trained
    fn is_trained(&self) -> bool;
}

/// Index and value of the largest entry; the first one wins ties
pub fn argmax(row: ArrayView1<f64>) -> (usize, f64) {
    row.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| {
            if v > bv {
                (i, v)
            } else {
                (bi, bv)
            }
        })
}

/// Hyperparameters of the random forest that take part in model selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees
    pub n_estimators: usize,

    /// Maximum tree depth (`None` grows until leaves are pure)
    pub max_depth: Option<usize>,

    /// Minimum samples required to split an internal node
    pub min_samples_split: usize,

    /// Minimum samples required in each leaf
    pub min_samples_leaf: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

impl fmt::Display for ForestParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let depth = self
            .max_depth
            .map(|d| d.to_string())
            .unwrap_or_else(|| "None".to_string());
        write!(
            f,
            "n_estimators={}, max_depth={}, min_samples_split={}, min_samples_leaf={}",
            self.n_estimators, depth, self.min_samples_split, self.min_samples_leaf
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        distribution: Vec<f64>,
    },
}

/// Single CART tree with class-distribution leaves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Class distribution of the leaf reached by `row`
    fn leaf_distribution(&self, row: ArrayView1<f64>) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf { distribution } => return distribution,
            }
        }
    }

    /// Longest root-to-leaf path
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                Node::Leaf { .. } => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Best split found for one node
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

/// Grows one tree on a bootstrap sample
struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    y: &'a [usize],
    class_weight: &'a [f64],
    n_classes: usize,
    max_features: usize,
    params: ForestParams,
    rng: Xoshiro256PlusPlus,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl<'a> TreeBuilder<'a> {
    fn weighted_counts(&self, indices: &[usize]) -> Vec<f64> {
        let mut counts = vec![0.0; self.n_classes];
        for &i in indices {
            counts[self.y[i]] += self.class_weight[self.y[i]];
        }
        counts
    }

    fn grow(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            distribution: Vec::new(),
        });

        let counts = self.weighted_counts(&indices);
        let total: f64 = counts.iter().sum();
        let impurity = gini(&counts, total);

        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
        let splittable = !depth_reached
            && impurity > 0.0
            && indices.len() >= self.params.min_samples_split
            && indices.len() >= 2 * self.params.min_samples_leaf;

        if splittable {
            if let Some(split) = self.best_split(&indices) {
                let x = self.x;
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                    .into_iter()
                    .partition(|&i| x[[i, split.feature]] <= split.threshold);

                self.importances[split.feature] += total * impurity - split.impurity;

                let left = self.grow(left_idx, depth + 1);
                let right = self.grow(right_idx, depth + 1);
                self.nodes[id] = Node::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left,
                    right,
                };
                return id;
            }
        }

        let distribution = if total > 0.0 {
            counts.iter().map(|c| c / total).collect()
        } else {
            vec![1.0 / self.n_classes as f64; self.n_classes]
        };
        self.nodes[id] = Node::Leaf { distribution };
        id
    }

    /// Search a random feature subset for the split minimising weighted Gini.
    ///
    /// Features beyond `max_features` are only visited while no valid split
    /// has been found yet.
    fn best_split(&mut self, indices: &[usize]) -> Option<SplitCandidate> {
        let n_features = self.x.ncols();
        let mut features: Vec<usize> = (0..n_features).collect();
        features.shuffle(&mut self.rng);

        let min_leaf = self.params.min_samples_leaf;
        let mut best: Option<SplitCandidate> = None;
        let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(indices.len());

        for (visited, &feature) in features.iter().enumerate() {
            if visited >= self.max_features && best.is_some() {
                break;
            }

            sorted.clear();
            sorted.extend(indices.iter().map(|&i| (self.x[[i, feature]], self.y[i])));
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut right = vec![0.0; self.n_classes];
            for &(_, class) in &sorted {
                right[class] += self.class_weight[class];
            }
            let mut left = vec![0.0; self.n_classes];
            let mut left_total = 0.0;
            let mut right_total: f64 = right.iter().sum();

            for k in 0..sorted.len() - 1 {
                let (value, class) = sorted[k];
                let w = self.class_weight[class];
                left[class] += w;
                right[class] -= w;
                left_total += w;
                right_total -= w;

                let n_left = k + 1;
                let n_right = sorted.len() - n_left;
                let next = sorted[k + 1].0;
                if value >= next || n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let child_impurity =
                    left_total * gini(&left, left_total) + right_total * gini(&right, right_total);
                if best.as_ref().map_or(true, |b| child_impurity < b.impurity) {
                    let mid = value + (next - value) / 2.0;
                    best = Some(SplitCandidate {
                        feature,
                        threshold: if mid < next { mid } else { value },
                        impurity: child_impurity,
                    });
                }
            }
        }

        best
    }
}

fn gini(counts: &[f64], total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|c| (c / total).powi(2)).sum::<f64>()
}

/// Per-class weights inversely proportional to class frequency
pub fn balanced_class_weights(y: &[usize], n_classes: usize) -> Vec<f64> {
    let mut counts = vec![0usize; n_classes];
    for &c in y {
        counts[c] += 1;
    }
    counts
        .iter()
        .map(|&c| {
            if c == 0 {
                0.0
            } else {
                y.len() as f64 / (n_classes as f64 * c as f64)
            }
        })
        .collect()
}

/// Bagged ensemble of randomized decision trees
///
/// Each tree sees a bootstrap sample of the rows and considers √p features
/// per split. Rows are weighted with balanced class weights so minority risk
/// categories are not drowned out. Tree `t` draws from an RNG seeded with
/// `seed + t`, which makes training independent of thread scheduling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    params: ForestParams,
    seed: u64,
    n_classes: usize,
    n_features: usize,
    trees: Vec<DecisionTree>,
    feature_importances: Vec<f64>,
}

impl RandomForestClassifier {
    pub fn new(params: ForestParams, seed: u64) -> Self {
        Self {
            params,
            seed,
            n_classes: 0,
            n_features: 0,
            trees: Vec::new(),
            feature_importances: Vec::new(),
        }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Normalised mean impurity decrease per feature
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    fn validate_params(&self) -> Result<()> {
        let p = &self.params;
        if p.n_estimators == 0 {
            return Err(AppError::Configuration("n_estimators must be > 0".into()));
        }
        if p.min_samples_split < 2 {
            return Err(AppError::Configuration("min_samples_split must be >= 2".into()));
        }
        if p.min_samples_leaf == 0 {
            return Err(AppError::Configuration("min_samples_leaf must be >= 1".into()));
        }
        if p.max_depth == Some(0) {
            return Err(AppError::Configuration("max_depth must be >= 1".into()));
        }
        Ok(())
    }
}

impl Classifier for RandomForestClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
        self.validate_params()?;

        let n_samples = x.nrows();
        if n_samples == 0 || n_samples != y.len() {
            return Err(AppError::TrainingData(format!(
                "feature rows ({}) and labels ({}) must be non-empty and equal",
                n_samples,
                y.len()
            )));
        }
        if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
            return Err(AppError::TrainingData(format!(
                "class index {} outside 0..{}",
                bad, n_classes
            )));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(AppError::TrainingData(
                "forest input must be imputed and finite".to_string(),
            ));
        }

        let n_features = x.ncols();
        let class_weight = balanced_class_weights(y, n_classes);
        let max_features = ((n_features as f64).sqrt() as usize).max(1);
        let params = self.params;
        let seed = self.seed;

        let grown: Vec<(DecisionTree, Vec<f64>)> = (0..params.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed.wrapping_add(t as u64));
                let bootstrap: Vec<usize> =
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();

                let mut builder = TreeBuilder {
                    x,
                    y,
                    class_weight: &class_weight,
                    n_classes,
                    max_features,
                    params,
                    rng,
                    nodes: Vec::new(),
                    importances: vec![0.0; n_features],
                };
                builder.grow(bootstrap, 0);
                (DecisionTree { nodes: builder.nodes }, builder.importances)
            })
            .collect();

        let mut importances = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(grown.len());
        for (tree, tree_importances) in grown {
            let sum: f64 = tree_importances.iter().sum();
            if sum > 0.0 {
                for (acc, v) in importances.iter_mut().zip(tree_importances) {
                    *acc += v / sum;
                }
            }
            trees.push(tree);
        }
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        self.trees = trees;
        self.n_classes = n_classes;
        self.n_features = n_features;
        self.feature_importances = importances;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_trained() {
            return Err(AppError::Internal("Model not trained".to_string()));
        }
        if x.ncols() != self.n_features {
            return Err(AppError::Schema(format!(
                "forest was fit on {} features but got {}",
                self.n_features,
                x.ncols()
            )));
        }

        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for (row, mut out) in x.axis_iter(Axis(0)).zip(proba.axis_iter_mut(Axis(0))) {
            for tree in &self.trees {
                let dist = tree.leaf_distribution(row);
                out.zip_mut_with(&ArrayView1::from(dist), |acc, &p| *acc += p);
            }
        }
        proba /= self.trees.len() as f64;
        Ok(proba)
    }

    fn is_trained(&self) -> bool {
        !self.trees.is_empty()
    }
}
