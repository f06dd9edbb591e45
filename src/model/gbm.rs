// =============================================================================
// Gradient-Boosted Classifier — depth-limited regression trees on logistic loss
// =============================================================================
//
// Binary classifier predicting whether the next candle closes higher.  Each
// boosting round fits a small regression tree to the logistic-loss gradients,
// with Newton leaf values and an L2 regulariser on the leaf weights:
//
//   p_i     = sigmoid(F_i)
//   grad_i  = y_i - p_i              (negative gradient)
//   hess_i  = p_i * (1 - p_i)
//   leaf    = sum(grad) / (sum(hess) + lambda)
//   gain    = G_L²/(H_L+λ) + G_R²/(H_R+λ) − G²/(H+λ)
//
// Row subsampling per round is driven by a seedable RNG so training runs are
// reproducible.  The fitted model serialises to JSON.
// =============================================================================

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// L2 regularisation applied to every leaf weight.
const LAMBDA: f64 = 1.0;
/// Minimum rows on each side of a split.
const MIN_LEAF_SAMPLES: usize = 5;
/// Maximum candidate thresholds examined per feature.
const MAX_SPLIT_CANDIDATES: usize = 32;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("training set is empty")]
    EmptyDataset,

    #[error("model has no trees — train it first")]
    NotTrained,

    #[error("targets length {targets} does not match rows length {rows}")]
    LengthMismatch { rows: usize, targets: usize },

    #[error("expected {expected} features, got {got}")]
    FeatureMismatch { expected: usize, got: usize },

    #[error("model file I/O failed at {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialise model")]
    Serialization(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Hyperparameters
// ---------------------------------------------------------------------------

/// Boosting hyperparameters (the grid-search axes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbmParams {
    /// Number of boosting rounds (trees).
    pub n_estimators: usize,
    /// Maximum depth of each tree.
    pub max_depth: usize,
    /// Shrinkage applied to every tree's contribution.
    pub learning_rate: f64,
    /// Fraction of rows sampled per boosting round.
    pub subsample: f64,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: 3,
            learning_rate: 0.1,
            subsample: 0.9,
        }
    }
}

// ---------------------------------------------------------------------------
// Regression tree (flat arena representation, serde-friendly)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Node {
    /// Split feature index (unused on leaves).
    feature: usize,
    /// Split threshold: rows with value <= threshold go left.
    threshold: f64,
    /// Child indices into the arena (unused on leaves).
    left: usize,
    right: usize,
    /// Leaf weight (unused on internal nodes).
    value: f64,
    is_leaf: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Fit a tree to the gradient/hessian pairs of the sampled rows.
    fn fit(
        rows: &[Vec<f64>],
        grad: &[f64],
        hess: &[f64],
        indices: &[usize],
        max_depth: usize,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.build(rows, grad, hess, indices, max_depth, 0);
        tree
    }

    /// Recursively grow a node; returns its arena index.
    fn build(
        &mut self,
        rows: &[Vec<f64>],
        grad: &[f64],
        hess: &[f64],
        indices: &[usize],
        max_depth: usize,
        depth: usize,
    ) -> usize {
        let g: f64 = indices.iter().map(|&i| grad[i]).sum();
        let h: f64 = indices.iter().map(|&i| hess[i]).sum();

        let make_leaf = |nodes: &mut Vec<Node>| {
            let value = g / (h + LAMBDA);
            nodes.push(Node {
                feature: 0,
                threshold: 0.0,
                left: 0,
                right: 0,
                value,
                is_leaf: true,
            });
            nodes.len() - 1
        };

        if depth >= max_depth || indices.len() < 2 * MIN_LEAF_SAMPLES {
            return make_leaf(&mut self.nodes);
        }

        let Some(split) = best_split(rows, grad, hess, indices, g, h) else {
            return make_leaf(&mut self.nodes);
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| rows[i][split.feature] <= split.threshold);

        // Reserve the parent slot before recursing so children land after it.
        self.nodes.push(Node {
            feature: split.feature,
            threshold: split.threshold,
            left: 0,
            right: 0,
            value: 0.0,
            is_leaf: false,
        });
        let parent = self.nodes.len() - 1;

        let left = self.build(rows, grad, hess, &left_idx, max_depth, depth + 1);
        let right = self.build(rows, grad, hess, &right_idx, max_depth, depth + 1);
        self.nodes[parent].left = left;
        self.nodes[parent].right = right;

        parent
    }

    fn predict(&self, row: &[f64]) -> f64 {
        // The root is the first node pushed at depth 0 — index 0 always.
        let mut idx = 0;
        loop {
            let node = &self.nodes[idx];
            if node.is_leaf {
                return node.value;
            }
            idx = if row[node.feature] <= node.threshold {
                node.left
            } else {
                node.right
            };
        }
    }

    /// Feature indices used by this tree's internal nodes.
    fn split_features(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes.iter().filter(|n| !n.is_leaf).map(|n| n.feature)
    }
}

struct Split {
    feature: usize,
    threshold: f64,
}

/// Exhaustive greedy split search over all features with quantile-sampled
/// thresholds.  Returns `None` when no split improves the objective.
fn best_split(
    rows: &[Vec<f64>],
    grad: &[f64],
    hess: &[f64],
    indices: &[usize],
    g_total: f64,
    h_total: f64,
) -> Option<Split> {
    let n_features = rows[indices[0]].len();
    let parent_score = g_total * g_total / (h_total + LAMBDA);

    let mut best: Option<(f64, Split)> = None;

    for feature in 0..n_features {
        let mut ordered: Vec<usize> = indices.to_vec();
        ordered.sort_by(|&a, &b| {
            rows[a][feature]
                .partial_cmp(&rows[b][feature])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let step = (ordered.len() / MAX_SPLIT_CANDIDATES).max(1);

        let mut g_left = 0.0;
        let mut h_left = 0.0;
        for (pos, &idx) in ordered.iter().enumerate() {
            g_left += grad[idx];
            h_left += hess[idx];

            if pos + 1 < MIN_LEAF_SAMPLES
                || ordered.len() - (pos + 1) < MIN_LEAF_SAMPLES
                || (pos + 1) % step != 0
            {
                continue;
            }

            let here = rows[idx][feature];
            let next = rows[ordered[pos + 1]][feature];
            if here == next {
                continue; // cannot separate identical values
            }

            let g_right = g_total - g_left;
            let h_right = h_total - h_left;

            let gain = g_left * g_left / (h_left + LAMBDA)
                + g_right * g_right / (h_right + LAMBDA)
                - parent_score;

            if gain > 1e-9 && best.as_ref().map(|(b, _)| gain > *b).unwrap_or(true) {
                best = Some((
                    gain,
                    Split {
                        feature,
                        threshold: (here + next) / 2.0,
                    },
                ));
            }
        }
    }

    best.map(|(_, split)| split)
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// The fitted gradient-boosted classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbmClassifier {
    trees: Vec<RegressionTree>,
    params: GbmParams,
    /// Log-odds prior from the class balance of the training set.
    base_score: f64,
    feature_names: Vec<String>,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl GbmClassifier {
    /// Fit the classifier on a feature matrix and binary targets.
    ///
    /// `seed` drives the row subsampling; the same data, params and seed
    /// reproduce the same model bit-for-bit.
    pub fn fit(
        rows: &[Vec<f64>],
        targets: &[u8],
        feature_names: &[&str],
        params: &GbmParams,
        seed: u64,
    ) -> Result<Self, ModelError> {
        if rows.is_empty() {
            return Err(ModelError::EmptyDataset);
        }
        if rows.len() != targets.len() {
            return Err(ModelError::LengthMismatch {
                rows: rows.len(),
                targets: targets.len(),
            });
        }

        let n = rows.len();
        let mut rng = StdRng::seed_from_u64(seed);

        let positive = targets.iter().filter(|&&t| t == 1).count() as f64 / n as f64;
        let p0 = positive.clamp(1e-6, 1.0 - 1e-6);
        let base_score = (p0 / (1.0 - p0)).ln();

        let mut scores = vec![base_score; n];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for round in 0..params.n_estimators {
            let mut grad = vec![0.0; n];
            let mut hess = vec![0.0; n];
            for i in 0..n {
                let p = sigmoid(scores[i]);
                grad[i] = targets[i] as f64 - p;
                hess[i] = p * (1.0 - p);
            }

            let mut sampled: Vec<usize> =
                (0..n).filter(|_| rng.gen::<f64>() < params.subsample).collect();
            if sampled.len() < 2 * MIN_LEAF_SAMPLES {
                sampled = (0..n).collect();
            }

            let tree = RegressionTree::fit(rows, &grad, &hess, &sampled, params.max_depth);

            for i in 0..n {
                scores[i] += params.learning_rate * tree.predict(&rows[i]);
            }

            trees.push(tree);

            if round % 50 == 49 {
                debug!(round = round + 1, total = params.n_estimators, "boosting progress");
            }
        }

        info!(
            trees = trees.len(),
            max_depth = params.max_depth,
            learning_rate = params.learning_rate,
            subsample = params.subsample,
            "gradient-boosted classifier fitted"
        );

        Ok(Self {
            trees,
            params: params.clone(),
            base_score,
            feature_names: feature_names.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Probability that the row belongs to class 1 (next close higher).
    pub fn predict_proba(&self, row: &[f64]) -> Result<f64, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotTrained);
        }
        if row.len() != self.feature_names.len() {
            return Err(ModelError::FeatureMismatch {
                expected: self.feature_names.len(),
                got: row.len(),
            });
        }

        let mut score = self.base_score;
        for tree in &self.trees {
            score += self.params.learning_rate * tree.predict(row);
        }
        Ok(sigmoid(score))
    }

    /// Hard class prediction: 1 (up) or 0 (down).
    pub fn predict(&self, row: &[f64]) -> Result<u8, ModelError> {
        Ok(if self.predict_proba(row)? >= 0.5 { 1 } else { 0 })
    }

    pub fn params(&self) -> &GbmParams {
        &self.params
    }

    /// Normalised split counts per feature, highest first.
    pub fn feature_importance(&self) -> Vec<(String, f64)> {
        let mut counts = vec![0usize; self.feature_names.len()];
        for tree in &self.trees {
            for feature in tree.split_features() {
                if feature < counts.len() {
                    counts[feature] += 1;
                }
            }
        }

        let total: usize = counts.iter().sum();
        if total == 0 {
            return Vec::new();
        }

        let mut importance: Vec<(String, f64)> = self
            .feature_names
            .iter()
            .zip(counts.iter())
            .map(|(name, &c)| (name.clone(), c as f64 / total as f64))
            .collect();
        importance.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        importance
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    /// Serialise the model to `path` as JSON (atomic tmp + rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| ModelError::Io {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
        }

        let content = serde_json::to_string(self)?;
        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content).map_err(|source| ModelError::Io {
            path: tmp_path.display().to_string(),
            source,
        })?;
        std::fs::rename(&tmp_path, path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;

        info!(path = %path.display(), trees = self.trees.len(), "model saved");
        Ok(())
    }

    /// Load a model previously written by [`GbmClassifier::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let model: Self = serde_json::from_str(&content)?;
        info!(path = %path.display(), trees = model.trees.len(), "model loaded");
        Ok(model)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: [&str; 3] = ["a", "b", "c"];

    /// Separable toy problem: class 1 iff feature 0 > 0.5.
    fn toy_dataset(n: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<u8>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows = Vec::with_capacity(n);
        let mut targets = Vec::with_capacity(n);
        for _ in 0..n {
            let a: f64 = rng.gen();
            let b: f64 = rng.gen();
            let c: f64 = rng.gen();
            targets.push(if a > 0.5 { 1 } else { 0 });
            rows.push(vec![a, b, c]);
        }
        (rows, targets)
    }

    fn small_params() -> GbmParams {
        GbmParams {
            n_estimators: 30,
            max_depth: 3,
            learning_rate: 0.3,
            subsample: 0.9,
        }
    }

    #[test]
    fn empty_dataset_is_rejected() {
        let err = GbmClassifier::fit(&[], &[], &NAMES, &small_params(), 7);
        assert!(matches!(err, Err(ModelError::EmptyDataset)));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let rows = vec![vec![0.1, 0.2, 0.3]];
        let err = GbmClassifier::fit(&rows, &[], &NAMES, &small_params(), 7);
        assert!(matches!(err, Err(ModelError::LengthMismatch { .. })));
    }

    #[test]
    fn learns_a_separable_problem() {
        let (rows, targets) = toy_dataset(400, 11);
        let model = GbmClassifier::fit(&rows, &targets, &NAMES, &small_params(), 42).unwrap();

        let correct = rows
            .iter()
            .zip(targets.iter())
            .filter(|(row, &t)| model.predict(row).unwrap() == t)
            .count();
        let accuracy = correct as f64 / rows.len() as f64;
        assert!(accuracy > 0.95, "expected high accuracy, got {accuracy}");
    }

    #[test]
    fn probabilities_stay_in_unit_interval() {
        let (rows, targets) = toy_dataset(200, 3);
        let model = GbmClassifier::fit(&rows, &targets, &NAMES, &small_params(), 1).unwrap();
        for row in &rows {
            let p = model.predict_proba(row).unwrap();
            assert!((0.0..=1.0).contains(&p), "probability out of range: {p}");
        }
    }

    #[test]
    fn same_seed_reproduces_the_model() {
        let (rows, targets) = toy_dataset(200, 5);
        let a = GbmClassifier::fit(&rows, &targets, &NAMES, &small_params(), 99).unwrap();
        let b = GbmClassifier::fit(&rows, &targets, &NAMES, &small_params(), 99).unwrap();
        for row in rows.iter().take(20) {
            assert_eq!(a.predict_proba(row).unwrap(), b.predict_proba(row).unwrap());
        }
    }

    #[test]
    fn feature_mismatch_is_rejected() {
        let (rows, targets) = toy_dataset(100, 2);
        let model = GbmClassifier::fit(&rows, &targets, &NAMES, &small_params(), 4).unwrap();
        let err = model.predict(&[0.5, 0.5]);
        assert!(matches!(err, Err(ModelError::FeatureMismatch { expected: 3, got: 2 })));
    }

    #[test]
    fn informative_feature_dominates_importance() {
        let (rows, targets) = toy_dataset(400, 17);
        let model = GbmClassifier::fit(&rows, &targets, &NAMES, &small_params(), 8).unwrap();
        let importance = model.feature_importance();
        assert_eq!(importance[0].0, "a");
        // Early rounds split exclusively on the informative feature, so its
        // share must clearly exceed a uniform split across three features.
        assert!(importance[0].1 > 0.34);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("model.json");

        let (rows, targets) = toy_dataset(150, 21);
        let model = GbmClassifier::fit(&rows, &targets, &NAMES, &small_params(), 6).unwrap();
        model.save(&path).unwrap();

        let loaded = GbmClassifier::load(&path).unwrap();
        for row in rows.iter().take(10) {
            assert_eq!(
                model.predict_proba(row).unwrap(),
                loaded.predict_proba(row).unwrap()
            );
        }
        assert_eq!(loaded.params(), model.params());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn imbalanced_classes_shift_the_prior() {
        // 90 % negatives: with no signal in the features, predictions lean 0.
        let rows: Vec<Vec<f64>> = (0..200).map(|_| vec![0.5, 0.5, 0.5]).collect();
        let mut targets = vec![0u8; 180];
        targets.extend(vec![1u8; 20]);
        let model = GbmClassifier::fit(&rows, &targets, &NAMES, &small_params(), 9).unwrap();
        let p = model.predict_proba(&[0.5, 0.5, 0.5]).unwrap();
        assert!(p < 0.5, "prior should pull probability below 0.5, got {p}");
    }
}
