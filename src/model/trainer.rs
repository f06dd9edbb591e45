// =============================================================================
// Model Trainer — grid search with time-series cross-validation
// =============================================================================
//
// Candidate hyperparameters are scored by mean accuracy over expanding-window
// splits: each fold trains on a prefix of the history and validates on the
// next contiguous block.  Shuffled K-fold would leak future candles into the
// training side, so it is deliberately not offered.
//
// The winning parameters are refit on the full dataset and every run appends
// a JSON line to the training log.
// =============================================================================

use std::ops::Range;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::features::{FeatureFrame, FEATURE_NAMES};
use crate::model::gbm::{GbmClassifier, GbmParams};

// ---------------------------------------------------------------------------
// Time-series split
// ---------------------------------------------------------------------------

/// Expanding-window splitter: fold `k` trains on everything before its
/// validation block and validates on the block itself.
#[derive(Debug, Clone, Copy)]
pub struct TimeSeriesSplit {
    n_splits: usize,
}

impl TimeSeriesSplit {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    /// Produce `(train, validation)` index ranges over `n_samples` rows.
    ///
    /// The validation block size is `n_samples / (n_splits + 1)`; the first
    /// fold's training window absorbs the remainder.
    pub fn splits(&self, n_samples: usize) -> Result<Vec<(Range<usize>, Range<usize>)>> {
        if self.n_splits == 0 {
            bail!("n_splits must be at least 1");
        }
        let test_size = n_samples / (self.n_splits + 1);
        if test_size == 0 {
            bail!(
                "{} samples are too few for {} time-series folds",
                n_samples,
                self.n_splits
            );
        }

        let mut out = Vec::with_capacity(self.n_splits);
        for k in 0..self.n_splits {
            let test_start = n_samples - (self.n_splits - k) * test_size;
            out.push((0..test_start, test_start..test_start + test_size));
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// The hyperparameter grid the experiment has always searched.
pub fn default_grid() -> Vec<GbmParams> {
    let mut grid = Vec::new();
    for &n_estimators in &[100, 200] {
        for &max_depth in &[3, 5] {
            for &learning_rate in &[0.05, 0.1] {
                for &subsample in &[0.8, 0.9] {
                    grid.push(GbmParams {
                        n_estimators,
                        max_depth,
                        learning_rate,
                        subsample,
                    });
                }
            }
        }
    }
    grid
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// One line of the training log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainReport {
    pub timestamp: String,
    pub model_type: String,
    pub best_cv_accuracy: f64,
    pub final_accuracy_on_full_data: f64,
    pub best_params: GbmParams,
    pub n_rows: usize,
    pub positive_rate: f64,
}

/// The refit model together with its report.
pub struct TrainOutcome {
    pub model: GbmClassifier,
    pub report: TrainReport,
}

/// Fraction of rows the model classifies correctly.
pub fn accuracy(model: &GbmClassifier, rows: &[Vec<f64>], targets: &[u8]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let correct = rows
        .iter()
        .zip(targets.iter())
        .filter(|(row, &t)| model.predict(row).map(|p| p == t).unwrap_or(false))
        .count();
    correct as f64 / rows.len() as f64
}

// ---------------------------------------------------------------------------
// Grid search
// ---------------------------------------------------------------------------

/// Score every candidate in `grid` by mean cross-validated accuracy, refit
/// the winner on the full frame, and return it with the report.
pub fn grid_search(
    frame: &FeatureFrame,
    grid: &[GbmParams],
    n_splits: usize,
    seed: u64,
) -> Result<TrainOutcome> {
    if grid.is_empty() {
        bail!("hyperparameter grid is empty");
    }
    if frame.targets.len() != frame.rows.len() {
        bail!("feature frame was built without targets — cannot train");
    }

    let splits = TimeSeriesSplit::new(n_splits).splits(frame.n_rows())?;

    let mut best: Option<(f64, &GbmParams)> = None;

    for (ci, params) in grid.iter().enumerate() {
        let mut fold_scores = Vec::with_capacity(splits.len());

        for (train, valid) in &splits {
            let train_rows = &frame.rows[train.clone()];
            let train_targets = &frame.targets[train.clone()];

            let model = GbmClassifier::fit(train_rows, train_targets, &FEATURE_NAMES, params, seed)
                .context("cross-validation fit failed")?;

            let score = accuracy(&model, &frame.rows[valid.clone()], &frame.targets[valid.clone()]);
            fold_scores.push(score);
        }

        let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
        debug!(
            candidate = ci + 1,
            total = grid.len(),
            n_estimators = params.n_estimators,
            max_depth = params.max_depth,
            learning_rate = params.learning_rate,
            subsample = params.subsample,
            cv_accuracy = format!("{mean_score:.4}"),
            "grid candidate scored"
        );

        if best.map(|(b, _)| mean_score > b).unwrap_or(true) {
            best = Some((mean_score, params));
        }
    }

    let (best_cv_accuracy, best_params) = best.expect("grid is non-empty");

    // Refit the winner on the full dataset.
    let model = GbmClassifier::fit(&frame.rows, &frame.targets, &FEATURE_NAMES, best_params, seed)
        .context("final refit failed")?;
    let final_accuracy = accuracy(&model, &frame.rows, &frame.targets);

    info!(
        cv_accuracy = format!("{best_cv_accuracy:.4}"),
        full_accuracy = format!("{final_accuracy:.4}"),
        n_estimators = best_params.n_estimators,
        max_depth = best_params.max_depth,
        "grid search complete"
    );

    let report = TrainReport {
        timestamp: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        model_type: "gradient-boosted-trees".to_string(),
        best_cv_accuracy,
        final_accuracy_on_full_data: final_accuracy,
        best_params: best_params.clone(),
        n_rows: frame.n_rows(),
        positive_rate: frame.positive_rate(),
    };

    Ok(TrainOutcome { model, report })
}

/// Append one training report as a JSON line.
pub fn append_training_log(path: impl AsRef<Path>, report: &TrainReport) -> Result<()> {
    use std::io::Write;

    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let line = serde_json::to_string(report).context("failed to serialise training report")?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open training log at {}", path.display()))?;
    writeln!(file, "{line}").context("failed to append training log line")?;

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_signal(n: usize) -> FeatureFrame {
        // Feature 2 (rsi slot) carries the label; everything else is noise-free
        // constant so the tree must find the informative column.
        let mut rows = Vec::with_capacity(n);
        let mut targets = Vec::with_capacity(n);
        for i in 0..n {
            let signal = if i % 3 == 0 { 0.9 } else { 0.1 };
            let mut row = vec![0.5; FEATURE_NAMES.len()];
            row[2] = signal;
            rows.push(row);
            targets.push(if signal > 0.5 { 1 } else { 0 });
        }
        FeatureFrame {
            open_times: (0..n as i64).collect(),
            closes: vec![100.0; n],
            rows,
            targets,
        }
    }

    #[test]
    fn splits_are_expanding_and_contiguous() {
        let splits = TimeSeriesSplit::new(5).splits(120).unwrap();
        assert_eq!(splits.len(), 5);

        // test_size = 120 / 6 = 20
        assert_eq!(splits[0], (0..20, 20..40));
        assert_eq!(splits[4], (0..100, 100..120));

        for (train, valid) in &splits {
            assert_eq!(train.end, valid.start); // no gap, no overlap
        }
    }

    #[test]
    fn splits_absorb_remainder_into_first_train_window() {
        let splits = TimeSeriesSplit::new(3).splits(103).unwrap();
        // test_size = 103 / 4 = 25; first train window gets the extra 3 rows.
        assert_eq!(splits[0].0, 0..28);
        assert_eq!(splits[2].1, 78..103);
    }

    #[test]
    fn too_few_samples_is_an_error() {
        assert!(TimeSeriesSplit::new(5).splits(4).is_err());
    }

    #[test]
    fn grid_has_the_sixteen_original_combinations() {
        let grid = default_grid();
        assert_eq!(grid.len(), 16);
        assert!(grid.iter().any(|p| p.n_estimators == 100
            && p.max_depth == 5
            && (p.learning_rate - 0.05).abs() < 1e-12
            && (p.subsample - 0.8).abs() < 1e-12));
    }

    #[test]
    fn grid_search_finds_the_signal() {
        let frame = frame_with_signal(240);
        let grid = vec![
            GbmParams {
                n_estimators: 20,
                max_depth: 2,
                learning_rate: 0.3,
                subsample: 0.9,
            },
            GbmParams {
                n_estimators: 10,
                max_depth: 1,
                learning_rate: 0.3,
                subsample: 0.9,
            },
        ];

        let outcome = grid_search(&frame, &grid, 4, 42).unwrap();
        assert!(
            outcome.report.best_cv_accuracy > 0.9,
            "cv accuracy too low: {}",
            outcome.report.best_cv_accuracy
        );
        assert!(outcome.report.final_accuracy_on_full_data > 0.9);
        assert_eq!(outcome.report.n_rows, 240);
    }

    #[test]
    fn untargeted_frame_is_rejected() {
        let mut frame = frame_with_signal(100);
        frame.targets.clear();
        let grid = default_grid();
        assert!(grid_search(&frame, &grid, 5, 1).is_err());
    }

    #[test]
    fn training_log_appends_one_line_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("training_log.jsonl");

        let report = TrainReport {
            timestamp: "2024-01-01 00:00:00".to_string(),
            model_type: "gradient-boosted-trees".to_string(),
            best_cv_accuracy: 0.61,
            final_accuracy_on_full_data: 0.72,
            best_params: GbmParams::default(),
            n_rows: 500,
            positive_rate: 0.52,
        };
        append_training_log(&path, &report).unwrap();
        append_training_log(&path, &report).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: TrainReport = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.n_rows, 500);
    }
}
