//! Per-target model selection.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::regressor::{FittedRegressor, ModelSettings, RegressorKind};
use super::vocabulary::FeatureVocabularies;
use super::{FeatureRow, TargetMetric};
use crate::data::MergedEventRecord;
use crate::error::{AnalysisError, Result};

/// The winning model for one target, with everything needed to apply it.
#[derive(Debug)]
pub struct TrainedMetricModel {
    pub target: TargetMetric,
    pub regressor: FittedRegressor,
    /// Held-out R² of the winner. May be negative.
    pub score: f64,
    pub candidates: Vec<CandidateScore>,
    pub vocabularies: FeatureVocabularies,
    /// Input columns in the order the regressor expects them.
    pub feature_names: Vec<String>,
    pub training_samples: usize,
    pub evaluation_samples: usize,
}

impl TrainedMetricModel {
    pub fn kind(&self) -> RegressorKind {
        self.regressor.kind()
    }

    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            target: self.target,
            chosen: self.kind(),
            r2: self.score,
            candidates: self.candidates.clone(),
            training_samples: self.training_samples,
            evaluation_samples: self.evaluation_samples,
        }
    }
}

/// Held-out score of one candidate; `r2` is `None` when the fit failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub kind: RegressorKind,
    pub r2: Option<f64>,
}

/// Serializable description of a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub target: TargetMetric,
    pub chosen: RegressorKind,
    pub r2: f64,
    pub candidates: Vec<CandidateScore>,
    pub training_samples: usize,
    pub evaluation_samples: usize,
}

/// Row indices of a shuffled train/evaluation split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n` with a seeded generator and hold out `ceil(n * test_fraction)`
/// rows, keeping at least one row on each side.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Result<TrainTestSplit> {
    if n < 2 {
        return Err(AnalysisError::insufficient(format!(
            "need at least 2 merged events to train, found {n}"
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((n as f64 * test_fraction).ceil() as usize).clamp(1, n - 1);
    let train = indices.split_off(n_test);

    Ok(TrainTestSplit {
        train,
        test: indices,
    })
}

/// Coefficient of determination.
///
/// When the evaluation targets are constant the score is 1.0 for a perfect
/// fit and 0.0 otherwise.
pub fn r2_score(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> f64 {
    let n = y_true.len();
    if n == 0 {
        return 0.0;
    }

    let mean = y_true.sum() / n as f64;
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        if ss_res == 0.0 { 1.0 } else { 0.0 }
    } else {
        1.0 - ss_res / ss_tot
    }
}

/// Train and select one model per target metric.
///
/// Vocabularies are fit once and copied into every model; all targets share
/// one seeded split, so training is reproducible for a fixed seed and table.
pub fn train_models(
    records: &[MergedEventRecord],
    settings: &ModelSettings,
) -> Result<Vec<TrainedMetricModel>> {
    let vocabularies = FeatureVocabularies::fit(records)?;
    let split = train_test_split(records.len(), settings.test_fraction, settings.seed)?;

    let rows = records
        .iter()
        .map(|r| vocabularies.encode_record(r))
        .collect::<Result<Vec<_>>>()?;
    let flat: Vec<f64> = rows.iter().flat_map(FeatureRow::to_vec).collect();
    let x = Array2::from_shape_vec((rows.len(), FeatureRow::NUM_FEATURES), flat)
        .map_err(|e| AnalysisError::insufficient(format!("feature matrix: {e}")))?;

    let x_train = x.select(Axis(0), &split.train);
    let x_test = x.select(Axis(0), &split.test);

    tracing::info!(
        "Training models on {} events ({} held out)",
        split.train.len(),
        split.test.len()
    );

    TargetMetric::ALL
        .iter()
        .map(|&target| -> Result<TrainedMetricModel> {
            let y: Array1<f64> = records.iter().map(|r| target.value(&r.sales)).collect();
            let y_train = y.select(Axis(0), &split.train);
            let y_test = y.select(Axis(0), &split.test);

            let (regressor, score, candidates) =
                select_best(target, &x_train, &y_train, &x_test, &y_test, settings)?;

            tracing::info!(
                "{}: selected {} (R² {:.3})",
                target,
                regressor.kind(),
                score
            );

            Ok(TrainedMetricModel {
                target,
                regressor,
                score,
                candidates,
                vocabularies: vocabularies.clone(),
                feature_names: FeatureRow::NAMES.iter().map(|n| n.to_string()).collect(),
                training_samples: split.train.len(),
                evaluation_samples: split.test.len(),
            })
        })
        .collect()
}

/// Fit every candidate family and keep the first one reaching the best score.
fn select_best(
    target: TargetMetric,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
    settings: &ModelSettings,
) -> Result<(FittedRegressor, f64, Vec<CandidateScore>)> {
    let mut best: Option<(FittedRegressor, f64)> = None;
    let mut candidates = Vec::with_capacity(RegressorKind::ALL.len());

    for kind in RegressorKind::ALL {
        match kind.fit(x_train.view(), y_train.view(), settings) {
            Ok(fitted) => {
                let predictions = fitted.predict(x_test.view());
                let score = r2_score(y_test.view(), predictions.view());
                tracing::debug!("{}: {} R² {:.3}", target, kind, score);

                candidates.push(CandidateScore {
                    kind,
                    r2: Some(score),
                });
                if best.as_ref().is_none_or(|(_, best_score)| score > *best_score) {
                    best = Some((fitted, score));
                }
            }
            Err(e) => {
                tracing::warn!("{}: skipping {}: {}", target, kind, e);
                candidates.push(CandidateScore { kind, r2: None });
            }
        }
    }

    let (regressor, score) = best.ok_or_else(|| {
        AnalysisError::insufficient(format!("no candidate model could be fit for {target}"))
    })?;
    Ok((regressor, score, candidates))
}
