//! The closed set of candidate regressors and their uniform fit/predict surface.

use linfa::prelude::*;
use linfa_linear::{FittedLinearRegression, LinearRegression};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::tree::{GradientBoosting, RandomForest};

/// Regressor families competing for each target, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegressorKind {
    RandomForest,
    GradientBoosting,
    LinearRegression,
}

impl RegressorKind {
    /// Evaluation order; on equal scores the earlier family wins.
    pub const ALL: [RegressorKind; 3] = [
        RegressorKind::RandomForest,
        RegressorKind::GradientBoosting,
        RegressorKind::LinearRegression,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RegressorKind::RandomForest => "RandomForest",
            RegressorKind::GradientBoosting => "GradientBoosting",
            RegressorKind::LinearRegression => "LinearRegression",
        }
    }

    /// Fit this family on a training matrix.
    pub fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        settings: &ModelSettings,
    ) -> Result<FittedRegressor, FitError> {
        if x.nrows() == 0 || x.nrows() != y.len() {
            return Err(FitError::Shape {
                rows: x.nrows(),
                targets: y.len(),
            });
        }

        Ok(match self {
            RegressorKind::RandomForest => FittedRegressor::RandomForest(RandomForest::fit(
                x,
                y,
                settings.forest_trees,
                settings.seed,
            )),
            RegressorKind::GradientBoosting => {
                FittedRegressor::GradientBoosting(GradientBoosting::fit(
                    x,
                    y,
                    settings.boosting_stages,
                    settings.boosting_learning_rate,
                    settings.boosting_max_depth,
                ))
            }
            RegressorKind::LinearRegression => {
                FittedRegressor::LinearRegression(LinearModel::fit(x, y)?)
            }
        })
    }
}

impl std::fmt::Display for RegressorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Hyperparameters for the candidate families and the evaluation split.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelSettings {
    pub seed: u64,
    pub test_fraction: f64,
    pub forest_trees: usize,
    pub boosting_stages: usize,
    pub boosting_learning_rate: f64,
    pub boosting_max_depth: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            test_fraction: 0.2,
            forest_trees: 100,
            boosting_stages: 100,
            boosting_learning_rate: 0.1,
            boosting_max_depth: 3,
        }
    }
}

/// A fitted candidate.
#[derive(Debug)]
pub enum FittedRegressor {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
    LinearRegression(LinearModel),
}

impl FittedRegressor {
    pub fn kind(&self) -> RegressorKind {
        match self {
            FittedRegressor::RandomForest(_) => RegressorKind::RandomForest,
            FittedRegressor::GradientBoosting(_) => RegressorKind::GradientBoosting,
            FittedRegressor::LinearRegression(_) => RegressorKind::LinearRegression,
        }
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        match self {
            FittedRegressor::RandomForest(m) => m.predict_row(row),
            FittedRegressor::GradientBoosting(m) => m.predict_row(row),
            FittedRegressor::LinearRegression(m) => m.predict_row(row),
        }
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        x.rows().into_iter().map(|row| self.predict_row(row)).collect()
    }
}

/// Ordinary least squares over the non-constant input columns.
///
/// Constant columns are dropped before fitting since they are collinear with
/// the intercept; if every column is constant the model predicts the mean.
#[derive(Debug)]
pub struct LinearModel {
    columns: Vec<usize>,
    fitted: Option<FittedLinearRegression<f64>>,
    mean: f64,
}

impl LinearModel {
    pub fn fit(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<Self, FitError> {
        let mean = y.sum() / y.len() as f64;
        let columns: Vec<usize> = (0..x.ncols())
            .filter(|&j| {
                let column = x.column(j);
                let first = column[0];
                column.iter().any(|v| *v != first)
            })
            .collect();

        if columns.is_empty() {
            return Ok(Self {
                columns,
                fitted: None,
                mean,
            });
        }

        let records = x.select(Axis(1), &columns);
        let dataset = Dataset::new(records, y.to_owned());
        let fitted = LinearRegression::default()
            .with_intercept(true)
            .fit(&dataset)
            .map_err(|e: linfa_linear::LinearError<f64>| FitError::Linear(e.to_string()))?;

        Ok(Self {
            columns,
            fitted: Some(fitted),
            mean,
        })
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        match &self.fitted {
            Some(fitted) => {
                let coefficients = fitted.params();
                fitted.intercept()
                    + self
                        .columns
                        .iter()
                        .zip(coefficients.iter())
                        .map(|(&j, c)| row[j] * c)
                        .sum::<f64>()
            }
            None => self.mean,
        }
    }

    /// Input columns that took part in the fit.
    pub fn columns(&self) -> &[usize] {
        &self.columns
    }
}

/// Errors that can occur while fitting a candidate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FitError {
    #[error("feature rows and targets disagree: {rows} vs {targets}")]
    Shape { rows: usize, targets: usize },

    #[error("least squares fit failed: {0}")]
    Linear(String),
}
