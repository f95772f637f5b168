//! Demand models for the four event-level target metrics.
//!
//! Every target gets its own small contest between a random forest, gradient
//! boosting and ordinary least squares; the candidate with the best held-out
//! R² is kept together with the category vocabularies it was trained with.

pub mod predictor;
pub mod regressor;
pub mod training;
pub mod tree;
pub mod vocabulary;

use serde::{Deserialize, Serialize};

use crate::data::EventSalesRecord;

pub use predictor::{
    DerivedMetrics, EventDescriptor, EventPrediction, PredictionResult, predict_event,
};
pub use regressor::{FittedRegressor, ModelSettings, RegressorKind};
pub use training::{CandidateScore, ModelSummary, TrainedMetricModel, r2_score, train_models};
pub use vocabulary::{CategoryVocabulary, FeatureVocabularies};

/// Event-level outcome a model is trained to predict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMetric {
    Transactions,
    NetSales,
    Units,
    TotalPos,
}

impl TargetMetric {
    /// Training order.
    pub const ALL: [TargetMetric; 4] = [
        TargetMetric::Transactions,
        TargetMetric::NetSales,
        TargetMetric::Units,
        TargetMetric::TotalPos,
    ];

    /// Column name in the event point-of-sale sheet.
    pub fn column(&self) -> &'static str {
        match self {
            TargetMetric::Transactions => "Transactions",
            TargetMetric::NetSales => "Net Sales",
            TargetMetric::Units => "Units",
            TargetMetric::TotalPos => "Total POS",
        }
    }

    pub fn value(&self, sales: &EventSalesRecord) -> f64 {
        match self {
            TargetMetric::Transactions => sales.transactions,
            TargetMetric::NetSales => sales.net_sales,
            TargetMetric::Units => sales.units,
            TargetMetric::TotalPos => sales.total_pos,
        }
    }
}

impl std::fmt::Display for TargetMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// One encoded model input row.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub attendance: f64,
    pub event_type_code: f64,
    pub opponent_code: f64,
    pub day_of_week_code: f64,
    pub month: f64,
    pub hour: f64,
    pub is_weekend: f64,
}

impl FeatureRow {
    /// Column names, in the order of [`FeatureRow::to_vec`].
    pub const NAMES: [&'static str; 7] = [
        "Total Attendance",
        "EventType_Encoded",
        "Opponent_Encoded",
        "DayOfWeek_Encoded",
        "Month",
        "Hour",
        "IsWeekend",
    ];

    pub const NUM_FEATURES: usize = 7;

    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.attendance,
            self.event_type_code,
            self.opponent_code,
            self.day_of_week_code,
            self.month,
            self.hour,
            self.is_weekend,
        ]
    }

    /// Look a feature up by column name.
    pub fn value(&self, name: &str) -> Option<f64> {
        Self::NAMES
            .iter()
            .position(|n| *n == name)
            .map(|idx| self.to_vec()[idx])
    }
}
