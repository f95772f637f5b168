//! Arena Demand Library
//!
//! Demand analysis for a single venue: loads historical event and
//! point-of-sale sheets, trains per-metric models, forecasts one event and
//! derives staffing, risk and historical summaries from it.

pub mod analytics;
pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod ml;
pub mod pipeline;
pub mod report;
pub mod risk;
pub mod staffing;
pub mod traits;

// Re-export commonly used types
pub use analytics::{HistoricalSummary, summarize_history};
pub use cache::{CacheError, CacheLock, ReportSnapshot};
pub use config::AppConfig;
pub use data::{
    EventCharacteristicRecord, EventSalesRecord, MergedEventRecord, SourceTables,
    StandSalesRecord, load_tables, merge_events,
};
pub use error::{AnalysisError, DataSourceError};
pub use features::derive_features;
pub use ml::{
    EventDescriptor, EventPrediction, ModelSettings, PredictionResult, RegressorKind,
    TargetMetric, TrainedMetricModel, predict_event, train_models,
};
pub use pipeline::{AnalysisContext, AnalysisSettings, run_full_analysis};
pub use report::{AnalysisReport, assemble_report};
pub use risk::{RiskAssessment, RiskLevel, assess_risk};
pub use staffing::{StaffingPlan, allocate_staffing};
pub use traits::{Clock, MockClock, SystemClock};
