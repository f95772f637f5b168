use std::path::PathBuf;

use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::ml::{EventDescriptor, ModelSettings};
use crate::pipeline::AnalysisSettings;
use crate::risk::DEFAULT_ATTENDANCE_GAP_THRESHOLD;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub data: DataConfig,
    pub cache: CacheConfig,
    pub model: ModelSettings,
    pub event: EventConfig,
    pub risk: RiskConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    /// Workbook file, or a directory holding one CSV export per sheet.
    pub path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/Demand Planning - Case Data Final 2023.xlsx"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub path: PathBuf,
    /// Snapshots older than this are recomputed.
    pub max_age_hours: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("cache/analysis_report.json"),
            max_age_hours: 24,
        }
    }
}

/// The event to forecast when none is given on the command line.
#[derive(Debug, Deserialize, Clone)]
pub struct EventConfig {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub attendance: f64,
    pub event_type: String,
    pub opponent: String,
    pub time_label: Option<String>,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            date: NaiveDate::from_ymd_opt(2023, 3, 5).unwrap_or_default(),
            time: NaiveTime::from_hms_opt(14, 0, 0).unwrap_or_default(),
            attendance: 10000.0,
            event_type: "NBA Regular Season".to_string(),
            opponent: "Oklahoma City Thunder".to_string(),
            time_label: Some("2:00 PM Eastern".to_string()),
        }
    }
}

impl EventConfig {
    pub fn descriptor(&self) -> EventDescriptor {
        let event = EventDescriptor::scheduled(
            self.date,
            self.time,
            self.attendance,
            self.event_type.clone(),
            self.opponent.clone(),
        );
        match &self.time_label {
            Some(label) => event.with_time_label(label.clone()),
            None => event,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RiskConfig {
    pub attendance_gap_threshold: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            attendance_gap_threshold: DEFAULT_ATTENDANCE_GAP_THRESHOLD,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        // .env is optional; plain environment variables work the same way
        let _ = dotenvy::dotenv();

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("arena-demand");

        let data = DataConfig::default();
        let cache = CacheConfig::default();
        let model = ModelSettings::default();
        let event = EventConfig::default();
        let risk = RiskConfig::default();

        let builder = Config::builder()
            // 1. Built-in defaults
            // Data & cache
            .set_default("data.path", data.path.to_string_lossy().into_owned())?
            .set_default("cache.path", cache.path.to_string_lossy().into_owned())?
            .set_default("cache.max_age_hours", cache.max_age_hours)?
            // Model
            .set_default("model.seed", model.seed as i64)?
            .set_default("model.test_fraction", model.test_fraction)?
            .set_default("model.forest_trees", model.forest_trees as i64)?
            .set_default("model.boosting_stages", model.boosting_stages as i64)?
            .set_default("model.boosting_learning_rate", model.boosting_learning_rate)?
            .set_default("model.boosting_max_depth", model.boosting_max_depth as i64)?
            // Event
            .set_default("event.date", event.date.to_string())?
            .set_default("event.time", event.time.to_string())?
            .set_default("event.attendance", event.attendance)?
            .set_default("event.event_type", event.event_type)?
            .set_default("event.opponent", event.opponent)?
            .set_default("event.time_label", event.time_label)?
            // Risk
            .set_default("risk.attendance_gap_threshold", risk.attendance_gap_threshold)?
            // 2. Local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))
            // 3. User config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false))
            // 4. Environment variables (ARENA__EVENT__ATTENDANCE=...)
            .add_source(Environment::with_prefix("ARENA").separator("__"));

        let s = builder.build()?;
        Ok(s.try_deserialize()?)
    }

    pub fn analysis_settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            model: self.model.clone(),
            attendance_gap_threshold: self.risk.attendance_gap_threshold,
        }
    }
}
