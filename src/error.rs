//! Error types shared by every pipeline stage.

use std::path::PathBuf;

use thiserror::Error;

/// Problems reading the upstream workbook sheets.
#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("data source not found: {}", .0.display())]
    MissingPath(PathBuf),

    #[error("sheet '{sheet}' not found at {}", .path.display())]
    MissingSheet { sheet: String, path: PathBuf },

    #[error("sheet '{sheet}' is missing required column '{column}'")]
    MissingColumn { sheet: String, column: String },

    #[error("sheet '{sheet}' row {row}: {message}")]
    Malformed {
        sheet: String,
        row: usize,
        message: String,
    },

    #[error("failed to read workbook {}: {source}", .path.display())]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("failed to read sheet '{sheet}': {source}")]
    Csv {
        sheet: String,
        #[source]
        source: csv::Error,
    },
}

/// Any failure that aborts an analysis run.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("data source error: {0}")]
    DataSource(#[from] DataSourceError),

    #[error("feature mismatch: column '{column}' is not available")]
    FeatureMismatch { column: String },

    #[error("unseen category: {feature} '{label}' was not present in the training data")]
    UnseenCategory { feature: String, label: String },

    #[error("insufficient data: {0}")]
    InsufficientData(String),
}

impl AnalysisError {
    pub(crate) fn feature_mismatch(column: impl Into<String>) -> Self {
        Self::FeatureMismatch {
            column: column.into(),
        }
    }

    pub(crate) fn insufficient(message: impl Into<String>) -> Self {
        Self::InsufficientData(message.into())
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_message_names_column() {
        let err = DataSourceError::MissingColumn {
            sheet: "Event Point of Sale Data".to_string(),
            column: "Net Sales".to_string(),
        };
        assert!(err.to_string().contains("'Net Sales'"));
    }

    #[test]
    fn test_data_source_error_converts() {
        let err: AnalysisError = DataSourceError::MissingPath(PathBuf::from("/nope")).into();
        assert!(matches!(err, AnalysisError::DataSource(_)));
        assert!(err.to_string().contains("/nope"));
    }

    #[test]
    fn test_unseen_category_message() {
        let err = AnalysisError::UnseenCategory {
            feature: "opponent".to_string(),
            label: "Seattle".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unseen category: opponent 'Seattle' was not present in the training data"
        );
    }
}
