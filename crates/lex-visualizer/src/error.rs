//! Error types for the visualization pipeline.
//!
//! Every stage has its own `thiserror` enum so a caller can tell a bad upload
//! apart from a bad column selection or an impossible chart request.
//! [`VisualizerError`] aggregates them for the orchestration layer.
//!
//! Errors are serializable so a UI collaborator can display them without
//! knowing the concrete variant.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::SemanticType;
use crate::loader::DataFormat;

/// Failure to turn raw bytes into a [`Dataset`](crate::Dataset).
#[derive(Error, Debug)]
pub enum LoadError {
    /// The file name suffix does not map to a supported format.
    #[error("Unrecognized file format for '{0}' (expected .csv, .xlsx or .dta)")]
    UnknownFormat(String),

    /// The bytes are not valid content for the declared format.
    #[error("Failed to parse {format} content: {reason}")]
    Parse { format: DataFormat, reason: String },

    /// A workbook was supplied without choosing a sheet.
    #[error("A sheet must be selected; available sheets: {}", available.join(", "))]
    SheetNotSpecified { available: Vec<String> },

    /// The requested sheet is not part of the workbook.
    #[error("Sheet '{sheet}' not found; available sheets: {}", available.join(", "))]
    SheetNotFound {
        sheet: String,
        available: Vec<String>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoadError {
    pub(crate) fn parse(format: DataFormat, reason: impl Into<String>) -> Self {
        LoadError::Parse {
            format,
            reason: reason.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownFormat(_) => "UNKNOWN_FORMAT",
            Self::Parse { .. } => "PARSE_FAILED",
            Self::SheetNotSpecified { .. } => "SHEET_NOT_SPECIFIED",
            Self::SheetNotFound { .. } => "SHEET_NOT_FOUND",
            Self::Io(_) => "IO_ERROR",
        }
    }
}

/// A column selection that references columns the dataset does not have.
#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error("Column '{column}' not found; available columns: {}", available.join(", "))]
    ColumnNotFound {
        column: String,
        available: Vec<String>,
    },

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

/// A column with no observed values, so no fill statistic exists.
///
/// This is a recoverable condition: the column is left with its missing
/// markers and the condition is reported through the imputation report.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Column '{column}' ({semantic_type}) has no observed values; missing cells were left in place")]
pub struct ImputationIndeterminate {
    pub column: String,
    pub semantic_type: SemanticType,
}

/// Failure to build a chart from a dataset.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A column the chart kind needs is not in the dataset.
    #[error("Chart column '{column}' not found; available columns: {}", available.join(", "))]
    ColumnNotFound {
        column: String,
        available: Vec<String>,
    },

    /// A column has the wrong semantic type for the chart kind.
    #[error("Column '{column}' is {actual} but a {chart} chart needs a {expected} column")]
    ColumnType {
        column: String,
        chart: &'static str,
        expected: SemanticType,
        actual: SemanticType,
    },

    /// A chart kind was requested without one of its required arguments.
    #[error("A {chart} chart requires the '{argument}' argument")]
    MissingArgument {
        chart: &'static str,
        argument: &'static str,
    },

    #[error("Unknown chart kind '{0}' (expected line, bar, scatter, box, histogram, heatmap or pie)")]
    UnknownKind(String),

    /// The drawing backend reported a failure.
    #[error("Chart backend error: {0}")]
    Backend(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

/// Failure to encode an artifact into bytes.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write table: {0}")]
    Table(#[from] polars::error::PolarsError),

    #[error("Failed to encode image: {0}")]
    Image(#[from] image::ImageError),

    /// The pixel buffer does not match the artifact's dimensions.
    #[error("Chart buffer holds {actual} bytes but {width}x{height} RGB needs {expected}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// The main error type for the visualization pipeline.
#[derive(Error, Debug)]
pub enum VisualizerError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Export(#[from] ExportError),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<VisualizerError>,
    },
}

impl VisualizerError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        VisualizerError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for collaborator handling.
    ///
    /// Codes are stable, so a UI can map them to specific messages without
    /// parsing the display text.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Load(e) => e.error_code(),
            Self::Projection(ProjectionError::ColumnNotFound { .. }) => "COLUMN_NOT_FOUND",
            Self::Projection(ProjectionError::Polars(_)) => "POLARS_ERROR",
            Self::Render(e) => match e {
                RenderError::ColumnNotFound { .. } => "CHART_COLUMN_NOT_FOUND",
                RenderError::ColumnType { .. } => "CHART_COLUMN_TYPE",
                RenderError::MissingArgument { .. } => "CHART_MISSING_ARGUMENT",
                RenderError::UnknownKind(_) => "UNKNOWN_CHART_KIND",
                RenderError::Backend(_) => "RENDER_BACKEND_ERROR",
                RenderError::Polars(_) => "POLARS_ERROR",
            },
            Self::Export(_) => "EXPORT_FAILED",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// The pipeline stage the error came from.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Load(_) => "load",
            Self::Projection(_) => "project",
            Self::Render(_) => "render",
            Self::Export(_) => "export",
            Self::InvalidConfig(_) | Self::Json(_) => "config",
            Self::Io(_) | Self::Polars(_) => "internal",
            Self::WithContext { source, .. } => source.stage(),
        }
    }

    /// Whether the error was caused by the user's input rather than a
    /// failure inside the pipeline.
    pub fn is_input_error(&self) -> bool {
        match self {
            Self::Load(LoadError::Io(_)) => false,
            Self::Load(_) | Self::Projection(ProjectionError::ColumnNotFound { .. }) => true,
            Self::Render(e) => !matches!(e, RenderError::Backend(_) | RenderError::Polars(_)),
            Self::InvalidConfig(_) => true,
            Self::WithContext { source, .. } => source.is_input_error(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code`, `stage` and `message`
/// fields, making them easy to handle in a frontend.
impl Serialize for VisualizerError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("VisualizerError", 3)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("stage", &self.stage())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, VisualizerError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<VisualizerError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err: VisualizerError = LoadError::UnknownFormat("data.txt".to_string()).into();
        assert_eq!(err.error_code(), "UNKNOWN_FORMAT");

        let err: VisualizerError = ProjectionError::ColumnNotFound {
            column: "Age".to_string(),
            available: vec!["Name".to_string()],
        }
        .into();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
        assert_eq!(err.stage(), "project");
    }

    #[test]
    fn test_sheet_errors_list_available_sheets() {
        let err = LoadError::SheetNotFound {
            sheet: "Q3".to_string(),
            available: vec!["Q1".to_string(), "Q2".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Sheet 'Q3' not found; available sheets: Q1, Q2"
        );
    }

    #[test]
    fn test_is_input_error() {
        let missing_arg: VisualizerError = RenderError::MissingArgument {
            chart: "line",
            argument: "x",
        }
        .into();
        assert!(missing_arg.is_input_error());

        let backend: VisualizerError = RenderError::Backend("oops".to_string()).into();
        assert!(!backend.is_input_error());
    }

    #[test]
    fn test_error_serialization() {
        let error: VisualizerError = RenderError::ColumnType {
            column: "city".to_string(),
            chart: "histogram",
            expected: SemanticType::Numeric,
            actual: SemanticType::Categorical,
        }
        .into();
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("CHART_COLUMN_TYPE"));
        assert!(json.contains("\"stage\":\"render\""));
        assert!(json.contains("city"));
    }

    #[test]
    fn test_indeterminate_display() {
        let condition = ImputationIndeterminate {
            column: "notes".to_string(),
            semantic_type: SemanticType::Categorical,
        };
        assert!(condition.to_string().contains("'notes' (categorical)"));
    }

    #[test]
    fn test_with_context() {
        let result: std::result::Result<(), LoadError> =
            Err(LoadError::UnknownFormat("x.bin".to_string()));
        let error = result.context("While loading upload").unwrap_err();
        assert!(error.to_string().contains("While loading upload"));
        assert_eq!(error.error_code(), "UNKNOWN_FORMAT");
        assert_eq!(error.stage(), "load");
    }
}
