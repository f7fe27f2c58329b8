//! Configuration types for the visualization pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup. Configurations also load from
//! JSON so a collaborator can keep them in a file.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, VisualizerError};

/// Largest accepted canvas side, in pixels.
pub const MAX_CANVAS_SIZE: u32 = 8192;

/// Strategy for imputing missing numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NumericImputation {
    /// Use the mean of non-null values
    #[default]
    Mean,
    /// Use the median of non-null values
    Median,
}

/// Strategy for imputing missing temporal values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TemporalImputation {
    /// Use the median timestamp
    #[default]
    Median,
    /// Use the mean timestamp
    Mean,
}

/// Strategy for imputing missing categorical values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CategoricalImputation {
    /// Use the most frequent value (mode), first encountered on ties
    #[default]
    Mode,
    /// Use a constant value ("Unknown")
    Constant,
}

/// Imputation strategy per semantic type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CleaningPolicy {
    pub numeric: NumericImputation,
    pub temporal: TemporalImputation,
    pub categorical: CategoricalImputation,
}

/// Configuration for the visualization pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use lex_visualizer::config::{PipelineConfig, NumericImputation};
///
/// let config = PipelineConfig::builder()
///     .auto_clean(true)
///     .numeric_imputation(NumericImputation::Median)
///     .chart_size(1200, 800)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Whether missing values are imputed before projection.
    /// When false the loaded dataset flows to projection unchanged.
    /// Default: true
    pub auto_clean: bool,

    /// Imputation strategy per semantic type.
    pub cleaning_policy: CleaningPolicy,

    /// Canvas width in pixels for axis-based charts.
    /// Default: 1000
    pub chart_width: u32,

    /// Canvas height in pixels for axis-based charts.
    /// Default: 600
    pub chart_height: u32,

    /// Side of the square canvas used for pie charts.
    /// Default: 800
    pub pie_size: u32,

    /// Number of rows used to infer delimited-text column types.
    /// `None` scans the whole file.
    /// Default: None
    pub infer_schema_length: Option<usize>,

    /// Whether delimited-text columns that look like dates become temporal.
    /// Default: true
    pub try_parse_dates: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            auto_clean: true,
            cleaning_policy: CleaningPolicy::default(),
            chart_width: 1000,
            chart_height: 600,
            pie_size: 800,
            infer_schema_length: None,
            try_parse_dates: true,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load and validate a configuration from a JSON file.
    ///
    /// Fields missing from the file keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        for (field, value) in [
            ("chart_width", self.chart_width),
            ("chart_height", self.chart_height),
            ("pie_size", self.pie_size),
        ] {
            if value == 0 || value > MAX_CANVAS_SIZE {
                return Err(ConfigValidationError::InvalidCanvasSize {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if self.infer_schema_length == Some(0) {
            return Err(ConfigValidationError::InvalidInferSchemaLength);
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid canvas size for '{field}': {value} (must be between 1 and {MAX_CANVAS_SIZE})")]
    InvalidCanvasSize { field: String, value: u32 },

    #[error("Invalid schema inference length: 0 (use None to scan the whole file)")]
    InvalidInferSchemaLength,
}

impl From<ConfigValidationError> for VisualizerError {
    fn from(err: ConfigValidationError) -> Self {
        VisualizerError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    auto_clean: Option<bool>,
    numeric_imputation: Option<NumericImputation>,
    temporal_imputation: Option<TemporalImputation>,
    categorical_imputation: Option<CategoricalImputation>,
    chart_width: Option<u32>,
    chart_height: Option<u32>,
    pie_size: Option<u32>,
    infer_schema_length: Option<usize>,
    try_parse_dates: Option<bool>,
}

impl PipelineConfigBuilder {
    /// Enable or disable the imputation stage.
    pub fn auto_clean(mut self, enable: bool) -> Self {
        self.auto_clean = Some(enable);
        self
    }

    /// Set the whole cleaning policy at once.
    pub fn cleaning_policy(mut self, policy: CleaningPolicy) -> Self {
        self.numeric_imputation = Some(policy.numeric);
        self.temporal_imputation = Some(policy.temporal);
        self.categorical_imputation = Some(policy.categorical);
        self
    }

    pub fn numeric_imputation(mut self, strategy: NumericImputation) -> Self {
        self.numeric_imputation = Some(strategy);
        self
    }

    pub fn temporal_imputation(mut self, strategy: TemporalImputation) -> Self {
        self.temporal_imputation = Some(strategy);
        self
    }

    pub fn categorical_imputation(mut self, strategy: CategoricalImputation) -> Self {
        self.categorical_imputation = Some(strategy);
        self
    }

    /// Set the canvas size for axis-based charts.
    pub fn chart_size(mut self, width: u32, height: u32) -> Self {
        self.chart_width = Some(width);
        self.chart_height = Some(height);
        self
    }

    /// Set the side of the square pie chart canvas.
    pub fn pie_size(mut self, size: u32) -> Self {
        self.pie_size = Some(size);
        self
    }

    /// Limit delimited-text type inference to the first `rows` rows.
    pub fn infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = Some(rows);
        self
    }

    pub fn try_parse_dates(mut self, enable: bool) -> Self {
        self.try_parse_dates = Some(enable);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> std::result::Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            auto_clean: self.auto_clean.unwrap_or(defaults.auto_clean),
            cleaning_policy: CleaningPolicy {
                numeric: self.numeric_imputation.unwrap_or_default(),
                temporal: self.temporal_imputation.unwrap_or_default(),
                categorical: self.categorical_imputation.unwrap_or_default(),
            },
            chart_width: self.chart_width.unwrap_or(defaults.chart_width),
            chart_height: self.chart_height.unwrap_or(defaults.chart_height),
            pie_size: self.pie_size.unwrap_or(defaults.pie_size),
            infer_schema_length: self.infer_schema_length,
            try_parse_dates: self.try_parse_dates.unwrap_or(defaults.try_parse_dates),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert!(config.auto_clean);
        assert_eq!(config.cleaning_policy.numeric, NumericImputation::Mean);
        assert_eq!(config.cleaning_policy.temporal, TemporalImputation::Median);
        assert_eq!(config.cleaning_policy.categorical, CategoricalImputation::Mode);
        assert_eq!((config.chart_width, config.chart_height), (1000, 600));
        assert_eq!(config.pie_size, 800);
        assert_eq!(config.infer_schema_length, None);
        assert!(config.try_parse_dates);
    }

    #[test]
    fn test_builder_defaults() {
        let config = PipelineConfig::builder().build().unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = PipelineConfig::builder()
            .auto_clean(false)
            .numeric_imputation(NumericImputation::Median)
            .categorical_imputation(CategoricalImputation::Constant)
            .chart_size(640, 480)
            .pie_size(500)
            .infer_schema_length(100)
            .build()
            .unwrap();

        assert!(!config.auto_clean);
        assert_eq!(config.cleaning_policy.numeric, NumericImputation::Median);
        assert_eq!(
            config.cleaning_policy.categorical,
            CategoricalImputation::Constant
        );
        assert_eq!(config.chart_width, 640);
        assert_eq!(config.pie_size, 500);
        assert_eq!(config.infer_schema_length, Some(100));
    }

    #[test]
    fn test_validation_invalid_canvas() {
        let result = PipelineConfig::builder().chart_size(0, 600).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidCanvasSize { value: 0, .. }
        ));

        let result = PipelineConfig::builder().pie_size(10_000).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidCanvasSize { .. }
        ));
    }

    #[test]
    fn test_validation_invalid_infer_length() {
        let result = PipelineConfig::builder().infer_schema_length(0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidInferSchemaLength
        ));
    }

    #[test]
    fn test_config_serialization() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{
            "auto_clean": false,
            "cleaning_policy": { "numeric": "Median" },
            "chart_width": 1200
        }"#;

        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert!(!config.auto_clean);
        assert_eq!(config.cleaning_policy.numeric, NumericImputation::Median);
        assert_eq!(config.cleaning_policy.temporal, TemporalImputation::Median);
        assert_eq!(config.chart_width, 1200);
        assert_eq!(config.chart_height, 600);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "pie_size": 640, "try_parse_dates": false }}"#).unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.pie_size, 640);
        assert!(!config.try_parse_dates);
    }

    #[test]
    fn test_from_json_file_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "chart_height": 0 }}"#).unwrap();

        let err = PipelineConfig::from_json_file(file.path()).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }
}
