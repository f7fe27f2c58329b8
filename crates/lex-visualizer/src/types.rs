use serde::{Deserialize, Serialize};

use crate::dataset::SemanticType;
use crate::error::ImputationIndeterminate;

/// Name, dtype, semantic type and missing count of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: String,
    pub semantic_type: SemanticType,
    pub missing: usize,
}

// ============================================================================
// Imputation Report
// ============================================================================

/// What the imputation engine did to a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnImputation {
    /// Name of the column.
    pub column: String,
    pub semantic_type: SemanticType,
    /// Strategy used (`mean`, `median`, `mode` or `constant`).
    pub strategy: String,
    /// Number of missing cells replaced.
    pub cells_filled: usize,
    /// Display rendering of the fill value.
    pub fill_value: String,
}

/// Outcome of one imputation pass over a dataset.
///
/// Columns without missing values do not appear. Columns with no observed
/// values appear only in `indeterminate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImputationReport {
    pub filled: Vec<ColumnImputation>,
    pub indeterminate: Vec<ImputationIndeterminate>,
}

impl ImputationReport {
    /// Total number of cells replaced across all columns.
    pub fn cells_filled(&self) -> usize {
        self.filled.iter().map(|c| c.cells_filled).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.filled.is_empty() && self.indeterminate.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnImputation> {
        self.filled.iter().find(|c| c.column == name)
    }
}

// ============================================================================
// Pipeline Summary Types
// ============================================================================

/// Human-readable summary of what a pipeline pass did.
///
/// Serialized for a UI collaborator or printed by the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Total execution time in milliseconds.
    pub duration_ms: u64,

    /// Extension of the format that was loaded (`csv`, `xlsx` or `dta`).
    pub format: String,
    /// Sheet that was read, for workbooks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,

    pub rows: usize,
    /// Number of columns in the loaded dataset.
    pub columns_loaded: usize,
    /// Number of columns left after projection.
    pub columns_selected: usize,

    /// Whether the imputation stage ran.
    pub cleaned: bool,
    /// Missing cells before and after the imputation stage.
    pub missing_before: usize,
    pub missing_after: usize,
    pub imputation: ImputationReport,

    pub chart_kind: String,
    pub chart_title: String,

    /// List of actions taken during the pass.
    pub actions: Vec<PipelineAction>,

    /// Warnings generated during the pass.
    pub warnings: Vec<String>,
}

impl PipelineSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action to the summary.
    pub fn add_action(&mut self, action: PipelineAction) {
        self.actions.push(action);
    }

    /// Add a warning to the summary.
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Share of missing cells the imputation stage repaired, in percent.
    pub fn repaired_percentage(&self) -> f32 {
        if self.missing_before == 0 {
            0.0
        } else {
            let repaired = self.missing_before.saturating_sub(self.missing_after);
            (repaired as f32 / self.missing_before as f32) * 100.0
        }
    }
}

/// A single action taken during a pipeline pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineAction {
    pub action_type: ActionType,
    /// Target of the action (column name, chart kind or "dataset").
    pub target: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl PipelineAction {
    pub fn new(
        action_type: ActionType,
        target: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action_type,
            target: target.into(),
            description: description.into(),
            details: None,
        }
    }

    /// Add details to the action.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Types of actions recorded in a [`PipelineSummary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// The input file was parsed into a dataset.
    FileLoaded,
    /// Missing values in a column were imputed.
    ValueImputed,
    /// A column could not be imputed and was left as is.
    ImputationSkipped,
    /// The dataset was narrowed to the selected columns.
    ColumnsProjected,
    /// A chart was rendered.
    ChartRendered,
    /// An artifact was encoded to bytes.
    ArtifactExported,
}

impl ActionType {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::FileLoaded => "File Loaded",
            Self::ValueImputed => "Value Imputed",
            Self::ImputationSkipped => "Imputation Skipped",
            Self::ColumnsProjected => "Columns Projected",
            Self::ChartRendered => "Chart Rendered",
            Self::ArtifactExported => "Artifact Exported",
        }
    }
}
