//! Inputs and outputs of a single pipeline pass.

use serde::Serialize;
use std::path::Path;

use crate::charts::{ChartArtifact, ChartSpec};
use crate::dataset::Dataset;
use crate::types::PipelineSummary;

/// Everything a collaborator supplies for one pass.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    /// Name of the uploaded file. Its suffix selects the format.
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Worksheet to read from a spreadsheet.
    pub sheet: Option<String>,
    /// Columns to keep. `None` keeps every column.
    pub columns: Option<Vec<String>>,
    pub chart: ChartSpec,
}

impl PipelineRequest {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>, chart: ChartSpec) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
            sheet: None,
            columns: None,
            chart,
        }
    }

    /// Read the request bytes from a file on disk.
    pub fn from_path(path: impl AsRef<Path>, chart: ChartSpec) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Ok(Self::new(file_name, bytes, chart))
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}

/// Result of a successful pass.
///
/// Serializing it yields the chart metadata and summary; the table and the
/// encoded artifacts are raw bytes meant to be written or wrapped by the
/// caller.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    /// The cleaned and projected dataset the chart was drawn from.
    #[serde(skip)]
    pub dataset: Dataset,
    pub chart: ChartArtifact,
    /// CSV encoding of `dataset`.
    #[serde(skip)]
    pub table_csv: Vec<u8>,
    /// PNG encoding of `chart`.
    #[serde(skip)]
    pub chart_png: Vec<u8>,
    /// CSV encoding of the chart's derived table, if it has one.
    #[serde(skip)]
    pub derived_csv: Option<Vec<u8>>,
    pub summary: PipelineSummary,
}
