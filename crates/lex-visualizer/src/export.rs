//! Artifact export: tables to CSV bytes, charts to PNG bytes.
//!
//! Both encodings are pure. Delivering the bytes (a file, a download link)
//! is up to the caller.

use image::ImageEncoder;
use image::codecs::png::PngEncoder;
use polars::prelude::*;
use tracing::debug;

use crate::charts::{ChartArtifact, DerivedTable};
use crate::dataset::Dataset;
use crate::error::ExportError;

/// The artifacts a pipeline run can hand to a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactType {
    /// The cleaned, projected table.
    Table,
    /// The rendered chart image.
    Chart,
    /// The table derived while rendering.
    DerivedTable,
}

/// File name a collaborator can offer for an artifact of `chart`.
pub fn suggested_file_name(chart: &str, artifact: ArtifactType) -> String {
    match artifact {
        ArtifactType::Table => "cleaned_data.csv".to_string(),
        ArtifactType::Chart => format!("{chart}_chart.png"),
        ArtifactType::DerivedTable => format!("{chart}_table.csv"),
    }
}

/// Encodes datasets and charts into portable byte streams.
pub struct ArtifactExporter;

impl ArtifactExporter {
    /// CSV with a header row, in the dataset's column order. Missing cells
    /// become empty fields and temporal values are written as ISO-8601.
    pub fn export_table(dataset: &Dataset) -> Result<Vec<u8>, ExportError> {
        let mut frame = dataset.frame().clone();
        let mut buffer = Vec::new();
        CsvWriter::new(&mut buffer)
            .include_header(true)
            .finish(&mut frame)?;
        debug!(bytes = buffer.len(), "Exported table");
        Ok(buffer)
    }

    /// PNG encoding of the chart's pixels.
    pub fn export_chart(artifact: &ChartArtifact) -> Result<Vec<u8>, ExportError> {
        let expected = artifact.width as usize * artifact.height as usize * 3;
        if artifact.pixels.len() != expected {
            return Err(ExportError::BufferSize {
                width: artifact.width,
                height: artifact.height,
                expected,
                actual: artifact.pixels.len(),
            });
        }

        let mut buffer = Vec::new();
        PngEncoder::new(&mut buffer).write_image(
            &artifact.pixels,
            artifact.width,
            artifact.height,
            image::ExtendedColorType::Rgb8,
        )?;
        debug!(bytes = buffer.len(), "Exported chart");
        Ok(buffer)
    }

    /// CSV of a derived table.
    pub fn export_derived(table: &DerivedTable) -> Result<Vec<u8>, ExportError> {
        Self::export_table(&table.to_dataset()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::{ChartKind, ChartLabels, ValueCount};

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    fn artifact(pixels: Vec<u8>) -> ChartArtifact {
        ChartArtifact {
            kind: ChartKind::Heatmap,
            labels: ChartLabels {
                title: String::new(),
                x_label: String::new(),
                y_label: String::new(),
            },
            width: 2,
            height: 2,
            pixels,
            derived: None,
        }
    }

    #[test]
    fn test_export_table_writes_empty_fields_for_missing() {
        let ds = Dataset::new(
            df! {
                "name" => [Some("a"), None],
                "score" => [Some(1.5f64), None],
            }
            .unwrap(),
        );
        let csv = String::from_utf8(ArtifactExporter::export_table(&ds).unwrap()).unwrap();
        assert_eq!(csv, "name,score\na,1.5\n,\n");
    }

    #[test]
    fn test_export_chart_png() {
        let png = ArtifactExporter::export_chart(&artifact(vec![255; 12])).unwrap();
        assert_eq!(png[..8], PNG_SIGNATURE);
    }

    #[test]
    fn test_export_chart_rejects_short_buffer() {
        let err = ArtifactExporter::export_chart(&artifact(vec![0; 5])).unwrap_err();
        assert!(matches!(
            err,
            ExportError::BufferSize {
                expected: 12,
                actual: 5,
                ..
            }
        ));
    }

    #[test]
    fn test_export_derived() {
        let table = DerivedTable::ValueCounts(vec![ValueCount {
            value: "a".to_string(),
            count: 2,
            percentage: 100.0,
        }]);
        let csv = String::from_utf8(ArtifactExporter::export_derived(&table).unwrap()).unwrap();
        assert!(csv.starts_with("value,count,percentage\n"));
        assert!(csv.contains("a,2,100"));
    }

    #[test]
    fn test_suggested_file_names() {
        assert_eq!(suggested_file_name("pie", ArtifactType::Table), "cleaned_data.csv");
        assert_eq!(suggested_file_name("pie", ArtifactType::Chart), "pie_chart.png");
        assert_eq!(
            suggested_file_name("heatmap", ArtifactType::DerivedTable),
            "heatmap_table.csv"
        );
    }
}
