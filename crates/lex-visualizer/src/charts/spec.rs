//! Chart requests: which chart, over which columns, with which labels.

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// The supported chart kinds, each carrying the columns it needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartKind {
    /// `y` against `x`, connected in row order.
    Line { x: String, y: String },
    /// Mean of `y` per category of `x`.
    Bar { x: String, y: String },
    /// One point per row.
    Scatter { x: String, y: String },
    /// Distribution of `y` per category of `x`.
    Box { x: String, y: String },
    /// Binned counts of `y` with a density overlay.
    Histogram { y: String },
    /// Pairwise correlation of every numeric column.
    Heatmap,
    /// Share of each distinct value of `column`.
    Pie { column: String },
}

impl ChartKind {
    /// Every kind name accepted by [`ChartKind::from_parts`].
    pub const NAMES: [&'static str; 7] = [
        "line",
        "bar",
        "scatter",
        "box",
        "histogram",
        "heatmap",
        "pie",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ChartKind::Line { .. } => "line",
            ChartKind::Bar { .. } => "bar",
            ChartKind::Scatter { .. } => "scatter",
            ChartKind::Box { .. } => "box",
            ChartKind::Histogram { .. } => "histogram",
            ChartKind::Heatmap => "heatmap",
            ChartKind::Pie { .. } => "pie",
        }
    }

    /// Build a kind from its name and loose column arguments.
    ///
    /// Arguments a kind does not use are ignored. A pie chart takes its
    /// column from `column`, falling back to `x`.
    pub fn from_parts(
        kind: &str,
        x: Option<&str>,
        y: Option<&str>,
        column: Option<&str>,
    ) -> Result<Self, RenderError> {
        let name = kind.trim().to_ascii_lowercase();
        let chart = Self::NAMES
            .iter()
            .copied()
            .find(|n| *n == name)
            .ok_or_else(|| RenderError::UnknownKind(kind.to_string()))?;

        let require = |value: Option<&str>, argument: &'static str| {
            value
                .map(str::to_string)
                .ok_or(RenderError::MissingArgument { chart, argument })
        };

        Ok(match chart {
            "line" => ChartKind::Line {
                x: require(x, "x")?,
                y: require(y, "y")?,
            },
            "bar" => ChartKind::Bar {
                x: require(x, "x")?,
                y: require(y, "y")?,
            },
            "scatter" => ChartKind::Scatter {
                x: require(x, "x")?,
                y: require(y, "y")?,
            },
            "box" => ChartKind::Box {
                x: require(x, "x")?,
                y: require(y, "y")?,
            },
            "histogram" => ChartKind::Histogram {
                y: require(y, "y")?,
            },
            "heatmap" => ChartKind::Heatmap,
            _ => ChartKind::Pie {
                column: require(column.or(x), "column")?,
            },
        })
    }

    /// The columns this kind reads, in argument order.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            ChartKind::Line { x, y }
            | ChartKind::Bar { x, y }
            | ChartKind::Scatter { x, y }
            | ChartKind::Box { x, y } => vec![x.as_str(), y.as_str()],
            ChartKind::Histogram { y } => vec![y.as_str()],
            ChartKind::Heatmap => Vec::new(),
            ChartKind::Pie { column } => vec![column.as_str()],
        }
    }

    pub fn default_title(&self) -> String {
        match self {
            ChartKind::Line { x, y } => format!("Line Plot of {y} vs {x}"),
            ChartKind::Bar { x, y } => format!("Bar Plot of {y} by {x}"),
            ChartKind::Scatter { x, y } => format!("Scatter Plot of {y} vs {x}"),
            ChartKind::Box { x, y } => format!("Box Plot of {y} by {x}"),
            ChartKind::Histogram { y } => format!("Histogram of {y}"),
            ChartKind::Heatmap => HEATMAP_TITLE.to_string(),
            ChartKind::Pie { column } => format!("Pie Chart of {column}"),
        }
    }

    /// Default `(x, y)` axis labels.
    pub fn default_axis_labels(&self) -> (String, String) {
        match self {
            ChartKind::Line { x, y }
            | ChartKind::Bar { x, y }
            | ChartKind::Scatter { x, y }
            | ChartKind::Box { x, y } => (x.clone(), y.clone()),
            ChartKind::Histogram { y } => (y.clone(), "Count".to_string()),
            ChartKind::Heatmap | ChartKind::Pie { .. } => (String::new(), String::new()),
        }
    }
}

/// Fixed title of every correlation heatmap.
pub const HEATMAP_TITLE: &str = "Correlation Heatmap";

/// The title and axis labels a chart was drawn with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartLabels {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
}

/// A chart request: the kind plus optional label overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(flatten)]
    pub kind: ChartKind,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub x_label: Option<String>,
    #[serde(default)]
    pub y_label: Option<String>,
}

impl ChartSpec {
    pub fn new(kind: ChartKind) -> Self {
        Self {
            kind,
            title: None,
            x_label: None,
            y_label: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_x_label(mut self, label: impl Into<String>) -> Self {
        self.x_label = Some(label.into());
        self
    }

    pub fn with_y_label(mut self, label: impl Into<String>) -> Self {
        self.y_label = Some(label.into());
        self
    }

    /// Resolve the labels to draw.
    ///
    /// Heatmaps ignore every override. Pies honour a title override but
    /// have no axes to label.
    pub fn labels(&self) -> ChartLabels {
        let (default_x, default_y) = self.kind.default_axis_labels();
        match self.kind {
            ChartKind::Heatmap => ChartLabels {
                title: HEATMAP_TITLE.to_string(),
                x_label: String::new(),
                y_label: String::new(),
            },
            ChartKind::Pie { .. } => ChartLabels {
                title: self.title.clone().unwrap_or_else(|| self.kind.default_title()),
                x_label: String::new(),
                y_label: String::new(),
            },
            _ => ChartLabels {
                title: self.title.clone().unwrap_or_else(|| self.kind.default_title()),
                x_label: self.x_label.clone().unwrap_or(default_x),
                y_label: self.y_label.clone().unwrap_or(default_y),
            },
        }
    }
}

impl From<ChartKind> for ChartSpec {
    fn from(kind: ChartKind) -> Self {
        Self::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_parts() {
        assert_eq!(
            ChartKind::from_parts("Line", Some("t"), Some("v"), None).unwrap(),
            ChartKind::Line {
                x: "t".to_string(),
                y: "v".to_string()
            }
        );
        assert_eq!(
            ChartKind::from_parts("heatmap", None, None, None).unwrap(),
            ChartKind::Heatmap
        );
        assert_eq!(
            ChartKind::from_parts("pie", Some("city"), None, None).unwrap(),
            ChartKind::Pie {
                column: "city".to_string()
            }
        );
    }

    #[test]
    fn test_from_parts_errors() {
        let err = ChartKind::from_parts("bar", Some("x"), None, None).unwrap_err();
        assert!(matches!(
            err,
            RenderError::MissingArgument {
                chart: "bar",
                argument: "y"
            }
        ));

        let err = ChartKind::from_parts("violin", None, None, None).unwrap_err();
        assert!(matches!(err, RenderError::UnknownKind(_)));
    }

    #[test]
    fn test_default_labels() {
        let labels = ChartSpec::new(ChartKind::Box {
            x: "region".to_string(),
            y: "sales".to_string(),
        })
        .labels();
        assert_eq!(labels.title, "Box Plot of sales by region");
        assert_eq!(labels.x_label, "region");
        assert_eq!(labels.y_label, "sales");

        let labels = ChartSpec::new(ChartKind::Histogram {
            y: "age".to_string(),
        })
        .labels();
        assert_eq!(labels.title, "Histogram of age");
        assert_eq!(labels.x_label, "age");
        assert_eq!(labels.y_label, "Count");
    }

    #[test]
    fn test_overrides() {
        let labels = ChartSpec::new(ChartKind::Scatter {
            x: "a".to_string(),
            y: "b".to_string(),
        })
        .with_title("Custom")
        .with_y_label("B values")
        .labels();
        assert_eq!(labels.title, "Custom");
        assert_eq!(labels.x_label, "a");
        assert_eq!(labels.y_label, "B values");
    }

    #[test]
    fn test_heatmap_ignores_overrides() {
        let labels = ChartSpec::new(ChartKind::Heatmap)
            .with_title("Mine")
            .with_x_label("x")
            .labels();
        assert_eq!(labels.title, HEATMAP_TITLE);
        assert_eq!(labels.x_label, "");
        assert_eq!(labels.y_label, "");
    }

    #[test]
    fn test_spec_json() {
        let spec: ChartSpec =
            serde_json::from_str(r#"{ "kind": "pie", "column": "city", "title": "Cities" }"#)
                .unwrap();
        assert_eq!(
            spec.kind,
            ChartKind::Pie {
                column: "city".to_string()
            }
        );
        assert_eq!(spec.title.as_deref(), Some("Cities"));

        let spec: ChartSpec = serde_json::from_str(r#"{ "kind": "heatmap" }"#).unwrap();
        assert_eq!(spec.kind, ChartKind::Heatmap);
    }
}
