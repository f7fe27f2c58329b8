//! Drawing prepared chart data into an RGB pixel buffer.
//!
//! Every function here receives data that has already been validated and
//! aggregated; the only failures left are backend errors.

use plotters::chart::ChartContext;
use plotters::coord::Shift;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::element::Pie;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::ops::Range;

use super::axis::{Axis, category_label, category_range, format_tick, padded_range};
use super::derived::{BoxSummary, CategoryMean, CorrelationMatrix, HistogramBin, ValueCount};
use super::font::FONT_FAMILY;
use super::spec::ChartLabels;
use crate::error::RenderError;

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;
type Chart<'a, 'b> = ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

const PRIMARY: RGBColor = RGBColor(31, 119, 180);

/// Wedge colours, cycled.
const PALETTE: [RGBColor; 10] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];

const COLD: (f64, f64, f64) = (59.0, 76.0, 192.0);
const NEUTRAL: (f64, f64, f64) = (221.0, 221.0, 221.0);
const WARM: (f64, f64, f64) = (180.0, 4.0, 38.0);

/// Size of the pixel buffer to draw into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Canvas {
    pub width: u32,
    pub height: u32,
}

fn backend_error<E: std::error::Error + Send + Sync>(err: DrawingAreaErrorKind<E>) -> RenderError {
    RenderError::Backend(err.to_string())
}

/// Allocate a white canvas, let `draw` paint it and return the pixels.
fn paint<F>(canvas: Canvas, draw: F) -> Result<Vec<u8>, RenderError>
where
    F: FnOnce(&Area<'_>) -> Result<(), RenderError>,
{
    let mut pixels = vec![0u8; canvas.width as usize * canvas.height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut pixels, (canvas.width, canvas.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(backend_error)?;
        draw(&root)?;
        root.present().map_err(backend_error)?;
    }
    Ok(pixels)
}

fn cartesian<'a, 'b>(
    root: &'a Area<'b>,
    title: &str,
    x: Range<f64>,
    y: Range<f64>,
) -> Result<Chart<'a, 'b>, RenderError> {
    ChartBuilder::on(root)
        .caption(title, (FONT_FAMILY, 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x, y)
        .map_err(backend_error)
}

fn draw_axes(
    chart: &mut Chart<'_, '_>,
    labels: &ChartLabels,
    x_ticks: usize,
    x_format: &dyn Fn(&f64) -> String,
) -> Result<(), RenderError> {
    chart
        .configure_mesh()
        .x_desc(labels.x_label.as_str())
        .y_desc(labels.y_label.as_str())
        .x_labels(x_ticks)
        .x_label_formatter(x_format)
        .axis_desc_style((FONT_FAMILY, 16))
        .label_style((FONT_FAMILY, 13))
        .draw()
        .map_err(backend_error)
}

pub(crate) fn line(
    canvas: Canvas,
    labels: &ChartLabels,
    axis: &Axis,
    points: &[(f64, f64)],
) -> Result<Vec<u8>, RenderError> {
    paint(canvas, |root| {
        let x_range = axis.range(points.iter().map(|p| p.0));
        let y_range = padded_range(points.iter().map(|p| p.1));
        let mut chart = cartesian(root, &labels.title, x_range, y_range)?;
        draw_axes(&mut chart, labels, axis.tick_count(), &|v: &f64| axis.format(*v))?;
        chart
            .draw_series(LineSeries::new(
                points.iter().copied(),
                PRIMARY.stroke_width(2),
            ))
            .map_err(backend_error)?;
        Ok(())
    })
}

pub(crate) fn scatter(
    canvas: Canvas,
    labels: &ChartLabels,
    axis: &Axis,
    points: &[(f64, f64)],
) -> Result<Vec<u8>, RenderError> {
    paint(canvas, |root| {
        let x_range = axis.range(points.iter().map(|p| p.0));
        let y_range = padded_range(points.iter().map(|p| p.1));
        let mut chart = cartesian(root, &labels.title, x_range, y_range)?;
        draw_axes(&mut chart, labels, axis.tick_count(), &|v: &f64| axis.format(*v))?;
        chart
            .draw_series(
                points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 4, PRIMARY.mix(0.8).filled())),
            )
            .map_err(backend_error)?;
        Ok(())
    })
}

pub(crate) fn bar(
    canvas: Canvas,
    labels: &ChartLabels,
    means: &[CategoryMean],
) -> Result<Vec<u8>, RenderError> {
    let categories: Vec<String> = means.iter().map(|m| m.category.clone()).collect();
    paint(canvas, |root| {
        // Bars grow from zero, so zero is always in view.
        let y_range = padded_range(means.iter().map(|m| m.mean).chain([0.0]));
        let mut chart = cartesian(root, &labels.title, category_range(means.len()), y_range)?;
        draw_axes(&mut chart, labels, categories.len() + 1, &|v: &f64| {
            category_label(&categories, *v)
        })?;
        chart
            .draw_series(means.iter().enumerate().map(|(i, m)| {
                let x = i as f64;
                Rectangle::new([(x - 0.4, 0.0), (x + 0.4, m.mean)], PRIMARY.filled())
            }))
            .map_err(backend_error)?;
        Ok(())
    })
}

pub(crate) fn boxes(
    canvas: Canvas,
    labels: &ChartLabels,
    summaries: &[BoxSummary],
) -> Result<Vec<u8>, RenderError> {
    let categories: Vec<String> = summaries.iter().map(|b| b.category.clone()).collect();
    paint(canvas, |root| {
        let y_range = padded_range(summaries.iter().flat_map(|b| {
            [b.whisker_low, b.whisker_high]
                .into_iter()
                .chain(b.outliers.iter().copied())
        }));
        let mut chart =
            cartesian(root, &labels.title, category_range(summaries.len()), y_range)?;
        draw_axes(&mut chart, labels, categories.len() + 1, &|v: &f64| {
            category_label(&categories, *v)
        })?;

        let half = 0.3;
        for (i, b) in summaries.iter().enumerate() {
            let x = i as f64;
            chart
                .draw_series([
                    Rectangle::new([(x - half, b.q1), (x + half, b.q3)], PRIMARY.mix(0.6).filled()),
                    Rectangle::new([(x - half, b.q1), (x + half, b.q3)], BLACK.stroke_width(1)),
                ])
                .map_err(backend_error)?;
            chart
                .draw_series([
                    PathElement::new(vec![(x - half, b.median), (x + half, b.median)], BLACK.stroke_width(2)),
                    PathElement::new(vec![(x, b.q3), (x, b.whisker_high)], BLACK.stroke_width(1)),
                    PathElement::new(vec![(x, b.q1), (x, b.whisker_low)], BLACK.stroke_width(1)),
                    PathElement::new(
                        vec![(x - half / 2.0, b.whisker_high), (x + half / 2.0, b.whisker_high)],
                        BLACK.stroke_width(1),
                    ),
                    PathElement::new(
                        vec![(x - half / 2.0, b.whisker_low), (x + half / 2.0, b.whisker_low)],
                        BLACK.stroke_width(1),
                    ),
                ])
                .map_err(backend_error)?;
            chart
                .draw_series(
                    b.outliers
                        .iter()
                        .map(|&v| Circle::new((x, v), 3, BLACK.stroke_width(1))),
                )
                .map_err(backend_error)?;
        }
        Ok(())
    })
}

pub(crate) fn histogram(
    canvas: Canvas,
    labels: &ChartLabels,
    bins: &[HistogramBin],
    density: &[(f64, f64)],
) -> Result<Vec<u8>, RenderError> {
    paint(canvas, |root| {
        let x_range = match (bins.first(), bins.last()) {
            (Some(first), Some(last)) => first.bin_start..last.bin_end,
            _ => 0.0..1.0,
        };
        let peak = bins
            .iter()
            .map(|b| b.count as f64)
            .chain(density.iter().map(|p| p.1))
            .fold(0.0, f64::max);
        let y_range = 0.0..(peak * 1.05).max(1.0);

        let mut chart = cartesian(root, &labels.title, x_range, y_range)?;
        draw_axes(&mut chart, labels, 10, &|v: &f64| format_tick(*v))?;
        chart
            .draw_series(bins.iter().map(|b| {
                Rectangle::new(
                    [(b.bin_start, 0.0), (b.bin_end, b.count as f64)],
                    PRIMARY.mix(0.5).filled(),
                )
            }))
            .map_err(backend_error)?;
        chart
            .draw_series(bins.iter().map(|b| {
                Rectangle::new(
                    [(b.bin_start, 0.0), (b.bin_end, b.count as f64)],
                    PRIMARY.stroke_width(1),
                )
            }))
            .map_err(backend_error)?;
        chart
            .draw_series(LineSeries::new(
                density.iter().copied(),
                PRIMARY.stroke_width(2),
            ))
            .map_err(backend_error)?;
        Ok(())
    })
}

/// Diverging blue-grey-red scale for a correlation in `[-1, 1]`.
fn correlation_color(value: f64) -> RGBColor {
    let t = (value.clamp(-1.0, 1.0) + 1.0) / 2.0;
    let (from, to, s) = if t < 0.5 {
        (COLD, NEUTRAL, t * 2.0)
    } else {
        (NEUTRAL, WARM, (t - 0.5) * 2.0)
    };
    let lerp = |a: f64, b: f64| (a + (b - a) * s).round() as u8;
    RGBColor(lerp(from.0, to.0), lerp(from.1, to.1), lerp(from.2, to.2))
}

pub(crate) fn heatmap(
    canvas: Canvas,
    labels: &ChartLabels,
    matrix: &CorrelationMatrix,
) -> Result<Vec<u8>, RenderError> {
    let n = matrix.len();
    let names = &matrix.columns;
    // Row 0 is drawn at the top.
    let reversed: Vec<String> = names.iter().rev().cloned().collect();
    let mut cells = Vec::with_capacity(n * n);
    for row in 0..n {
        for col in 0..n {
            let value = matrix.get(row, col).unwrap_or(f64::NAN);
            cells.push((col as f64, (n - 1 - row) as f64, value));
        }
    }

    paint(canvas, |root| {
        let mut chart = cartesian(root, &labels.title, category_range(n), category_range(n))?;
        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(n + 1)
            .y_labels(n + 1)
            .x_label_formatter(&|v: &f64| category_label(names, *v))
            .y_label_formatter(&|v: &f64| category_label(&reversed, *v))
            .label_style((FONT_FAMILY, 13))
            .draw()
            .map_err(backend_error)?;

        chart
            .draw_series(cells.iter().map(|&(x, y, value)| {
                let color = if value.is_nan() {
                    WHITE
                } else {
                    correlation_color(value)
                };
                Rectangle::new([(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)], color.filled())
            }))
            .map_err(backend_error)?;
        chart
            .draw_series(cells.iter().map(|&(x, y, value)| {
                let color = if value.abs() > 0.6 { WHITE } else { BLACK };
                Text::new(
                    CorrelationMatrix::annotation(value),
                    (x, y),
                    (FONT_FAMILY, 16)
                        .into_font()
                        .color(&color)
                        .pos(Pos::new(HPos::Center, VPos::Center)),
                )
            }))
            .map_err(backend_error)?;
        Ok(())
    })
}

/// Square pie chart, wedges clockwise from twelve o'clock.
pub(crate) fn pie(
    size: u32,
    labels: &ChartLabels,
    counts: &[ValueCount],
) -> Result<Vec<u8>, RenderError> {
    let canvas = Canvas {
        width: size,
        height: size,
    };
    paint(canvas, |root| {
        let area = root
            .titled(&labels.title, (FONT_FAMILY, 28))
            .map_err(backend_error)?;
        if counts.is_empty() {
            return Ok(());
        }

        let (width, height) = area.dim_in_pixel();
        let center = (width as i32 / 2, height as i32 / 2);
        let radius = f64::from(width.min(height)) * 0.38;
        let sizes: Vec<f64> = counts.iter().map(|c| c.count as f64).collect();
        let colors: Vec<RGBColor> = (0..counts.len())
            .map(|i| PALETTE[i % PALETTE.len()])
            .collect();
        let names: Vec<&str> = counts.iter().map(|c| c.value.as_str()).collect();

        let mut pie = Pie::new(&center, &radius, &sizes, &colors, &names);
        pie.start_angle(-90.0);
        pie.label_style((FONT_FAMILY, 18).into_font().color(&BLACK));
        pie.percentages((FONT_FAMILY, 16).into_font().color(&WHITE));
        area.draw(&pie).map_err(backend_error)
    })
}
