//! Raster charts for embedding in PDF reports.
//!
//! The raster holds only geometry (bars, lines, axes, gridlines). Text is
//! returned alongside as [`ChartLabel`]s in pixel coordinates, and the PDF
//! writer draws it with a real font on top of the embedded image.

use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut,
};
use imageproc::rect::Rect;

pub const CHART_WIDTH: u32 = 800;
pub const CHART_HEIGHT: u32 = 500;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
/// Fixed bar colour ("skyblue").
pub const BAR_COLOR: Rgb<u8> = Rgb([135, 206, 235]);
pub const TRAIN_COLOR: Rgb<u8> = Rgb([31, 119, 180]);
pub const VALIDATION_COLOR: Rgb<u8> = Rgb([255, 127, 14]);
/// Ends of the heatmap scale. The dark end stays light enough for black text.
pub const HEAT_LOW: Rgb<u8> = Rgb([247, 251, 255]);
pub const HEAT_HIGH: Rgb<u8> = Rgb([33, 113, 181]);

const TITLE_SIZE: f32 = 20.0;
const AXIS_LABEL_SIZE: f32 = 15.0;
const TICK_SIZE: f32 = 13.0;

/// Average Helvetica glyph advance as a fraction of the font size.
const GLYPH_ASPECT: f32 = 0.52;

/// Text to draw over the chart. `x`/`y` is the start of the baseline in
/// image pixels (origin top-left); `rotation` is degrees counter-clockwise.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartLabel {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub rotation: f32,
}

#[derive(Debug, Clone)]
pub struct Chart {
    pub image: RgbImage,
    pub labels: Vec<ChartLabel>,
}

/// Approximate rendered width of `text` at `size` pixels.
pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * GLYPH_ASPECT
}

#[derive(Debug, Clone, Copy)]
struct PlotArea {
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
}

impl PlotArea {
    fn width(&self) -> f32 {
        self.right - self.left
    }

    fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Pixel row for `value` on a linear `[min, max]` axis.
    fn y_for(&self, value: f64, min: f64, max: f64) -> f32 {
        let span = (max - min).max(f64::EPSILON);
        let t = ((value - min) / span).clamp(0.0, 1.0) as f32;
        self.bottom - t * self.height()
    }
}

struct ChartCanvas {
    image: RgbImage,
    labels: Vec<ChartLabel>,
    area: PlotArea,
}

impl ChartCanvas {
    fn new(area: PlotArea) -> Self {
        Self {
            image: RgbImage::from_pixel(CHART_WIDTH, CHART_HEIGHT, BACKGROUND),
            labels: Vec::new(),
            area,
        }
    }

    fn label(&mut self, text: impl Into<String>, x: f32, y: f32, size: f32, rotation: f32) {
        self.labels.push(ChartLabel {
            text: text.into(),
            x,
            y,
            size,
            rotation,
        });
    }

    fn title(&mut self, text: &str) {
        let x = CHART_WIDTH as f32 / 2.0 - text_width(text, TITLE_SIZE) / 2.0;
        self.label(text, x, self.area.top - 18.0, TITLE_SIZE, 0.0);
    }

    fn y_axis_label(&mut self, text: &str) {
        let x = 26.0;
        let y = self.area.top + self.area.height() / 2.0 + text_width(text, AXIS_LABEL_SIZE) / 2.0;
        self.label(text, x, y, AXIS_LABEL_SIZE, 90.0);
    }

    fn y_ticks(&mut self, ticks: &[f64], min: f64, max: f64, fmt_tick: impl Fn(f64) -> String) {
        for &tick in ticks {
            let y = self.area.y_for(tick, min, max);
            draw_line_segment_mut(
                &mut self.image,
                (self.area.left, y),
                (self.area.right, y),
                GRID,
            );
            draw_line_segment_mut(&mut self.image, (self.area.left - 5.0, y), (self.area.left, y), AXIS);

            let text = fmt_tick(tick);
            let x = self.area.left - 9.0 - text_width(&text, TICK_SIZE);
            self.label(text, x, y + TICK_SIZE * 0.35, TICK_SIZE, 0.0);
        }
    }

    fn axes(&mut self) {
        let PlotArea {
            left,
            top,
            right,
            bottom,
        } = self.area;
        draw_line_segment_mut(&mut self.image, (left, top), (left, bottom), AXIS);
        draw_line_segment_mut(&mut self.image, (left, bottom), (right, bottom), AXIS);
    }

    fn finish(self) -> Chart {
        Chart {
            image: self.image,
            labels: self.labels,
        }
    }
}

/// Vertical bar chart on a fixed `[0, 100]` scale with category labels
/// rotated 45°.
///
/// Values outside the scale are clamped; NaN is drawn as zero.
pub fn bar_chart(title: &str, y_label: &str, bars: &[(&str, f64)]) -> Chart {
    let area = PlotArea {
        left: 80.0,
        top: 50.0,
        right: CHART_WIDTH as f32 - 20.0,
        bottom: CHART_HEIGHT as f32 - 150.0,
    };
    let mut canvas = ChartCanvas::new(area);

    canvas.title(title);
    canvas.y_axis_label(y_label);
    canvas.y_ticks(&[0.0, 20.0, 40.0, 60.0, 80.0, 100.0], 0.0, 100.0, |t| {
        format!("{t:.0}")
    });

    let slot = area.width() / bars.len().max(1) as f32;
    let bar_width = slot * 0.8;

    for (i, (label, value)) in bars.iter().enumerate() {
        let value = if value.is_nan() { 0.0 } else { *value };
        let center = area.left + slot * (i as f32 + 0.5);
        let top = area.y_for(value, 0.0, 100.0);
        let height = (area.bottom - top).round() as u32;

        if height > 0 && bar_width >= 1.0 {
            let rect = Rect::at((center - bar_width / 2.0) as i32, top.round() as i32)
                .of_size(bar_width as u32, height);
            draw_filled_rect_mut(&mut canvas.image, rect, BAR_COLOR);
        }

        // Rotated text ends just below its tick, reading up and to the right.
        let diagonal = text_width(label, TICK_SIZE) * std::f32::consts::FRAC_1_SQRT_2;
        let end_x = center + TICK_SIZE * 0.35;
        let end_y = area.bottom + 14.0;
        canvas.label(*label, end_x - diagonal, end_y + diagonal, TICK_SIZE, 45.0);
        draw_line_segment_mut(
            &mut canvas.image,
            (center, area.bottom),
            (center, area.bottom + 5.0),
            AXIS,
        );
    }

    canvas.axes();
    canvas.finish()
}

/// One line of a [`line_chart`].
#[derive(Debug, Clone)]
pub struct Series<'a> {
    pub name: &'a str,
    pub values: &'a [f64],
    pub color: Rgb<u8>,
}

/// Per-epoch line chart with markers and a legend in the top-right corner.
///
/// The y axis spans the finite values of all series, padded by 5%.
pub fn line_chart(title: &str, x_label: &str, y_label: &str, series: &[Series<'_>]) -> Chart {
    let area = PlotArea {
        left: 90.0,
        top: 50.0,
        right: CHART_WIDTH as f32 - 20.0,
        bottom: CHART_HEIGHT as f32 - 70.0,
    };
    let mut canvas = ChartCanvas::new(area);

    let (min, max) = value_range(series);
    let epochs = series.iter().map(|s| s.values.len()).max().unwrap_or(0);

    canvas.title(title);
    canvas.y_axis_label(y_label);
    let ticks: Vec<f64> = (0..=4).map(|i| min + (max - min) * i as f64 / 4.0).collect();
    canvas.y_ticks(&ticks, min, max, |t| format!("{t:.2}"));

    let x_for = |epoch: usize| -> f32 {
        if epochs <= 1 {
            area.left + area.width() / 2.0
        } else {
            area.left + area.width() * epoch as f32 / (epochs - 1) as f32
        }
    };

    let step = (epochs / 10).max(1);
    for epoch in (0..epochs).step_by(step) {
        let x = x_for(epoch);
        draw_line_segment_mut(&mut canvas.image, (x, area.bottom), (x, area.bottom + 5.0), AXIS);
        let text = epoch.to_string();
        let tx = x - text_width(&text, TICK_SIZE) / 2.0;
        canvas.label(text, tx, area.bottom + 20.0, TICK_SIZE, 0.0);
    }
    let x_label_x = area.left + area.width() / 2.0 - text_width(x_label, AXIS_LABEL_SIZE) / 2.0;
    canvas.label(x_label, x_label_x, area.bottom + 45.0, AXIS_LABEL_SIZE, 0.0);

    for s in series {
        let points: Vec<(f32, f32)> = s
            .values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(i, v)| (x_for(i), area.y_for(*v, min, max)))
            .collect();

        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            // Three offset passes give a 3px stroke.
            for d in [-1.0, 0.0, 1.0] {
                draw_line_segment_mut(&mut canvas.image, (a.0, a.1 + d), (b.0, b.1 + d), s.color);
            }
        }
        for (x, y) in &points {
            draw_filled_circle_mut(&mut canvas.image, (*x as i32, *y as i32), 3, s.color);
        }
    }

    legend(&mut canvas, series);
    canvas.axes();
    canvas.finish()
}

/// Grid of counts shaded from [`HEAT_LOW`] (zero) to [`HEAT_HIGH`] (the
/// largest count), with the count written in each cell.
///
/// Rows run top to bottom and columns left to right in `categories` order;
/// cells missing from `counts` are zero.
pub fn heatmap(
    title: &str,
    x_label: &str,
    y_label: &str,
    categories: &[&str],
    counts: &[Vec<usize>],
) -> Chart {
    let area = PlotArea {
        left: 200.0,
        top: 50.0,
        right: CHART_WIDTH as f32 - 120.0,
        bottom: CHART_HEIGHT as f32 - 130.0,
    };
    let mut canvas = ChartCanvas::new(area);
    canvas.title(title);

    let n = categories.len().max(1);
    let cell_w = area.width() / n as f32;
    let cell_h = area.height() / n as f32;
    let count = |row: usize, col: usize| counts.get(row).and_then(|r| r.get(col)).copied().unwrap_or(0);
    let max = (0..n)
        .flat_map(|row| (0..n).map(move |col| (row, col)))
        .map(|(row, col)| count(row, col))
        .max()
        .unwrap_or(0);

    for row in 0..categories.len() {
        for col in 0..categories.len() {
            let value = count(row, col);
            let t = if max == 0 { 0.0 } else { value as f32 / max as f32 };
            let x = area.left + col as f32 * cell_w;
            let y = area.top + row as f32 * cell_h;

            let rect = Rect::at(x.round() as i32, y.round() as i32)
                .of_size(cell_w.round().max(1.0) as u32, cell_h.round().max(1.0) as u32);
            draw_filled_rect_mut(&mut canvas.image, rect, shade(t));

            let text = value.to_string();
            let tx = x + cell_w / 2.0 - text_width(&text, TICK_SIZE) / 2.0;
            canvas.label(text, tx, y + cell_h / 2.0 + TICK_SIZE * 0.35, TICK_SIZE, 0.0);
        }
    }

    for (i, name) in categories.iter().enumerate() {
        let y = area.top + (i as f32 + 0.5) * cell_h;
        let x = area.left - 8.0 - text_width(name, TICK_SIZE);
        canvas.label(*name, x, y + TICK_SIZE * 0.35, TICK_SIZE, 0.0);

        let center = area.left + (i as f32 + 0.5) * cell_w;
        let diagonal = text_width(name, TICK_SIZE) * std::f32::consts::FRAC_1_SQRT_2;
        canvas.label(*name, center - diagonal, area.bottom + 14.0 + diagonal, TICK_SIZE, 45.0);
    }

    canvas.y_axis_label(y_label);
    let x_label_x = area.left + area.width() / 2.0 - text_width(x_label, AXIS_LABEL_SIZE) / 2.0;
    canvas.label(x_label, x_label_x, CHART_HEIGHT as f32 - 12.0, AXIS_LABEL_SIZE, 0.0);

    canvas.axes();
    canvas.finish()
}

/// Linear blend between the heatmap ends, `t` in `[0, 1]`.
fn shade(t: f32) -> Rgb<u8> {
    let t = t.clamp(0.0, 1.0);
    let mix = |lo: u8, hi: u8| (lo as f32 + (hi as f32 - lo as f32) * t).round() as u8;
    Rgb([
        mix(HEAT_LOW[0], HEAT_HIGH[0]),
        mix(HEAT_LOW[1], HEAT_HIGH[1]),
        mix(HEAT_LOW[2], HEAT_HIGH[2]),
    ])
}

fn legend(canvas: &mut ChartCanvas, series: &[Series<'_>]) {
    let longest = series
        .iter()
        .map(|s| text_width(s.name, TICK_SIZE))
        .fold(0.0f32, f32::max);
    let x = canvas.area.right - longest - 40.0;

    for (i, s) in series.iter().enumerate() {
        let y = canvas.area.top + 12.0 + i as f32 * 20.0;
        let swatch = Rect::at(x as i32, (y - 6.0) as i32).of_size(18, 6);
        draw_filled_rect_mut(&mut canvas.image, swatch, s.color);
        canvas.label(s.name, x + 24.0, y + 1.0, TICK_SIZE, 0.0);
    }
}

fn value_range(series: &[Series<'_>]) -> (f64, f64) {
    let (min, max) = series
        .iter()
        .flat_map(|s| s.values.iter().copied())
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });

    if !min.is_finite() {
        return (0.0, 1.0);
    }
    if (max - min).abs() < 1e-9 {
        return (min - 0.5, max + 0.5);
    }
    let pad = (max - min) * 0.05;
    (min - pad, max + pad)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_color(image: &RgbImage, color: Rgb<u8>) -> usize {
        image.pixels().filter(|p| **p == color).count()
    }

    fn bars(values: [f64; 4]) -> Vec<(&'static str, f64)> {
        ["Mild Dementia", "Moderate Dementia", "Non Demented", "Very mild Dementia"]
            .into_iter()
            .zip(values)
            .collect()
    }

    #[test]
    fn bar_chart_has_fixed_size_and_labels() {
        let chart = bar_chart("Confidence Scores", "Confidence (%)", &bars([10.0, 20.0, 30.0, 40.0]));

        assert_eq!(chart.image.dimensions(), (CHART_WIDTH, CHART_HEIGHT));
        let texts: Vec<&str> = chart.labels.iter().map(|l| l.text.as_str()).collect();
        assert!(texts.contains(&"Confidence Scores"));
        assert!(texts.contains(&"Confidence (%)"));
        assert!(texts.contains(&"100"));

        let rotated: Vec<&ChartLabel> = chart.labels.iter().filter(|l| l.rotation == 45.0).collect();
        assert_eq!(rotated.len(), 4, "every category label is rotated");
    }

    #[test]
    fn bar_area_scales_with_value() {
        let small = bar_chart("t", "y", &[("a", 10.0)]);
        let large = bar_chart("t", "y", &[("a", 80.0)]);

        let small_px = count_color(&small.image, BAR_COLOR);
        let large_px = count_color(&large.image, BAR_COLOR);
        assert!(small_px > 0);
        assert!(
            large_px > small_px * 6,
            "80% bar ({}) should be ~8x a 10% bar ({})",
            large_px,
            small_px
        );
    }

    #[test]
    fn bar_values_are_clamped_and_nan_is_empty() {
        let over = bar_chart("t", "y", &[("a", 250.0)]);
        let full = bar_chart("t", "y", &[("a", 100.0)]);
        assert_eq!(count_color(&over.image, BAR_COLOR), count_color(&full.image, BAR_COLOR));

        let nan = bar_chart("t", "y", &[("a", f64::NAN), ("b", -5.0)]);
        assert_eq!(count_color(&nan.image, BAR_COLOR), 0);
    }

    #[test]
    fn line_chart_draws_each_series() {
        let train = [0.5, 0.6, 0.7, 0.8];
        let val = [0.45, 0.55, 0.6, 0.62];
        let chart = line_chart(
            "Model Accuracy",
            "Epoch",
            "Accuracy",
            &[
                Series {
                    name: "Train Accuracy",
                    values: &train,
                    color: TRAIN_COLOR,
                },
                Series {
                    name: "Validation Accuracy",
                    values: &val,
                    color: VALIDATION_COLOR,
                },
            ],
        );

        assert!(count_color(&chart.image, TRAIN_COLOR) > 0);
        assert!(count_color(&chart.image, VALIDATION_COLOR) > 0);
        let texts: Vec<&str> = chart.labels.iter().map(|l| l.text.as_str()).collect();
        assert!(texts.contains(&"Train Accuracy"));
        assert!(texts.contains(&"Validation Accuracy"));
        assert!(texts.contains(&"Epoch"));
    }

    #[test]
    fn line_chart_tolerates_empty_and_flat_series() {
        let flat = [0.3, 0.3, 0.3];
        let chart = line_chart(
            "Loss",
            "Epoch",
            "Loss",
            &[
                Series {
                    name: "flat",
                    values: &flat,
                    color: TRAIN_COLOR,
                },
                Series {
                    name: "empty",
                    values: &[],
                    color: VALIDATION_COLOR,
                },
            ],
        );
        assert_eq!(chart.image.dimensions(), (CHART_WIDTH, CHART_HEIGHT));
    }

    #[test]
    fn heatmap_shades_by_count_and_labels_cells() {
        let counts = vec![vec![9, 1], vec![0, 4]];
        let chart = heatmap("Confusion Matrix", "Predicted", "Actual", &["a", "b"], &counts);

        assert_eq!(chart.image.dimensions(), (CHART_WIDTH, CHART_HEIGHT));
        assert!(count_color(&chart.image, HEAT_HIGH) > 0, "largest count uses the dark end");
        assert!(count_color(&chart.image, HEAT_LOW) > 0, "zero uses the light end");

        let texts: Vec<&str> = chart.labels.iter().map(|l| l.text.as_str()).collect();
        for expected in ["9", "1", "0", "4", "Predicted", "Actual", "Confusion Matrix"] {
            assert!(texts.contains(&expected), "missing label {expected}");
        }
        assert_eq!(chart.labels.iter().filter(|l| l.rotation == 45.0).count(), 2);
    }

    #[test]
    fn heatmap_of_empty_matrix_is_light() {
        let chart = heatmap("t", "x", "y", &["a", "b"], &[]);
        assert_eq!(count_color(&chart.image, HEAT_HIGH), 0);
        assert!(chart.labels.iter().filter(|l| l.text == "0").count() == 4);
    }

    #[test]
    fn value_range_pads_and_ignores_non_finite() {
        let values = [1.0, f64::NAN, 3.0, f64::INFINITY];
        let (min, max) = value_range(&[Series {
            name: "s",
            values: &values,
            color: TRAIN_COLOR,
        }]);
        assert!((min - 0.9).abs() < 1e-9);
        assert!((max - 3.1).abs() < 1e-9);
    }
}
