use crate::artifacts::ReportArtifacts;
use crate::chart::{self, Chart};
use crate::pdf::{ReportWriter, load_rgb};
use crate::ReportError;
use chrono::NaiveDateTime;
use common::span;
use inference::ConfidenceScores;
use std::path::PathBuf;

pub const REPORT_TITLE: &str = "Alzheimer Stage Detection Report";

/// Width of the embedded upload and chart, in millimetres.
const FIGURE_WIDTH: f32 = 180.0;

/// Everything a report shows. `predicted_stage` is free text so a report
/// can be produced for any submitted result.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub predicted_stage: String,
    pub confidence_scores: ConfidenceScores,
    pub image_path: Option<PathBuf>,
    pub generated_at: NaiveDateTime,
}

/// Build the PDF report.
///
/// Page 1 carries the prediction and one line per label. The uploaded image
/// gets its own page only when `image_path` points at an existing file; the
/// chart page is always present. An image or chart that cannot be loaded is
/// replaced by an error line instead of failing the whole report.
pub fn generate_report(request: &ReportRequest) -> Result<Vec<u8>, ReportError> {
    let _s = span!("generate_report");

    let mut writer = ReportWriter::new(REPORT_TITLE)?;
    summary_page(&mut writer, request);

    if let Some(path) = request.image_path.as_ref().filter(|p| p.exists()) {
        writer.add_page();
        writer.line("Uploaded MRI Image:");
        if let Err(e) = load_rgb(path).and_then(|img| writer.image(&img, FIGURE_WIDTH)) {
            tracing::warn!(path = %path.display(), error = %e, "Uploaded image not embedded");
            writer.line(&format!("Error loading image: {e}"));
        }
    }

    writer.add_page();
    writer.line("Confidence Chart:");
    if let Err(e) = chart_section(&mut writer, &request.confidence_scores) {
        tracing::warn!(error = %e, "Confidence chart not embedded");
        writer.line(&format!("Error loading chart: {e}"));
    }

    let bytes = writer.finish()?;
    tracing::debug!(bytes = bytes.len(), "Report rendered");
    Ok(bytes)
}

fn summary_page(writer: &mut ReportWriter, request: &ReportRequest) {
    writer.centered_line(REPORT_TITLE);
    writer.line(&format!(
        "Date: {}",
        request.generated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    writer.line(&format!("Prediction: {}", request.predicted_stage));
    writer.line("Confidence Scores:");
    for (stage, score) in request.confidence_scores.iter() {
        writer.line(&format!("{}: {:.2}%", stage, score * 100.0));
    }
}

/// Render the chart to the scratch directory and embed it from there.
fn chart_section(writer: &mut ReportWriter, scores: &ConfidenceScores) -> Result<(), ReportError> {
    let chart = confidence_chart(scores);
    let artifacts = ReportArtifacts::new()?;
    let path = artifacts.save_chart(&chart.image)?;

    let image = load_rgb(&path)?;
    writer.chart(
        &Chart {
            image,
            labels: chart.labels,
        },
        FIGURE_WIDTH,
    )
}

pub(crate) fn confidence_chart(scores: &ConfidenceScores) -> Chart {
    let bars: Vec<(&str, f64)> = scores
        .iter()
        .map(|(stage, score)| (stage.as_str(), score * 100.0))
        .collect();
    chart::bar_chart("Confidence Scores", "Confidence (%)", &bars)
}
