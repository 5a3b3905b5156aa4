use anyhow::Context;
use report::chart::{self, Series, TRAIN_COLOR, VALIDATION_COLOR};
use report::{ReportError, ReportWriter};
use serde::Deserialize;
use std::path::Path;

/// Width of each chart on the page, in millimetres.
const CHART_WIDTH_MM: f32 = 190.0;

/// Per-epoch training curves as exported by the training run.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TrainingHistory {
    pub accuracy: Vec<f64>,
    #[serde(default)]
    pub val_accuracy: Vec<f64>,
    pub loss: Vec<f64>,
    #[serde(default)]
    pub val_loss: Vec<f64>,
}

impl TrainingHistory {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let history: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", path.display()))?;
        anyhow::ensure!(
            !history.accuracy.is_empty() || !history.loss.is_empty(),
            "{} has no epochs",
            path.display()
        );
        Ok(history)
    }

    pub fn epochs(&self) -> usize {
        [&self.accuracy, &self.val_accuracy, &self.loss, &self.val_loss]
            .iter()
            .map(|v| v.len())
            .max()
            .unwrap_or(0)
    }

    /// Two pages: "Model Accuracy" then "Model Loss", train against
    /// validation.
    pub fn render_pdf(&self) -> Result<Vec<u8>, ReportError> {
        let mut writer = ReportWriter::new("Training History")?;

        let accuracy = chart::line_chart(
            "Model Accuracy",
            "Epoch",
            "Accuracy",
            &curves(&self.accuracy, &self.val_accuracy, ACCURACY_NAMES),
        );
        writer.chart(&accuracy, CHART_WIDTH_MM)?;

        writer.add_page();
        let loss = chart::line_chart(
            "Model Loss",
            "Epoch",
            "Loss",
            &curves(&self.loss, &self.val_loss, LOSS_NAMES),
        );
        writer.chart(&loss, CHART_WIDTH_MM)?;

        writer.finish()
    }
}

const ACCURACY_NAMES: (&str, &str) = ("Train Accuracy", "Validation Accuracy");
const LOSS_NAMES: (&str, &str) = ("Train Loss", "Validation Loss");

/// Train curve, plus the validation curve when one was recorded.
fn curves<'a>(
    train: &'a [f64],
    validation: &'a [f64],
    (train_name, validation_name): (&'a str, &'a str),
) -> Vec<Series<'a>> {
    let mut series = vec![Series {
        name: train_name,
        values: train,
        color: TRAIN_COLOR,
    }];
    if !validation.is_empty() {
        series.push(Series {
            name: validation_name,
            values: validation,
            color: VALIDATION_COLOR,
        });
    }
    series
}
