//! Multi-class scores over the four stages: confusion matrix, accuracy and
//! per-class precision, recall, F1 and support.
//!
//! Ratios with a zero denominator are reported as 0.

use inference::{NUM_CLASSES, Stage};
use report::{ReportError, ReportWriter, chart};
use std::fmt;

/// Width of the heatmap on the page, in millimetres.
const HEATMAP_WIDTH_MM: f32 = 190.0;

/// Counts indexed `[actual][predicted]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    counts: [[usize; NUM_CLASSES]; NUM_CLASSES],
}

impl ConfusionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, actual: Stage, predicted: Stage) {
        self.counts[actual.index()][predicted.index()] += 1;
    }

    pub fn count(&self, actual: Stage, predicted: Stage) -> usize {
        self.counts[actual.index()][predicted.index()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..NUM_CLASSES).map(|i| self.counts[i][i]).sum()
    }

    /// `None` until something has been recorded.
    pub fn accuracy(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.correct() as f64 / total as f64),
        }
    }

    /// Samples whose true label is `stage`.
    pub fn support(&self, stage: Stage) -> usize {
        self.counts[stage.index()].iter().sum()
    }

    fn predicted(&self, stage: Stage) -> usize {
        self.counts.iter().map(|row| row[stage.index()]).sum()
    }

    pub fn precision(&self, stage: Stage) -> f64 {
        ratio(self.count(stage, stage), self.predicted(stage))
    }

    pub fn recall(&self, stage: Stage) -> f64 {
        ratio(self.count(stage, stage), self.support(stage))
    }

    pub fn f1(&self, stage: Stage) -> f64 {
        let (p, r) = (self.precision(stage), self.recall(stage));
        if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) }
    }

    /// One page with the matrix drawn as a heatmap, actual labels down the
    /// side and predicted labels along the bottom.
    pub fn render_pdf(&self) -> Result<Vec<u8>, ReportError> {
        let names: Vec<&str> = Stage::ALL.iter().map(|s| s.as_str()).collect();
        let rows: Vec<Vec<usize>> = self.counts.iter().map(|row| row.to_vec()).collect();

        let mut writer = ReportWriter::new("Confusion Matrix")?;
        writer.centered_line(&format!(
            "Accuracy: {:.2}% ({} of {})",
            self.accuracy().unwrap_or(0.0) * 100.0,
            self.correct(),
            self.total()
        ));
        let heatmap = chart::heatmap("Confusion Matrix", "Predicted Label", "True Label", &names, &rows);
        writer.chart(&heatmap, HEATMAP_WIDTH_MM)?;
        writer.finish()
    }

    pub fn report(&self) -> ClassificationReport {
        ClassificationReport {
            classes: Stage::ALL
                .iter()
                .map(|&stage| ClassMetrics {
                    stage,
                    precision: self.precision(stage),
                    recall: self.recall(stage),
                    f1: self.f1(stage),
                    support: self.support(stage),
                })
                .collect(),
            accuracy: self.accuracy().unwrap_or(0.0),
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl fmt::Display for ConfusionMatrix {
    /// Rows are actual labels, columns predicted, in label order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const CORNER: &str = "actual \\ predicted";
        let name_width = Stage::ALL
            .iter()
            .map(|s| s.as_str().len() + 4)
            .max()
            .unwrap_or(0)
            .max(CORNER.len());
        let cell = self
            .counts
            .iter()
            .flatten()
            .map(|c| c.to_string().len())
            .max()
            .unwrap_or(1)
            .max(4);

        write!(f, "{CORNER:>name_width$}")?;
        for i in 0..NUM_CLASSES {
            write!(f, " {:>cell$}", format!("[{i}]"))?;
        }
        writeln!(f)?;

        for (i, stage) in Stage::ALL.iter().enumerate() {
            write!(f, "{:>name_width$}", format!("[{i}] {stage}"))?;
            for count in &self.counts[i] {
                write!(f, " {count:>cell$}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub stage: Stage,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
}

impl ClassificationReport {
    pub fn total_support(&self) -> usize {
        self.classes.iter().map(|c| c.support).sum()
    }

    /// Unweighted mean of (precision, recall, F1) over classes.
    pub fn macro_avg(&self) -> (f64, f64, f64) {
        let n = self.classes.len().max(1) as f64;
        let sum = self.classes.iter().fold((0.0, 0.0, 0.0), |acc, c| {
            (acc.0 + c.precision, acc.1 + c.recall, acc.2 + c.f1)
        });
        (sum.0 / n, sum.1 / n, sum.2 / n)
    }

    /// Mean of (precision, recall, F1) weighted by support.
    pub fn weighted_avg(&self) -> (f64, f64, f64) {
        let total = self.total_support();
        if total == 0 {
            return (0.0, 0.0, 0.0);
        }
        let sum = self.classes.iter().fold((0.0, 0.0, 0.0), |acc, c| {
            let w = c.support as f64;
            (acc.0 + c.precision * w, acc.1 + c.recall * w, acc.2 + c.f1 * w)
        });
        let total = total as f64;
        (sum.0 / total, sum.1 / total, sum.2 / total)
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let w = self
            .classes
            .iter()
            .map(|c| c.stage.as_str().len())
            .max()
            .unwrap_or(0)
            .max("weighted avg".len());

        writeln!(f, "{:>w$} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>w$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.stage.as_str(),
                c.precision,
                c.recall,
                c.f1,
                c.support
            )?;
        }
        writeln!(f)?;

        let total = self.total_support();
        writeln!(f, "{:>w$} {:>9} {:>9} {:>9.2} {:>9}", "accuracy", "", "", self.accuracy, total)?;
        for (name, (p, r, f1)) in [("macro avg", self.macro_avg()), ("weighted avg", self.weighted_avg())] {
            writeln!(f, "{name:>w$} {p:>9.2} {r:>9.2} {f1:>9.2} {total:>9}")?;
        }
        Ok(())
    }
}
