use crate::dataset::LabeledImage;
use crate::metrics::ConfusionMatrix;
use indicatif::ProgressBar;
use inference::ImageClassifier;
use std::path::PathBuf;

#[derive(Debug, Default)]
pub struct Evaluation {
    pub matrix: ConfusionMatrix,
    /// Images that could not be read or classified, with the reason.
    pub failures: Vec<(PathBuf, String)>,
}

/// Classify every image and tally predictions against the directory labels.
///
/// A failing image is recorded in `failures` and left out of the matrix.
pub fn evaluate(
    classifier: &dyn ImageClassifier,
    images: &[LabeledImage],
    progress: &ProgressBar,
) -> Evaluation {
    let mut evaluation = Evaluation::default();

    for image in images {
        let outcome = std::fs::read(&image.path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| classifier.classify(&bytes).map_err(|e| e.to_string()));

        match outcome {
            Ok(prediction) => evaluation
                .matrix
                .record(image.stage, prediction.predicted_stage),
            Err(reason) => {
                tracing::warn!(path = %image.path.display(), error = %reason, "Image skipped");
                evaluation.failures.push((image.path.clone(), reason));
            }
        }
        progress.inc(1);
    }

    progress.finish_and_clear();
    evaluation
}
