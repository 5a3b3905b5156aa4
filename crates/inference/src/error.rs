use preprocess::PreprocessError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Model failed to load.")]
    ModelUnavailable,

    #[error("Invalid image: {0}")]
    Preprocess(#[from] PreprocessError),

    #[error("Inference failed: {0:#}")]
    Inference(anyhow::Error),

    #[error("Classifier returned {actual} scores, expected {expected}")]
    OutputShape { expected: usize, actual: usize },

    #[error("Classifier returned no finite scores")]
    InvalidScores,
}

impl ClassifyError {
    /// True when the caller sent something unusable, as opposed to the
    /// service failing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ClassifyError::Preprocess(_))
    }
}
