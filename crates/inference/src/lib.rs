pub mod backend;
pub mod config;
pub mod error;
pub mod labels;
pub mod service;

// Re-export commonly used types for convenience
pub use backend::{BackendOptions, InferenceBackend};
pub use config::InferenceConfig;
pub use error::ClassifyError;
pub use labels::{ConfidenceScores, NUM_CLASSES, Prediction, Stage};
pub use service::{Classifier, ImageClassifier};

#[cfg(feature = "ort-backend")]
pub use backend::ort::OrtBackend;
