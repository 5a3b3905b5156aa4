use crate::backend::BackendOptions;
use common::{env_or, env_string};
use preprocess::DEFAULT_INPUT_SIZE;

pub use common::Environment;

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub environment: Environment,
    pub model_path: String,
    /// Side of the square grayscale input the model was exported with.
    pub input_size: u32,
    pub intra_threads: usize,
}

impl InferenceConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Self {
        Self {
            environment: Environment::from_env(),
            model_path: env_string("MODEL_PATH", "models/alzheimer_stage_classifier.onnx"),
            input_size: env_or("INPUT_SIZE", DEFAULT_INPUT_SIZE),
            intra_threads: env_or("INTRA_THREADS", 4),
        }
    }

    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            intra_threads: self.intra_threads,
        }
    }

    /// Create default configuration for testing
    pub fn test_default() -> Self {
        Self {
            environment: Environment::Development,
            model_path: "/models/model.onnx".to_string(),
            input_size: DEFAULT_INPUT_SIZE,
            intra_threads: 1,
        }
    }
}
