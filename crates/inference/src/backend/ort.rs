use super::{BackendOptions, InferenceBackend};
use ndarray::Array4;
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};

/// ONNX Runtime on the CPU execution provider.
pub struct OrtBackend {
    session: Session,
}

impl InferenceBackend for OrtBackend {
    fn load_model(path: &str, options: &BackendOptions) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        tracing::info!(
            intra_threads = options.intra_threads,
            "Initializing ONNX Runtime with CPU execution provider"
        );

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(options.intra_threads)?
            .commit_from_file(path)?;

        tracing::info!("Model loaded from {}", path);
        Ok(Self { session })
    }

    fn infer(&mut self, input: &Array4<f32>) -> anyhow::Result<Vec<f32>> {
        let input = input.view().into_dyn();
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input)?])?;

        let scores = outputs[0].try_extract_array::<f32>()?;
        Ok(scores.iter().copied().collect())
    }
}
