use ndarray::Array4;

#[cfg(feature = "ort-backend")]
pub mod ort;

/// Options applied when a backend loads its model.
#[derive(Debug, Clone)]
pub struct BackendOptions {
    pub intra_threads: usize,
}

pub trait InferenceBackend: Send {
    fn load_model(path: &str, options: &BackendOptions) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Run the model on one NHWC batch and return its flattened class scores.
    fn infer(&mut self, input: &Array4<f32>) -> anyhow::Result<Vec<f32>>;
}
