pub mod error;
pub mod normalizer;

use ndarray::Array4;

pub use error::PreprocessError;
pub use normalizer::{Normalizer, decode};

/// Side length of the square grayscale input the classifier is built for.
pub const DEFAULT_INPUT_SIZE: u32 = 128;

/// A single image ready for the classifier: NHWC layout `(1, size, size, 1)`
/// with intensities in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    tensor: Array4<f32>,
}

impl NormalizedImage {
    pub(crate) fn new(tensor: Array4<f32>) -> Self {
        Self { tensor }
    }

    /// All-zero (black) image, used to probe a model's input shape.
    pub fn zeros(size: u32) -> Self {
        let side = size as usize;
        Self::new(Array4::zeros((1, side, side, 1)))
    }

    pub fn tensor(&self) -> &Array4<f32> {
        &self.tensor
    }

    pub fn shape(&self) -> &[usize] {
        self.tensor.shape()
    }
}

/// Turns encoded image bytes into classifier input.
pub trait Preprocess: Send + Sync {
    fn preprocess(&self, bytes: &[u8]) -> Result<NormalizedImage, PreprocessError>;

    /// Side length of the square images this preprocessor produces.
    fn input_size(&self) -> u32;
}
