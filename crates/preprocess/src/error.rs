use fast_image_resize::{ImageBufferError, ResizeError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Empty image upload")]
    Empty,

    #[error("Unable to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Image has no pixels ({width}x{height})")]
    ZeroSized { width: u32, height: u32 },

    #[error("Resize failed: {0}")]
    Resize(String),
}

impl From<ResizeError> for PreprocessError {
    fn from(err: ResizeError) -> Self {
        PreprocessError::Resize(err.to_string())
    }
}

impl From<ImageBufferError> for PreprocessError {
    fn from(err: ImageBufferError) -> Self {
        PreprocessError::Resize(err.to_string())
    }
}
