use crate::{DEFAULT_INPUT_SIZE, NormalizedImage, Preprocess, PreprocessError};
use common::span;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use image::{DynamicImage, GrayImage};
use ndarray::Array4;

/// Decodes an upload, drops colour, resizes to a fixed square and scales
/// intensities to `[0, 1]`.
///
/// Holds no per-call buffers, so one instance can be shared by every request.
#[derive(Debug, Clone)]
pub struct Normalizer {
    input_size: u32,
}

impl Normalizer {
    pub fn new(input_size: u32) -> Self {
        Self { input_size }
    }

    pub fn normalize(&self, bytes: &[u8]) -> Result<NormalizedImage, PreprocessError> {
        let decoded = decode(bytes)?;
        self.normalize_image(&decoded)
    }

    /// Normalize an image the caller already decoded.
    pub fn normalize_image(&self, image: &DynamicImage) -> Result<NormalizedImage, PreprocessError> {
        let _s = span!("normalize_image");

        let gray = to_grayscale(image);
        let resized = self.resize(&gray)?;

        Ok(NormalizedImage::new(self.scale(resized)?))
    }

    fn resize(&self, gray: &GrayImage) -> Result<Vec<u8>, PreprocessError> {
        let _s = span!("resize");

        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return Err(PreprocessError::ZeroSized { width, height });
        }

        let src = ImageRef::new(width, height, gray.as_raw(), PixelType::U8)?;
        let mut dst = Image::new(self.input_size, self.input_size, PixelType::U8);

        Resizer::new().resize(
            &src,
            &mut dst,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::CatmullRom)),
        )?;

        Ok(dst.buffer().to_vec())
    }

    fn scale(&self, pixels: Vec<u8>) -> Result<Array4<f32>, PreprocessError> {
        let side = self.input_size as usize;
        let data = pixels.into_iter().map(|p| p as f32 / 255.0).collect();

        Array4::from_shape_vec((1, side, side, 1), data)
            .map_err(|e| PreprocessError::Resize(e.to_string()))
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_SIZE)
    }
}

impl Preprocess for Normalizer {
    fn preprocess(&self, bytes: &[u8]) -> Result<NormalizedImage, PreprocessError> {
        self.normalize(bytes)
    }

    fn input_size(&self) -> u32 {
        self.input_size
    }
}

/// Decode an upload in any format the `image` crate recognises.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PreprocessError> {
    if bytes.is_empty() {
        return Err(PreprocessError::Empty);
    }

    let decoded = image::load_from_memory(bytes)?;
    tracing::trace!(
        width = decoded.width(),
        height = decoded.height(),
        color = ?decoded.color(),
        "Decoded upload"
    );
    Ok(decoded)
}

/// Single-channel luma with ITU-R 601-2 weights in 16-bit fixed point, the
/// transform most imaging stacks apply for an "L" conversion. Alpha is ignored.
fn to_grayscale(image: &DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        other => {
            let rgb = other.to_rgb8();
            let (width, height) = rgb.dimensions();
            let luma = rgb
                .pixels()
                .map(|px| {
                    let [r, g, b] = px.0;
                    ((r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16) as u8
                })
                .collect();
            // Length always matches width * height.
            GrayImage::from_raw(width, height, luma).unwrap_or_else(|| GrayImage::new(width, height))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, format).unwrap();
        bytes.into_inner()
    }

    fn solid_rgb(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(color));
        encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)
    }

    #[test]
    fn output_shape_is_fixed_for_any_source_size() {
        let normalizer = Normalizer::default();

        for (width, height) in [(1, 1), (17, 300), (128, 128), (640, 480), (90, 91)] {
            let bytes = solid_rgb(width, height, [10, 200, 30]);
            let out = normalizer.normalize(&bytes).unwrap();
            assert_eq!(
                out.shape(),
                &[1, 128, 128, 1],
                "{}x{} input should normalize to the fixed shape",
                width,
                height
            );
        }
    }

    #[test]
    fn respects_configured_input_size() {
        let normalizer = Normalizer::new(64);
        let out = normalizer.normalize(&solid_rgb(200, 100, [0, 0, 0])).unwrap();
        assert_eq!(out.shape(), &[1, 64, 64, 1]);
        assert_eq!(normalizer.input_size(), 64);
    }

    #[test]
    fn values_stay_in_unit_range() {
        // Checkerboard maximises overshoot for a Catmull-Rom kernel.
        let img = GrayImage::from_fn(37, 23, |x, y| {
            if (x + y) % 2 == 0 { Luma([255]) } else { Luma([0]) }
        });
        let bytes = encode(DynamicImage::ImageLuma8(img), ImageFormat::Png);

        let out = Normalizer::default().normalize(&bytes).unwrap();
        assert!(out.tensor().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn white_and_black_map_to_unit_bounds() {
        let normalizer = Normalizer::default();

        let white = normalizer.normalize(&solid_rgb(50, 50, [255, 255, 255])).unwrap();
        assert!(white.tensor().iter().all(|v| (*v - 1.0).abs() <= 1.0 / 255.0));

        let black = normalizer.normalize(&solid_rgb(50, 50, [0, 0, 0])).unwrap();
        assert!(black.tensor().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn colour_is_collapsed_with_601_luma() {
        let out = Normalizer::default()
            .normalize(&solid_rgb(8, 8, [255, 0, 0]))
            .unwrap();

        // 255 * 0.299 = 76.2 -> 76
        let expected = 76.0 / 255.0;
        let value = out.tensor()[[0, 64, 64, 0]];
        assert!(
            (value - expected).abs() < 1.5 / 255.0,
            "red should become luma ~{} (got {})",
            expected,
            value
        );
    }

    #[test]
    fn alpha_channel_is_dropped() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 0]));
        let bytes = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);

        let out = Normalizer::default().normalize(&bytes).unwrap();
        assert!(out.tensor().iter().all(|v| (*v - 1.0).abs() <= 1.0 / 255.0));
    }

    #[test]
    fn jpeg_input_is_accepted() {
        let img = RgbImage::from_pixel(64, 48, Rgb([120, 120, 120]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg);

        let out = Normalizer::default().normalize(&bytes).unwrap();
        assert_eq!(out.shape(), &[1, 128, 128, 1]);
    }

    #[test]
    fn malformed_bytes_are_a_decode_error() {
        let err = Normalizer::default()
            .normalize(b"definitely not an image")
            .unwrap_err();
        assert!(matches!(err, PreprocessError::Decode(_)), "got {err:?}");
    }

    #[test]
    fn truncated_png_is_a_decode_error() {
        let bytes = solid_rgb(200, 160, [80, 80, 80]);
        let err = decode(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, PreprocessError::Decode(_)), "got {err:?}");
    }

    #[test]
    fn decoded_and_encoded_paths_agree() {
        let bytes = solid_rgb(40, 30, [200, 100, 50]);
        let normalizer = Normalizer::default();

        let from_bytes = normalizer.normalize(&bytes).unwrap();
        let from_image = normalizer.normalize_image(&decode(&bytes).unwrap()).unwrap();
        assert_eq!(from_bytes.tensor(), from_image.tensor());
    }

    #[test]
    fn empty_upload_is_rejected() {
        let err = Normalizer::default().normalize(&[]).unwrap_err();
        assert!(matches!(err, PreprocessError::Empty));
    }

    #[test]
    fn zeros_probe_matches_normalized_shape() {
        let probe = NormalizedImage::zeros(128);
        let real = Normalizer::default()
            .normalize(&solid_rgb(3, 3, [1, 2, 3]))
            .unwrap();
        assert_eq!(probe.shape(), real.shape());
    }
}
