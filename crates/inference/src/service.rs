use crate::{
    ClassifyError,
    backend::InferenceBackend,
    config::InferenceConfig,
    labels::{NUM_CLASSES, Prediction, map_scores},
};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use image::DynamicImage;
use preprocess::{NormalizedImage, Normalizer, Preprocess, PreprocessError};
use std::sync::Mutex;
use std::time::Instant;

/// Anything that can turn an uploaded image into a [`Prediction`].
///
/// The HTTP adapters only see this trait, so they never depend on which
/// backend is loaded.
pub trait ImageClassifier: Send + Sync {
    fn classify(&self, image: &[u8]) -> Result<Prediction, ClassifyError>;

    /// Classify an image the caller has already decoded.
    fn classify_image(&self, image: &DynamicImage) -> Result<Prediction, ClassifyError>;

    /// False when no model was loaded at startup.
    fn is_available(&self) -> bool;
}

struct ClassifierMetrics {
    duration: Histogram<f64>,
    classifications: Counter<u64>,
    failures: Counter<u64>,
}

impl ClassifierMetrics {
    fn new(meter_name: &'static str) -> Self {
        let meter = global::meter(meter_name);
        let latency_buckets = [
            0.001, 0.002, 0.005, 0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0,
        ];

        Self {
            duration: meter
                .f64_histogram("classification_duration_seconds")
                .with_description("Time to classify one upload (normalize + infer + map)")
                .with_unit("s")
                .with_boundaries(latency_buckets.to_vec())
                .build(),
            classifications: meter
                .u64_counter("classifications_total")
                .with_description("Total uploads classified")
                .build(),
            failures: meter
                .u64_counter("classification_failures_total")
                .with_description("Total uploads that could not be classified")
                .build(),
        }
    }
}

/// Normalizer, backend and label mapping behind one call.
///
/// Built once at startup and shared read-only; the backend sits behind a
/// mutex because sessions need exclusive access while running.
pub struct Classifier<B: InferenceBackend> {
    backend: Option<Mutex<B>>,
    normalizer: Normalizer,
    metrics: ClassifierMetrics,
}

impl<B: InferenceBackend> Classifier<B> {
    pub fn new(backend: Option<B>, normalizer: Normalizer) -> Self {
        Self {
            backend: backend.map(Mutex::new),
            normalizer,
            metrics: ClassifierMetrics::new("inference"),
        }
    }

    /// Load the model named by `config`.
    ///
    /// A model that fails to load leaves the classifier unavailable instead
    /// of failing: every later `classify` call reports
    /// [`ClassifyError::ModelUnavailable`].
    pub fn load(config: &InferenceConfig) -> Self {
        let backend = match B::load_model(&config.model_path, &config.backend_options()) {
            Ok(backend) => {
                tracing::info!(model_path = %config.model_path, "Model loaded successfully");
                Some(backend)
            }
            Err(e) => {
                tracing::error!(
                    model_path = %config.model_path,
                    error = %e,
                    "Failed to load model; inference requests will be rejected"
                );
                None
            }
        };

        Self::new(backend, Normalizer::new(config.input_size))
    }

    /// Run a blank image of the configured shape through the model.
    ///
    /// Fails when the model does not accept that shape or does not return one
    /// score per label, i.e. when configuration and model disagree. Does
    /// nothing when no model is loaded.
    pub fn verify(&self) -> Result<(), ClassifyError> {
        if self.backend.is_none() {
            return Ok(());
        }

        let probe = NormalizedImage::zeros(self.normalizer.input_size());
        let scores = self.run_backend(&probe)?;
        if scores.len() != NUM_CLASSES {
            return Err(ClassifyError::OutputShape {
                expected: NUM_CLASSES,
                actual: scores.len(),
            });
        }

        tracing::info!(
            input_shape = ?probe.shape(),
            "Model accepts configured input shape"
        );
        Ok(())
    }

    pub fn input_size(&self) -> u32 {
        self.normalizer.input_size()
    }

    /// Classify an already normalized image.
    pub fn classify_normalized(&self, image: &NormalizedImage) -> Result<Prediction, ClassifyError> {
        let scores = self.run_backend(image)?;
        map_scores(&scores)
    }

    fn run_backend(&self, image: &NormalizedImage) -> Result<Vec<f32>, ClassifyError> {
        let backend = self
            .backend
            .as_ref()
            .ok_or(ClassifyError::ModelUnavailable)?;

        let _infer_span = tracing::info_span!("model_inference").entered();
        let mut backend = backend
            .lock()
            .map_err(|_| ClassifyError::Inference(anyhow::anyhow!("backend lock poisoned")))?;

        backend
            .infer(image.tensor())
            .map_err(ClassifyError::Inference)
    }

    /// Normalize, infer and map, with metrics and a log line per outcome.
    ///
    /// Input problems are reported before availability so a bad request
    /// is a client error whether or not a model is loaded.
    fn observe(
        &self,
        normalize: impl FnOnce() -> Result<NormalizedImage, PreprocessError>,
    ) -> Result<Prediction, ClassifyError> {
        let start = Instant::now();

        let result = normalize()
            .map_err(ClassifyError::from)
            .and_then(|normalized| self.classify_normalized(&normalized));

        self.record(start, &result);

        match &result {
            Ok(prediction) => tracing::debug!(
                predicted_stage = %prediction.predicted_stage,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Upload classified"
            ),
            Err(e) => tracing::warn!(error = %e, "Classification failed"),
        }

        result
    }

    fn record(&self, start: Instant, result: &Result<Prediction, ClassifyError>) {
        match result {
            Ok(prediction) => {
                self.metrics
                    .duration
                    .record(start.elapsed().as_secs_f64(), &[]);
                self.metrics.classifications.add(
                    1,
                    &[KeyValue::new(
                        "predicted_stage",
                        prediction.predicted_stage.as_str(),
                    )],
                );
            }
            Err(e) => {
                let kind = if e.is_client_error() {
                    "invalid_input"
                } else {
                    "server"
                };
                self.metrics.failures.add(1, &[KeyValue::new("kind", kind)]);
            }
        }
    }
}

impl<B: InferenceBackend> ImageClassifier for Classifier<B> {
    fn classify(&self, image: &[u8]) -> Result<Prediction, ClassifyError> {
        let _span = tracing::info_span!("classify", upload_bytes = image.len()).entered();
        self.observe(|| self.normalizer.preprocess(image))
    }

    fn classify_image(&self, image: &DynamicImage) -> Result<Prediction, ClassifyError> {
        let _span = tracing::info_span!(
            "classify",
            width = image.width(),
            height = image.height()
        )
        .entered();
        self.observe(|| self.normalizer.normalize_image(image))
    }

    fn is_available(&self) -> bool {
        self.backend.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendOptions;
    use crate::labels::Stage;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use ndarray::Array4;
    use std::io::Cursor;

    /// Returns the same scores for every input and remembers the input shape.
    struct FixedBackend {
        scores: Vec<f32>,
        seen_shapes: std::sync::Arc<Mutex<Vec<Vec<usize>>>>,
    }

    impl FixedBackend {
        fn new(scores: Vec<f32>) -> Self {
            Self {
                scores,
                seen_shapes: Default::default(),
            }
        }
    }

    impl InferenceBackend for FixedBackend {
        fn load_model(path: &str, _options: &BackendOptions) -> anyhow::Result<Self> {
            anyhow::bail!("no model at {}", path)
        }

        fn infer(&mut self, input: &Array4<f32>) -> anyhow::Result<Vec<f32>> {
            self.seen_shapes.lock().unwrap().push(input.shape().to_vec());
            Ok(self.scores.clone())
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([90, 90, 90]));
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn classify_runs_full_pipeline() {
        let backend = FixedBackend::new(vec![0.1, 0.2, 0.3, 0.4]);
        let shapes = backend.seen_shapes.clone();
        let classifier = Classifier::new(Some(backend), Normalizer::default());

        let prediction = classifier.classify(&png(300, 200)).unwrap();

        assert_eq!(prediction.predicted_stage, Stage::VeryMildDementia);
        assert_eq!(prediction.confidence_scores.values(), &[0.1, 0.2, 0.3, 0.4]);
        assert_eq!(shapes.lock().unwrap().as_slice(), &[vec![1, 128, 128, 1]]);
    }

    #[test]
    fn decoded_image_takes_the_same_path() {
        let backend = FixedBackend::new(vec![0.4, 0.3, 0.2, 0.1]);
        let shapes = backend.seen_shapes.clone();
        let classifier = Classifier::new(Some(backend), Normalizer::new(32));

        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(50, 40, Rgb([9, 9, 9])));
        let prediction = classifier.classify_image(&image).unwrap();

        assert_eq!(prediction.predicted_stage, Stage::MildDementia);
        assert_eq!(shapes.lock().unwrap().as_slice(), &[vec![1, 32, 32, 1]]);
    }

    #[test]
    fn load_failure_degrades_to_unavailable() {
        let classifier = Classifier::<FixedBackend>::load(&InferenceConfig::test_default());

        assert!(!classifier.is_available());
        let err = classifier.classify(&png(10, 10)).unwrap_err();
        assert!(matches!(err, ClassifyError::ModelUnavailable));
        assert!(classifier.verify().is_ok(), "nothing to verify without a model");
    }

    #[test]
    fn bad_input_is_reported_before_missing_model() {
        let classifier = Classifier::<FixedBackend>::new(None, Normalizer::default());
        let err = classifier.classify(b"garbage").unwrap_err();
        assert!(err.is_client_error(), "got {err:?}");
    }

    #[test]
    fn verify_rejects_models_with_wrong_output_size() {
        let classifier = Classifier::new(
            Some(FixedBackend::new(vec![0.5, 0.5, 0.0])),
            Normalizer::default(),
        );
        let err = classifier.verify().unwrap_err();
        assert!(matches!(
            err,
            ClassifyError::OutputShape {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn verify_probes_with_configured_shape() {
        let backend = FixedBackend::new(vec![0.25; 4]);
        let shapes = backend.seen_shapes.clone();
        let classifier = Classifier::new(Some(backend), Normalizer::new(64));

        classifier.verify().unwrap();
        assert_eq!(classifier.input_size(), 64);
        assert_eq!(shapes.lock().unwrap().as_slice(), &[vec![1, 64, 64, 1]]);
    }
}
