use crate::config::GatewayConfig;
use crate::templates::Templates;
use crate::uploads::UploadStore;
use axum::body::Bytes;
use image::DynamicImage;
use inference::{ClassifyError, ImageClassifier, Prediction};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<dyn ImageClassifier>,
    pub config: Arc<GatewayConfig>,
    pub uploads: Arc<UploadStore>,
    pub templates: Arc<Templates>,
}

impl AppState {
    pub fn new(
        classifier: Arc<dyn ImageClassifier>,
        config: GatewayConfig,
    ) -> anyhow::Result<Self> {
        let uploads = UploadStore::open(&config.upload_dir)?;

        Ok(Self {
            classifier,
            config: Arc::new(config),
            uploads: Arc::new(uploads),
            templates: Arc::new(Templates::new()?),
        })
    }

    /// Classify on the blocking pool; decoding and inference are CPU bound.
    pub async fn classify(&self, image: Bytes) -> Result<Prediction, ClassifyError> {
        let classifier = self.classifier.clone();

        tokio::task::spawn_blocking(move || classifier.classify(&image))
            .await
            .map_err(|e| ClassifyError::Inference(anyhow::anyhow!("classification task failed: {e}")))?
    }

    /// As [`AppState::classify`], for an upload that is already decoded.
    pub async fn classify_image(&self, image: DynamicImage) -> Result<Prediction, ClassifyError> {
        let classifier = self.classifier.clone();

        tokio::task::spawn_blocking(move || classifier.classify_image(&image))
            .await
            .map_err(|e| ClassifyError::Inference(anyhow::anyhow!("classification task failed: {e}")))?
    }
}
