use crate::error::ApiError;
use crate::state::AppState;
use crate::uploads::{ImageField, read_image_field};
use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use inference::Prediction;
use serde::Serialize;

/// `POST /predict`: multipart `image` in, JSON prediction out.
pub async fn predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Prediction>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let ImageField::Present(image) = read_image_field(&mut multipart).await? else {
        return Err(ApiError::BadRequest("No image uploaded".to_string()));
    };

    let prediction = state.classify(image).await?;
    tracing::info!(
        predicted_stage = %prediction.predicted_stage,
        "Prediction served"
    );

    Ok(Json(prediction))
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub model_loaded: bool,
}

/// `GET /health`: the process is up; `model_loaded` says whether
/// predictions can succeed.
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        model_loaded: state.classifier.is_available(),
    })
}
