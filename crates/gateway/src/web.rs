use crate::error::ApiError;
use crate::state::AppState;
use crate::templates::ResultView;
use crate::uploads::{ImageField, StoredUpload, read_image_field};
use axum::Form;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::rejection::FormRejection;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use image::DynamicImage;
use inference::{ConfidenceScores, NUM_CLASSES, Stage};
use preprocess::PreprocessError;
use report::ReportRequest;
use std::collections::HashMap;
use thiserror::Error;

const REPORT_FILENAME: &str = "alzheimer_report.pdf";

/// `GET /`: the upload form.
pub async fn index(State(state): State<AppState>) -> Response {
    page(&state, StatusCode::OK, None, None)
}

/// `POST /upload`: store the image, classify it and render the result.
///
/// A classifier failure still renders a result, with the stage
/// "Model Error" and all scores zero.
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let field = match multipart {
        Ok(mut multipart) => read_image_field(&mut multipart).await,
        Err(e) => return page(&state, e.status(), None, Some(&e.body_text())),
    };
    let bytes = match field {
        Ok(ImageField::Present(bytes)) => bytes,
        Ok(ImageField::Empty) => return Redirect::to("/").into_response(),
        Ok(ImageField::Missing) => {
            return page(&state, StatusCode::BAD_REQUEST, None, Some("No image uploaded"));
        }
        Err(e) => {
            let message = format!("Could not read upload: {}", e.body_text());
            return page(&state, e.status(), None, Some(&message));
        }
    };

    let (image, stored) = match store_upload(&state, bytes).await {
        Ok(upload) => upload,
        Err(UploadError::Invalid(e)) => {
            let message = format!("Invalid image: {e}");
            return page(&state, StatusCode::BAD_REQUEST, None, Some(&message));
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to store upload");
            let message = "The upload could not be stored.";
            return page(&state, StatusCode::INTERNAL_SERVER_ERROR, None, Some(message));
        }
    };

    let view = match state.classify_image(image).await {
        Ok(prediction) => {
            tracing::info!(
                predicted_stage = %prediction.predicted_stage,
                upload = %stored.url,
                "Upload classified"
            );
            ResultView::new(
                prediction.predicted_stage.as_str(),
                &prediction.confidence_scores,
                Some(stored.url),
            )
        }
        Err(e) if e.is_client_error() => {
            let message = e.to_string();
            return page(&state, StatusCode::BAD_REQUEST, None, Some(&message));
        }
        Err(e) => {
            tracing::error!(error = %e, "Classification failed; showing model error");
            ResultView::model_error(Some(stored.url))
        }
    };

    page(&state, StatusCode::OK, Some(&view), None)
}

#[derive(Debug, Error)]
enum UploadError {
    #[error(transparent)]
    Invalid(#[from] PreprocessError),

    #[error("writing upload: {0}")]
    Write(#[from] image::ImageError),

    #[error("upload task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Decode the upload once and keep an RGB PNG copy for display and reports.
///
/// The decoded image is handed back for classification.
async fn store_upload(
    state: &AppState,
    bytes: Bytes,
) -> Result<(DynamicImage, StoredUpload), UploadError> {
    let uploads = state.uploads.clone();

    tokio::task::spawn_blocking(move || {
        let image = preprocess::decode(&bytes)?;
        let stored = uploads.save_png(&image.to_rgb8())?;
        Ok::<_, UploadError>((image, stored))
    })
    .await?
}

fn page(
    state: &AppState,
    status: StatusCode,
    result: Option<&ResultView>,
    error: Option<&str>,
) -> Response {
    match state.templates.index(result, error) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Template rendering failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Page rendering failed").into_response()
        }
    }
}

/// Fields posted by the result page's report form.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportForm {
    pub predicted_stage: String,
    pub confidence_scores: ConfidenceScores,
    pub image_path: Option<String>,
}

impl ReportForm {
    /// Missing labels count as zero; a label that is present must parse as a
    /// number.
    pub fn parse(fields: &HashMap<String, String>) -> Result<Self, ApiError> {
        let predicted_stage = fields
            .get("predicted_stage")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::BadRequest("Missing predicted_stage".to_string()))?
            .to_string();

        let mut scores = [0.0; NUM_CLASSES];
        for stage in Stage::ALL {
            if let Some(raw) = fields.get(stage.as_str()) {
                scores[stage.index()] = raw.trim().parse::<f64>().map_err(|_| {
                    ApiError::BadRequest(format!("Score for {stage} is not a number: {raw:?}"))
                })?;
            }
        }

        let image_path = fields
            .get("image_path")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            predicted_stage,
            confidence_scores: ConfidenceScores::new(scores),
            image_path,
        })
    }
}

/// `POST /download_pdf`: render the report for a submitted result.
///
/// `image_path` is only honoured when it names a file in the upload store.
pub async fn download_pdf(
    State(state): State<AppState>,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> Result<Response, ApiError> {
    let Form(fields) = form.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let form = ReportForm::parse(&fields)?;

    let image_path = form.image_path.as_deref().and_then(|reference| {
        let resolved = state.uploads.resolve(reference);
        if resolved.is_none() {
            tracing::warn!(reference, "Report image is not a stored upload; omitting it");
        }
        resolved
    });

    let request = ReportRequest {
        predicted_stage: form.predicted_stage,
        confidence_scores: form.confidence_scores,
        image_path,
        generated_at: chrono::Local::now().naive_local(),
    };

    let pdf = tokio::task::spawn_blocking(move || report::generate_report(&request))
        .await
        .map_err(|e| ApiError::Internal(format!("report task failed: {e}")))?
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    tracing::info!(bytes = pdf.len(), "Report generated");

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{REPORT_FILENAME}\""),
            ),
        ],
        pdf,
    )
        .into_response())
}
