//! # Prediction Endpoint
//!
//! `POST /api/v1/predict` — multipart form with one `audio` field holding the
//! clip to classify. Validates the upload the same way the demo UI expects
//! (file present, named, allow-listed extension) and runs it through the
//! analysis pipeline.

use crate::error::AppError;
use crate::state::AppState;
use actix_multipart::form::{bytes::Bytes as UploadBytes, MultipartForm};
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Audio containers the decoder is built with.
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["wav", "mp3", "flac", "ogg"];

#[derive(MultipartForm)]
pub struct PredictForm {
    /// The uploaded clip, held in memory for the duration of one analysis.
    pub audio: UploadBytes,
}

pub async fn predict(
    state: web::Data<AppState>,
    MultipartForm(form): MultipartForm<PredictForm>,
) -> Result<HttpResponse, AppError> {
    let filename = form.audio.file_name.clone().unwrap_or_default();
    if filename.is_empty() {
        return Err(AppError::BadRequest("No file selected".to_string()));
    }

    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::BadRequest(format!(
            "Invalid file type '{}'. Allowed: {}",
            filename,
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }

    if form.audio.data.is_empty() {
        return Err(AppError::BadRequest("Audio file is empty".to_string()));
    }

    tracing::info!("analyzing upload '{}' ({} bytes)", filename, form.audio.data.len());

    // The guard settles the in-flight counter even if this future is dropped
    // by a client disconnect before analyze() completes.
    let guard = state.begin_analysis();
    let outcome = state.analyzer.analyze(&form.audio.data, Some(&filename)).await;
    guard.finish(outcome.is_ok());

    let result = outcome?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "filename": filename,
        "result": result
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_allow_list() {
        assert!(ALLOWED_EXTENSIONS.contains(&"wav"));
        assert!(ALLOWED_EXTENSIONS.contains(&"ogg"));
        assert!(!ALLOWED_EXTENSIONS.contains(&"pdf"));
    }
}
