//! # Sample Endpoints
//!
//! `GET /api/v1/samples` — per-item prefetch status of the bundled demo
//! clips. `GET /api/v1/samples/{name}` — the bytes of a ready sample, served
//! from memory for playback in the UI.

use crate::error::{AppError, PipelineError};
use crate::samples::SampleStatus;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

#[derive(serde::Serialize)]
struct SampleView {
    name: String,
    #[serde(flatten)]
    status: SampleStatus,
}

pub async fn list_samples(state: web::Data<AppState>) -> HttpResponse {
    let samples: Vec<SampleView> = state
        .samples
        .statuses()
        .into_iter()
        .map(|(name, status)| SampleView { name, status })
        .collect();

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "samples": samples
    }))
}

pub async fn get_sample(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let name = path.into_inner();

    match state.samples.status_of(&name) {
        None => Err(AppError::NotFound(format!("unknown sample '{}'", name))),
        Some(SampleStatus::Pending) => Err(AppError::ServiceUnavailable(format!(
            "sample '{}' is still being fetched",
            name
        ))),
        Some(SampleStatus::Failed(reason)) => {
            Err(AppError::Pipeline(PipelineError::Fetch(reason)))
        }
        Some(SampleStatus::Ready) => {
            let bytes = state.samples.get(&name).ok_or_else(|| {
                AppError::Internal(format!("sample '{}' marked ready without data", name))
            })?;
            Ok(HttpResponse::Ok()
                .content_type(content_type_for(&name))
                .body(bytes))
        }
    }
}

fn content_type_for(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext) {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("ogg") => "audio/ogg",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("call.wav"), "audio/wav");
        assert_eq!(content_type_for("call.mp3"), "audio/mpeg");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }
}
