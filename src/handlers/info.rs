//! # API Info Endpoint
//!
//! `GET /api/v1/info` — static description of the API plus the versioned
//! model contract, so a client can verify it talks to a compatible pipeline
//! before uploading anything.

use crate::handlers::predict::ALLOWED_EXTENSIONS;
use crate::pipeline::contract;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn api_info(state: web::Data<AppState>) -> HttpResponse {
    let config = state.get_config();

    HttpResponse::Ok().json(json!({
        "name": "AgilaGuard API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Audio classification API detecting Philippine eagle calls from mel spectrogram features",
        "endpoints": {
            "GET /api/v1/health": "Health check",
            "GET /api/v1/metrics": "Detailed request metrics",
            "GET /api/v1/info": "API information",
            "POST /api/v1/predict": "Upload an audio file for classification (multipart field 'audio')",
            "GET /api/v1/samples": "Prefetch status of the bundled sample clips",
            "GET /api/v1/samples/{name}": "Download a prefetched sample clip",
            "GET /api/v1/config": "Current configuration",
            "PUT /api/v1/config": "Partial configuration update"
        },
        "supported_formats": ALLOWED_EXTENSIONS,
        "max_upload_bytes": config.limits.max_upload_bytes,
        "model_contract": {
            "version": contract::CONTRACT_VERSION,
            "sample_rate": contract::SAMPLE_RATE,
            "frame_size": contract::FRAME_SIZE,
            "hop_size": contract::HOP_SIZE,
            "mel_bands": contract::MEL_BANDS,
            "input_size": contract::MODEL_INPUT_SIZE,
            "decision_threshold": contract::EAGLE_THRESHOLD
        }
    }))
}
