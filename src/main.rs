//! # AgilaGuard Backend - Main Application Entry Point
//!
//! HTTP service that classifies audio clips for Philippine eagle calls. Sets
//! up an Actix-web server around a fixed analysis pipeline: decode to 16 kHz
//! mono, extract mel band energies per window, pack a fixed-size feature
//! vector, and score it with a lazily-loaded classifier.
//!
//! ## Application Architecture:
//! - **config**: Application configuration (TOML file + environment variables)
//! - **state**: Shared application state and metrics
//! - **pipeline**: Decoder, framer, feature packer, and inference engine
//! - **samples**: Prefetched demo clips served for in-browser playback
//! - **health**: Health and metrics endpoints
//! - **middleware**: Request telemetry (logging + per-endpoint metrics)
//! - **handlers**: HTTP request handlers for the API endpoints
//! - **error**: Error taxonomy and HTTP error responses

mod config;
mod error;
mod handlers;
mod health;
mod middleware;
mod pipeline;
mod samples;
mod state;

use actix_cors::Cors;
use actix_multipart::form::MultipartFormConfig;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Result;
use config::AppConfig;
use pipeline::engine::InferenceEngine;
use pipeline::Analyzer;
use samples::SampleLibrary;
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Global shutdown flag flipped by the signal handler task.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting agilaguard-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    // The engine defers the actual weights load to the first request.
    let engine = InferenceEngine::new(
        config.model.weights_path.clone().into(),
        Duration::from_secs(config.model.load_timeout_secs),
    );
    let analyzer = Arc::new(Analyzer::new(engine));

    let sample_library = Arc::new(SampleLibrary::new(
        config.samples.dir.clone(),
        &config.samples.files,
        Duration::from_secs(config.samples.fetch_timeout_secs),
    ));
    sample_library.start_prefetch();

    let app_state = AppState::new(config.clone(), analyzer, sample_library.clone());
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let max_upload_bytes = config.limits.max_upload_bytes;

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Uploads are held in memory, so both multipart limits track the
        // configured cap.
        let multipart_config = MultipartFormConfig::default()
            .total_limit(max_upload_bytes)
            .memory_limit(max_upload_bytes);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(multipart_config)
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(middleware::Telemetry)
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics))
                    .route("/info", web::get().to(handlers::api_info))
                    .route("/predict", web::post().to(handlers::predict))
                    .route("/samples", web::get().to(handlers::list_samples))
                    .route("/samples/{name}", web::get().to(handlers::get_sample))
                    .route("/config", web::get().to(handlers::get_config))
                    .route("/config", web::put().to(handlers::update_config)),
            )
            // Health check at root level for load balancers
            .route("/health", web::get().to(health::health_check))
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    sample_library.abort_all();

    info!("Server stopped gracefully");
    Ok(())
}

/// Console logging, filterable through `RUST_LOG`.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agilaguard_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Flip the shutdown flag on SIGTERM or SIGINT so in-flight requests can
/// finish before the server stops.
fn setup_signal_handlers() {
    tokio::spawn(async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
