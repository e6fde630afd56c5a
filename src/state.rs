//! # Application State Management
//!
//! Shared state every HTTP handler can reach: the runtime configuration, the
//! request metrics, the analyzer (framer + inference engine), and the sample
//! library. Mutable pieces sit behind `Arc<RwLock<_>>`; the analyzer and
//! sample library manage their own interior locking.

use crate::config::AppConfig;
use crate::pipeline::Analyzer;
use crate::samples::SampleLibrary;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    /// Runtime configuration, updatable through `PUT /config`.
    pub config: Arc<RwLock<AppConfig>>,

    /// Request/analysis counters, updated by middleware and handlers.
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// The analysis pipeline (mel extractor + lazily-loaded classifier).
    pub analyzer: Arc<Analyzer>,

    /// Prefetched demo sample clips.
    pub samples: Arc<SampleLibrary>,

    pub start_time: Instant,
}

/// Counters collected across all HTTP requests.
#[derive(Debug, Default)]
pub struct AppMetrics {
    /// Total HTTP requests since startup
    pub request_count: u64,

    /// Total failed requests since startup
    pub error_count: u64,

    /// Analyses currently running (the UI allows one per user action, but
    /// nothing stops independent clients from overlapping)
    pub analyses_in_flight: u32,

    /// Completed analyses since startup
    pub analyses_completed: u64,

    /// Analyses that ended in a pipeline error
    pub analyses_failed: u64,

    /// Per-endpoint statistics keyed by "METHOD /path"
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    pub fn new(config: AppConfig, analyzer: Arc<Analyzer>, samples: Arc<SampleLibrary>) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            analyzer,
            samples,
            start_time: Instant::now(),
        }
    }

    /// Copy of the current configuration; cloning keeps lock hold times short.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        match new_config.validate() {
            Ok(_) => {
                *self.config.write().unwrap() = new_config;
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.request_count += 1;
    }

    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.error_count += 1;
    }

    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();

        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();
        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    pub fn analysis_started(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.analyses_in_flight += 1;
    }

    /// Start tracking one analysis and return a guard that settles the
    /// counters exactly once.
    ///
    /// Handler futures are dropped mid-await when the client disconnects; if
    /// the guard goes down with the future, its `Drop` records the analysis
    /// as failed so `analyses_in_flight` cannot leak.
    pub fn begin_analysis(&self) -> AnalysisGuard {
        self.analysis_started();
        AnalysisGuard {
            state: self.clone(),
            finished: false,
        }
    }

    pub fn analysis_finished(&self, success: bool) {
        let mut metrics = self.metrics.write().unwrap();
        if metrics.analyses_in_flight > 0 {
            metrics.analyses_in_flight -= 1;
        }
        if success {
            metrics.analyses_completed += 1;
        } else {
            metrics.analyses_failed += 1;
        }
    }

    /// Consistent copy of the metrics for serialization; avoids holding the
    /// lock while the response is built.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        let metrics = self.metrics.read().unwrap();
        AppMetrics {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            analyses_in_flight: metrics.analyses_in_flight,
            analyses_completed: metrics.analyses_completed,
            analyses_failed: metrics.analyses_failed,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// In-flight analysis marker handed out by [`AppState::begin_analysis`].
pub struct AnalysisGuard {
    state: AppState,
    finished: bool,
}

impl AnalysisGuard {
    /// Settle the analysis with its real outcome, consuming the guard.
    pub fn finish(mut self, success: bool) {
        self.finished = true;
        self.state.analysis_finished(success);
    }
}

impl Drop for AnalysisGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.state.analysis_finished(false);
        }
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::engine::InferenceEngine;
    use std::time::Duration;

    fn test_state() -> AppState {
        let analyzer = Arc::new(Analyzer::new(InferenceEngine::new(
            "unused.safetensors".into(),
            Duration::from_secs(5),
        )));
        let samples = Arc::new(SampleLibrary::new("unused", &[], Duration::from_secs(5)));
        AppState::new(AppConfig::default(), analyzer, samples)
    }

    #[test]
    fn test_analysis_counters() {
        let state = test_state();

        state.analysis_started();
        assert_eq!(state.get_metrics_snapshot().analyses_in_flight, 1);

        state.analysis_finished(true);
        state.analysis_started();
        state.analysis_finished(false);

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.analyses_in_flight, 0);
        assert_eq!(snapshot.analyses_completed, 1);
        assert_eq!(snapshot.analyses_failed, 1);
    }

    #[test]
    fn test_analysis_guard_settles_once_on_finish() {
        let state = test_state();

        let guard = state.begin_analysis();
        assert_eq!(state.get_metrics_snapshot().analyses_in_flight, 1);

        guard.finish(true);
        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.analyses_in_flight, 0);
        assert_eq!(snapshot.analyses_completed, 1);
        assert_eq!(snapshot.analyses_failed, 0);
    }

    #[tokio::test]
    async fn test_aborted_analysis_returns_in_flight_to_zero() {
        let state = test_state();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();

        // Simulates a client disconnect: the task holding the guard is
        // dropped mid-await, never reaching finish().
        let task_state = state.clone();
        let task = tokio::spawn(async move {
            let _guard = task_state.begin_analysis();
            let _ = started_tx.send(());
            std::future::pending::<()>().await;
        });

        started_rx.await.unwrap();
        assert_eq!(state.get_metrics_snapshot().analyses_in_flight, 1);

        task.abort();
        let _ = task.await;

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.analyses_in_flight, 0);
        assert_eq!(snapshot.analyses_failed, 1);
        assert_eq!(snapshot.analyses_completed, 0);
    }

    #[test]
    fn test_in_flight_never_underflows() {
        let state = test_state();
        state.analysis_finished(true);
        assert_eq!(state.get_metrics_snapshot().analyses_in_flight, 0);
    }

    #[test]
    fn test_endpoint_metrics_accumulate() {
        let state = test_state();
        state.record_endpoint_request("POST /api/v1/predict", 120, false);
        state.record_endpoint_request("POST /api/v1/predict", 80, true);

        let snapshot = state.get_metrics_snapshot();
        let metric = &snapshot.endpoint_metrics["POST /api/v1/predict"];
        assert_eq!(metric.request_count, 2);
        assert_eq!(metric.average_duration_ms(), 100.0);
        assert_eq!(metric.error_rate(), 0.5);
    }

    #[test]
    fn test_update_config_validates() {
        let state = test_state();
        let mut bad = AppConfig::default();
        bad.server.port = 0;
        assert!(state.update_config(bad).is_err());
        assert_eq!(state.get_config().server.port, 8080);
    }
}
