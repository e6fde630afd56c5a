//! # Analysis Pipeline
//!
//! One pipeline, four stages, invoked once per request:
//!
//! Decoder → Framer → Feature Packer → Inference Engine → caller
//!
//! Control flow is strictly sequential with no retries; whichever stage fails
//! propagates its typed [`PipelineError`](crate::error::PipelineError) to the
//! caller. The only state surviving between invocations is the lazily-loaded
//! classifier inside the [`InferenceEngine`]. The analysis future is
//! cancel-safe: dropping it (e.g. on client disconnect) abandons the work at
//! the next await point.

pub mod contract;
pub mod decoder;
pub mod engine;
pub mod framer;
pub mod packer;

use crate::error::PipelineError;
use engine::{InferenceEngine, PredictionResult};
use framer::Framer;
use std::time::Instant;

/// Owns the reusable pieces of the pipeline: the precomputed mel extractor
/// and the lazily-loaded inference engine. Constructed once by the host
/// application and shared across requests.
pub struct Analyzer {
    framer: Framer,
    engine: InferenceEngine,
}

impl Analyzer {
    pub fn new(engine: InferenceEngine) -> Self {
        Self {
            framer: Framer::new(),
            engine,
        }
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    /// Run one audio resource through the full pipeline.
    ///
    /// ## Parameters:
    /// - **bytes**: the complete audio resource (upload or sample)
    /// - **name_hint**: original file name for the format probe
    pub async fn analyze(
        &self,
        bytes: &[u8],
        name_hint: Option<&str>,
    ) -> Result<PredictionResult, PipelineError> {
        let start = Instant::now();

        self.engine.ensure_loaded().await?;

        let waveform = decoder::decode(bytes, name_hint)?;
        tracing::debug!(
            "decoded {:.2}s of audio ({} samples)",
            waveform.duration_secs(),
            waveform.samples.len()
        );

        let matrix = self.framer.frames(&waveform);
        let features = packer::pack(&matrix);

        let result = self.engine.predict(&features).await?;

        tracing::info!(
            "analysis complete: {} frames -> {} (confidence {:.3}) in {}ms",
            matrix.len(),
            result.label,
            result.confidence,
            start.elapsed().as_millis()
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::{VarBuilder, VarMap};
    use engine::EagleClassifier;
    use std::time::Duration;

    fn analyzer_with_weights(dir: &std::path::Path) -> Analyzer {
        let path = dir.join("eagle.safetensors");
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let _ = EagleClassifier::new(vb).unwrap();
        varmap.save(&path).unwrap();

        Analyzer::new(InferenceEngine::new(path, Duration::from_secs(30)))
    }

    fn silent_wav_16k(num_samples: usize) -> Vec<u8> {
        let data_len = (num_samples * 2) as u32;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&16_000u32.to_le_bytes());
        out.extend_from_slice(&32_000u32.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out.extend(std::iter::repeat(0u8).take(num_samples * 2));
        out
    }

    #[tokio::test]
    async fn test_analyze_end_to_end_on_silence() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = analyzer_with_weights(dir.path());

        // Silent 2-second 16 kHz clip
        let result = analyzer
            .analyze(&silent_wav_16k(32_000), Some("silence.wav"))
            .await
            .unwrap();

        let sum = result.probabilities.non_eagle + result.probabilities.eagle;
        assert!((sum - 1.0).abs() < 1e-4);
        assert!(result.confidence >= 0.0 && result.confidence <= 1.0);
    }

    #[tokio::test]
    async fn test_analyze_accepts_clips_shorter_than_one_frame() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = analyzer_with_weights(dir.path());

        // 500 samples: the framer yields no rows, the packer zero-pads,
        // and inference still runs without a special-case failure.
        let result = analyzer
            .analyze(&silent_wav_16k(500), Some("short.wav"))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_analyze_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = analyzer_with_weights(dir.path());

        let bytes = silent_wav_16k(20_000);
        let a = analyzer.analyze(&bytes, Some("a.wav")).await.unwrap();
        let b = analyzer.analyze(&bytes, Some("a.wav")).await.unwrap();
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.is_eagle, b.is_eagle);
    }

    #[tokio::test]
    async fn test_analyze_propagates_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = analyzer_with_weights(dir.path());

        let err = analyzer
            .analyze(b"definitely not audio", Some("nope.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::PipelineError::Decode(_)));
    }
}
