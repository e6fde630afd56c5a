//! # Audio Decoder
//!
//! First stage of the analysis pipeline: turns an opaque byte buffer (an
//! uploaded blob or a prefetched sample) into a mono 16 kHz waveform.
//!
//! ## Behavior:
//! - Probes the container with symphonia (wav, mp3, flac, ogg/vorbis)
//! - Keeps only the **first channel** of multi-channel sources
//! - Resamples to [`contract::SAMPLE_RATE`] when the source rate differs
//! - No side effects beyond the decoded buffer allocation

use crate::error::PipelineError;
use crate::pipeline::contract;
use dasp::{interpolate::linear::Linear, signal, Signal};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// A single-channel waveform at the contract sample rate.
///
/// Ephemeral: exists only for the duration of one feature extraction.
#[derive(Debug, Clone)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    /// Duration in seconds at the contract sample rate.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode an audio byte buffer into a mono waveform at 16 kHz.
///
/// ## Parameters:
/// - **bytes**: the complete audio resource
/// - **name_hint**: original file name, used only to hint the format probe
///
/// ## Errors:
/// `PipelineError::Decode` when the bytes cannot be parsed as audio. Packets
/// that fail to decode mid-stream are skipped with a warning, matching how
/// lenient decoders treat trailing garbage.
pub fn decode(bytes: &[u8], name_hint: Option<&str>) -> Result<Waveform, PipelineError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let mut hint = Hint::new();
    if let Some(name) = name_hint {
        if let Some(ext) = name.rsplit('.').next() {
            hint.with_extension(ext);
        }
    }

    let format_opts = FormatOptions::default();
    let metadata_opts = MetadataOptions::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &metadata_opts)
        .map_err(|e| PipelineError::Decode(format!("unrecognized audio format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| PipelineError::Decode("no audio track found".to_string()))?;

    let track_id = track.id;
    let source_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| PipelineError::Decode("no sample rate in audio track".to_string()))?;

    let dec_opts = DecoderOptions::default();
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &dec_opts)
        .map_err(|e| PipelineError::Decode(format!("failed to create decoder: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                tracing::warn!("error reading packet, stopping decode: {:?}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("error decoding packet, skipping: {:?}", e);
                continue;
            }
        };

        let spec = *decoded.spec();
        let duration = decoded.capacity() as u64;

        let mut sample_buf = SampleBuffer::<f32>::new(duration, spec);
        sample_buf.copy_interleaved_ref(decoded);

        // First channel only; the model was trained on mono and the original
        // extraction reads channel 0 rather than downmixing.
        let channels = spec.channels.count();
        if channels > 1 {
            samples.extend(sample_buf.samples().chunks_exact(channels).map(|c| c[0]));
        } else {
            samples.extend_from_slice(sample_buf.samples());
        }
    }

    let samples = resample(samples, source_rate);

    Ok(Waveform {
        samples,
        sample_rate: contract::SAMPLE_RATE,
    })
}

/// Linear-interpolation resample to the contract rate.
///
/// Returns the input untouched when the rates already match. Inputs shorter
/// than two samples cannot seed the interpolator and are passed through; at
/// that length the framer produces an empty matrix either way.
fn resample(samples: Vec<f32>, source_rate: u32) -> Vec<f32> {
    if source_rate == contract::SAMPLE_RATE || samples.len() < 2 {
        return samples;
    }

    let out_len =
        (samples.len() as u64 * contract::SAMPLE_RATE as u64 / source_rate as u64) as usize;

    let mut source = signal::from_iter(samples.into_iter());
    let first = source.next();
    let second = source.next();
    let interp = Linear::new(first, second);

    source
        .from_hz_to_hz(
            interp,
            source_rate as f64,
            contract::SAMPLE_RATE as f64,
        )
        .take(out_len)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal RIFF/WAVE container with 16-bit PCM samples.
    fn wav_bytes(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let byte_rate = sample_rate * channels as u32 * 2;
        let block_align = channels * 2;

        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&byte_rate.to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_decode_mono_16k_passthrough() {
        let pcm: Vec<i16> = (0..1600).map(|i| ((i % 64) * 256) as i16).collect();
        let bytes = wav_bytes(16_000, 1, &pcm);

        let waveform = decode(&bytes, Some("clip.wav")).unwrap();
        assert_eq!(waveform.sample_rate, 16_000);
        assert_eq!(waveform.samples.len(), 1600);
    }

    #[test]
    fn test_decode_takes_first_channel() {
        // Left channel silent, right channel loud. Interleaved L R L R ...
        let mut pcm = Vec::new();
        for _ in 0..800 {
            pcm.push(0i16);
            pcm.push(20_000i16);
        }
        let bytes = wav_bytes(16_000, 2, &pcm);

        let waveform = decode(&bytes, Some("stereo.wav")).unwrap();
        assert_eq!(waveform.samples.len(), 800);
        assert!(waveform.samples.iter().all(|s| s.abs() < 1e-4));
    }

    #[test]
    fn test_decode_resamples_to_contract_rate() {
        let pcm: Vec<i16> = vec![0; 800];
        let bytes = wav_bytes(8_000, 1, &pcm);

        let waveform = decode(&bytes, Some("low.wav")).unwrap();
        assert_eq!(waveform.sample_rate, 16_000);
        // 0.1s of audio should still be ~0.1s after resampling.
        let expected = 1600usize;
        assert!(
            waveform.samples.len().abs_diff(expected) <= 4,
            "got {} samples",
            waveform.samples.len()
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let bytes = vec![0xDEu8, 0xAD, 0xBE, 0xEF, 0x00, 0x11, 0x22, 0x33];
        let err = decode(&bytes, Some("junk.wav")).unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }

    #[test]
    fn test_resample_passthrough_when_rates_match() {
        let samples = vec![0.1f32, 0.2, 0.3];
        assert_eq!(resample(samples.clone(), 16_000), samples);
    }
}
