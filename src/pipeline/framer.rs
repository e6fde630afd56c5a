//! # Framer
//!
//! Second stage of the pipeline: slices a waveform into fixed, overlapping
//! analysis windows and reduces each one to 128 mel band energies.
//!
//! ## Algorithm:
//! - Slide a [`contract::FRAME_SIZE`] window with [`contract::HOP_SIZE`]
//!   stride (50% overlap)
//! - Per complete window: Hann window → FFT → power spectrum → triangular
//!   mel filterbank (HTK mel scale, 0 Hz..Nyquist)
//! - Windows running past the end of the waveform are dropped; the tail is
//!   never zero-padded
//!
//! Deterministic with no failure modes: a zero-length waveform yields an
//! empty matrix, which the packer turns into an all-zero feature vector.

use crate::pipeline::contract::{FRAME_SIZE, HOP_SIZE, MEL_BANDS, SAMPLE_RATE};
use crate::pipeline::decoder::Waveform;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Number of non-redundant FFT bins for a real input of `FRAME_SIZE` samples.
const SPECTRUM_BINS: usize = FRAME_SIZE / 2 + 1;

/// One row per analysis frame, `MEL_BANDS` energies per row.
pub type FrameBandMatrix = Vec<Vec<f32>>;

/// Mel band extractor with a precomputed FFT plan, window, and filterbank.
///
/// Construct once and reuse; all state is immutable after `new()`.
pub struct Framer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    /// Dense filterbank, `MEL_BANDS` rows of `SPECTRUM_BINS` weights.
    filterbank: Vec<f32>,
}

impl Framer {
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FRAME_SIZE);

        // Hann window
        let window: Vec<f32> = (0..FRAME_SIZE)
            .map(|i| {
                let x = i as f32 / (FRAME_SIZE - 1) as f32;
                0.5 - 0.5 * (2.0 * std::f32::consts::PI * x).cos()
            })
            .collect();

        Self {
            fft,
            window,
            filterbank: build_mel_filterbank(),
        }
    }

    /// Extract the frame/band matrix for a waveform.
    ///
    /// ## Invariants:
    /// - Every row has exactly `MEL_BANDS` elements
    /// - Row count is the number of complete windows:
    ///   `(len - FRAME_SIZE) / HOP_SIZE + 1` when `len >= FRAME_SIZE`, else 0
    pub fn frames(&self, waveform: &Waveform) -> FrameBandMatrix {
        let samples = &waveform.samples;
        let mut matrix = FrameBandMatrix::new();

        let mut spectrum = vec![Complex::new(0.0f32, 0.0); FRAME_SIZE];
        let mut power = vec![0.0f32; SPECTRUM_BINS];

        let mut start = 0;
        while start + FRAME_SIZE <= samples.len() {
            for (i, (s, w)) in samples[start..start + FRAME_SIZE]
                .iter()
                .zip(&self.window)
                .enumerate()
            {
                spectrum[i] = Complex::new(s * w, 0.0);
            }
            self.fft.process(&mut spectrum);

            for (p, c) in power.iter_mut().zip(&spectrum[..SPECTRUM_BINS]) {
                *p = c.norm_sqr() / FRAME_SIZE as f32;
            }

            let row: Vec<f32> = (0..MEL_BANDS)
                .map(|band| {
                    let weights = &self.filterbank[band * SPECTRUM_BINS..(band + 1) * SPECTRUM_BINS];
                    weights.iter().zip(&power).map(|(w, p)| w * p).sum()
                })
                .collect();

            matrix.push(row);
            start += HOP_SIZE;
        }

        matrix
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0f32.powf(mel / 2595.0) - 1.0)
}

/// Build `MEL_BANDS` triangular filters over the power spectrum bins,
/// evenly spaced on the mel scale from 0 Hz to Nyquist.
fn build_mel_filterbank() -> Vec<f32> {
    let nyquist = SAMPLE_RATE as f32 / 2.0;
    let mel_max = hz_to_mel(nyquist);

    // MEL_BANDS + 2 edge points, expressed as fractional bin positions.
    let points: Vec<f32> = (0..MEL_BANDS + 2)
        .map(|i| {
            let mel = mel_max * i as f32 / (MEL_BANDS + 1) as f32;
            mel_to_hz(mel) * FRAME_SIZE as f32 / SAMPLE_RATE as f32
        })
        .collect();

    let mut filterbank = vec![0.0f32; MEL_BANDS * SPECTRUM_BINS];
    for band in 0..MEL_BANDS {
        let (left, center, right) = (points[band], points[band + 1], points[band + 2]);
        for bin in 0..SPECTRUM_BINS {
            let k = bin as f32;
            let weight = if k <= left || k >= right {
                0.0
            } else if k <= center {
                (k - left) / (center - left).max(f32::EPSILON)
            } else {
                (right - k) / (right - center).max(f32::EPSILON)
            };
            filterbank[band * SPECTRUM_BINS + bin] = weight;
        }
    }
    filterbank
}
