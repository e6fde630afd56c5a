//! # Model Contract
//!
//! Every numeric hyperparameter of the analysis pipeline lives here, next to
//! the contract version string. These values are fixed at training time: the
//! framer, packer, and classifier must stay in lockstep with the deployed
//! weights, and nothing validates the pairing at runtime. Swapping the model
//! artifact therefore requires bumping this module, not scattering new
//! literals through the code.

/// Contract revision bundled with the model artifact. Reported by `/api/v1/info`.
pub const CONTRACT_VERSION: &str = "agila-eagle-v1";

/// Sample rate the model was trained on. The decoder resamples everything to this.
pub const SAMPLE_RATE: u32 = 16_000;

/// Analysis window length in samples.
pub const FRAME_SIZE: usize = 1024;

/// Stride between consecutive windows (50% overlap).
pub const HOP_SIZE: usize = 512;

/// Mel band energies extracted per frame.
pub const MEL_BANDS: usize = 128;

/// Flattened feature vector length the classifier expects.
pub const MODEL_INPUT_SIZE: usize = 1024;

/// Fixed decision threshold on the eagle-class probability.
pub const EAGLE_THRESHOLD: f32 = 0.5;
