//! # Feature Packer
//!
//! Third stage: flattens the frame/band matrix into the exact fixed-length
//! vector the classifier's statically-shaped input tensor requires.
//!
//! Long clips are truncated to the leading `MODEL_INPUT_SIZE` values and
//! short clips are right-padded with zeros. Both are lossy approximations
//! the model was trained with; the truncate-from-the-front / pad-at-the-end
//! ordering must not change or predictions silently lose meaning.

use crate::pipeline::contract::MODEL_INPUT_SIZE;
use crate::pipeline::framer::FrameBandMatrix;

/// Flatten and size a frame/band matrix to exactly `MODEL_INPUT_SIZE` values.
///
/// Deterministic and infallible; an empty matrix packs to all zeros.
pub fn pack(matrix: &FrameBandMatrix) -> Vec<f32> {
    let mut flat: Vec<f32> = matrix.iter().flatten().copied().collect();

    match flat.len().cmp(&MODEL_INPUT_SIZE) {
        std::cmp::Ordering::Greater => flat.truncate(MODEL_INPUT_SIZE),
        std::cmp::Ordering::Less => flat.resize(MODEL_INPUT_SIZE, 0.0),
        std::cmp::Ordering::Equal => {}
    }

    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::contract::MEL_BANDS;

    #[test]
    fn test_empty_matrix_packs_to_zeros() {
        let packed = pack(&vec![]);
        assert_eq!(packed.len(), MODEL_INPUT_SIZE);
        assert!(packed.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_short_input_is_right_padded() {
        // 4 frames x 128 bands = 512 values, half the target
        let matrix: FrameBandMatrix = (0..4).map(|f| vec![(f + 1) as f32; MEL_BANDS]).collect();
        let packed = pack(&matrix);

        assert_eq!(packed.len(), MODEL_INPUT_SIZE);
        assert_eq!(packed[0], 1.0);
        assert_eq!(packed[511], 4.0);
        assert!(packed[512..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_long_input_keeps_leading_values() {
        // 10 frames x 128 bands = 1280 values, longer than the target
        let matrix: FrameBandMatrix = (0..10).map(|f| vec![f as f32; MEL_BANDS]).collect();
        let packed = pack(&matrix);

        assert_eq!(packed.len(), MODEL_INPUT_SIZE);
        // First 8 full frames survive (8 * 128 = 1024); frame 8 and 9 are dropped
        assert_eq!(packed[0], 0.0);
        assert_eq!(packed[MODEL_INPUT_SIZE - 1], 7.0);
    }

    #[test]
    fn test_exact_input_passes_through() {
        let matrix: FrameBandMatrix = (0..8).map(|f| vec![f as f32 * 0.5; MEL_BANDS]).collect();
        let flat: Vec<f32> = matrix.iter().flatten().copied().collect();
        assert_eq!(flat.len(), MODEL_INPUT_SIZE);
        assert_eq!(pack(&matrix), flat);
    }
}
