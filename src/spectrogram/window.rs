use std::f32::consts::PI;

use crate::spectrogram::params::WindowKind;

/// Window coefficients of length `len`
///
/// Symmetric form (denominator `len - 1`). A single-sample window is 1.
pub fn coefficients(kind: WindowKind, len: usize) -> Vec<f32> {
    if len <= 1 {
        return vec![1.0; len];
    }

    let denom = (len - 1) as f32;
    (0..len)
        .map(|i| {
            let phase = 2.0 * PI * i as f32 / denom;
            match kind {
                WindowKind::Rectangular => 1.0,
                WindowKind::Hamming => 0.54 - 0.46 * phase.cos(),
                WindowKind::Hanning => 0.5 * (1.0 - phase.cos()),
                WindowKind::Blackman => 0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos(),
            }
        })
        .collect()
}
