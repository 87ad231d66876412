use ndarray::{Array2, ArrayView2, Axis};
use num_complex::Complex32;

use crate::math::fft::FftHelper;
use crate::math::window::blackman_harris;
use crate::prelude::{CoreError, CoreResult};

/// Range transform shared by the Doppler chain and the single-antenna detectors.
///
/// Each chirp has its DC removed, is Blackman-Harris windowed and zero-padded
/// to twice its length; only the positive half of the spectrum is kept.
pub struct RangeProcessor {
    num_chirps: usize,
    num_samples: usize,
    window: Vec<f32>,
    fft: FftHelper,
}

impl RangeProcessor {
    pub fn new(num_chirps: usize, num_samples: usize) -> Self {
        Self {
            num_chirps,
            num_samples,
            window: blackman_harris(num_samples),
            fft: FftHelper::new(2 * num_samples),
        }
    }

    /// (chirps, samples) the processor accepts.
    pub fn shape(&self) -> (usize, usize) {
        (self.num_chirps, self.num_samples)
    }

    /// Chirp x range-bin spectrum of one antenna.
    pub fn transform(&mut self, chirps: ArrayView2<Complex32>) -> CoreResult<Array2<Complex32>> {
        if chirps.dim() != self.shape() {
            let (rows, cols) = chirps.dim();
            return Err(CoreError::ShapeMismatch {
                context: "range transform",
                expected: vec![self.num_chirps, self.num_samples],
                actual: vec![rows, cols],
            });
        }

        let scale = 2.0 / self.num_samples as f32;
        let mut spectrum = Array2::zeros((self.num_chirps, self.num_samples));
        for (chirp, mut row) in chirps.outer_iter().zip(spectrum.outer_iter_mut()) {
            let dc = chirp.sum() / self.num_samples as f32;
            let bins = self.fft.forward(
                chirp
                    .iter()
                    .zip(&self.window)
                    .map(|(&sample, &weight)| (sample - dc) * weight),
            );
            for (dst, src) in row.iter_mut().zip(bins.iter()) {
                *dst = *src * scale;
            }
        }
        Ok(spectrum)
    }

    /// Mean magnitude per range bin across chirps.
    pub fn magnitude_profile(spectrum: &Array2<Complex32>) -> Vec<f32> {
        let chirps = spectrum.len_of(Axis(0)).max(1) as f32;
        spectrum
            .axis_iter(Axis(1))
            .map(|bin| bin.iter().map(|c| c.norm()).sum::<f32>() / chirps)
            .collect()
    }

    /// Mean magnitude per range bin after removing the per-bin mean across chirps,
    /// leaving only energy that changes from chirp to chirp.
    pub fn moving_profile(spectrum: &Array2<Complex32>) -> Vec<f32> {
        let chirps = spectrum.len_of(Axis(0)).max(1) as f32;
        spectrum
            .axis_iter(Axis(1))
            .map(|bin| {
                let mean = bin.sum() / chirps;
                bin.iter().map(|&c| (c - mean).norm()).sum::<f32>() / chirps
            })
            .collect()
    }
}
