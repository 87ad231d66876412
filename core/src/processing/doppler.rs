use ndarray::{Array2, ArrayView2, Axis};
use num_complex::Complex32;
use rustfft::num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::math::fft::{shifted_index, FftHelper};
use crate::math::window::blackman_harris;
use crate::prelude::{CoreError, CoreResult, FrameConfig};
use crate::processing::range::RangeProcessor;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DopplerConfig {
    /// Weight of the newest frame in the per-antenna moving-target history.
    /// `None` disables the history and keeps each frame independent.
    pub mti_alpha: Option<f32>,
}

impl DopplerConfig {
    pub fn validate(&self) -> CoreResult<()> {
        match self.mti_alpha {
            Some(alpha) if !(0.0..=1.0).contains(&alpha) => Err(CoreError::InvalidConfig(
                format!("mti_alpha must lie in [0, 1], got {}", alpha),
            )),
            _ => Ok(()),
        }
    }
}

/// Converts one antenna's chirp x sample matrix into a range-Doppler map.
///
/// The map has one row per range bin and `2 * chirps` Doppler columns with
/// zero velocity in column `chirps`.
pub struct DopplerProcessor {
    range: RangeProcessor,
    doppler_window: Vec<f32>,
    fft: FftHelper,
    mti_alpha: Option<f32>,
    mti_history: Vec<Array2<Complex32>>,
}

impl DopplerProcessor {
    pub fn new(
        num_chirps: usize,
        num_samples: usize,
        num_antennas: usize,
        config: &DopplerConfig,
    ) -> Self {
        Self {
            range: RangeProcessor::new(num_chirps, num_samples),
            doppler_window: blackman_harris(num_chirps),
            fft: FftHelper::new(2 * num_chirps),
            mti_alpha: config.mti_alpha,
            mti_history: vec![Array2::zeros((num_chirps, num_samples)); num_antennas],
        }
    }

    pub fn from_frame_config(frame: &FrameConfig, config: &DopplerConfig) -> Self {
        Self::new(
            frame.num_chirps,
            frame.num_samples,
            frame.num_antennas(),
            config,
        )
    }

    pub fn num_antennas(&self) -> usize {
        self.mti_history.len()
    }

    /// (range bins, Doppler bins) of every map this processor produces.
    pub fn map_shape(&self) -> (usize, usize) {
        let (chirps, samples) = self.range.shape();
        (samples, 2 * chirps)
    }

    pub fn compute_doppler_map(
        &mut self,
        chirps: ArrayView2<Complex32>,
        antenna: usize,
    ) -> CoreResult<Array2<Complex32>> {
        if antenna >= self.mti_history.len() {
            return Err(CoreError::AntennaMismatch {
                configured: self.mti_history.len(),
                actual: antenna + 1,
            });
        }

        let mut range_fft = self.range.transform(chirps)?;
        let (num_chirps, num_samples) = self.range.shape();

        let mean = range_fft
            .sum_axis(Axis(0))
            .mapv(|v| v / num_chirps as f32);
        range_fft -= &mean;

        if let Some(alpha) = self.mti_alpha {
            let history = &mut self.mti_history[antenna];
            let moving = &range_fft - &*history;
            history.zip_mut_with(&range_fft, |h, &current| {
                *h = current * alpha + *h * (1.0 - alpha)
            });
            range_fft = moving;
        }

        let doppler_bins = 2 * num_chirps;
        let scale = 1.0 / num_chirps as f32;
        let mut map = Array2::from_elem((num_samples, doppler_bins), Complex32::zero());
        for (bin, mut row) in map.outer_iter_mut().enumerate() {
            let column = range_fft.column(bin);
            let spectrum = self.fft.forward(
                column
                    .iter()
                    .zip(&self.doppler_window)
                    .map(|(&value, &weight)| value * weight),
            );
            for (k, value) in spectrum.iter().enumerate() {
                row[shifted_index(k, doppler_bins)] = *value * scale;
            }
        }
        Ok(map)
    }

    /// Forgets the moving-target history of every antenna.
    pub fn reset(&mut self) {
        for history in &mut self.mti_history {
            history.fill(Complex32::zero());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::range::tests::moving_tone;
    use ndarray::Array2;
    use std::f32::consts::PI;

    fn argmax(map: &Array2<Complex32>) -> (usize, usize) {
        let mut best = ((0, 0), f32::MIN);
        for ((r, d), value) in map.indexed_iter() {
            if value.norm() > best.1 {
                best = ((r, d), value.norm());
            }
        }
        best.0
    }

    #[test]
    fn map_shape_is_samples_by_twice_chirps() {
        let mut doppler = DopplerProcessor::new(8, 16, 1, &DopplerConfig::default());
        for fill in [0.0, 1.0, -3.5] {
            let input = Array2::from_elem((8, 16), Complex32::new(fill, fill));
            let map = doppler.compute_doppler_map(input.view(), 0).unwrap();
            assert_eq!(map.dim(), (16, 16));
        }
        assert_eq!(doppler.map_shape(), (16, 16));
    }

    #[test]
    fn moving_reflector_lands_on_range_and_velocity_bins() {
        let (chirps, samples) = (16, 32);
        let mut doppler = DopplerProcessor::new(chirps, samples, 1, &DopplerConfig::default());
        // four Doppler columns right of zero velocity
        let step = 2.0 * PI * 4.0 / (2.0 * chirps as f32);
        let input = moving_tone(chirps, samples, 12.0, step, 1.0);
        let map = doppler.compute_doppler_map(input.view(), 0).unwrap();
        assert_eq!(argmax(&map), (12, chirps + 4));
    }

    #[test]
    fn static_reflector_is_removed_as_clutter() {
        let mut doppler = DopplerProcessor::new(8, 32, 1, &DopplerConfig::default());
        let input = moving_tone(8, 32, 12.0, 0.0, 1.0);
        let map = doppler.compute_doppler_map(input.view(), 0).unwrap();
        assert!(map.iter().all(|c| c.norm() < 1e-4));
    }

    #[test]
    fn wrong_shape_is_a_shape_mismatch() {
        let mut doppler = DopplerProcessor::new(8, 16, 2, &DopplerConfig::default());
        let input = Array2::<Complex32>::zeros((8, 12));
        assert!(matches!(
            doppler.compute_doppler_map(input.view(), 1),
            Err(CoreError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn antenna_beyond_configuration_is_rejected() {
        let mut doppler = DopplerProcessor::new(8, 16, 2, &DopplerConfig::default());
        let input = Array2::<Complex32>::zeros((8, 16));
        assert_eq!(
            doppler.compute_doppler_map(input.view(), 2).unwrap_err(),
            CoreError::AntennaMismatch {
                configured: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn mti_history_attenuates_repeated_frames_per_antenna() {
        let config = DopplerConfig {
            mti_alpha: Some(0.8),
        };
        let mut doppler = DopplerProcessor::new(16, 32, 2, &config);
        let input = moving_tone(16, 32, 12.0, 2.0 * PI * 4.0 / 32.0, 1.0);
        let energy = |map: &Array2<Complex32>| map.iter().map(|c| c.norm_sqr()).sum::<f32>();

        let first = energy(&doppler.compute_doppler_map(input.view(), 0).unwrap());
        let second = energy(&doppler.compute_doppler_map(input.view(), 0).unwrap());
        let other_antenna = energy(&doppler.compute_doppler_map(input.view(), 1).unwrap());
        assert!(second < first * 0.1);
        assert!((other_antenna - first).abs() < first * 1e-3);

        doppler.reset();
        let after_reset = energy(&doppler.compute_doppler_map(input.view(), 0).unwrap());
        assert!((after_reset - first).abs() < first * 1e-3);
    }
}
