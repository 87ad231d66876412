use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use crate::sensor_interface::{AcquisitionError, Frame, FrameSource};

pub const SPEED_OF_LIGHT_MPS: f32 = 299_792_458.0;

/// Acquisition parameters fixed by the device layer for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Bit mask of enabled receive antennas.
    pub rx_mask: u32,
    pub num_chirps: usize,
    pub num_samples: usize,
    pub frame_repetition_time_s: f32,
    pub chirp_repetition_time_s: f32,
    pub start_frequency_hz: f32,
    pub end_frequency_hz: f32,
    pub sample_rate_hz: f32,
    /// Overrides the range derived from the chirp sweep.
    pub max_range_m: Option<f32>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            rx_mask: 5,
            num_chirps: 64,
            num_samples: 128,
            frame_repetition_time_s: 0.5,
            chirp_repetition_time_s: 0.001,
            start_frequency_hz: 60.0e9,
            end_frequency_hz: 61.5e9,
            sample_rate_hz: 2.0e6,
            max_range_m: None,
        }
    }
}

impl FrameConfig {
    pub fn num_antennas(&self) -> usize {
        self.rx_mask.count_ones() as usize
    }

    /// (antennas, chirps, samples) every frame of the session must carry.
    pub fn frame_shape(&self) -> (usize, usize, usize) {
        (self.num_antennas(), self.num_chirps, self.num_samples)
    }

    pub fn bandwidth_hz(&self) -> f32 {
        (self.end_frequency_hz - self.start_frequency_hz).abs()
    }

    /// Maximum unambiguous range covered by the kept half of the range transform.
    pub fn max_range_m(&self) -> f32 {
        self.max_range_m.unwrap_or_else(|| {
            self.num_samples as f32 * SPEED_OF_LIGHT_MPS / (4.0 * self.bandwidth_hz())
        })
    }

    /// Physical width of one range bin.
    pub fn range_bin_m(&self) -> f32 {
        self.max_range_m() / self.num_samples as f32
    }

    pub fn wavelength_m(&self) -> f32 {
        let centre = 0.5 * (self.start_frequency_hz + self.end_frequency_hz);
        SPEED_OF_LIGHT_MPS / centre
    }

    /// Radial velocity covered by one column of the zero-padded Doppler map.
    pub fn velocity_bin_mps(&self) -> f32 {
        self.wavelength_m() / (2.0 * self.chirp_repetition_time_s * 2.0 * self.num_chirps as f32)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.num_antennas() == 0 {
            return Err(CoreError::InvalidConfig("rx_mask enables no antenna".into()));
        }
        if self.num_chirps == 0 || self.num_samples == 0 {
            return Err(CoreError::InvalidConfig(format!(
                "frame needs chirps and samples, got {}x{}",
                self.num_chirps, self.num_samples
            )));
        }
        let bandwidth = self.bandwidth_hz();
        if self.max_range_m.is_none() && !(bandwidth.is_finite() && bandwidth > 0.0) {
            return Err(CoreError::InvalidConfig("chirp sweep has zero bandwidth".into()));
        }
        if let Some(range) = self.max_range_m {
            if !(range.is_finite() && range > 0.0) {
                return Err(CoreError::InvalidConfig(format!(
                    "max_range_m must be positive, got {}",
                    range
                )));
            }
        }
        for time in [self.chirp_repetition_time_s, self.frame_repetition_time_s] {
            let positive = time > 0.0 && Duration::try_from_secs_f32(time).is_ok();
            if !positive {
                return Err(CoreError::InvalidConfig(format!(
                    "repetition times must be positive durations, got {}",
                    time
                )));
            }
        }
        Ok(())
    }
}

/// Common error type for the processing core.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("antenna mismatch: configured {configured}, got {actual}")]
    AntennaMismatch { configured: usize, actual: usize },
    #[error("insufficient antennas: need {required}, have {available}")]
    InsufficientAntennas { required: usize, available: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("device failure: {0}")]
    Device(String),
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// A stateful consumer of the frame stream.
///
/// Every detector and the angle pipeline implement this; the session runs
/// each one in its own loop. An error returned from `process` ends that loop.
pub trait FrameProcessor: Send {
    type Output: Clone + Send + Sync + 'static;

    fn name(&self) -> &'static str;
    fn process(&mut self, frame: &Frame) -> CoreResult<Self::Output>;

    /// Clears accumulated history.
    fn reset(&mut self) {}
}
