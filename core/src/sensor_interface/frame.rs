use ndarray::{Array3, ArrayView2, Axis};
use num_complex::Complex32;

use crate::prelude::{CoreError, CoreResult, FrameConfig};

/// One acquisition cycle of raw samples, indexed (antenna, chirp, sample).
///
/// Frames are immutable once built; the session shares them behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Frame {
    index: u64,
    data: Array3<Complex32>,
}

impl Frame {
    pub fn new(index: u64, data: Array3<Complex32>) -> Self {
        Self { index, data }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn data(&self) -> &Array3<Complex32> {
        &self.data
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn num_antennas(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// Chirp x sample matrix of one antenna, if the frame carries it.
    pub fn antenna(&self, antenna: usize) -> Option<ArrayView2<'_, Complex32>> {
        (antenna < self.num_antennas()).then(|| self.data.index_axis(Axis(0), antenna))
    }

    /// The first antenna, used by the single-channel detectors.
    pub fn primary(&self) -> CoreResult<ArrayView2<'_, Complex32>> {
        self.antenna(0).ok_or(CoreError::InsufficientAntennas {
            required: 1,
            available: 0,
        })
    }

    /// Checks the frame against the session configuration.
    pub fn validate(&self, config: &FrameConfig) -> CoreResult<()> {
        let (antennas, chirps, samples) = self.shape();
        if antennas != config.num_antennas() {
            return Err(CoreError::AntennaMismatch {
                configured: config.num_antennas(),
                actual: antennas,
            });
        }
        if (chirps, samples) != (config.num_chirps, config.num_samples) {
            return Err(CoreError::ShapeMismatch {
                context: "frame",
                expected: vec![config.num_chirps, config.num_samples],
                actual: vec![chirps, samples],
            });
        }
        Ok(())
    }
}

/// Failure reported by a frame source.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AcquisitionError {
    /// The frame was dropped; the next read may succeed.
    #[error("frame acquisition failed: {0}")]
    Transient(String),
    /// The device cannot deliver further frames.
    #[error("device error: {0}")]
    Fatal(String),
    /// A finite source (recording, scripted run) has delivered its last frame.
    #[error("frame source exhausted")]
    Exhausted,
}

/// Blocking producer of frames, implemented by the device layer.
pub trait FrameSource: Send {
    fn config(&self) -> &FrameConfig;
    fn get_next_frame(&mut self) -> Result<Frame, AcquisitionError>;
}
