use ndarray::{Array2, Array3, ArrayView2, Axis};
use num_complex::Complex32;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

use crate::math::matrix::MatrixHelper;
use crate::prelude::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamConfig {
    pub num_beams: usize,
    /// Beams span `-max_angle_deg..=max_angle_deg`.
    pub max_angle_deg: f32,
    /// Antenna spacing in wavelengths.
    pub spacing_wavelengths: f32,
}

impl Default for BeamConfig {
    fn default() -> Self {
        Self {
            num_beams: 80,
            max_angle_deg: 60.0,
            spacing_wavelengths: 0.5,
        }
    }
}

impl BeamConfig {
    /// Steering angle of `beam`, uniformly spaced across the field of view.
    pub fn beam_angle_deg(&self, beam: usize) -> f32 {
        if self.num_beams < 2 {
            return -self.max_angle_deg;
        }
        let step = 2.0 * self.max_angle_deg / (self.num_beams - 1) as f32;
        -self.max_angle_deg + step * beam as f32
    }

    pub fn angles_deg(&self) -> Vec<f32> {
        (0..self.num_beams).map(|beam| self.beam_angle_deg(beam)).collect()
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.num_beams == 0 {
            return Err(CoreError::InvalidConfig("num_beams must be positive".into()));
        }
        if !(self.max_angle_deg > 0.0 && self.max_angle_deg <= 90.0) {
            return Err(CoreError::InvalidConfig(format!(
                "max_angle_deg must lie in (0, 90], got {}",
                self.max_angle_deg
            )));
        }
        if self.spacing_wavelengths <= 0.0 {
            return Err(CoreError::InvalidConfig(
                "spacing_wavelengths must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Beam-formed cube indexed (range bin, Doppler bin, beam).
#[derive(Debug, Clone)]
pub struct BeamCube {
    data: Array3<Complex32>,
}

impl BeamCube {
    pub fn new(data: Array3<Complex32>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &Array3<Complex32> {
        &self.data
    }

    /// (range bins, Doppler bins, beams)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn num_beams(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// Range-Doppler map of one beam.
    pub fn beam(&self, beam: usize) -> ArrayView2<'_, Complex32> {
        self.data.index_axis(Axis(2), beam)
    }
}

/// Delay-and-sum beamformer over a uniform linear array.
pub struct BeamFormer {
    config: BeamConfig,
    /// antennas x beams
    weights: Array2<Complex32>,
}

impl BeamFormer {
    pub fn new(num_antennas: usize, config: &BeamConfig) -> CoreResult<Self> {
        if num_antennas == 0 {
            return Err(CoreError::InsufficientAntennas {
                required: 1,
                available: 0,
            });
        }
        config.validate()?;

        let angles = config.angles_deg();
        let weights = Array2::from_shape_fn((num_antennas, config.num_beams), |(antenna, beam)| {
            let phase = 2.0
                * PI
                * config.spacing_wavelengths
                * antenna as f32
                * angles[beam].to_radians().sin();
            Complex32::from_polar(1.0, -phase)
        });

        Ok(Self {
            config: config.clone(),
            weights,
        })
    }

    pub fn config(&self) -> &BeamConfig {
        &self.config
    }

    pub fn num_antennas(&self) -> usize {
        self.weights.len_of(Axis(0))
    }

    pub fn num_beams(&self) -> usize {
        self.weights.len_of(Axis(1))
    }

    pub fn weights(&self) -> &Array2<Complex32> {
        &self.weights
    }

    /// Coherent weighted sum of the per-antenna maps for every beam.
    pub fn run(&self, maps: &[Array2<Complex32>]) -> CoreResult<BeamCube> {
        let antennas = self.num_antennas();
        if maps.len() < antennas {
            return Err(CoreError::InsufficientAntennas {
                required: antennas,
                available: maps.len(),
            });
        }
        if maps.len() > antennas {
            return Err(CoreError::AntennaMismatch {
                configured: antennas,
                actual: maps.len(),
            });
        }

        let (ranges, dopplers) = maps[0].dim();
        if let Some(bad) = maps.iter().find(|map| map.dim() != (ranges, dopplers)) {
            let (r, d) = bad.dim();
            return Err(CoreError::ShapeMismatch {
                context: "beamformer input",
                expected: vec![ranges, dopplers],
                actual: vec![r, d],
            });
        }

        let cells = ranges * dopplers;
        let mut stacked = Array2::<Complex32>::zeros((cells, antennas));
        for (antenna, map) in maps.iter().enumerate() {
            for (dst, src) in stacked.column_mut(antenna).iter_mut().zip(map.iter()) {
                *dst = *src;
            }
        }

        let beams = MatrixHelper::multiply(stacked.view(), self.weights.view());
        let data = beams
            .into_shape((ranges, dopplers, self.num_beams()))
            .map_err(|err| CoreError::Internal(format!("beam cube reshape: {}", err)))?;
        Ok(BeamCube::new(data))
    }
}
