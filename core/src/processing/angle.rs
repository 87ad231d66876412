use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::prelude::{CoreError, CoreResult};
use crate::processing::beamform::{BeamConfig, BeamCube};
use crate::sensor_interface::AngleReport;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AngleConfig {
    pub num_segments: usize,
    /// Fraction of the full field of view trimmed from each edge before segmenting.
    pub margin_ratio: f32,
    pub history_len: usize,
}

impl Default for AngleConfig {
    fn default() -> Self {
        Self {
            num_segments: 8,
            margin_ratio: 0.13,
            history_len: 5,
        }
    }
}

impl AngleConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if self.num_segments == 0 || self.history_len == 0 {
            return Err(CoreError::InvalidConfig(
                "num_segments and history_len must be positive".into(),
            ));
        }
        if !(0.0..0.5).contains(&self.margin_ratio) {
            return Err(CoreError::InvalidConfig(format!(
                "margin_ratio must lie in [0, 0.5), got {}",
                self.margin_ratio
            )));
        }
        Ok(())
    }
}

/// Doppler-collapsed energy of a beam cube, indexed (range bin, beam).
#[derive(Debug, Clone)]
pub struct RangeBeamEnergy {
    data: Array2<f32>,
}

impl RangeBeamEnergy {
    /// Root-sum-of-squares over Doppler bins, normalised by the square root of the beam count.
    pub fn from_cube(cube: &BeamCube) -> Self {
        let (ranges, _, beams) = cube.dim();
        let norm = (beams.max(1) as f32).sqrt();
        let cells = cube.data();
        let data = Array2::from_shape_fn((ranges, beams), |(range, beam)| {
            let power: f32 = cells
                .slice(s![range, .., beam])
                .iter()
                .map(|c| c.norm_sqr())
                .sum();
            power.sqrt() / norm
        });
        Self { data }
    }

    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    /// (range bin, beam) of the strongest cell. Equal maxima resolve to the
    /// lowest beam, then the lowest range bin.
    pub fn peak(&self) -> Option<(usize, usize)> {
        let (ranges, beams) = self.data.dim();
        let mut best: Option<(usize, usize, f32)> = None;
        for beam in 0..beams {
            for range in 0..ranges {
                let value = self.data[[range, beam]];
                match best {
                    Some((_, _, top)) if value <= top || value.is_nan() => {}
                    _ => best = Some((range, beam, value)),
                }
            }
        }
        best.map(|(range, beam, _)| (range, beam))
    }
}

/// Equal-width segments over the field of view minus an edge margin.
#[derive(Debug, Clone)]
pub struct SegmentQuantizer {
    edges: Vec<f32>,
}

impl SegmentQuantizer {
    pub fn new(max_angle_deg: f32, num_segments: usize, margin_ratio: f32) -> Self {
        let margin = margin_ratio * 2.0 * max_angle_deg;
        let low = -max_angle_deg + margin;
        let high = max_angle_deg - margin;
        let step = (high - low) / num_segments as f32;
        let edges = (0..=num_segments)
            .map(|edge| low + step * edge as f32)
            .collect();
        Self { edges }
    }

    pub fn num_segments(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn edges(&self) -> &[f32] {
        &self.edges
    }

    /// Segment containing `angle_deg` (left edge inclusive). Angles inside the
    /// margins fall into the outermost segments.
    pub fn segment_of(&self, angle_deg: f32) -> usize {
        let above = self.edges.iter().filter(|&&edge| edge <= angle_deg).count();
        above.saturating_sub(1).min(self.num_segments() - 1)
    }

    pub fn centre_deg(&self, segment: usize) -> f32 {
        let segment = segment.min(self.num_segments() - 1);
        0.5 * (self.edges[segment] + self.edges[segment + 1])
    }
}

/// Fixed-capacity FIFO of segment indices.
#[derive(Debug, Clone)]
pub struct SegmentHistory {
    capacity: usize,
    entries: VecDeque<usize>,
}

impl SegmentHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, segment: usize) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(segment);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() == self.capacity
    }

    /// Mean of the held segments, rounded half to even.
    pub fn rounded_mean(&self) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        let sum: usize = self.entries.iter().sum();
        let mean = sum as f64 / self.entries.len() as f64;
        Some(mean.round_ties_even() as usize)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Reduces beam cubes to a temporally smoothed angle segment.
pub struct AngleEstimator {
    beam_angles: Vec<f32>,
    quantizer: SegmentQuantizer,
    history: SegmentHistory,
}

impl AngleEstimator {
    pub fn new(beam: &BeamConfig, config: &AngleConfig) -> CoreResult<Self> {
        beam.validate()?;
        config.validate()?;
        Ok(Self {
            beam_angles: beam.angles_deg(),
            quantizer: SegmentQuantizer::new(
                beam.max_angle_deg,
                config.num_segments,
                config.margin_ratio,
            ),
            history: SegmentHistory::new(config.history_len),
        })
    }

    pub fn quantizer(&self) -> &SegmentQuantizer {
        &self.quantizer
    }

    pub fn estimate(&mut self, frame_index: u64, cube: &BeamCube) -> CoreResult<AngleReport> {
        let (ranges, dopplers, beams) = cube.dim();
        if beams != self.beam_angles.len() || ranges == 0 || dopplers == 0 {
            return Err(CoreError::ShapeMismatch {
                context: "beam cube",
                expected: vec![ranges.max(1), dopplers.max(1), self.beam_angles.len()],
                actual: vec![ranges, dopplers, beams],
            });
        }

        let energy = RangeBeamEnergy::from_cube(cube);
        let (_, beam) = energy
            .peak()
            .ok_or_else(|| CoreError::Internal("beam cube has no cells".into()))?;
        Ok(self.update(frame_index, self.beam_angles[beam]))
    }

    /// Pushes one raw angle through quantisation and smoothing.
    pub fn update(&mut self, frame_index: u64, angle_deg: f32) -> AngleReport {
        let segment = self.quantizer.segment_of(angle_deg);
        self.history.push(segment);
        let active_segment = self.history.rounded_mean().unwrap_or(segment);
        AngleReport {
            frame_index,
            raw_angle_deg: angle_deg,
            segment,
            active_segment,
            smoothed_angle_deg: self.quantizer.centre_deg(active_segment),
            settled: self.history.is_full(),
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use num_complex::Complex32;

    fn cube_with_beams(beams: usize, hot: &[(usize, f32)]) -> BeamCube {
        let mut data = Array3::<Complex32>::zeros((4, 6, beams));
        for &(beam, amplitude) in hot {
            data[[2, 3, beam]] = Complex32::new(amplitude, 0.0);
        }
        BeamCube::new(data)
    }

    fn estimator() -> AngleEstimator {
        AngleEstimator::new(&BeamConfig::default(), &AngleConfig::default()).unwrap()
    }

    #[test]
    fn energy_is_normalised_doppler_norm() {
        let mut data = Array3::<Complex32>::zeros((1, 2, 4));
        data[[0, 0, 1]] = Complex32::new(3.0, 0.0);
        data[[0, 1, 1]] = Complex32::new(0.0, 4.0);
        let energy = RangeBeamEnergy::from_cube(&BeamCube::new(data));
        assert!((energy.data()[[0, 1]] - 2.5).abs() < 1e-6);
        assert_eq!(energy.peak(), Some((0, 1)));
    }

    #[test]
    fn equal_beams_resolve_to_lower_index() {
        let energy = RangeBeamEnergy::from_cube(&cube_with_beams(80, &[(55, 1.0), (12, 1.0)]));
        assert_eq!(energy.peak(), Some((2, 12)));
    }

    #[test]
    fn lower_beam_wins_even_at_a_farther_range() {
        let mut data = Array3::<Complex32>::zeros((4, 2, 8));
        data[[0, 0, 6]] = Complex32::new(1.0, 0.0);
        data[[3, 0, 2]] = Complex32::new(1.0, 0.0);
        let energy = RangeBeamEnergy::from_cube(&BeamCube::new(data));
        assert_eq!(energy.peak(), Some((3, 2)));
    }

    #[test]
    fn segments_trim_the_margins() {
        let quantizer = SegmentQuantizer::new(60.0, 8, 0.13);
        assert!((quantizer.edges()[0] + 44.4).abs() < 1e-3);
        assert!((quantizer.edges()[8] - 44.4).abs() < 1e-3);
        assert_eq!(quantizer.segment_of(-59.0), 0);
        assert_eq!(quantizer.segment_of(0.5), 4);
        assert_eq!(quantizer.segment_of(-0.5), 3);
        assert_eq!(quantizer.segment_of(59.0), 7);
    }

    #[test]
    fn constant_input_is_idempotent() {
        let mut estimator = estimator();
        let beam = 70;
        let expected = estimator
            .quantizer()
            .segment_of(BeamConfig::default().beam_angle_deg(beam));
        let cube = cube_with_beams(80, &[(beam, 2.0)]);
        let mut last = None;
        for index in 0..7 {
            last = Some(estimator.estimate(index, &cube).unwrap());
        }
        let report = last.unwrap();
        assert_eq!(report.segment, expected);
        assert_eq!(report.active_segment, expected);
        assert!(report.settled);
    }

    #[test]
    fn history_never_exceeds_capacity_and_evicts_oldest() {
        let mut history = SegmentHistory::new(3);
        for segment in [7, 7, 7, 1, 1, 1] {
            history.push(segment);
            assert!(history.len() <= 3);
        }
        assert_eq!(history.rounded_mean(), Some(1));
    }

    #[test]
    fn partial_history_averages_what_is_present() {
        let mut estimator = estimator();
        let first = estimator.update(0, -40.0);
        assert_eq!(first.active_segment, 0);
        assert!(!first.settled);
        let second = estimator.update(1, 40.0);
        // mean of 0 and 7 is 3.5, rounded half to even
        assert_eq!(second.active_segment, 4);
        let centre = estimator.quantizer().centre_deg(4);
        assert_eq!(second.smoothed_angle_deg, centre);
    }

    #[test]
    fn cube_with_wrong_beam_count_is_rejected() {
        let mut estimator = estimator();
        let cube = cube_with_beams(40, &[(3, 1.0)]);
        assert!(matches!(
            estimator.estimate(0, &cube),
            Err(CoreError::ShapeMismatch { .. })
        ));
    }
}
