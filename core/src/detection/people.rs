use serde::{Deserialize, Serialize};

use crate::math::peaks::separated_peaks;
use crate::prelude::{CoreError, CoreResult, Frame, FrameConfig, FrameProcessor};
use crate::processing::range::RangeProcessor;
use crate::sensor_interface::PeopleCountReport;
use crate::telemetry::log::LogManager;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeopleCountConfig {
    /// Moving-energy level a range peak must reach.
    pub threshold: f32,
    /// Peaks closer than this are one person.
    pub min_separation_m: f32,
    /// Weight of the newest frame in the smoothed profile.
    pub smoothing: f32,
    pub detect_near_m: f32,
    pub detect_far_m: f32,
}

impl Default for PeopleCountConfig {
    fn default() -> Self {
        Self {
            threshold: 0.002,
            min_separation_m: 0.4,
            smoothing: 0.5,
            detect_near_m: 0.2,
            detect_far_m: 5.0,
        }
    }
}

impl PeopleCountConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.smoothing > 0.0 && self.smoothing <= 1.0) {
            return Err(CoreError::InvalidConfig(format!(
                "smoothing must lie in (0, 1], got {}",
                self.smoothing
            )));
        }
        if self.min_separation_m < 0.0 {
            return Err(CoreError::InvalidConfig(
                "min_separation_m must not be negative".into(),
            ));
        }
        if self.detect_near_m < 0.0 || self.detect_far_m <= self.detect_near_m {
            return Err(CoreError::InvalidConfig(
                "count window must satisfy 0 <= near < far".into(),
            ));
        }
        Ok(())
    }
}

/// Counts resolvable moving reflectors along range.
pub struct PeopleCountDetector {
    config: PeopleCountConfig,
    range: RangeProcessor,
    window: (usize, usize),
    min_separation_bins: usize,
    profile: Option<Vec<f32>>,
    logger: LogManager,
}

impl PeopleCountDetector {
    pub fn new(frame: &FrameConfig, config: &PeopleCountConfig) -> CoreResult<Self> {
        frame.validate()?;
        config.validate()?;
        let bin_m = frame.range_bin_m();
        let start = (config.detect_near_m / bin_m) as usize;
        let end = ((config.detect_far_m / bin_m).ceil() as usize).min(frame.num_samples);
        if start + 3 > end {
            return Err(CoreError::InvalidConfig(format!(
                "count window {}..{} m holds too few range bins",
                config.detect_near_m, config.detect_far_m
            )));
        }
        let min_separation_bins = ((config.min_separation_m / bin_m).ceil() as usize).max(1);

        Ok(Self {
            config: config.clone(),
            range: RangeProcessor::new(frame.num_chirps, frame.num_samples),
            window: (start, end),
            min_separation_bins,
            profile: None,
            logger: LogManager::new("people"),
        })
    }

    pub fn min_separation_bins(&self) -> usize {
        self.min_separation_bins
    }

    /// Range bins of the people found in the smoothed profile.
    pub fn locate(&mut self, frame: &Frame) -> CoreResult<Vec<usize>> {
        let spectrum = self.range.transform(frame.primary()?)?;
        let current = RangeProcessor::moving_profile(&spectrum);

        let alpha = self.config.smoothing;
        let profile = self.profile.get_or_insert_with(|| current.clone());
        for (smoothed, &value) in profile.iter_mut().zip(&current) {
            *smoothed = *smoothed * (1.0 - alpha) + value * alpha;
        }

        let (start, end) = self.window;
        Ok(separated_peaks(
            &profile[start..end],
            self.config.threshold,
            self.min_separation_bins,
        )
        .into_iter()
        .map(|bin| bin + start)
        .collect())
    }
}

impl FrameProcessor for PeopleCountDetector {
    type Output = PeopleCountReport;

    fn name(&self) -> &'static str {
        "people"
    }

    fn process(&mut self, frame: &Frame) -> CoreResult<PeopleCountReport> {
        let people = self.locate(frame)?;
        self.logger.detail(&format!(
            "frame {} people at bins {:?}",
            frame.index(),
            people
        ));
        Ok(PeopleCountReport {
            frame_index: frame.index(),
            count: people.len(),
        })
    }

    fn reset(&mut self) {
        self.profile = None;
    }
}
