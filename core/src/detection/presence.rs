use ndarray::ArrayView2;
use num_complex::Complex32;
use serde::{Deserialize, Serialize};

use crate::math::peaks::local_maxima;
use crate::prelude::{CoreError, CoreResult, Frame, FrameConfig, FrameProcessor};
use crate::processing::range::RangeProcessor;
use crate::sensor_interface::{Posture, PostureReport};
use crate::telemetry::log::LogManager;

/// Upper distance bound of each posture band; each band includes its upper bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostureThresholds {
    pub standing_max_m: f32,
    pub sitting_max_m: f32,
    pub sleeping_max_m: f32,
}

impl Default for PostureThresholds {
    fn default() -> Self {
        Self {
            standing_max_m: 0.50,
            sitting_max_m: 0.70,
            sleeping_max_m: 0.90,
        }
    }
}

impl PostureThresholds {
    pub fn classify(&self, presence: bool, distance_m: Option<f32>) -> Posture {
        if !presence {
            return Posture::NoPresence;
        }
        match distance_m {
            Some(d) if d <= self.standing_max_m => Posture::Standing,
            Some(d) if d <= self.sitting_max_m => Posture::Sitting,
            Some(d) if d <= self.sleeping_max_m => Posture::Sleeping,
            _ => Posture::Unknown,
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.standing_max_m < self.sitting_max_m && self.sitting_max_m < self.sleeping_max_m {
            Ok(())
        } else {
            Err(CoreError::InvalidConfig(
                "posture bands must increase: standing < sitting < sleeping".into(),
            ))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Minimum rise of the fast over the slow range average that counts as presence.
    pub threshold: f32,
    /// Slow-average weight while nobody is present.
    pub alpha_med: f32,
    /// Slow-average weight while somebody is present.
    pub alpha_slow: f32,
    pub alpha_fast: f32,
    pub detect_near_m: f32,
    pub detect_far_m: f32,
    pub postures: PostureThresholds,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            threshold: 0.0007,
            alpha_med: 0.05,
            alpha_slow: 0.001,
            alpha_fast: 0.6,
            detect_near_m: 0.1,
            detect_far_m: 3.0,
            postures: PostureThresholds::default(),
        }
    }
}

impl PresenceConfig {
    pub fn validate(&self) -> CoreResult<()> {
        for (name, alpha) in [
            ("alpha_med", self.alpha_med),
            ("alpha_slow", self.alpha_slow),
            ("alpha_fast", self.alpha_fast),
        ] {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(CoreError::InvalidConfig(format!(
                    "{} must lie in [0, 1], got {}",
                    name, alpha
                )));
            }
        }
        if self.detect_near_m < 0.0 || self.detect_far_m <= self.detect_near_m {
            return Err(CoreError::InvalidConfig(
                "presence window must satisfy 0 <= near < far".into(),
            ));
        }
        self.postures.validate()
    }
}

/// Presence decision and candidate range peaks for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceState {
    pub presence: bool,
    /// Range bins of significant peaks, nearest first.
    pub peaks: Vec<usize>,
}

/// Tracks a fast and a slow average of the range profile; a person shows up
/// as the fast average rising above the slow one.
pub struct PresenceAndPostureDetector {
    config: PresenceConfig,
    num_samples: usize,
    max_range_m: f32,
    window: (usize, usize),
    range: RangeProcessor,
    averages: Option<(Vec<f32>, Vec<f32>)>,
    presence: bool,
    logger: LogManager,
}

impl PresenceAndPostureDetector {
    pub fn new(frame: &FrameConfig, config: &PresenceConfig) -> CoreResult<Self> {
        frame.validate()?;
        config.validate()?;
        let bin_m = frame.range_bin_m();
        let start = (config.detect_near_m / bin_m) as usize;
        let end = ((config.detect_far_m / bin_m).ceil() as usize).min(frame.num_samples);
        if start + 3 > end {
            return Err(CoreError::InvalidConfig(format!(
                "presence window {}..{} m holds too few range bins",
                config.detect_near_m, config.detect_far_m
            )));
        }
        Ok(Self {
            config: config.clone(),
            num_samples: frame.num_samples,
            max_range_m: frame.max_range_m(),
            window: (start, end),
            range: RangeProcessor::new(frame.num_chirps, frame.num_samples),
            averages: None,
            presence: false,
            logger: LogManager::new("posture"),
        })
    }

    /// Physical distance of a range bin.
    pub fn distance_m(&self, bin: usize) -> f32 {
        bin as f32 / self.num_samples as f32 * self.max_range_m
    }

    pub fn detect(&mut self, chirps: ArrayView2<Complex32>) -> CoreResult<PresenceState> {
        let spectrum = self.range.transform(chirps)?;
        let profile = RangeProcessor::magnitude_profile(&spectrum);

        let alpha_slow = if self.presence {
            self.config.alpha_slow
        } else {
            self.config.alpha_med
        };
        let alpha_fast = self.config.alpha_fast;
        let (slow, fast) = self
            .averages
            .get_or_insert_with(|| (profile.clone(), profile.clone()));
        for ((s, f), &p) in slow.iter_mut().zip(fast.iter_mut()).zip(&profile) {
            *s = *s * (1.0 - alpha_slow) + p * alpha_slow;
            *f = *f * (1.0 - alpha_fast) + p * alpha_fast;
        }

        let (start, end) = self.window;
        let rise: Vec<f32> = fast[start..end]
            .iter()
            .zip(&slow[start..end])
            .map(|(f, s)| f - s)
            .collect();
        let strongest = rise.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        self.presence = strongest > self.config.threshold;

        let peaks = if self.presence {
            local_maxima(&rise, self.config.threshold)
                .into_iter()
                .map(|bin| bin + start)
                .collect()
        } else {
            Vec::new()
        };
        Ok(PresenceState {
            presence: self.presence,
            peaks,
        })
    }
}

impl FrameProcessor for PresenceAndPostureDetector {
    type Output = PostureReport;

    fn name(&self) -> &'static str {
        "posture"
    }

    fn process(&mut self, frame: &Frame) -> CoreResult<PostureReport> {
        let state = self.detect(frame.primary()?)?;
        let distance_m = state.peaks.first().map(|&bin| self.distance_m(bin));
        let posture = self.config.postures.classify(state.presence, distance_m);
        self.logger.detail(&format!(
            "frame {} presence {} distance {:?} -> {}",
            frame.index(),
            state.presence,
            distance_m,
            posture
        ));
        Ok(PostureReport {
            frame_index: frame.index(),
            presence: state.presence,
            distance_m,
            posture,
        })
    }

    fn reset(&mut self) {
        self.averages = None;
        self.presence = false;
    }
}
