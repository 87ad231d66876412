use ndarray::{Array2, Axis};
use num_complex::Complex32;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::math::stats::StatsHelper;
use crate::prelude::{CoreError, CoreResult, Frame, FrameConfig, FrameProcessor};
use crate::processing::doppler::{DopplerConfig, DopplerProcessor};
use crate::sensor_interface::FallReport;
use crate::telemetry::log::LogManager;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallConfig {
    /// Doppler columns slower than this carry no fall energy.
    pub min_velocity_mps: f32,
    /// Recent frames averaged into the motion baseline.
    pub baseline_frames: usize,
    /// Score a frame needs to count as sudden.
    pub trigger_ratio: f32,
    /// Energy floor below which no frame counts as sudden; also regularises the score.
    pub min_motion_energy: f32,
    /// Consecutive sudden frames needed to latch.
    pub confirm_frames: usize,
    /// Frames the latch is held before it may release.
    pub hold_frames: usize,
    /// Score under which a held latch releases.
    pub release_ratio: f32,
}

impl Default for FallConfig {
    fn default() -> Self {
        Self {
            min_velocity_mps: 0.3,
            baseline_frames: 10,
            trigger_ratio: 4.0,
            min_motion_energy: 1e-4,
            confirm_frames: 2,
            hold_frames: 10,
            release_ratio: 1.5,
        }
    }
}

impl FallConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if self.baseline_frames == 0 || self.confirm_frames == 0 {
            return Err(CoreError::InvalidConfig(
                "baseline_frames and confirm_frames must be positive".into(),
            ));
        }
        if self.min_motion_energy <= 0.0 {
            return Err(CoreError::InvalidConfig(
                "min_motion_energy must be positive".into(),
            ));
        }
        if self.release_ratio > self.trigger_ratio {
            return Err(CoreError::InvalidConfig(format!(
                "release_ratio {} exceeds trigger_ratio {}",
                self.release_ratio, self.trigger_ratio
            )));
        }
        Ok(())
    }
}

/// Requests a latch reset from outside the loop that owns the detector.
#[derive(Debug, Clone, Default)]
pub struct FallResetHandle {
    requested: Arc<AtomicBool>,
}

impl FallResetHandle {
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    fn take(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }
}

/// Flags a sudden burst of fast radial motion against the recent baseline,
/// with confirm/hold/release hysteresis so the flag does not flicker.
pub struct FallDetector {
    config: FallConfig,
    doppler: DopplerProcessor,
    /// |velocity| per Doppler column, zero for columns under the minimum.
    column_speeds: Vec<f32>,
    baseline: VecDeque<f32>,
    streak: usize,
    hold_remaining: usize,
    latched: bool,
    reset: FallResetHandle,
    logger: LogManager,
}

impl FallDetector {
    pub fn new(frame: &FrameConfig, config: &FallConfig) -> CoreResult<Self> {
        frame.validate()?;
        config.validate()?;
        let doppler = DopplerProcessor::new(
            frame.num_chirps,
            frame.num_samples,
            1,
            &DopplerConfig::default(),
        );
        let (_, columns) = doppler.map_shape();
        let velocity_bin = frame.velocity_bin_mps();
        let column_speeds = (0..columns)
            .map(|column| {
                let speed = (column as f32 - (columns / 2) as f32).abs() * velocity_bin;
                if speed >= config.min_velocity_mps {
                    speed
                } else {
                    0.0
                }
            })
            .collect();

        Ok(Self {
            config: config.clone(),
            doppler,
            column_speeds,
            baseline: VecDeque::with_capacity(config.baseline_frames),
            streak: 0,
            hold_remaining: 0,
            latched: false,
            reset: FallResetHandle::default(),
            logger: LogManager::new("fall"),
        })
    }

    pub fn reset_handle(&self) -> FallResetHandle {
        self.reset.clone()
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }

    /// Power-weighted speed of everything moving faster than the minimum.
    pub fn motion_energy(&self, map: &Array2<Complex32>) -> f32 {
        map.axis_iter(Axis(1))
            .zip(&self.column_speeds)
            .filter(|(_, speed)| **speed > 0.0)
            .map(|(column, &speed)| column.iter().map(|c| c.norm_sqr()).sum::<f32>() * speed)
            .sum()
    }

    /// Feeds one primary-antenna frame, returning (fall flag, suddenness score).
    pub fn detect(&mut self, frame: &Frame) -> CoreResult<(bool, f32)> {
        if self.reset.take() {
            self.clear();
            self.logger.record("latch reset on request");
        }

        let map = self.doppler.compute_doppler_map(frame.primary()?, 0)?;
        let energy = self.motion_energy(&map);
        let baseline = StatsHelper::mean(self.baseline.make_contiguous());
        let score = energy / (baseline + self.config.min_motion_energy);

        if self.baseline.len() == self.config.baseline_frames {
            self.baseline.pop_front();
        }
        self.baseline.push_back(energy);

        let sudden = energy >= self.config.min_motion_energy && score >= self.config.trigger_ratio;
        self.streak = if sudden { self.streak + 1 } else { 0 };

        if !self.latched {
            if self.streak >= self.config.confirm_frames {
                self.latched = true;
                self.hold_remaining = self.config.hold_frames;
                self.logger.record(&format!(
                    "fall detected at frame {} (score {:.2})",
                    frame.index(),
                    score
                ));
            }
        } else if self.hold_remaining > 0 {
            self.hold_remaining -= 1;
        } else if score < self.config.release_ratio {
            self.latched = false;
            self.logger
                .record(&format!("fall cleared at frame {}", frame.index()));
        }

        Ok((self.latched, score))
    }

    fn clear(&mut self) {
        self.baseline.clear();
        self.streak = 0;
        self.hold_remaining = 0;
        self.latched = false;
    }
}

impl FrameProcessor for FallDetector {
    type Output = FallReport;

    fn name(&self) -> &'static str {
        "fall"
    }

    fn process(&mut self, frame: &Frame) -> CoreResult<FallReport> {
        let (fall_detected, score) = self.detect(frame)?;
        Ok(FallReport {
            frame_index: frame.index(),
            fall_detected,
            score,
        })
    }

    fn reset(&mut self) {
        self.clear();
        self.doppler.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::range::tests::moving_tone;
    use ndarray::{Array3, Axis};
    use std::f32::consts::PI;

    const CHIRPS: usize = 16;
    const SAMPLES: usize = 32;

    fn frame_config() -> FrameConfig {
        FrameConfig {
            rx_mask: 1,
            num_chirps: CHIRPS,
            num_samples: SAMPLES,
            ..Default::default()
        }
    }

    fn fall_config() -> FallConfig {
        FallConfig {
            min_velocity_mps: 3.0 * frame_config().velocity_bin_mps(),
            confirm_frames: 2,
            hold_frames: 3,
            ..Default::default()
        }
    }

    fn quiet(index: u64) -> Frame {
        Frame::new(index, Array3::zeros((1, CHIRPS, SAMPLES)))
    }

    /// Reflector moving eight Doppler columns away from zero velocity.
    fn falling(index: u64, amplitude: f32) -> Frame {
        let step = 2.0 * PI * 8.0 / (2.0 * CHIRPS as f32);
        let chirps = moving_tone(CHIRPS, SAMPLES, 10.0, step, amplitude);
        Frame::new(index, chirps.insert_axis(Axis(0)))
    }

    fn run(detector: &mut FallDetector, frames: &[Frame]) -> Vec<bool> {
        frames
            .iter()
            .map(|frame| detector.process(frame).unwrap().fall_detected)
            .collect()
    }

    #[test]
    fn steady_quiet_room_never_falls() {
        let mut detector = FallDetector::new(&frame_config(), &fall_config()).unwrap();
        let frames: Vec<_> = (0..20).map(quiet).collect();
        assert!(run(&mut detector, &frames).iter().all(|&fall| !fall));
    }

    #[test]
    fn sudden_motion_latches_then_holds_then_releases() {
        let mut detector = FallDetector::new(&frame_config(), &fall_config()).unwrap();
        let mut frames: Vec<_> = (0..5).map(quiet).collect();
        frames.push(falling(5, 1.0));
        frames.push(falling(6, 1.0));
        frames.extend((7..12).map(quiet));

        let flags = run(&mut detector, &frames);
        // confirm needs two sudden frames
        assert_eq!(&flags[..7], &[false, false, false, false, false, false, true]);
        // held for three quiet frames, released on the fourth
        assert_eq!(&flags[7..], &[true, true, true, false, false]);
    }

    #[test]
    fn single_spike_does_not_flicker_the_flag() {
        let mut detector = FallDetector::new(&frame_config(), &fall_config()).unwrap();
        let mut frames: Vec<_> = (0..5).map(quiet).collect();
        frames.push(falling(5, 1.0));
        frames.extend((6..10).map(quiet));
        assert!(run(&mut detector, &frames).iter().all(|&fall| !fall));
    }

    #[test]
    fn score_grows_with_motion_energy() {
        let mut weak = FallDetector::new(&frame_config(), &fall_config()).unwrap();
        let mut strong = FallDetector::new(&frame_config(), &fall_config()).unwrap();
        run(&mut weak, &[quiet(0)]);
        run(&mut strong, &[quiet(0)]);
        let (_, weak_score) = weak.detect(&falling(1, 0.5)).unwrap();
        let (_, strong_score) = strong.detect(&falling(1, 1.0)).unwrap();
        assert!(strong_score > weak_score);
    }

    #[test]
    fn reset_handle_clears_the_latch() {
        let mut detector = FallDetector::new(&frame_config(), &fall_config()).unwrap();
        let mut frames: Vec<_> = (0..5).map(quiet).collect();
        frames.push(falling(5, 1.0));
        frames.push(falling(6, 1.0));
        run(&mut detector, &frames);
        assert!(detector.is_latched());

        detector.reset_handle().request();
        let report = detector.process(&quiet(7)).unwrap();
        assert!(!report.fall_detected);
        assert!(!detector.is_latched());
    }

    #[test]
    fn slow_motion_carries_no_fall_energy() {
        let detector = FallDetector::new(&frame_config(), &fall_config()).unwrap();
        let mut map = Array2::<Complex32>::zeros((SAMPLES, 2 * CHIRPS));
        map[[4, CHIRPS + 1]] = Complex32::new(5.0, 0.0);
        assert_eq!(detector.motion_energy(&map), 0.0);
        map[[4, CHIRPS + 8]] = Complex32::new(1.0, 0.0);
        assert!(detector.motion_energy(&map) > 0.0);
    }
}
