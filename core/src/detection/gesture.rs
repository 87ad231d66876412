use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::math::stats::StatsHelper;
use crate::prelude::{CoreError, CoreResult, Frame, FrameConfig, FrameProcessor};
use crate::processing::doppler::{DopplerConfig, DopplerProcessor};
use crate::sensor_interface::{GestureReport, GestureState};
use crate::telemetry::log::LogManager;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Any Doppler cell louder than this counts as a gesture.
    pub threshold_db: f32,
    /// Raw detections this soon after the last accepted one are ignored.
    pub suppress_s: f32,
    /// How long an accepted detection stays visible.
    pub hold_s: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            threshold_db: -59.0,
            suppress_s: 1.0,
            hold_s: 5.0,
        }
    }
}

fn seconds(name: &str, value: f32) -> CoreResult<Duration> {
    Duration::try_from_secs_f32(value).map_err(|err| {
        CoreError::InvalidConfig(format!(
            "{} must be a finite duration, got {}: {}",
            name, value, err
        ))
    })
}

impl GestureConfig {
    pub fn validate(&self) -> CoreResult<()> {
        seconds("suppress_s", self.suppress_s)?;
        seconds("hold_s", self.hold_s)?;
        Ok(())
    }
}

/// Debounces raw per-frame detections into the displayed state.
#[derive(Debug, Clone)]
pub struct GestureLatch {
    suppress: Duration,
    hold: Duration,
    last_accepted: Option<Instant>,
}

impl GestureLatch {
    pub fn new(config: &GestureConfig) -> CoreResult<Self> {
        Ok(Self {
            suppress: seconds("suppress_s", config.suppress_s)?,
            hold: seconds("hold_s", config.hold_s)?,
            last_accepted: None,
        })
    }

    pub fn update(&mut self, raw: GestureState, now: Instant) -> GestureState {
        if raw.is_detected() {
            let accept = match self.last_accepted {
                Some(last) => now.saturating_duration_since(last) > self.suppress,
                None => true,
            };
            if accept {
                self.last_accepted = Some(now);
            }
        }
        match self.last_accepted {
            Some(last) if now.saturating_duration_since(last) <= self.hold => {
                GestureState::Detected
            }
            _ => GestureState::NotDetected,
        }
    }

    pub fn clear(&mut self) {
        self.last_accepted = None;
    }
}

/// Energy-threshold gesture detector over every configured antenna.
pub struct GestureDetector {
    threshold_db: f32,
    doppler: DopplerProcessor,
    latch: GestureLatch,
    logger: LogManager,
}

impl GestureDetector {
    pub fn new(frame: &FrameConfig, config: &GestureConfig) -> CoreResult<Self> {
        frame.validate()?;
        config.validate()?;
        Ok(Self {
            threshold_db: config.threshold_db,
            doppler: DopplerProcessor::from_frame_config(frame, &DopplerConfig::default()),
            latch: GestureLatch::new(config)?,
            logger: LogManager::new("gesture"),
        })
    }

    /// Raw detection for one frame plus the number of antennas that could not
    /// be evaluated. Missing antennas and per-antenna failures are skipped.
    pub fn detect_gesture(&mut self, frame: &Frame) -> (GestureState, usize) {
        let mut skipped = 0;
        for antenna in 0..self.doppler.num_antennas() {
            let Some(chirps) = frame.antenna(antenna) else {
                self.logger.warn(&format!(
                    "frame {} has no antenna {}; skipping",
                    frame.index(),
                    antenna
                ));
                skipped += 1;
                continue;
            };
            match self.doppler.compute_doppler_map(chirps, antenna) {
                Ok(map) => {
                    let threshold = self.threshold_db;
                    if map
                        .iter()
                        .any(|cell| StatsHelper::linear_to_db(cell.norm()) > threshold)
                    {
                        return (GestureState::Detected, skipped);
                    }
                }
                Err(err) => {
                    self.logger.warn(&format!(
                        "frame {} antenna {} skipped: {}",
                        frame.index(),
                        antenna,
                        err
                    ));
                    skipped += 1;
                }
            }
        }
        (GestureState::NotDetected, skipped)
    }

    pub fn observe(&mut self, frame: &Frame, now: Instant) -> GestureReport {
        let (raw, skipped_antennas) = self.detect_gesture(frame);
        let state = self.latch.update(raw, now);
        if raw.is_detected() {
            self.logger
                .detail(&format!("frame {} raw gesture, showing {}", frame.index(), state));
        }
        GestureReport {
            frame_index: frame.index(),
            state,
            raw,
            skipped_antennas,
        }
    }
}

impl FrameProcessor for GestureDetector {
    type Output = GestureReport;

    fn name(&self) -> &'static str {
        "gesture"
    }

    fn process(&mut self, frame: &Frame) -> CoreResult<GestureReport> {
        Ok(self.observe(frame, Instant::now()))
    }

    fn reset(&mut self) {
        self.latch.clear();
        self.doppler.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::range::tests::moving_tone;
    use ndarray::{Array3, Axis};
    use num_complex::Complex32;
    use std::f32::consts::PI;

    const CHIRPS: usize = 8;
    const SAMPLES: usize = 16;

    fn frame_config() -> FrameConfig {
        FrameConfig {
            rx_mask: 0b111,
            num_chirps: CHIRPS,
            num_samples: SAMPLES,
            ..Default::default()
        }
    }

    fn detector() -> GestureDetector {
        GestureDetector::new(&frame_config(), &GestureConfig::default()).unwrap()
    }

    #[test]
    fn unrepresentable_durations_are_rejected() {
        for (suppress_s, hold_s) in [(1.0, f32::INFINITY), (f32::NAN, 5.0), (-1.0, 5.0)] {
            let config = GestureConfig {
                suppress_s,
                hold_s,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));
            assert!(matches!(
                GestureDetector::new(&frame_config(), &config),
                Err(CoreError::InvalidConfig(_))
            ));
        }
    }

    fn hand_wave(antennas: usize) -> Frame {
        let chirps = moving_tone(CHIRPS, SAMPLES, 4.0, 2.0 * PI * 2.0 / 16.0, 1.0);
        let views = vec![chirps.view(); antennas];
        Frame::new(0, ndarray::stack(Axis(0), &views).unwrap())
    }

    #[test]
    fn silent_frame_has_no_gesture() {
        let mut detector = detector();
        let frame = Frame::new(0, Array3::zeros((3, CHIRPS, SAMPLES)));
        assert_eq!(detector.detect_gesture(&frame), (GestureState::NotDetected, 0));
    }

    #[test]
    fn loud_motion_is_a_gesture() {
        let mut detector = detector();
        assert_eq!(detector.detect_gesture(&hand_wave(3)).0, GestureState::Detected);
    }

    #[test]
    fn missing_antennas_are_skipped_not_fatal() {
        let mut detector = detector();
        let frame = Frame::new(0, Array3::zeros((1, CHIRPS, SAMPLES)));
        assert_eq!(detector.detect_gesture(&frame), (GestureState::NotDetected, 2));

        let report = detector.process(&hand_wave(1)).unwrap();
        assert_eq!(report.raw, GestureState::Detected);
        assert_eq!(report.skipped_antennas, 0);
    }

    #[test]
    fn misshapen_antennas_are_skipped() {
        let mut detector = detector();
        let frame = Frame::new(0, Array3::from_elem((3, CHIRPS, 4), Complex32::new(1.0, 0.0)));
        assert_eq!(detector.detect_gesture(&frame), (GestureState::NotDetected, 3));
    }

    #[test]
    fn latch_suppresses_then_holds_then_releases() {
        let mut latch = GestureLatch::new(&GestureConfig::default()).unwrap();
        let start = Instant::now();
        let at = |secs: f32| start + Duration::from_secs_f32(secs);

        assert_eq!(latch.update(GestureState::NotDetected, at(0.0)), GestureState::NotDetected);
        assert_eq!(latch.update(GestureState::Detected, at(1.0)), GestureState::Detected);
        // inside the suppression window: hold is not extended
        assert_eq!(latch.update(GestureState::Detected, at(1.5)), GestureState::Detected);
        assert_eq!(latch.update(GestureState::NotDetected, at(5.9)), GestureState::Detected);
        assert_eq!(latch.update(GestureState::NotDetected, at(6.2)), GestureState::NotDetected);
        // accepted again once past suppression
        assert_eq!(latch.update(GestureState::Detected, at(7.0)), GestureState::Detected);
        assert_eq!(latch.update(GestureState::NotDetected, at(11.5)), GestureState::Detected);
    }

    #[test]
    fn reset_clears_the_latch() {
        let mut detector = detector();
        detector.process(&hand_wave(3)).unwrap();
        detector.reset();
        let frame = Frame::new(1, Array3::zeros((3, CHIRPS, SAMPLES)));
        assert_eq!(detector.process(&frame).unwrap().state, GestureState::NotDetected);
    }
}
