use crate::generator::source::SyntheticRadar;
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use presencecore::detection::{
    FallDetector, GestureDetector, PeopleCountDetector, PresenceAndPostureDetector,
};
use presencecore::processing::AnglePipeline;
use presencecore::{AcquisitionError, Frame, FrameProcessor, FrameSource, ResultsSnapshot};
use serde::Serialize;
use std::collections::BTreeMap;

/// Totals of an offline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowResult {
    pub scenario: Option<String>,
    pub frames_processed: u64,
    pub frames_dropped: u64,
    /// Frames on which the fall flag was raised.
    pub fall_frames: Vec<u64>,
    pub max_people: usize,
    pub gesture_frames: u64,
    /// Frames per posture label.
    pub postures: BTreeMap<String, u64>,
    pub last: ResultsSnapshot,
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

fn step<P: FrameProcessor>(
    processor: &mut Option<P>,
    frame: &Frame,
) -> anyhow::Result<Option<P::Output>> {
    match processor {
        Some(processor) => {
            let name = processor.name();
            processor
                .process(frame)
                .map(Some)
                .with_context(|| format!("{} failed on frame {}", name, frame.index()))
        }
        None => Ok(None),
    }
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    /// Pushes every frame through every enabled consumer in order, on the
    /// calling thread.
    pub fn execute(&self) -> anyhow::Result<WorkflowResult> {
        let session = &self.config.session;
        let enabled = &session.consumers;
        let mut generator = self.config.generator.clone();
        generator.realtime = false;
        let mut radar =
            SyntheticRadar::new(session.frame.clone(), generator, Some(self.config.frames))?;

        let mut angle = enabled
            .angle
            .enabled
            .then(|| {
                AnglePipeline::new(&session.frame, &session.doppler, &session.beam, &session.angle)
            })
            .transpose()
            .context("building angle pipeline")?;
        let mut posture = enabled
            .posture
            .enabled
            .then(|| PresenceAndPostureDetector::new(&session.frame, &session.presence))
            .transpose()
            .context("building posture detector")?;
        let mut fall = enabled
            .fall
            .enabled
            .then(|| FallDetector::new(&session.frame, &session.fall))
            .transpose()
            .context("building fall detector")?;
        let mut people = enabled
            .people
            .enabled
            .then(|| PeopleCountDetector::new(&session.frame, &session.people))
            .transpose()
            .context("building people counter")?;
        let mut gesture = enabled
            .gesture
            .enabled
            .then(|| GestureDetector::new(&session.frame, &session.gesture))
            .transpose()
            .context("building gesture detector")?;

        let mut result = WorkflowResult {
            scenario: self
                .config
                .generator
                .scenario
                .map(|scenario| scenario.description().to_string()),
            ..Default::default()
        };

        loop {
            let frame = match radar.get_next_frame() {
                Ok(frame) => frame,
                Err(AcquisitionError::Transient(reason)) => {
                    log::warn!("[runner] {}", reason);
                    result.frames_dropped += 1;
                    continue;
                }
                Err(AcquisitionError::Exhausted) => break,
                Err(err @ AcquisitionError::Fatal(_)) => {
                    return Err(err).context("synthetic radar failed");
                }
            };
            frame
                .validate(radar.config())
                .context("validating synthetic frame")?;

            if let Some(report) = step(&mut angle, &frame)? {
                result.last.angle = Some(report);
            }
            if let Some(report) = step(&mut posture, &frame)? {
                *result
                    .postures
                    .entry(report.posture.label().to_string())
                    .or_default() += 1;
                result.last.posture = Some(report);
            }
            if let Some(report) = step(&mut fall, &frame)? {
                if report.fall_detected {
                    result.fall_frames.push(report.frame_index);
                }
                result.last.fall = Some(report);
            }
            if let Some(report) = step(&mut people, &frame)? {
                result.max_people = result.max_people.max(report.count);
                result.last.people = Some(report);
            }
            if let Some(report) = step(&mut gesture, &frame)? {
                if report.raw.is_detected() {
                    result.gesture_frames += 1;
                }
                result.last.gesture = Some(report);
            }
            result.frames_processed += 1;
        }

        Ok(result)
    }
}
