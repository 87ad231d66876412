use crate::prelude::{CoreError, CoreResult, Frame, FrameConfig, FrameProcessor};
use crate::processing::angle::{AngleConfig, AngleEstimator};
use crate::processing::beamform::{BeamConfig, BeamFormer};
use crate::processing::doppler::{DopplerConfig, DopplerProcessor};
use crate::sensor_interface::AngleReport;
use crate::telemetry::log::LogManager;

/// Frame -> per-antenna Doppler maps -> beam cube -> smoothed angle.
pub struct AnglePipeline {
    frame_config: FrameConfig,
    doppler: DopplerProcessor,
    beamformer: BeamFormer,
    estimator: AngleEstimator,
    logger: LogManager,
}

impl AnglePipeline {
    pub fn new(
        frame: &FrameConfig,
        doppler: &DopplerConfig,
        beam: &BeamConfig,
        angle: &AngleConfig,
    ) -> CoreResult<Self> {
        frame.validate()?;
        doppler.validate()?;
        Ok(Self {
            frame_config: frame.clone(),
            doppler: DopplerProcessor::from_frame_config(frame, doppler),
            beamformer: BeamFormer::new(frame.num_antennas(), beam)?,
            estimator: AngleEstimator::new(beam, angle)?,
            logger: LogManager::new("angle"),
        })
    }

    pub fn estimator(&self) -> &AngleEstimator {
        &self.estimator
    }
}

impl FrameProcessor for AnglePipeline {
    type Output = AngleReport;

    fn name(&self) -> &'static str {
        "angle"
    }

    fn process(&mut self, frame: &Frame) -> CoreResult<AngleReport> {
        frame.validate(&self.frame_config)?;

        let antennas = self.frame_config.num_antennas();
        let mut maps = Vec::with_capacity(antennas);
        for antenna in 0..antennas {
            let chirps = frame
                .antenna(antenna)
                .ok_or(CoreError::InsufficientAntennas {
                    required: antennas,
                    available: frame.num_antennas(),
                })?;
            maps.push(self.doppler.compute_doppler_map(chirps, antenna)?);
        }

        let cube = self.beamformer.run(&maps)?;
        let report = self.estimator.estimate(frame.index(), &cube)?;
        self.logger.detail(&format!(
            "frame {} raw {:.1} deg segment {} active {}",
            report.frame_index, report.raw_angle_deg, report.segment, report.active_segment
        ));
        Ok(report)
    }

    fn reset(&mut self) {
        self.doppler.reset();
        self.estimator.reset();
    }
}
