pub mod angle;
pub mod beamform;
pub mod doppler;
pub mod pipeline;
pub mod range;

pub use angle::{AngleConfig, AngleEstimator, RangeBeamEnergy, SegmentHistory, SegmentQuantizer};
pub use beamform::{BeamConfig, BeamCube, BeamFormer};
pub use doppler::{DopplerConfig, DopplerProcessor};
pub use pipeline::AnglePipeline;
pub use range::RangeProcessor;
