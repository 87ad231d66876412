//! Signal-processing and detection core for FMCW radar presence sensing.
//!
//! Frames of raw antenna samples flow from a [`FrameSource`] into a single
//! latest-frame slot. The angle pipeline and each detector consume that slot
//! independently, every one keeping its own history.

pub mod detection;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod sensor_interface;
pub mod session;
pub mod telemetry;

pub use prelude::{CoreError, CoreResult, FrameConfig, FrameProcessor};
pub use sensor_interface::{AcquisitionError, Frame, FrameSource, ResultsSnapshot};
pub use session::{Session, SessionConfig};
