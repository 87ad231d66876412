pub mod frame;
pub mod report;

pub use frame::{AcquisitionError, Frame, FrameSource};
pub use report::{
    AngleReport, FallReport, GestureReport, GestureState, PeopleCountReport, Posture,
    PostureReport, ResultsSnapshot,
};
