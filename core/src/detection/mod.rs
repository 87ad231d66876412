pub mod fall;
pub mod gesture;
pub mod people;
pub mod presence;

pub use fall::{FallConfig, FallDetector, FallResetHandle};
pub use gesture::{GestureConfig, GestureDetector, GestureLatch};
pub use people::{PeopleCountConfig, PeopleCountDetector};
pub use presence::{PostureThresholds, PresenceAndPostureDetector, PresenceConfig, PresenceState};
