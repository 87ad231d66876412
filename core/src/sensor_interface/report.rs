use serde::{Deserialize, Serialize};
use std::fmt;

/// Posture class derived from the nearest range peak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Posture {
    Standing,
    Sitting,
    Sleeping,
    Unknown,
    NoPresence,
}

impl Posture {
    pub fn label(&self) -> &'static str {
        match self {
            Posture::Standing => "standing",
            Posture::Sitting => "sitting",
            Posture::Sleeping => "sleeping",
            Posture::Unknown => "unknown",
            Posture::NoPresence => "no_presence",
        }
    }
}

impl fmt::Display for Posture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GestureState {
    #[serde(rename = "Gesture detected")]
    Detected,
    #[serde(rename = "No gesture detected")]
    NotDetected,
}

impl GestureState {
    pub fn label(&self) -> &'static str {
        match self {
            GestureState::Detected => "Gesture detected",
            GestureState::NotDetected => "No gesture detected",
        }
    }

    pub fn is_detected(&self) -> bool {
        matches!(self, GestureState::Detected)
    }
}

impl fmt::Display for GestureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Output of the angle pipeline for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleReport {
    pub frame_index: u64,
    /// Angle of the strongest beam in this frame.
    pub raw_angle_deg: f32,
    /// Segment of `raw_angle_deg` alone.
    pub segment: usize,
    /// Rounded mean of the segment history; the display-facing result.
    pub active_segment: usize,
    /// Centre of the active segment.
    pub smoothed_angle_deg: f32,
    /// True once the history holds its full capacity.
    pub settled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PostureReport {
    pub frame_index: u64,
    pub presence: bool,
    pub distance_m: Option<f32>,
    pub posture: Posture,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FallReport {
    pub frame_index: u64,
    pub fall_detected: bool,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeopleCountReport {
    pub frame_index: u64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GestureReport {
    pub frame_index: u64,
    /// Debounced state shown to the user.
    pub state: GestureState,
    /// Per-frame decision before debouncing.
    pub raw: GestureState,
    pub skipped_antennas: usize,
}

/// Latest value of every result sink, as pulled by a dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsSnapshot {
    pub angle: Option<AngleReport>,
    pub posture: Option<PostureReport>,
    pub fall: Option<FallReport>,
    pub people: Option<PeopleCountReport>,
    pub gesture: Option<GestureReport>,
}

impl ResultsSnapshot {
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_match_serialized_names() {
        assert_eq!(
            serde_json::to_string(&Posture::NoPresence).unwrap(),
            "\"no_presence\""
        );
        assert_eq!(
            serde_json::to_string(&GestureState::Detected).unwrap(),
            format!("\"{}\"", GestureState::Detected.label())
        );
        assert_eq!(Posture::Sleeping.to_string(), "sleeping");
    }

    #[test]
    fn empty_snapshot_serializes_nulls() {
        let line = ResultsSnapshot::default().to_json_line().unwrap();
        assert!(line.contains("\"fall\":null"));
    }
}
