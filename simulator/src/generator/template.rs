use crate::generator::profile::Reflector;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Canned rooms for exercising every detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// Noise only.
    Empty,
    /// One person pacing back and forth off to the side.
    Walker,
    /// A person standing close by who drops to the floor after five seconds.
    Fall,
    /// Three people at different ranges and angles.
    Crowd,
}

impl Scenario {
    pub fn description(&self) -> &'static str {
        match self {
            Scenario::Empty => "empty room",
            Scenario::Walker => "single walker at 20 degrees",
            Scenario::Fall => "standing person falls at t = 5 s",
            Scenario::Crowd => "three walkers",
        }
    }

    pub fn reflectors(&self) -> Vec<Reflector> {
        match self {
            Scenario::Empty => Vec::new(),
            Scenario::Walker => vec![Reflector {
                range_m: 2.0,
                angle_deg: 20.0,
                sway_m: 0.8,
                sway_period_s: 8.0,
                ..Default::default()
            }],
            Scenario::Fall => vec![
                Reflector {
                    range_m: 0.45,
                    sway_m: 0.02,
                    active_until_s: Some(5.0),
                    ..Default::default()
                },
                Reflector {
                    range_m: 0.45,
                    velocity_mps: 0.8,
                    amplitude: 0.3,
                    active_from_s: Some(5.0),
                    active_until_s: Some(6.0),
                    ..Default::default()
                },
                Reflector {
                    range_m: 0.85,
                    sway_m: 0.01,
                    active_from_s: Some(6.0),
                    ..Default::default()
                },
            ],
            Scenario::Crowd => vec![
                Reflector {
                    range_m: 1.0,
                    angle_deg: -30.0,
                    sway_m: 0.3,
                    sway_period_s: 5.0,
                    ..Default::default()
                },
                Reflector {
                    range_m: 2.6,
                    angle_deg: 5.0,
                    sway_m: 0.4,
                    sway_period_s: 7.0,
                    ..Default::default()
                },
                Reflector {
                    range_m: 4.2,
                    angle_deg: 35.0,
                    sway_m: 0.3,
                    sway_period_s: 6.0,
                    ..Default::default()
                },
            ],
        }
    }
}
