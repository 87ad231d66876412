use ndarray::Array3;
use num_complex::Complex32;
use presencecore::prelude::FrameConfig;
use presencecore::Frame;
use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// A point target seen by the synthetic radar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reflector {
    pub range_m: f32,
    pub angle_deg: f32,
    pub amplitude: f32,
    /// Constant radial drift, positive moving away.
    pub velocity_mps: f32,
    /// Back-and-forth motion around `range_m`.
    pub sway_m: f32,
    pub sway_period_s: f32,
    /// Window during which the reflector exists.
    pub active_from_s: Option<f32>,
    pub active_until_s: Option<f32>,
}

impl Default for Reflector {
    fn default() -> Self {
        Self {
            range_m: 1.0,
            angle_deg: 0.0,
            amplitude: 0.2,
            velocity_mps: 0.0,
            sway_m: 0.0,
            sway_period_s: 4.0,
            active_from_s: None,
            active_until_s: None,
        }
    }
}

impl Reflector {
    pub fn is_active(&self, time_s: f32) -> bool {
        self.active_from_s.map_or(true, |from| time_s >= from)
            && self.active_until_s.map_or(true, |until| time_s < until)
    }

    /// (range, radial velocity) at `time_s`.
    pub fn kinematics(&self, time_s: f32) -> (f32, f32) {
        let elapsed = time_s - self.active_from_s.unwrap_or(0.0);
        let mut range = self.range_m + self.velocity_mps * elapsed;
        let mut velocity = self.velocity_mps;
        if self.sway_m > 0.0 && self.sway_period_s > 0.0 {
            let omega = 2.0 * PI / self.sway_period_s;
            range += self.sway_m * (omega * elapsed).sin();
            velocity += self.sway_m * omega * (omega * elapsed).cos();
        }
        (range.max(0.0), velocity)
    }
}

/// Builds the beat-signal frame `index` for the given reflectors.
///
/// Each reflector contributes a tone whose frequency follows its range, whose
/// phase advances chirp to chirp with its radial velocity and antenna to
/// antenna with its angle (half-wavelength spacing).
pub fn build_frame(
    config: &FrameConfig,
    reflectors: &[Reflector],
    index: u64,
    noise: f32,
    rng: &mut StdRng,
) -> Frame {
    let (antennas, chirps, samples) = config.frame_shape();
    let time_s = index as f32 * config.frame_repetition_time_s;
    let range_bin = config.range_bin_m();
    let wavelength = config.wavelength_m();

    let tones: Vec<(f32, f32, f32, f32)> = reflectors
        .iter()
        .filter(|reflector| reflector.is_active(time_s))
        .map(|reflector| {
            let (range, velocity) = reflector.kinematics(time_s);
            let beat_bin = range / range_bin;
            let doppler_step =
                4.0 * PI * velocity * config.chirp_repetition_time_s / wavelength;
            let antenna_step = PI * reflector.angle_deg.to_radians().sin();
            (beat_bin, doppler_step, antenna_step, reflector.amplitude)
        })
        .collect();

    let data = Array3::from_shape_fn((antennas, chirps, samples), |(a, c, s)| {
        let mut value = Complex32::new(0.0, 0.0);
        for &(beat_bin, doppler_step, antenna_step, amplitude) in &tones {
            let phase = 2.0 * PI * beat_bin * s as f32 / (2.0 * samples as f32)
                + doppler_step * c as f32
                + antenna_step * a as f32;
            value += Complex32::from_polar(amplitude, phase);
        }
        if noise > 0.0 {
            value += Complex32::new(rng.gen_range(-noise..noise), rng.gen_range(-noise..noise));
        }
        value
    });
    Frame::new(index, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn config() -> FrameConfig {
        FrameConfig {
            rx_mask: 0b111,
            num_chirps: 4,
            num_samples: 16,
            ..Default::default()
        }
    }

    #[test]
    fn frame_matches_configured_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let frame = build_frame(&config(), &[Reflector::default()], 3, 0.01, &mut rng);
        assert_eq!(frame.index(), 3);
        assert_eq!(frame.shape(), (3, 4, 16));
        frame.validate(&config()).unwrap();
    }

    #[test]
    fn silent_room_without_noise_is_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        let frame = build_frame(&config(), &[], 0, 0.0, &mut rng);
        assert!(frame.data().iter().all(|c| c.norm() == 0.0));
    }

    #[test]
    fn same_seed_same_frame() {
        let reflectors = [Reflector::default()];
        let a = build_frame(&config(), &reflectors, 0, 0.1, &mut StdRng::seed_from_u64(9));
        let b = build_frame(&config(), &reflectors, 0, 0.1, &mut StdRng::seed_from_u64(9));
        assert_eq!(a.data(), b.data());
    }

    #[test]
    fn reflector_window_and_sway() {
        let reflector = Reflector {
            range_m: 2.0,
            sway_m: 0.5,
            sway_period_s: 4.0,
            active_from_s: Some(1.0),
            active_until_s: Some(3.0),
            ..Default::default()
        };
        assert!(!reflector.is_active(0.5));
        assert!(reflector.is_active(1.0));
        assert!(!reflector.is_active(3.0));

        let (range, velocity) = reflector.kinematics(2.0);
        assert!((range - 2.5).abs() < 1e-4);
        assert!(velocity.abs() < 1e-4);
    }
}
