pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f32>() / samples.len() as f32
    }

    /// Amplitude in dB; zero maps to negative infinity.
    pub fn linear_to_db(amplitude: f32) -> f32 {
        20.0 * amplitude.abs().log10()
    }
}
