use std::f32::consts::PI;

const BLACKMAN_HARRIS: [f32; 4] = [0.35875, 0.48829, 0.14128, 0.01168];

/// Symmetric 4-term Blackman-Harris window.
pub fn blackman_harris(len: usize) -> Vec<f32> {
    match len {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let denom = (len - 1) as f32;
            (0..len)
                .map(|n| {
                    let x = 2.0 * PI * n as f32 / denom;
                    BLACKMAN_HARRIS[0] - BLACKMAN_HARRIS[1] * x.cos()
                        + BLACKMAN_HARRIS[2] * (2.0 * x).cos()
                        - BLACKMAN_HARRIS[3] * (3.0 * x).cos()
                })
                .collect()
        }
    }
}
