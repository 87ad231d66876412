use num_complex::Complex32;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::sync::Arc;

/// Helper that wraps the `rustfft` planner for reuse across frames.
pub struct FftHelper {
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl FftHelper {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let scratch = vec![Complex32::zero(); fft.get_inplace_scratch_len()];
        Self {
            fft,
            buffer: vec![Complex32::zero(); size],
            scratch,
        }
    }

    /// Forward transform of `input`, zero-padded (or truncated) to the planned length.
    pub fn forward<I>(&mut self, input: I) -> &[Complex32]
    where
        I: IntoIterator<Item = Complex32>,
    {
        self.buffer.fill(Complex32::zero());
        for (slot, value) in self.buffer.iter_mut().zip(input) {
            *slot = value;
        }
        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);
        &self.buffer
    }
}

/// Index a spectrum bin lands on after moving the zero frequency to the centre.
pub fn shifted_index(bin: usize, len: usize) -> usize {
    (bin + len / 2) % len
}
