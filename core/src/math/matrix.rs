use ndarray::{Array2, ArrayView2};
use num_complex::Complex32;

pub struct MatrixHelper;

impl MatrixHelper {
    /// Complex matrix product.
    pub fn multiply(lhs: ArrayView2<Complex32>, rhs: ArrayView2<Complex32>) -> Array2<Complex32> {
        lhs.dot(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn multiply_applies_complex_weights() {
        let j = Complex32::new(0.0, 1.0);
        let one = Complex32::new(1.0, 0.0);
        let lhs = array![[one, j]];
        let rhs = array![[one], [j]];
        let product = MatrixHelper::multiply(lhs.view(), rhs.view());
        assert_eq!(product.dim(), (1, 1));
        assert!((product[[0, 0]] - Complex32::new(0.0, 0.0)).norm() < 1e-6);
    }
}
