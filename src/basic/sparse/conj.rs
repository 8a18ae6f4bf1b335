use nalgebra::*;
use nalgebra_sparse::CscMatrix;

/// Conjugation of complex sparse matrices without touching the sparsity pattern.
pub(crate) trait Conjugate {
    type Mat;

    /// Returns the conjugate of the matrix.
    fn conjugate(&self) -> Self::Mat;
}

impl<T: SimdRealField> Conjugate for CscMatrix<Complex<T>>
where
    Complex<T>: SimdComplexField,
{
    type Mat = CscMatrix<Complex<T>>;

    fn conjugate(&self) -> Self::Mat {
        let values = self.values().iter().map(|x| x.clone().simd_conjugate()).collect();
        // same pattern, so the constructor cannot fail
        CscMatrix::try_from_pattern_and_values(self.pattern().clone(), values)
            .expect("pattern preserved")
    }
}

/// Splits a complex sparse matrix into its real and imaginary parts.
pub(crate) trait RealImage {
    type Mat;

    /// Returns the real and imaginary parts of the matrix.
    fn real_imag(&self) -> (Self::Mat, Self::Mat);
}

impl<T: SimdRealField> RealImage for CscMatrix<Complex<T>>
where
    Complex<T>: SimdComplexField<SimdRealField = T>,
{
    type Mat = CscMatrix<T>;

    fn real_imag(&self) -> (Self::Mat, Self::Mat) {
        let (re, im): (Vec<T>, Vec<T>) = self
            .values()
            .iter()
            .map(|e| (e.clone().simd_real(), e.clone().simd_imaginary()))
            .unzip();
        let pattern = self.pattern().clone();
        (
            CscMatrix::try_from_pattern_and_values(pattern.clone(), re).expect("pattern preserved"),
            CscMatrix::try_from_pattern_and_values(pattern, im).expect("pattern preserved"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_sparse::{CooMatrix, CscMatrix};

    fn sample(sign: f64) -> CscMatrix<Complex<f64>> {
        let mut a = CooMatrix::new(4, 4);
        a.push(0, 0, Complex::new(1.0, -1.0 * sign));
        a.push(2, 1, Complex::new(3.0, 1.0 * sign));
        a.push(3, 3, Complex::new(5.0, -2.0 * sign));
        (&a).into()
    }

    #[test]
    fn test_conj() {
        assert!(sample(1.0).conjugate() == sample(-1.0), "matrices do not match!")
    }

    #[test]
    fn test_real_imag() {
        let (re, im) = sample(1.0).real_imag();
        let re = DMatrix::from(&re);
        let im = DMatrix::from(&im);
        assert_eq!(re[(2, 1)], 3.0);
        assert_eq!(im[(3, 3)], -2.0);
        assert_eq!(im[(1, 1)], 0.0);
    }
}
