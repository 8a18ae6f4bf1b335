//! Sparse LU backends for the Newton update.

#[cfg(feature = "faer")]
mod faer;
#[cfg(feature = "faer")]
pub use faer::*;

#[cfg(feature = "rsparse")]
mod rsparse;
#[cfg(feature = "rsparse")]
pub use rsparse::*;

#[cfg(feature = "faer")]
pub type DefaultSolver = FaerSolver;

#[cfg(all(not(feature = "faer"), feature = "rsparse"))]
pub type DefaultSolver = RSparseSolver;

/// Square sparse linear solver working on a compressed-column matrix.
///
/// Implementations may cache the symbolic factorization between calls; the
/// Jacobian pattern does not change during one power-flow run. Call
/// [`Solve::reset`] before reusing a solver on a matrix with another pattern.
#[allow(non_snake_case)]
pub trait Solve {
    /// Solves `A x = b` in place, `b` holds `x` on return.
    ///
    /// `Ap`, `Ai` and `Ax` are the column offsets, row indices and values of
    /// the `n × n` matrix.
    fn solve(
        &mut self,
        Ap: &[usize],
        Ai: &[usize],
        Ax: &[f64],
        b: &mut [f64],
        n: usize,
    ) -> Result<(), &'static str>;

    /// Drops any cached factorization.
    fn reset(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;
    use nalgebra_sparse::CscMatrix;

    #[test]
    fn test_default_solver() {
        let dense = DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 0.0, 1.0, 3.0, 1.0, 0.0, 1.0, 2.0]);
        let a = CscMatrix::from(&dense);
        let mut b = vec![5.0, 5.0, 3.0];
        let mut solver = DefaultSolver::default();
        solver
            .solve(a.col_offsets(), a.row_indices(), a.values(), &mut b, 3)
            .unwrap();
        for (x, e) in b.iter().zip([1.0, 1.0, 1.0]) {
            assert!((x - e).abs() < 1e-10);
        }

        // cached symbolic factorization is reused for new values
        let a2 = CscMatrix::from(&(dense * 2.0));
        let mut b = vec![10.0, 10.0, 6.0];
        solver
            .solve(a2.col_offsets(), a2.row_indices(), a2.values(), &mut b, 3)
            .unwrap();
        assert!((b[2] - 1.0).abs() < 1e-10);
        solver.reset();
    }
}
