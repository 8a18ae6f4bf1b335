use faer::{
    MatMut,
    linalg::solvers::Solve,
    sparse::{
        SparseColMatRef, SymbolicSparseColMatRef,
        linalg::solvers::{Lu, SymbolicLu},
    },
};

use super::Solve as LinearSolve;

/// LU solver backed by `faer`.
#[derive(Default)]
pub struct FaerSolver {
    symbolic: Option<SymbolicLu<usize>>,
}

#[allow(non_snake_case)]
impl LinearSolve for FaerSolver {
    fn solve(
        &mut self,
        Ap: &[usize],
        Ai: &[usize],
        Ax: &[f64],
        b: &mut [f64],
        n: usize,
    ) -> Result<(), &'static str> {
        let s = SymbolicSparseColMatRef::new_checked(n, n, Ap, None, Ai);
        let mat = SparseColMatRef::new(s, Ax);
        let symbolic = match self.symbolic.take() {
            Some(sym) => sym,
            None => SymbolicLu::try_new(s).map_err(|_| "faer symbolic factorization failed")?,
        };
        let lu = Lu::try_new_with_symbolic(symbolic.clone(), mat)
            .map_err(|_| "faer numeric factorization failed")?;
        self.symbolic = Some(symbolic);
        lu.solve_in_place(MatMut::from_column_major_slice_mut(b, n, 1));
        if b.iter().any(|v| !v.is_finite()) {
            return Err("singular matrix");
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.symbolic = None;
    }
}
