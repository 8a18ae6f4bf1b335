use std::f64::consts::PI;

use super::{dsbus_dv::dSbus_dV, solver::Solve, sparse::slice::Slice};
use crate::basic::sparse::{
    conj::RealImage,
    stack::{csc_hstack, csc_vstack},
};
use crate::error::PowerFlowError;

use nalgebra::*;
use nalgebra_sparse::*;
use num_complex::Complex64;

/// Newton-Raphson power flow in polar coordinates.
///
/// Buses must be ordered `[pv, pq, slack]`: the first `npv` entries of
/// `Sbus`/`v_init` are PV buses, the next `npq` PQ buses, the remainder slack
/// buses whose voltage is held fixed. Returns the converged voltage phasors
/// and the number of Newton steps taken.
#[allow(non_snake_case)]
pub fn newton_pf<Solver: Solve>(
    Ybus: &CscMatrix<Complex64>,
    Sbus: &DVector<Complex64>,
    v_init: &DVector<Complex64>,
    npv: usize,
    npq: usize,
    tolerance: Option<f64>,
    max_iter: Option<usize>,
    solver: &mut Solver,
) -> Result<(DVector<Complex64>, usize), PowerFlowError> {
    let mut v = v_init.clone();
    let mut v_norm = v.map(|e| e.simd_signum());
    let max_iter = max_iter.unwrap_or(100);
    let tol = tolerance.unwrap_or(1e-8);

    let n_ext = v.len() - npv - npq;
    let n_bus = npq + npv;
    let num_state = npv + 2 * npq;

    let mut mis = &v.component_mul(&(Ybus * &v).conjugate()) - Sbus;
    let mut F = DVector::zeros(num_state);
    assemble_f(&mut F, n_bus, &mis, num_state, npv);
    if F.amax() < tol {
        return Ok((v, 0));
    }

    let mut v_m = v.map(|e| e.simd_modulus());
    let mut v_a = v.map(|e| e.simd_argument());
    solver.reset();

    for iterations in 1..=max_iter {
        let (dS_dVm, dS_dVa) = dSbus_dV(Ybus, &v, &v_norm);
        let jacobian = build_jacobian(&dS_dVm, &dS_dVa, npv, n_ext);
        let n = jacobian.nrows();
        let (Ap, Ai, Ax) = jacobian.disassemble();
        solver
            .solve(&Ap, &Ai, &Ax, F.as_mut_slice(), n)
            .map_err(PowerFlowError::LinearSolve)?;

        update_v(
            &mut v_a,
            &F,
            n_bus,
            &mut v_m,
            npv,
            num_state,
            &mut v_norm,
            &mut v,
        );

        v.component_mul(&(Ybus * &v).conjugate())
            .sub_to(Sbus, &mut mis);
        assemble_f(&mut F, n_bus, &mis, num_state, npv);

        let mismatch = F.amax();
        if !mismatch.is_finite() {
            return Err(PowerFlowError::NotConverged {
                iterations,
                mismatch,
            });
        }
        if mismatch < tol {
            return Ok((v, iterations));
        }
    }
    Err(PowerFlowError::NotConverged {
        iterations: max_iter,
        mismatch: F.amax(),
    })
}

#[inline(always)]
fn assemble_f(
    f: &mut DVector<f64>,
    n_bus: usize,
    mis: &DVector<Complex64>,
    num_state: usize,
    npv: usize,
) {
    f.rows_range_mut(0..n_bus)
        .zip_apply(&mis.rows_range(0..n_bus), |a, b| *a = b.re);
    f.rows_range_mut(n_bus..num_state)
        .zip_apply(&mis.rows_range(npv..n_bus), |a, b| *a = b.im);
}

#[inline(always)]
#[allow(clippy::too_many_arguments)]
fn update_v(
    v_a: &mut DVector<f64>,
    dx: &DVector<f64>,
    n_bus: usize,
    v_m: &mut DVector<f64>,
    npv: usize,
    num_state: usize,
    v_norm: &mut DVector<Complex64>,
    v: &mut DVector<Complex64>,
) {
    v_a.rows_range_mut(0..n_bus)
        .zip_apply(&dx.rows_range(0..n_bus), |a, b| {
            *a -= b;
            *a = a.rem_euclid(2.0 * PI);
        });
    v_m.rows_range_mut(npv..n_bus)
        .zip_apply(&dx.rows_range(n_bus..num_state), |a, b| *a -= b);

    v_norm.zip_apply(&*v_a, |a, va| *a = Complex64::from_polar(1.0, va));
    v.zip_zip_apply(v_norm, v_m, |a, e, vm| *a = vm * e);
}

/// Real Jacobian `[[dP/dθ, dP/d|V|], [dQ/dθ, dQ/d|V|]]` over the non-slack
/// states; angle columns cover PV and PQ buses, magnitude columns PQ buses.
#[allow(non_snake_case)]
#[inline(always)]
fn build_jacobian(
    ds_dvm: &CscMatrix<Complex64>,
    ds_dva: &CscMatrix<Complex64>,
    npv: usize,
    n_ext: usize,
) -> CscMatrix<f64> {
    let (real, imag) = ds_dva
        .block((0, 0), (ds_dva.nrows() - n_ext, ds_dva.ncols() - n_ext))
        .real_imag();
    let (real2, imag2) = ds_dvm
        .block((0, 0), (ds_dvm.nrows() - n_ext, ds_dvm.ncols() - n_ext))
        .real_imag();
    let J11 = real;
    let J12 = real2.columns(npv, real2.ncols());
    let J21 = imag.block((npv, 0), (imag.nrows() - npv, imag.ncols()));
    let J22 = imag2.block((npv, npv), (imag2.nrows() - npv, imag2.ncols() - npv));

    csc_vstack(&[&csc_hstack(&[&J11, &J12]), &csc_hstack(&[&J21, &J22])])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::solver::DefaultSolver;

    /// Two buses joined by a lossless line, bus 1 slack, bus 0 PQ load.
    #[allow(non_snake_case)]
    fn two_bus() -> (CscMatrix<Complex64>, DVector<Complex64>, DVector<Complex64>) {
        let y = Complex64::new(0.0, -10.0);
        let dense = DMatrix::from_row_slice(2, 2, &[y, -y, -y, y]);
        let Ybus = CscMatrix::from(&dense);
        let Sbus = DVector::from_vec(vec![Complex64::new(-0.5, -0.2), Complex64::new(0.0, 0.0)]);
        let v0 = DVector::from_element(2, Complex64::new(1.0, 0.0));
        (Ybus, Sbus, v0)
    }

    #[test]
    fn test_two_bus_converges() {
        let (ybus, sbus, v0) = two_bus();
        let mut solver = DefaultSolver::default();
        let (v, it) = newton_pf(&ybus, &sbus, &v0, 0, 1, None, None, &mut solver).unwrap();
        assert!(it > 0 && it < 10);
        let s = v.component_mul(&(&ybus * &v).conjugate());
        assert!((s[0] - sbus[0]).norm() < 1e-8);
        assert!(v[0].norm() < 1.0);
        assert!(v[0].arg() < 0.0);
        assert_eq!(v[1], Complex64::new(1.0, 0.0));
    }

    #[test]
    fn test_infeasible_load_fails() {
        let (ybus, _, v0) = two_bus();
        // beyond the maximum transferable power of the line
        let sbus = DVector::from_vec(vec![Complex64::new(-20.0, -10.0), Complex64::new(0.0, 0.0)]);
        let mut solver = DefaultSolver::default();
        let err = newton_pf(&ybus, &sbus, &v0, 0, 1, None, Some(20), &mut solver).unwrap_err();
        assert!(matches!(
            err,
            PowerFlowError::NotConverged { .. } | PowerFlowError::LinearSolve(_)
        ));
    }
}
