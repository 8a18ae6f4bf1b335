use crate::basic::sparse::conj::Conjugate;
use nalgebra::*;
use nalgebra_sparse::CscMatrix;

/// Partial derivatives of the complex bus injections with respect to voltage
/// magnitude and angle, `(dS/d|V|, dS/dθ)`.
///
/// `Vnorm` holds `V / |V|`. Complex matrix formulation after R. D. Zimmerman,
/// "AC Power Flows, Generalized OPF Costs and their Derivatives using Complex
/// Matrix Notation", MATPOWER Technical Note 2, 2010.
#[allow(non_snake_case)]
pub fn dSbus_dV(
    Ybus: &CscMatrix<Complex<f64>>,
    v: &DVector<Complex<f64>>,
    Vnorm: &DVector<Complex<f64>>,
) -> (CscMatrix<Complex<f64>>, CscMatrix<Complex<f64>>) {
    let diag = |values: &[Complex<f64>]| {
        let mut m = CscMatrix::<Complex<f64>>::identity(values.len());
        m.values_mut().copy_from_slice(values);
        m
    };
    let ibus = Ybus * v;
    let diagVnorm = diag(Vnorm.as_slice());
    let diagV = diag(v.as_slice());
    let diagIbus = diag(ibus.as_slice());

    let dS_dVm = &diagV * (Ybus * &diagVnorm).conjugate() + diagIbus.conjugate() * &diagVnorm;
    let dS_dVa = &diagV * (diagIbus - Ybus * &diagV).conjugate() * Complex::<f64>::i();
    (dS_dVm, dS_dVa)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_finite_difference() {
        let y = Complex::new(1.0, -5.0);
        let ybus = CscMatrix::from(&DMatrix::from_row_slice(2, 2, &[y, -y, -y, y]));
        let v = DVector::from_vec(vec![
            Complex::from_polar(0.98, -0.05),
            Complex::from_polar(1.02, 0.01),
        ]);
        let vnorm = v.map(|e| e / e.norm());
        let (dvm, dva) = dSbus_dV(&ybus, &v, &vnorm);
        let (dvm, dva) = (DMatrix::from(&dvm), DMatrix::from(&dva));

        let s = |v: &DVector<Complex<f64>>| v.component_mul(&(&ybus * v).conjugate());
        let h = 1e-7;
        for k in 0..2 {
            let mut va = v.clone();
            va[k] *= Complex::from_polar(1.0, h);
            let fd = (s(&va) - s(&v)) / Complex::new(h, 0.0);
            let mut vm = v.clone();
            vm[k] += vnorm[k] * h;
            let fdm = (s(&vm) - s(&v)) / Complex::new(h, 0.0);
            for i in 0..2 {
                assert!((fd[i] - dva[(i, k)]).norm() < 1e-5);
                assert!((fdm[i] - dvm[(i, k)]).norm() < 1e-5);
            }
        }
    }
}
