use nalgebra::*;
use nalgebra_sparse::*;
use num_complex::Complex64;
use num_traits::One;

use super::admittance::*;
use crate::basic::newtonpf::newton_pf;
use crate::basic::solver::Solve;
use crate::error::PowerFlowError;

/// Constant power demand at a bus, positive for consumption (MW, MVAr).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PQNode {
    pub s: Complex<f64>,
    pub bus: usize,
}

/// Voltage-controlled generation at a bus.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PVNode {
    pub p: f64,
    pub v: f64,
    pub bus: usize,
}

/// Slack bus with fixed voltage magnitude and angle (radians).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtGridNode {
    pub v: f64,
    pub phase: f64,
    pub bus: usize,
}

impl Default for ExtGridNode {
    fn default() -> Self {
        Self {
            v: 1.0,
            phase: Default::default(),
            bus: Default::default(),
        }
    }
}

/// Bus-branch model of a network in per unit, ready for a Newton solve.
///
/// Branch vectors are indexed by element id, out-of-service branches are kept
/// with `in_service == false` so that ids stay aligned with the source tables.
#[derive(Debug, Clone, Default)]
pub struct PFNetwork {
    pub s_base: f64,
    pub n_bus: usize,
    pub lines: Vec<PiBranch>,
    pub trafos: Vec<PiBranch>,
    /// Bus shunt elements, port `(bus, GND)`.
    pub shunts: Vec<AdmittanceBranch>,
    pub pq_loads: Vec<PQNode>,
    pub pv_nodes: Vec<PVNode>,
    pub ext: Vec<ExtGridNode>,
}

/// Matrices of a network reordered to `[pv, pq, slack]`.
#[allow(non_snake_case)]
pub struct PFMatrices {
    pub reorder: CscMatrix<Complex64>,
    pub Ybus: CscMatrix<Complex64>,
    pub Sbus: DVector<Complex64>,
    pub v_init: DVector<Complex64>,
    pub npv: usize,
    pub npq: usize,
}

fn create_incidence_mat(nodes: usize, y_br: &[AdmittanceBranch]) -> CooMatrix<Complex64> {
    let mut incidence_matrix = CooMatrix::new(nodes, y_br.len());
    for (idx, i) in y_br.iter().enumerate() {
        if i.port[0] >= 0 {
            incidence_matrix.push(i.port[0] as usize, idx, Complex64::one());
        }
        if i.port[1] >= 0 {
            incidence_matrix.push(i.port[1] as usize, idx, -Complex64::one());
        }
    }
    incidence_matrix
}

/// `Y = A diag(y) Aᵀ` with `A` the node-branch incidence matrix.
fn create_ybus(nodes: usize, admits: &[AdmittanceBranch]) -> CscMatrix<Complex64> {
    let mut diag_admit = CscMatrix::<Complex64>::identity(admits.len());
    diag_admit
        .values_mut()
        .iter_mut()
        .zip(admits)
        .for_each(|(x, br)| *x = br.y.0);
    let incidence = CscMatrix::from(&create_incidence_mat(nodes, admits));
    &incidence * (diag_admit * incidence.transpose())
}

/// Permutation `P` with `(P x)[i] = x[order[i]]`.
fn create_permute_mat(order: &[usize]) -> CscMatrix<Complex64> {
    let n = order.len();
    let mut coo = CooMatrix::new(n, n);
    order
        .iter()
        .enumerate()
        .for_each(|(row, &col)| coo.push(row, col, Complex64::one()));
    CscMatrix::from(&coo)
}

impl PFNetwork {
    /// All in-service admittances: branch pi sections then bus shunts.
    pub fn admittances(&self) -> Vec<AdmittanceBranch> {
        self.lines
            .iter()
            .chain(self.trafos.iter())
            .filter(|b| b.in_service)
            .flat_map(|b| b.admittances())
            .chain(self.shunts.iter().copied())
            .collect()
    }

    /// Nodal admittance matrix in bus index order.
    pub fn create_y_bus(&self) -> CscMatrix<Complex64> {
        create_ybus(self.n_bus, &self.admittances())
    }

    /// Net scheduled injections in per unit, generation positive.
    pub fn create_s_bus(&self) -> DVector<Complex64> {
        let mut sbus = DVector::zeros(self.n_bus);
        for i in &self.pq_loads {
            sbus[i.bus] -= i.s;
        }
        for i in &self.pv_nodes {
            sbus[i.bus] += i.p;
        }
        let divider = 1.0 / self.s_base;
        sbus.apply(|x| *x *= divider);
        sbus
    }

    /// Flat start with PV magnitudes and slack phasors applied.
    pub fn create_v_init(&self) -> DVector<Complex64> {
        let mut vbus = DVector::from_element(self.n_bus, Complex64::one());
        for i in &self.pv_nodes {
            vbus[i.bus] = Complex64::new(i.v, 0.0);
        }
        for e in &self.ext {
            vbus[e.bus] = Complex64::from_polar(e.v, e.phase);
        }
        vbus
    }

    /// Bus classification `(pv, pq, ext)`, each ascending except `ext` which
    /// follows the external grid table.
    pub fn bus_types(&self) -> (Vec<usize>, Vec<usize>, Vec<usize>) {
        let mut ext: Vec<usize> = Vec::new();
        for e in &self.ext {
            if !ext.contains(&e.bus) {
                ext.push(e.bus);
            }
        }
        let mut pv: Vec<usize> = self
            .pv_nodes
            .iter()
            .map(|x| x.bus)
            .filter(|b| !ext.contains(b))
            .collect();
        pv.sort_unstable();
        pv.dedup();
        let pq = (0..self.n_bus)
            .filter(|b| !ext.contains(b) && pv.binary_search(b).is_err())
            .collect();
        (pv, pq, ext)
    }

    /// Prepares reordered matrices for the Newton solve.
    #[allow(non_snake_case)]
    pub fn prepare_matrices(&self) -> PFMatrices {
        let (pv, pq, ext) = self.bus_types();
        let order: Vec<usize> = pv.iter().chain(pq.iter()).chain(ext.iter()).copied().collect();
        let reorder = create_permute_mat(&order);
        let reorder_t = reorder.transpose();

        let Ybus = &reorder * &(&self.create_y_bus() * &reorder_t);
        let Sbus = &reorder * &self.create_s_bus();
        let v_init = &reorder * &self.create_v_init();
        PFMatrices {
            reorder,
            Ybus,
            Sbus,
            v_init,
            npv: pv.len(),
            npq: pq.len(),
        }
    }

    /// Runs Newton-Raphson and returns bus voltages in bus index order.
    pub fn run_pf<S: Solve>(
        &self,
        solver: &mut S,
        max_it: Option<usize>,
        tol: Option<f64>,
    ) -> Result<(DVector<Complex64>, usize), PowerFlowError> {
        let m = self.prepare_matrices();
        let (v, iter) = newton_pf(&m.Ybus, &m.Sbus, &m.v_init, m.npv, m.npq, tol, max_it, solver)?;
        Ok((m.reorder.transpose() * &v, iter))
    }
}
