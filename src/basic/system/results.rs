use nalgebra::DVector;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::admittance::PiBranch;
use super::system::PFNetwork;
use crate::io::pandapower::Network;

/// Bus result row, power is positive for consumption.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResBus {
    pub vm_pu: f64,
    pub va_degree: f64,
    pub p_mw: f64,
    pub q_mvar: f64,
}

/// Line result row. Flows are positive into the line at the named terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResLine {
    pub p_from_mw: f64,
    pub q_from_mvar: f64,
    pub p_to_mw: f64,
    pub q_to_mvar: f64,
    pub pl_mw: f64,
    pub ql_mvar: f64,
    pub i_from_ka: f64,
    pub i_to_ka: f64,
    pub i_ka: f64,
    pub vm_from_pu: f64,
    pub va_from_degree: f64,
    pub vm_to_pu: f64,
    pub va_to_degree: f64,
    pub loading_percent: f64,
}

/// Transformer result row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResTrafo {
    pub p_hv_mw: f64,
    pub q_hv_mvar: f64,
    pub p_lv_mw: f64,
    pub q_lv_mvar: f64,
    pub pl_mw: f64,
    pub ql_mvar: f64,
    pub i_hv_ka: f64,
    pub i_lv_ka: f64,
    pub vm_hv_pu: f64,
    pub va_hv_degree: f64,
    pub vm_lv_pu: f64,
    pub va_lv_degree: f64,
    pub loading_percent: f64,
}

/// Result tables of one power-flow solve.
///
/// `res_bus` is indexed by bus index, `res_line`/`res_trafo` by element id.
/// `bus_order` lists bus indices in the order of the network's bus table,
/// which is the order result tables are presented in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PfResults {
    pub res_bus: Vec<ResBus>,
    pub res_line: Vec<ResLine>,
    pub res_trafo: Vec<ResTrafo>,
    pub bus_order: Vec<usize>,
    pub iterations: usize,
}

impl PfResults {
    /// Bus results in presentation order, paired with their bus index.
    pub fn bus_rows(&self) -> impl Iterator<Item = (usize, &ResBus)> + '_ {
        self.bus_order.iter().map(|&b| (b, &self.res_bus[b]))
    }

    /// Voltage phasors in bus index order.
    pub fn voltages(&self) -> DVector<Complex64> {
        DVector::from_iterator(
            self.res_bus.len(),
            self.res_bus
                .iter()
                .map(|r| Complex64::from_polar(r.vm_pu, r.va_degree.to_radians())),
        )
    }
}

/// Terminal power (MW, MVAr) and current (kA) of a pi branch.
fn terminal_flows(
    br: &PiBranch,
    v: &DVector<Complex64>,
    s_base: f64,
    kv: (f64, f64),
) -> ((Complex64, f64), (Complex64, f64)) {
    let (vf, vt) = (v[br.from], v[br.to]);
    let (i_f, i_t) = br.currents(vf, vt);
    let s_f = vf * i_f.conj() * s_base;
    let s_t = vt * i_t.conj() * s_base;
    let i_ka = |i: Complex64, kv: f64| i.norm() * s_base / (3f64.sqrt() * kv);
    ((s_f, i_ka(i_f, kv.0)), (s_t, i_ka(i_t, kv.1)))
}

impl PfResults {
    /// Derives all result tables from solved bus voltages (bus index order).
    pub fn from_voltages(
        net: &Network,
        pf: &PFNetwork,
        v: &DVector<Complex64>,
        iterations: usize,
    ) -> Self {
        let s_base = pf.s_base;
        let kv = |bus: usize| net.bus_by_index(bus as i64).map(|b| b.vn_kv).unwrap_or(1.0);

        // demand-positive injections, bus shunts count as consumption
        let inj = v.component_mul(&(&pf.create_y_bus() * v).conjugate());
        let mut s_bus: Vec<Complex64> = inj.iter().map(|s| -s * s_base).collect();
        for sh in &pf.shunts {
            let bus = sh.port[0] as usize;
            s_bus[bus] += v[bus].norm_sqr() * sh.y.0.conj() * s_base;
        }
        let res_bus = v
            .iter()
            .zip(&s_bus)
            .map(|(v, s)| ResBus {
                vm_pu: v.norm(),
                va_degree: v.arg().to_degrees(),
                p_mw: s.re,
                q_mvar: s.im,
            })
            .collect();

        let res_line = pf
            .lines
            .iter()
            .zip(net.lines())
            .map(|(br, line)| {
                if !br.in_service {
                    return ResLine::default();
                }
                let ((s_f, i_f), (s_t, i_t)) =
                    terminal_flows(br, v, s_base, (kv(br.from), kv(br.to)));
                let i_ka = i_f.max(i_t);
                let rating = line.max_i_ka * line.df * line.parallel as f64;
                ResLine {
                    p_from_mw: s_f.re,
                    q_from_mvar: s_f.im,
                    p_to_mw: s_t.re,
                    q_to_mvar: s_t.im,
                    pl_mw: s_f.re + s_t.re,
                    ql_mvar: s_f.im + s_t.im,
                    i_from_ka: i_f,
                    i_to_ka: i_t,
                    i_ka,
                    vm_from_pu: v[br.from].norm(),
                    va_from_degree: v[br.from].arg().to_degrees(),
                    vm_to_pu: v[br.to].norm(),
                    va_to_degree: v[br.to].arg().to_degrees(),
                    loading_percent: if rating > 0.0 { 100.0 * i_ka / rating } else { 0.0 },
                }
            })
            .collect();

        let res_trafo = pf
            .trafos
            .iter()
            .zip(net.trafos())
            .map(|(br, trafo)| {
                if !br.in_service {
                    return ResTrafo::default();
                }
                let ((s_hv, i_hv), (s_lv, i_lv)) =
                    terminal_flows(br, v, s_base, (kv(br.from), kv(br.to)));
                let rating = trafo.sn_mva * trafo.df * trafo.parallel as f64;
                let loading = s_hv.norm().max(s_lv.norm());
                ResTrafo {
                    p_hv_mw: s_hv.re,
                    q_hv_mvar: s_hv.im,
                    p_lv_mw: s_lv.re,
                    q_lv_mvar: s_lv.im,
                    pl_mw: s_hv.re + s_lv.re,
                    ql_mvar: s_hv.im + s_lv.im,
                    i_hv_ka: i_hv,
                    i_lv_ka: i_lv,
                    vm_hv_pu: v[br.from].norm(),
                    va_hv_degree: v[br.from].arg().to_degrees(),
                    vm_lv_pu: v[br.to].norm(),
                    va_lv_degree: v[br.to].arg().to_degrees(),
                    loading_percent: if rating > 0.0 { 100.0 * loading / rating } else { 0.0 },
                }
            })
            .collect();

        Self {
            res_bus,
            res_line,
            res_trafo,
            bus_order: net.bus_order(),
            iterations,
        }
    }
}
