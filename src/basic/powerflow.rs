//! Power-flow engines producing result tables from a pandapower network.

use std::marker::PhantomData;

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use super::solver::{DefaultSolver, Solve};
use super::system::*;
use crate::error::{NetworkError, PowerFlowError};
use crate::io::pandapower::Network;
use crate::measurement::{ElementKind, Side};
use crate::sensitivity::{ImpedanceBase, RowKey, SensitivityMatrix};

/// Solves a network and returns its result tables.
pub trait PowerFlowEngine: Send + Sync {
    fn solve(&self, net: &Network) -> Result<PfResults, PowerFlowError>;
}

/// AC Newton-Raphson engine.
pub struct NewtonEngine<S = DefaultSolver> {
    pub tolerance: f64,
    pub max_iter: usize,
    _solver: PhantomData<fn() -> S>,
}

impl<S> NewtonEngine<S> {
    pub fn new(tolerance: f64, max_iter: usize) -> Self {
        Self {
            tolerance,
            max_iter,
            _solver: PhantomData,
        }
    }
}

impl<S> Default for NewtonEngine<S> {
    fn default() -> Self {
        Self::new(1e-8, 100)
    }
}

impl<S: Solve + Default> PowerFlowEngine for NewtonEngine<S> {
    fn solve(&self, net: &Network) -> Result<PfResults, PowerFlowError> {
        let pf = PFNetwork::try_from(net)?;
        let mut solver = S::default();
        let (v, iterations) = pf.run_pf(&mut solver, Some(self.max_iter), Some(self.tolerance))?;
        debug!(iterations, buses = pf.n_bus, "newton power flow converged");
        Ok(PfResults::from_voltages(net, &pf, &v, iterations))
    }
}

/// Linear DC power flow on the sensitivity model.
///
/// Voltage magnitudes are fixed at 1 p.u., reactive quantities are zero and
/// branches are lossless. Out-of-service branches carry no flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct DcPowerFlow {
    pub base: ImpedanceBase,
}

impl DcPowerFlow {
    /// Demand per bus in per unit, consumption positive.
    fn bus_demand(net: &Network) -> DVector<f64> {
        let mut d = DVector::zeros(net.n_buses());
        for l in net.loads().iter().filter(|x| x.in_service) {
            d[l.bus as usize] += l.p_mw * l.scaling;
        }
        for s in net.sgens().iter().filter(|x| x.in_service) {
            d[s.bus as usize] -= s.p_mw * s.scaling;
        }
        for g in net.gens().iter().filter(|x| x.in_service) {
            d[g.bus as usize] -= g.p_mw * g.scaling;
        }
        d / net.sn_mva
    }

    /// Bus angles in radians, bus index order.
    pub fn angles(&self, net: &Network, h: &SensitivityMatrix) -> Result<DVector<f64>, PowerFlowError> {
        let slack = net.slack_buses();
        if slack.is_empty() {
            return Err(NetworkError::NoSlack.into());
        }
        let n = net.n_buses();
        let mut theta = DVector::zeros(n);
        for e in net.ext_grids().iter().filter(|e| e.in_service) {
            theta[e.bus as usize] = e.va_degree.to_radians();
        }
        let free: Vec<usize> = (0..n).filter(|b| !slack.contains(b)).collect();
        if free.is_empty() {
            return Ok(theta);
        }

        // injection rows close the matrix in bus order
        let offset = h.data().nrows() - n;
        let inj = |bus: usize| offset + bus;
        let d = Self::bus_demand(net);
        let b = DMatrix::from_fn(free.len(), free.len(), |i, j| h.data()[(inj(free[i]), free[j])]);
        let rhs = DVector::from_fn(free.len(), |i, _| {
            let row = inj(free[i]);
            d[free[i]] - slack.iter().map(|&s| h.data()[(row, s)] * theta[s]).sum::<f64>()
        });
        let x = b.lu().solve(&rhs).ok_or(PowerFlowError::SingularDc)?;
        if x.iter().any(|v| !v.is_finite()) {
            return Err(PowerFlowError::SingularDc);
        }
        for (k, &bus) in free.iter().enumerate() {
            theta[bus] = x[k];
        }
        Ok(theta)
    }
}

impl PowerFlowEngine for DcPowerFlow {
    fn solve(&self, net: &Network) -> Result<PfResults, PowerFlowError> {
        let h = SensitivityMatrix::build_in_service(net, self.base)?;
        let theta = self.angles(net, &h)?;
        let s_base = net.sn_mva;
        let values = h.evaluate(&theta) * s_base;
        let flow = |element, id, side| {
            h.row_index(&RowKey::Flow { element, id, side })
                .map(|i| values[i])
                .unwrap_or_default()
        };
        let va = |bus: i64| theta[bus as usize].to_degrees();
        let kv = |bus: i64| net.bus_by_index(bus).map(|b| b.vn_kv).unwrap_or(1.0);
        let i_ka = |p: f64, bus: i64| p.abs() / (3f64.sqrt() * kv(bus));

        let offset = values.len() - net.n_buses();
        let res_bus = (0..net.n_buses())
            .map(|bus| ResBus {
                vm_pu: 1.0,
                va_degree: theta[bus].to_degrees(),
                p_mw: values[offset + bus],
                q_mvar: 0.0,
            })
            .collect();
        let res_line = net
            .lines()
            .iter()
            .enumerate()
            .map(|(id, l)| {
                if !l.in_service {
                    return ResLine::default();
                }
                let p = flow(ElementKind::Line, id, Side::From);
                let i = i_ka(p, l.from_bus);
                let rating = l.max_i_ka * l.df * l.parallel as f64;
                ResLine {
                    p_from_mw: p,
                    p_to_mw: -p,
                    i_from_ka: i,
                    i_to_ka: i,
                    i_ka: i,
                    vm_from_pu: 1.0,
                    va_from_degree: va(l.from_bus),
                    vm_to_pu: 1.0,
                    va_to_degree: va(l.to_bus),
                    loading_percent: if rating > 0.0 { 100.0 * i / rating } else { 0.0 },
                    ..Default::default()
                }
            })
            .collect();
        let res_trafo = net
            .trafos()
            .iter()
            .enumerate()
            .map(|(id, t)| {
                if !t.in_service {
                    return ResTrafo::default();
                }
                let p = flow(ElementKind::Trafo, id, Side::Hv);
                let rating = t.sn_mva * t.df * t.parallel as f64;
                ResTrafo {
                    p_hv_mw: p,
                    p_lv_mw: -p,
                    i_hv_ka: i_ka(p, t.hv_bus),
                    i_lv_ka: i_ka(p, t.lv_bus),
                    vm_hv_pu: 1.0,
                    va_hv_degree: va(t.hv_bus),
                    vm_lv_pu: 1.0,
                    va_lv_degree: va(t.lv_bus),
                    loading_percent: if rating > 0.0 { 100.0 * p.abs() / rating } else { 0.0 },
                    ..Default::default()
                }
            })
            .collect();

        Ok(PfResults {
            res_bus,
            res_line,
            res_trafo,
            bus_order: net.bus_order(),
            iterations: 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcases::*;

    fn newton() -> NewtonEngine {
        NewtonEngine::default()
    }

    #[test]
    fn test_newton_3bus() {
        let net = simple_3bus();
        let res = newton().solve(&net).unwrap();
        assert_eq!(res.res_bus.len(), 3);
        assert_eq!(res.res_bus[0].vm_pu, 1.0);
        assert!(res.res_bus[2].vm_pu < res.res_bus[1].vm_pu);
        assert!(res.res_bus[1].vm_pu < 1.0);
        // demand-positive bus powers
        assert!((res.res_bus[1].p_mw - 1.0).abs() < 1e-6);
        assert!((res.res_bus[2].q_mvar - 0.2).abs() < 1e-6);
        assert!(res.res_bus[0].p_mw < -1.8);
        // power balance: slack supplies loads plus losses
        let line0 = &res.res_line[0];
        let losses: f64 = res.res_line.iter().map(|l| l.pl_mw).sum();
        assert!(losses > 0.0);
        assert!((-res.res_bus[0].p_mw - 1.8 - losses).abs() < 1e-6);
        assert!((line0.p_from_mw + res.res_bus[0].p_mw).abs() < 1e-6);
        assert!(line0.p_to_mw < 0.0);
        assert!(line0.i_ka > 0.0 && line0.loading_percent > 0.0);
    }

    #[test]
    fn test_newton_trafo_and_order() {
        let net = simple_4bus_trafo();
        let res = newton().solve(&net).unwrap();
        assert_eq!(res.bus_order, vec![0, 2, 1, 3]);
        let t = &res.res_trafo[0];
        assert!(t.p_hv_mw > 4.0);
        assert!(t.p_lv_mw < 0.0);
        assert!(t.pl_mw > 0.0);
        assert!(res.res_bus[3].vm_pu < res.res_bus[1].vm_pu);
    }

    #[test]
    fn test_newton_gen_and_shunt() {
        let net = meshed_3bus_gen();
        let res = newton().solve(&net).unwrap();
        // PV bus holds its set point
        assert!((res.res_bus[2].vm_pu - 1.0).abs() < 1e-9);
        // generation 0.5 MW against 0.8 MW of load
        assert!((res.res_bus[2].p_mw - 0.3).abs() < 1e-6);
        // capacitive shunt counted as negative reactive demand
        let q_shunt = -0.1 * res.res_bus[1].vm_pu.powi(2);
        assert!((res.res_bus[1].q_mvar - (0.3 + q_shunt)).abs() < 1e-6);
    }

    #[test]
    fn test_newton_not_converged() {
        let mut net = simple_3bus();
        net.scale_loads(&[500.0, 500.0]).unwrap();
        let err = NewtonEngine::<DefaultSolver>::new(1e-8, 15).solve(&net).unwrap_err();
        assert!(matches!(
            err,
            PowerFlowError::NotConverged { .. } | PowerFlowError::LinearSolve(_)
        ));
    }

    #[test]
    fn test_dc_3bus() {
        let net = simple_3bus();
        let res = DcPowerFlow::default().solve(&net).unwrap();
        assert_eq!(res.res_bus[0].va_degree, 0.0);
        assert!((res.res_line[0].p_from_mw - 1.8).abs() < 1e-9);
        assert!((res.res_line[1].p_from_mw - 0.8).abs() < 1e-9);
        assert!((res.res_bus[1].p_mw - 1.0).abs() < 1e-9);
        assert!((res.res_bus[0].p_mw + 1.8).abs() < 1e-9);
        assert!(res.res_bus[2].va_degree < res.res_bus[1].va_degree);
        assert!(res.res_bus.iter().all(|b| b.vm_pu == 1.0 && b.q_mvar == 0.0));
    }

    #[test]
    fn test_dc_trafo() {
        let net = simple_4bus_trafo();
        let res = DcPowerFlow::default().solve(&net).unwrap();
        assert!((res.res_trafo[0].p_hv_mw - 4.0).abs() < 1e-9);
        assert_eq!(res.res_trafo[0].p_lv_mw, -res.res_trafo[0].p_hv_mw);
    }

    #[test]
    fn test_dc_skips_out_of_service_line() {
        let mut net = meshed_3bus_gen();
        net.r#gen = None;
        net.line.as_mut().unwrap()[2].in_service = false;
        let dc = DcPowerFlow::default().solve(&net).unwrap();
        let ac = newton().solve(&net).unwrap();
        assert_eq!(dc.res_line[2], ResLine::default());
        assert_eq!(ac.res_line[2].p_from_mw, 0.0);

        // same angles and flows as the radial feeder without the open line
        let radial = DcPowerFlow::default().solve(&simple_3bus()).unwrap();
        for bus in 0..3 {
            assert!((dc.res_bus[bus].va_degree - radial.res_bus[bus].va_degree).abs() < 1e-12);
        }
        assert!((dc.res_line[0].p_from_mw - 1.8).abs() < 1e-9);
    }
}
