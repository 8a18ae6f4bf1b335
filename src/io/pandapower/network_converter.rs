use std::f64::consts::PI;

use nalgebra::{Complex, vector};

use super::file_io::*;
use crate::basic::system::*;
use crate::error::NetworkError;

/// Pi model of a line. Series impedance and charging are referred to the
/// from-bus voltage level.
fn line_to_pi(id: usize, wbase: f64, s_base: f64, v_base: f64, line: &Line) -> Result<PiBranch, NetworkError> {
    let parallel = line.parallel as f64;
    let rl = line.r_ohm_per_km * line.length_km / parallel;
    let xl = line.x_ohm_per_km * line.length_km / parallel;
    let z_base = v_base * v_base / s_base;
    let z = Complex::new(rl, xl) / z_base;
    if z.norm() == 0.0 || !z.is_finite() {
        return Err(NetworkError::InvalidLineImpedance { id, x_pu: z.im });
    }

    let b = wbase * 1e-9 * line.c_nf_per_km * line.length_km * parallel;
    let g = line.g_us_per_km * 1e-6 * line.length_km * parallel;
    let shunt = 0.5 * Complex::new(g, b) * z_base;
    Ok(PiBranch {
        from: line.from_bus as usize,
        to: line.to_bus as usize,
        y_series: 1.0 / z,
        y_from: shunt,
        y_to: shunt,
        in_service: line.in_service,
    })
}

/// Off-nominal tap ratio seen from the HV side.
fn tap_ratio(item: &Transformer) -> f64 {
    let steps = item.tap_pos.unwrap_or(0.0) - item.tap_neutral.unwrap_or(0.0);
    let dv = steps * 0.01 * item.tap_step_percent.unwrap_or(0.0);
    match item.tap_side.as_deref() {
        Some("lv") => 1.0 / (1.0 + dv),
        _ => 1.0 + dv,
    }
}

/// Pi model of a two-winding transformer referred to the LV side.
///
/// The tap is modelled as an ideal transformer at the HV terminal, the
/// magnetizing admittance is split evenly between both terminals.
fn trafo_to_pi(
    id: usize,
    s_base: f64,
    bus_hv_kv: f64,
    bus_lv_kv: f64,
    item: &Transformer,
) -> Result<PiBranch, NetworkError> {
    let invalid = || NetworkError::InvalidTrafoImpedance {
        id,
        vk_percent: item.vk_percent,
        vkr_percent: item.vkr_percent,
    };
    if item.sn_mva <= 0.0 || item.vkr_percent > item.vk_percent {
        return Err(invalid());
    }
    let parallel = item.parallel as f64;
    // trafo base to system base on the LV bus voltage level
    let rebase = (item.vn_lv_kv / bus_lv_kv).powi(2) * s_base / item.sn_mva;
    let vk = item.vk_percent * 0.01;
    let vkr = item.vkr_percent * 0.01;
    let z = Complex::new(vkr, (vk * vk - vkr * vkr).sqrt()) * rebase / parallel;
    if z.norm() == 0.0 || !z.is_finite() {
        return Err(invalid());
    }
    let y = 1.0 / z;

    let nominal = (item.vn_hv_kv / item.vn_lv_kv) / (bus_hv_kv / bus_lv_kv);
    let t = tap_ratio(item) * nominal;

    let g_m = item.pfe_kw * 0.001 / item.sn_mva;
    let i0 = item.i0_percent * 0.01;
    let b_m = (i0 * i0 - g_m * g_m).max(0.0).sqrt();
    let y_m = Complex::new(g_m, -b_m) * parallel / rebase;

    Ok(PiBranch {
        from: item.hv_bus as usize,
        to: item.lv_bus as usize,
        y_series: y / t,
        y_from: (1.0 - t) * y / (t * t) + 0.5 * y_m / (t * t),
        y_to: (1.0 - 1.0 / t) * y + 0.5 * y_m,
        in_service: item.in_service,
    })
}

fn shunt_to_admit(item: &Shunt, s_base: f64, bus_kv: f64) -> AdmittanceBranch {
    // rated at vn_kv, consumption positive
    let s = Complex::new(item.p_mw, -item.q_mvar) * item.step as f64;
    let y = s / s_base * (bus_kv / item.vn_kv).powi(2);
    AdmittanceBranch {
        y: Admittance(y),
        port: Port2(vector![item.bus as i32, GND]),
    }
}

impl TryFrom<&Network> for PFNetwork {
    type Error = NetworkError;

    fn try_from(value: &Network) -> Result<Self, Self::Error> {
        value.validate()?;
        if value.slack_buses().is_empty() {
            return Err(NetworkError::NoSlack);
        }
        let s_base = value.sn_mva;
        let wbase = value.f_hz * 2.0 * PI;
        let vn = |bus: i64| value.bus_by_index(bus).map(|b| b.vn_kv).unwrap_or(1.0);

        let lines = value
            .lines()
            .iter()
            .enumerate()
            .map(|(id, l)| line_to_pi(id, wbase, s_base, vn(l.from_bus), l))
            .collect::<Result<Vec<_>, _>>()?;
        let trafos = value
            .trafos()
            .iter()
            .enumerate()
            .map(|(id, t)| trafo_to_pi(id, s_base, vn(t.hv_bus), vn(t.lv_bus), t))
            .collect::<Result<Vec<_>, _>>()?;
        let shunts = value
            .shunts()
            .iter()
            .filter(|s| s.in_service)
            .map(|s| shunt_to_admit(s, s_base, vn(s.bus)))
            .collect();

        let loads = value.loads().iter().filter(|x| x.in_service).map(|x| PQNode {
            s: Complex::new(x.p_mw, x.q_mvar) * x.scaling,
            bus: x.bus as usize,
        });
        let sgens = value.sgens().iter().filter(|x| x.in_service).map(|x| PQNode {
            s: -Complex::new(x.p_mw, x.q_mvar) * x.scaling,
            bus: x.bus as usize,
        });
        let pq_loads = loads.chain(sgens).collect();

        let pv_nodes = value
            .gens()
            .iter()
            .filter(|x| x.in_service)
            .map(|x| PVNode {
                p: x.p_mw * x.scaling,
                v: x.vm_pu,
                bus: x.bus as usize,
            })
            .collect();
        let ext = value
            .ext_grids()
            .iter()
            .filter(|x| x.in_service)
            .map(|x| ExtGridNode {
                v: x.vm_pu,
                phase: x.va_degree.to_radians(),
                bus: x.bus as usize,
            })
            .collect();

        Ok(Self {
            s_base,
            n_bus: value.n_buses(),
            lines,
            trafos,
            shunts,
            pq_loads,
            pv_nodes,
            ext,
        })
    }
}
