//! Small hand-built networks used by the tests and the command line demo.

use crate::io::pandapower::*;

fn bus(index: i64, vn_kv: f64) -> Bus {
    Bus {
        index,
        in_service: true,
        vn_kv,
        name: Some(format!("bus_{index}")),
        type_: Some("b".to_owned()),
        ..Default::default()
    }
}

fn line(from_bus: i64, to_bus: i64, length_km: f64) -> Line {
    Line {
        from_bus,
        to_bus,
        length_km,
        r_ohm_per_km: 0.2,
        x_ohm_per_km: 0.4,
        c_nf_per_km: 10.0,
        g_us_per_km: 0.0,
        parallel: 1,
        df: 1.0,
        max_i_ka: 0.4,
        in_service: true,
        ..Default::default()
    }
}

fn load(bus: i64, p_mw: f64, q_mvar: f64) -> Load {
    Load {
        bus,
        p_mw,
        q_mvar,
        scaling: 1.0,
        in_service: true,
        ..Default::default()
    }
}

fn ext_grid(bus: i64) -> ExtGrid {
    ExtGrid {
        bus,
        in_service: true,
        vm_pu: 1.0,
        va_degree: 0.0,
        name: Some("grid".to_owned()),
    }
}

/// Radial 20 kV feeder: `0 -(line 0)- 1 -(line 1)- 2`, slack at bus 0.
pub fn simple_3bus() -> Network {
    Network {
        bus: vec![bus(0, 20.0), bus(1, 20.0), bus(2, 20.0)],
        line: Some(vec![line(0, 1, 2.0), line(1, 2, 3.0)]),
        load: Some(vec![load(1, 1.0, 0.3), load(2, 0.8, 0.2)]),
        ext_grid: Some(vec![ext_grid(0)]),
        ..Default::default()
    }
}

/// 110/20 kV substation feeding two 20 kV lines, slack on the 110 kV side.
///
/// Bus table is stored out of index order so that result ordering differs from
/// ascending bus order.
pub fn simple_4bus_trafo() -> Network {
    let trafo = Transformer {
        hv_bus: 0,
        lv_bus: 1,
        sn_mva: 25.0,
        vn_hv_kv: 110.0,
        vn_lv_kv: 20.0,
        vk_percent: 12.0,
        vkr_percent: 0.41,
        pfe_kw: 14.0,
        i0_percent: 0.07,
        parallel: 1,
        df: 1.0,
        in_service: true,
        tap_side: Some("hv".to_owned()),
        tap_neutral: Some(0.0),
        tap_pos: Some(0.0),
        tap_step_percent: Some(1.5),
        ..Default::default()
    };
    Network {
        bus: vec![bus(0, 110.0), bus(2, 20.0), bus(1, 20.0), bus(3, 20.0)],
        line: Some(vec![line(1, 2, 1.5), line(2, 3, 2.5)]),
        trafo: Some(vec![trafo]),
        load: Some(vec![load(2, 2.0, 0.5), load(3, 1.5, 0.4), load(1, 0.5, 0.1)]),
        ext_grid: Some(vec![ext_grid(0)]),
        ..Default::default()
    }
}

/// Meshed variant of [`simple_3bus`] with a generator and a shunt.
pub fn meshed_3bus_gen() -> Network {
    let mut net = simple_3bus();
    if let Some(lines) = net.line.as_mut() {
        lines.push(line(0, 2, 4.0));
    }
    net.r#gen = Some(vec![Gen {
        bus: 2,
        p_mw: 0.5,
        vm_pu: 1.0,
        scaling: 1.0,
        in_service: true,
        ..Default::default()
    }]);
    net.shunt = Some(vec![Shunt {
        bus: 1,
        q_mvar: -0.1,
        p_mw: 0.0,
        vn_kv: 20.0,
        step: 1,
        in_service: true,
        name: None,
    }]);
    net
}
