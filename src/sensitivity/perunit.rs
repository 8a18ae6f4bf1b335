use serde::{Deserialize, Serialize};

use crate::error::NetworkError;
use crate::io::pandapower::{Line, Transformer};

/// How the line impedance base `vn_kv² / sn_mva` is evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpedanceBase {
    /// Real division.
    #[default]
    Exact,
    /// Floor division, as used by older datasets.
    Truncated,
}

impl ImpedanceBase {
    pub fn z_base(self, vn_kv: f64, sn_mva: f64) -> f64 {
        let base = vn_kv * vn_kv / sn_mva;
        match self {
            ImpedanceBase::Exact => base,
            ImpedanceBase::Truncated => base.floor(),
        }
    }
}

/// Short-circuit reactance of a transformer in per unit of the system base.
///
/// `x = sqrt(z² - r²)` with `z` and `r` taken from `vk_percent` and
/// `vkr_percent`. Parallel units are not taken into account.
pub fn trafo_reactance_pu(id: usize, trafo: &Transformer, sn_mva: f64) -> Result<f64, NetworkError> {
    let invalid = || NetworkError::InvalidTrafoImpedance {
        id,
        vk_percent: trafo.vk_percent,
        vkr_percent: trafo.vkr_percent,
    };
    if trafo.sn_mva <= 0.0 {
        return Err(invalid());
    }
    let z_pu = (trafo.vk_percent / 100.0) * (sn_mva / trafo.sn_mva);
    let r_pu = (trafo.vkr_percent / 100.0) * (sn_mva / trafo.sn_mva);
    if r_pu > z_pu {
        return Err(invalid());
    }
    let x_pu = (z_pu * z_pu - r_pu * r_pu).sqrt();
    if x_pu.is_finite() { Ok(x_pu) } else { Err(invalid()) }
}

/// Series reactance of a line in per unit, referred to the from-bus voltage.
pub fn line_reactance_pu(
    id: usize,
    line: &Line,
    vn_kv: f64,
    sn_mva: f64,
    base: ImpedanceBase,
) -> Result<f64, NetworkError> {
    let z_base = base.z_base(vn_kv, sn_mva);
    let x_pu = (line.length_km * line.x_ohm_per_km / line.parallel as f64) / z_base;
    if x_pu == 0.0 || !x_pu.is_finite() {
        return Err(NetworkError::InvalidLineImpedance { id, x_pu });
    }
    Ok(x_pu)
}

/// Inverse of a per-unit reactance as used in the DC model.
pub fn susceptance(x_pu: f64) -> f64 {
    1.0 / x_pu
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trafo(vk: f64, vkr: f64, sn: f64) -> Transformer {
        Transformer {
            vk_percent: vk,
            vkr_percent: vkr,
            sn_mva: sn,
            ..Default::default()
        }
    }

    #[test]
    fn test_trafo_reactance() {
        let x = trafo_reactance_pu(0, &trafo(10.0, 6.0, 2.0), 1.0).unwrap();
        // z = 0.05, r = 0.03
        assert!((x - 0.04).abs() < 1e-12);
        assert_eq!(trafo_reactance_pu(0, &trafo(5.0, 5.0, 1.0), 1.0), Ok(0.0));
    }

    #[test]
    fn test_trafo_reactance_invalid() {
        assert!(matches!(
            trafo_reactance_pu(3, &trafo(4.0, 6.0, 1.0), 1.0),
            Err(NetworkError::InvalidTrafoImpedance { id: 3, .. })
        ));
        assert!(trafo_reactance_pu(0, &trafo(4.0, 1.0, 0.0), 1.0).is_err());
    }

    #[test]
    fn test_truncated_base() {
        // 0.4 kV on 1 MVA: 0.16 exact, 0 when truncated
        assert!((ImpedanceBase::Exact.z_base(0.4, 1.0) - 0.16).abs() < 1e-12);
        assert_eq!(ImpedanceBase::Truncated.z_base(0.4, 1.0), 0.0);
        assert_eq!(ImpedanceBase::Truncated.z_base(20.0, 3.0), 133.0);
    }

    #[test]
    fn test_line_reactance() {
        let line = Line {
            length_km: 2.0,
            x_ohm_per_km: 0.4,
            parallel: 2,
            ..Default::default()
        };
        let x = line_reactance_pu(0, &line, 20.0, 1.0, ImpedanceBase::Exact).unwrap();
        assert!((x - 0.4 / 400.0).abs() < 1e-15);
        let err = line_reactance_pu(1, &line, 0.4, 1.0, ImpedanceBase::Truncated).unwrap_err();
        assert!(matches!(err, NetworkError::InvalidLineImpedance { id: 1, .. }));
    }
}
