use std::collections::HashMap;
use std::path::Path;

use nalgebra::{DMatrix, DVector, RowDVector};
use tracing::debug;

use super::perunit::{ImpedanceBase, line_reactance_pu, susceptance, trafo_reactance_pu};
use crate::error::NetworkError;
use crate::io::artifacts::write_labeled_matrix;
use crate::io::pandapower::Network;
use crate::measurement::{ElementKind, Side};

/// Structured address of a row of `H`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowKey {
    /// Active power flow into a branch at terminal `side`.
    Flow {
        element: ElementKind,
        id: usize,
        side: Side,
    },
    /// Active power demand at a bus.
    Injection { bus: usize },
}

/// Row metadata. `first_bus` is the bus the equation is written at.
#[derive(Debug, Clone, PartialEq)]
pub struct HRow {
    pub key: RowKey,
    pub label: String,
    pub first_bus: usize,
}

/// DC sensitivity matrix: one row per branch flow direction followed by one
/// row per bus injection, one column per bus in ascending index order.
///
/// Flow rows are `b (θ_first - θ_second)`; an injection row is the negated sum
/// of the flow rows written at that bus, so it yields demand in the same sign
/// convention as the bus result table.
#[derive(Debug, Clone, PartialEq)]
pub struct SensitivityMatrix {
    rows: Vec<HRow>,
    index: HashMap<RowKey, usize>,
    data: DMatrix<f64>,
}

/// Builds `H` for every line, transformer and bus of `net`.
pub fn gen_h4all(net: &Network, base: ImpedanceBase) -> Result<SensitivityMatrix, NetworkError> {
    SensitivityMatrix::build(net, base)
}

impl SensitivityMatrix {
    pub fn build(net: &Network, base: ImpedanceBase) -> Result<Self, NetworkError> {
        Self::build_with(net, base, false)
    }

    /// Like [`SensitivityMatrix::build`], but out-of-service branches keep
    /// their rows with zero susceptance, so they carry no flow and do not
    /// enter the injection rows. Row layout is identical to `build`.
    pub fn build_in_service(net: &Network, base: ImpedanceBase) -> Result<Self, NetworkError> {
        Self::build_with(net, base, true)
    }

    fn build_with(net: &Network, base: ImpedanceBase, in_service_only: bool) -> Result<Self, NetworkError> {
        net.validate()?;
        let n_buses = net.n_buses();
        let mut rows: Vec<HRow> = Vec::new();
        let mut flows: Vec<RowDVector<f64>> = Vec::new();

        let mut push_pair = |element: ElementKind,
                             id: usize,
                             (first, second): ((Side, usize), (Side, usize)),
                             b: f64| {
            let prefix = match element {
                ElementKind::Trafo => "pft",
                _ => "pfl",
            };
            let mut row = RowDVector::zeros(n_buses);
            row[first.1] = b;
            row[second.1] = -b;
            for (sign, (side, bus), other) in [(1.0, first, second.1), (-1.0, second, first.1)] {
                rows.push(HRow {
                    key: RowKey::Flow { element, id, side },
                    label: format!("{prefix}{id}_{bus}_{other}"),
                    first_bus: bus,
                });
                flows.push(&row * sign);
            }
        };

        for (id, line) in net.lines().iter().enumerate() {
            let (f, t) = (line.from_bus as usize, line.to_bus as usize);
            if in_service_only && !line.in_service {
                push_pair(ElementKind::Line, id, ((Side::From, f), (Side::To, t)), 0.0);
                continue;
            }
            let vn_kv = net
                .bus_by_index(line.from_bus)
                .map(|b| b.vn_kv)
                .ok_or(NetworkError::UnknownBus {
                    element: "line",
                    id,
                    bus: line.from_bus,
                })?;
            let b = susceptance(line_reactance_pu(id, line, vn_kv, net.sn_mva, base)?);
            push_pair(ElementKind::Line, id, ((Side::From, f), (Side::To, t)), b);
        }
        for (id, trafo) in net.trafos().iter().enumerate() {
            let (hv, lv) = (trafo.hv_bus as usize, trafo.lv_bus as usize);
            if in_service_only && !trafo.in_service {
                push_pair(ElementKind::Trafo, id, ((Side::Lv, lv), (Side::Hv, hv)), 0.0);
                continue;
            }
            let x = trafo_reactance_pu(id, trafo, net.sn_mva)?;
            if x == 0.0 {
                return Err(NetworkError::InvalidTrafoImpedance {
                    id,
                    vk_percent: trafo.vk_percent,
                    vkr_percent: trafo.vkr_percent,
                });
            }
            push_pair(ElementKind::Trafo, id, ((Side::Lv, lv), (Side::Hv, hv)), susceptance(x));
        }

        let n_flows = flows.len();
        let mut data = DMatrix::zeros(n_flows + n_buses, n_buses);
        for (r, row) in flows.iter().enumerate() {
            data.set_row(r, row);
        }
        for bus in 0..n_buses {
            let mut inj = RowDVector::zeros(n_buses);
            for (r, meta) in rows.iter().enumerate().take(n_flows) {
                if meta.first_bus == bus {
                    inj -= &flows[r];
                }
            }
            data.set_row(n_flows + bus, &inj);
            rows.push(HRow {
                key: RowKey::Injection { bus },
                label: format!("p{bus}"),
                first_bus: bus,
            });
        }

        let index = rows.iter().enumerate().map(|(i, r)| (r.key, i)).collect();
        debug!(rows = rows.len(), buses = n_buses, "built sensitivity matrix");
        Ok(Self { rows, index, data })
    }

    pub fn n_buses(&self) -> usize {
        self.data.ncols()
    }

    pub fn rows(&self) -> &[HRow] {
        &self.rows
    }

    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    pub fn labels(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.label.clone()).collect()
    }

    /// Position of the row addressed by `key`.
    pub fn row_index(&self, key: &RowKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Copy of the row addressed by `key`.
    pub fn row(&self, key: &RowKey) -> Option<RowDVector<f64>> {
        self.row_index(key).map(|i| self.data.row(i).into_owned())
    }

    /// Row lookup by presentation label, e.g. `pfl0_1_2`.
    pub fn row_by_label(&self, label: &str) -> Option<RowDVector<f64>> {
        self.rows
            .iter()
            .position(|r| r.label == label)
            .map(|i| self.data.row(i).into_owned())
    }

    /// Evaluates every row at the given bus angles (radians).
    pub fn evaluate(&self, theta: &DVector<f64>) -> DVector<f64> {
        &self.data * theta
    }

    /// Writes `H` with row labels and bus indices as column headers.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        let cols: Vec<String> = (0..self.n_buses()).map(|b| b.to_string()).collect();
        write_labeled_matrix(path, &self.labels(), &cols, &self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcases::*;

    #[test]
    fn test_three_bus_rows() {
        let h = gen_h4all(&simple_3bus(), ImpedanceBase::Exact).unwrap();
        assert_eq!(h.n_buses(), 3);
        assert_eq!(
            h.labels(),
            vec!["pfl0_0_1", "pfl0_1_0", "pfl1_1_2", "pfl1_2_1", "p0", "p1", "p2"]
        );
        // 2 km at 0.4 ohm/km on a 400 ohm base
        let b = 1.0 / (0.8 / 400.0);
        let r = h.row_by_label("pfl0_0_1").unwrap();
        assert!((r[0] - b).abs() < 1e-9 && (r[1] + b).abs() < 1e-9 && r[2] == 0.0);
    }

    #[test]
    fn test_flow_rows_are_negations() {
        for net in [simple_3bus(), simple_4bus_trafo(), meshed_3bus_gen()] {
            let h = gen_h4all(&net, ImpedanceBase::Exact).unwrap();
            let flows: Vec<_> = h
                .rows()
                .iter()
                .enumerate()
                .filter(|(_, r)| matches!(r.key, RowKey::Flow { .. }))
                .map(|(i, _)| i)
                .collect();
            assert_eq!(flows.len() % 2, 0);
            for pair in flows.chunks(2) {
                assert_eq!(h.data().row(pair[0]), -h.data().row(pair[1]));
            }
        }
    }

    #[test]
    fn test_injection_is_negated_outgoing_sum() {
        let net = simple_3bus();
        let h = gen_h4all(&net, ImpedanceBase::Exact).unwrap();
        let row = |l: &str| h.row_by_label(l).unwrap();
        assert_eq!(row("p0"), -row("pfl0_0_1"));
        assert_eq!(row("p1"), -(row("pfl0_1_0") + row("pfl1_1_2")));
        assert_eq!(row("p2"), -row("pfl1_2_1"));
        // injections sum to zero over a lossless network
        let total: f64 = (0..3).map(|b| row(&format!("p{b}")).sum()).sum();
        assert!(total.abs() < 1e-9);
    }

    #[test]
    fn test_trafo_rows() {
        let net = simple_4bus_trafo();
        let h = gen_h4all(&net, ImpedanceBase::Exact).unwrap();
        let lv_first = RowKey::Flow {
            element: ElementKind::Trafo,
            id: 0,
            side: Side::Lv,
        };
        let i = h.row_index(&lv_first).unwrap();
        assert_eq!(h.rows()[i].label, "pft0_1_0");
        let b = 1.0 / ((0.12f64.powi(2) - 0.0041f64.powi(2)).sqrt() / 25.0);
        let r = h.row(&lv_first).unwrap();
        assert!((r[1] - b).abs() < 1e-6 && (r[0] + b).abs() < 1e-6);
        assert_eq!(
            h.row(&RowKey::Flow {
                element: ElementKind::Trafo,
                id: 0,
                side: Side::Hv
            })
            .unwrap(),
            -r
        );
    }

    #[test]
    fn test_deterministic() {
        let net = meshed_3bus_gen();
        let a = gen_h4all(&net, ImpedanceBase::Exact).unwrap();
        let b = gen_h4all(&net, ImpedanceBase::Exact).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_bad_trafo() {
        let mut net = simple_4bus_trafo();
        net.trafo.as_mut().unwrap()[0].vkr_percent = 15.0;
        assert!(matches!(
            gen_h4all(&net, ImpedanceBase::Exact),
            Err(NetworkError::InvalidTrafoImpedance { id: 0, .. })
        ));
    }

    #[test]
    fn test_write_csv() {
        let h = gen_h4all(&simple_3bus(), ImpedanceBase::Exact).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.csv");
        h.write_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("label,0,1,2"));
        assert!(lines.next().unwrap().starts_with("pfl0_0_1,"));
        assert_eq!(text.lines().count(), 8);
    }

    #[test]
    fn test_truncated_base() {
        let mut net = simple_3bus();
        net.sn_mva = 3.0;
        let exact = gen_h4all(&net, ImpedanceBase::Exact).unwrap();
        let truncated = gen_h4all(&net, ImpedanceBase::Truncated).unwrap();
        assert_eq!(exact.labels(), truncated.labels());

        // 400 / 3 = 133.33 ohm, floored to 133 ohm
        let r = truncated.row_by_label("pfl0_0_1").unwrap();
        assert!((r[0] - 133.0 / 0.8).abs() < 1e-9);
        let r = exact.row_by_label("pfl0_0_1").unwrap();
        assert!((r[0] - (400.0 / 3.0) / 0.8).abs() < 1e-9);
        let p1 = truncated.row_by_label("p1").unwrap();
        assert!((p1[1] + (133.0 / 0.8 + 133.0 / 1.2)).abs() < 1e-9);

        // an integral base is unaffected
        assert_eq!(
            gen_h4all(&simple_3bus(), ImpedanceBase::Truncated).unwrap(),
            gen_h4all(&simple_3bus(), ImpedanceBase::Exact).unwrap()
        );
    }

    #[test]
    fn test_in_service_build() {
        let mut net = meshed_3bus_gen();
        net.line.as_mut().unwrap()[2].in_service = false;
        let all = gen_h4all(&net, ImpedanceBase::Exact).unwrap();
        let live = SensitivityMatrix::build_in_service(&net, ImpedanceBase::Exact).unwrap();
        assert_eq!(all.labels(), live.labels());
        assert!(all.row_by_label("pfl2_0_2").unwrap()[0] > 0.0);
        assert!(live.row_by_label("pfl2_0_2").unwrap().iter().all(|v| *v == 0.0));
        assert_eq!(live.row_by_label("p0").unwrap(), -live.row_by_label("pfl0_0_1").unwrap());
        assert_eq!(
            live.row_by_label("pfl1_1_2").unwrap(),
            all.row_by_label("pfl1_1_2").unwrap()
        );
    }
}
