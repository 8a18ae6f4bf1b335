use std::path::Path;

use nalgebra::{DMatrix, RowDVector};
use tracing::{debug, info};

use super::template::{MeasTemplate, TemplateEntry};
use super::{ElementKind, MeasKind, Side, meas_name, read_result, side_str};
use crate::error::{MeasError, Result};
use crate::grid::Grid;
use crate::io::artifacts::write_labeled_matrix;
use crate::io::pandapower::Network;
use crate::sensitivity::{RowKey, SensitivityMatrix};

/// Measurement matrices returned by [`gen_meas`].
///
/// `h` has one column per bus in ascending index order, `h_reordered` follows
/// the result table bus order and `h_no_slack` additionally drops the columns
/// of external grid buses.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementMatrices {
    pub labels: Vec<String>,
    pub h: DMatrix<f64>,
    pub h_reordered: DMatrix<f64>,
    pub reordered_buses: Vec<usize>,
    pub h_no_slack: DMatrix<f64>,
    pub no_slack_buses: Vec<usize>,
}

impl MeasurementMatrices {
    fn new(net: &Network, labels: Vec<String>, h: DMatrix<f64>, bus_order: Vec<usize>) -> Self {
        let h_reordered = h.select_columns(&bus_order);
        let mut ext: Vec<usize> = net.ext_grids().iter().map(|e| e.bus as usize).collect();
        ext.sort_unstable();
        ext.dedup();
        let keep: Vec<usize> = (0..bus_order.len())
            .filter(|&c| ext.binary_search(&bus_order[c]).is_err())
            .collect();
        let h_no_slack = h_reordered.select_columns(&keep);
        let no_slack_buses = keep.iter().map(|&c| bus_order[c]).collect();
        Self {
            labels,
            h,
            h_reordered,
            reordered_buses: bus_order,
            h_no_slack,
            no_slack_buses,
        }
    }

    /// Writes `h.csv`, `h_reordered.csv` and `h_no_slack.csv` into `dir`.
    pub fn write_csv(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        let names = |buses: &[usize]| buses.iter().map(|b| b.to_string()).collect::<Vec<_>>();
        let ascending: Vec<usize> = (0..self.h.ncols()).collect();
        write_labeled_matrix(dir.join("h.csv"), &self.labels, &names(&ascending), &self.h)?;
        write_labeled_matrix(
            dir.join("h_reordered.csv"),
            &self.labels,
            &names(&self.reordered_buses),
            &self.h_reordered,
        )?;
        write_labeled_matrix(
            dir.join("h_no_slack.csv"),
            &self.labels,
            &names(&self.no_slack_buses),
            &self.h_no_slack,
        )?;
        Ok(())
    }
}

/// Processing group of a template row.
fn group(e: &TemplateEntry) -> u8 {
    match (e.element_type, e.meas_type) {
        (ElementKind::Bus, MeasKind::V) => 0,
        (ElementKind::Bus, MeasKind::P) => 1,
        (ElementKind::Bus, _) => 2,
        (ElementKind::Line, MeasKind::P) => 3,
        (ElementKind::Line, _) => 4,
        (ElementKind::Trafo, MeasKind::P) => 5,
        (ElementKind::Trafo, _) => 6,
    }
}

/// Checks kind, side and terminal buses of a picked row against the network.
fn validate_entry(net: &Network, e: &TemplateEntry) -> std::result::Result<(), MeasError> {
    let unsupported = || MeasError::Unsupported {
        meas_type: e.meas_type.to_string(),
        element_type: e.element_type.to_string(),
        element: e.element,
        side: side_str(e.side),
    };
    let unknown = || MeasError::UnknownElement {
        element_type: e.element_type.to_string(),
        element: e.element,
    };
    if e.meas_type == MeasKind::I {
        return Err(unsupported());
    }
    let expected = match (e.element_type, e.side) {
        (ElementKind::Bus, None) => {
            if e.element >= net.n_buses() {
                return Err(unknown());
            }
            (e.element as i64, e.element as i64)
        }
        (ElementKind::Bus, Some(_)) => return Err(unsupported()),
        (_, None) => return Err(unsupported()),
        (kind, Some(side)) if !side.belongs_to(kind) => return Err(unsupported()),
        (ElementKind::Line, Some(side)) => {
            let l = net.lines().get(e.element).ok_or_else(unknown)?;
            match side {
                Side::From => (l.from_bus, l.to_bus),
                _ => (l.to_bus, l.from_bus),
            }
        }
        (ElementKind::Trafo, Some(side)) => {
            let t = net.trafos().get(e.element).ok_or_else(unknown)?;
            match side {
                Side::Hv => (t.hv_bus, t.lv_bus),
                _ => (t.lv_bus, t.hv_bus),
            }
        }
    };
    if (e.side_idx, e.other_side_idx) != expected {
        return Err(MeasError::TemplateMismatch {
            element_type: e.element_type.to_string(),
            element: e.element,
            side_idx: e.side_idx,
            other_side_idx: e.other_side_idx,
            expected,
        });
    }
    Ok(())
}

/// Materializes the picked measurements of a solved grid.
///
/// Every picked row is validated before anything is registered. Rows are
/// processed as bus `v`, bus `p`, bus `q`, line `p`, line `q`, trafo `p`,
/// trafo `q`, keeping template order within a group. Active power quantities
/// take their row from `h`, all others get a zero row.
pub fn gen_meas(
    grid: &mut Grid,
    template: &MeasTemplate,
    h: &SensitivityMatrix,
    inst_err: f64,
) -> Result<MeasurementMatrices> {
    let res = grid.res.as_ref().ok_or(MeasError::NoResults)?;
    let net = &grid.net;

    let mut picked: Vec<&TemplateEntry> = template.picked().collect();
    for e in &picked {
        validate_entry(net, e)?;
    }
    picked.sort_by_key(|e| group(e));

    info!(count = picked.len(), "generating measurements");
    let n_buses = h.n_buses();
    let mut staged = Vec::with_capacity(picked.len());
    let mut rows: Vec<RowDVector<f64>> = Vec::with_capacity(picked.len());
    for e in picked {
        let value = read_result(res, e.meas_type, e.element_type, e.element, e.side)?;
        let std_dev = match e.meas_type {
            MeasKind::V => (0.5 * inst_err * value).abs(),
            _ => (inst_err * value).abs(),
        };
        let name = match e.element_type {
            ElementKind::Bus => meas_name(e.meas_type, e.element_type, e.element, None),
            _ => meas_name(
                e.meas_type,
                e.element_type,
                e.element,
                Some((e.side_idx, e.other_side_idx)),
            ),
        };
        let row = match (e.meas_type, e.element_type, e.side) {
            (MeasKind::P, ElementKind::Bus, _) => Some(RowKey::Injection { bus: e.element }),
            (MeasKind::P, element, Some(side)) => Some(RowKey::Flow {
                element,
                id: e.element,
                side,
            }),
            _ => None,
        };
        let row = match row {
            Some(key) => h.row(&key).ok_or_else(|| MeasError::MissingRow(name.clone()))?,
            None => RowDVector::zeros(n_buses),
        };
        debug!(%name, value, std_dev, "measurement");
        staged.push((e, value, std_dev, name));
        rows.push(row);
    }

    let labels: Vec<String> = staged.iter().map(|s| s.3.clone()).collect();
    let bus_order = res.bus_order.clone();
    for (e, value, std_dev, name) in staged {
        grid.measurement
            .register(e.meas_type, e.element_type, value, std_dev, e.element, e.side, name);
    }

    let mut data = DMatrix::zeros(rows.len(), n_buses);
    for (i, r) in rows.iter().enumerate() {
        data.set_row(i, r);
    }
    Ok(MeasurementMatrices::new(&grid.net, labels, data, bus_order))
}
