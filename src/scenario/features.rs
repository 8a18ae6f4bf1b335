//! Row-oriented feature tables, one row per scenario.

use std::path::Path;

use tracing::info;

use super::ScenarioSet;
use crate::error::{MeasError, Result};

/// Column holding the scenario id in every feature table.
pub const ID_COLUMN: &str = "l_scenario_id";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    pub columns: Vec<String>,
    pub ids: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureTable {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Values of one named column, if present.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let c = self.columns.iter().position(|x| x == name)?;
        Some(self.rows.iter().map(|r| r[c]).collect())
    }

    /// Writes `l_scenario_id` followed by the feature columns.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(std::iter::once(ID_COLUMN).chain(self.columns.iter().map(String::as_str)))?;
        for (id, row) in self.ids.iter().zip(&self.rows) {
            let mut record = Vec::with_capacity(row.len() + 1);
            record.push(id.clone());
            record.extend(row.iter().map(|v| v.to_string()));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Measurement values per scenario. Column names come from the first
/// scenario's measurement table.
pub fn meas2features(set: &ScenarioSet) -> FeatureTable {
    info!(scenarios = set.len(), "converting measurements to features");
    let columns = set
        .grids
        .first()
        .map(|g| g.measurement.names())
        .unwrap_or_default();
    FeatureTable {
        columns,
        ids: set.ids.clone(),
        rows: set.grids.iter().map(|g| g.measurement.values()).collect(),
    }
}

/// Solved bus states per scenario: `vm_{bus}` columns then `va_{bus}`
/// columns in radians, both in result-table bus order.
pub fn pf_states2features(set: &ScenarioSet) -> std::result::Result<FeatureTable, MeasError> {
    states2features(set, true)
}

/// Bus angles only, for DC-solved scenarios.
pub fn pfdc_states2features(set: &ScenarioSet) -> std::result::Result<FeatureTable, MeasError> {
    states2features(set, false)
}

fn states2features(set: &ScenarioSet, with_vm: bool) -> std::result::Result<FeatureTable, MeasError> {
    info!(scenarios = set.len(), with_vm, "converting states to features");
    let Some(first) = set.grids.first() else {
        return Ok(FeatureTable::default());
    };
    let order = &first.res().ok_or(MeasError::NoResults)?.bus_order;

    let mut columns = Vec::new();
    if with_vm {
        columns.extend(order.iter().map(|b| format!("vm_{b}")));
    }
    columns.extend(order.iter().map(|b| format!("va_{b}")));

    let rows = set
        .grids
        .iter()
        .map(|g| {
            let res = g.res().ok_or(MeasError::NoResults)?;
            let mut row = Vec::with_capacity(columns.len());
            if with_vm {
                row.extend(order.iter().map(|&b| res.res_bus[b].vm_pu));
            }
            row.extend(order.iter().map(|&b| res.res_bus[b].va_degree.to_radians()));
            Ok(row)
        })
        .collect::<std::result::Result<Vec<_>, MeasError>>()?;

    Ok(FeatureTable {
        columns,
        ids: set.ids.clone(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::{DcPowerFlow, NewtonEngine};
    use crate::grid::Grid;
    use crate::measurement::{ElementKind, gen_meas, gen_meas_picker};
    use crate::sensitivity::{ImpedanceBase, gen_h4all};
    use crate::testcases::*;

    fn solved_set() -> ScenarioSet {
        let engine: NewtonEngine = NewtonEngine::default();
        let mut grid = Grid::from(simple_4bus_trafo());
        grid.solve(&engine).unwrap();
        let h = gen_h4all(&grid.net, ImpedanceBase::Exact).unwrap();
        let mut t = gen_meas_picker(&grid.net);
        t.iter_mut()
            .for_each(|e| e.meas_picked = e.element_type == ElementKind::Bus && e.meas_type == crate::measurement::MeasKind::V);
        gen_meas(&mut grid, &t, &h, 0.02).unwrap();
        ScenarioSet {
            ids: vec!["t0".into(), "t1".into()],
            grids: vec![grid.clone(), grid],
            failed: Vec::new(),
        }
    }

    #[test]
    fn test_meas_features() {
        let set = solved_set();
        let f = meas2features(&set);
        assert_eq!(f.columns, vec!["v0", "v2", "v1", "v3"]);
        assert_eq!(f.ids, vec!["t0", "t1"]);
        assert_eq!(f.rows[1], set.grids[1].measurement.values());
    }

    #[test]
    fn test_state_features_in_result_order() {
        let set = solved_set();
        let f = pf_states2features(&set).unwrap();
        assert_eq!(
            f.columns,
            vec!["vm_0", "vm_2", "vm_1", "vm_3", "va_0", "va_2", "va_1", "va_3"]
        );
        let res = set.grids[0].res().unwrap();
        assert_eq!(f.column("vm_1").unwrap()[0], res.res_bus[1].vm_pu);
        assert_eq!(f.column("va_3").unwrap()[0], res.res_bus[3].va_degree.to_radians());
    }

    #[test]
    fn test_dc_state_features() {
        let engine = DcPowerFlow::default();
        let mut grid = Grid::from(simple_3bus());
        grid.solve(&engine).unwrap();
        let set = ScenarioSet {
            ids: vec!["d0".into()],
            grids: vec![grid],
            failed: Vec::new(),
        };
        let f = pfdc_states2features(&set).unwrap();
        assert_eq!(f.columns, vec!["va_0", "va_1", "va_2"]);
        assert_eq!(f.rows[0][0], 0.0);
        assert!(f.rows[0][2] < f.rows[0][1]);
    }

    #[test]
    fn test_states_require_results() {
        let set = ScenarioSet {
            ids: vec!["x".into()],
            grids: vec![Grid::from(simple_3bus())],
            failed: Vec::new(),
        };
        assert_eq!(pf_states2features(&set), Err(MeasError::NoResults));
    }

    #[test]
    fn test_write_csv() {
        let set = solved_set();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meas.csv");
        meas2features(&set).write_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("l_scenario_id,v0,v2,v1,v3"));
        assert!(lines.next().unwrap().starts_with("t0,"));
        assert_eq!(text.lines().count(), 3);
    }
}
