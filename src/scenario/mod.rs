//! Randomized load scenarios around a solved base grid.

pub mod features;

use rand::Rng;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::basic::PowerFlowEngine;
use crate::error::{ConfigError, Error, PowerFlowError, Result};
use crate::grid::Grid;
use crate::measurement::update_meas;

pub use features::{FeatureTable, meas2features, pf_states2features, pfdc_states2features};

/// Lower and upper bound of the per-load scaling factor.
pub const LOAD_FACTOR_RANGE: std::ops::Range<f64> = 0.1..1.1;

/// An ensemble of scenarios sharing a measurement layout.
///
/// `ids[i]` identifies `grids[i]`. Scenarios whose power flow failed are
/// listed in `failed` and are not part of `grids`.
#[derive(Debug, Clone, Default)]
pub struct ScenarioSet {
    pub ids: Vec<String>,
    pub grids: Vec<Grid>,
    pub failed: Vec<(String, PowerFlowError)>,
}

impl ScenarioSet {
    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Grid)> + '_ {
        self.ids.iter().map(String::as_str).zip(self.grids.iter())
    }
}

/// Draws one factor per load, uniform in [`LOAD_FACTOR_RANGE`].
pub fn draw_load_factors<R: Rng + ?Sized>(n_loads: usize, rng: &mut R) -> Vec<f64> {
    (0..n_loads)
        .map(|_| rng.gen_range(LOAD_FACTOR_RANGE))
        .collect()
}

/// Builds `n_l_scenarios` clean scenarios from `base`.
///
/// Scenario 0 is a copy of `base`. Every other scenario scales each load's
/// active and reactive demand by its own uniform factor, is re-solved with
/// `engine` and has its registered measurements refreshed. Factor vectors
/// are drawn in id order before any solve, so a seeded `rng` makes the
/// ensemble reproducible regardless of how the solves are scheduled.
pub fn gen_clean_scen_unfrm<R: Rng + ?Sized>(
    base: &Grid,
    n_l_scenarios: usize,
    set_id: &str,
    engine: &dyn PowerFlowEngine,
    rng: &mut R,
) -> Result<ScenarioSet> {
    if n_l_scenarios == 0 {
        return Err(ConfigError::Invalid {
            field: "n_l_scenarios",
            what: "at least one scenario is required".to_owned(),
        }
        .into());
    }
    info!(n_l_scenarios, set_id, "generating clean scenarios");

    let n_loads = base.net.loads().len();
    let jobs: Vec<(String, Vec<f64>)> = (1..n_l_scenarios)
        .map(|i| (format!("{set_id}{i}"), draw_load_factors(n_loads, rng)))
        .collect();

    let outcomes: Vec<(String, Result<Grid>)> = jobs
        .into_par_iter()
        .map(|(id, factors)| {
            let outcome = perturbed(base, &factors, engine);
            (id, outcome)
        })
        .collect();

    let mut set = ScenarioSet {
        ids: vec![format!("{set_id}0")],
        grids: vec![base.clone()],
        failed: Vec::new(),
    };
    for (id, outcome) in outcomes {
        match outcome {
            Ok(grid) => {
                set.ids.push(id);
                set.grids.push(grid);
            }
            Err(Error::PowerFlow(e)) => {
                warn!(scenario = %id, error = %e, "scenario excluded");
                set.failed.push((id, e));
            }
            Err(e) => return Err(e),
        }
    }
    info!(
        generated = set.len(),
        failed = set.failed.len(),
        "clean scenarios done"
    );
    Ok(set)
}

fn perturbed(base: &Grid, factors: &[f64], engine: &dyn PowerFlowEngine) -> Result<Grid> {
    let mut grid = base.clone();
    grid.net.scale_loads(factors)?;
    grid.solve(engine)?;
    update_meas(&mut grid)?;
    Ok(grid)
}

/// Repeats every scenario `rpt_per_elmnt` times in place order, so that
/// `a, b` becomes `a, a, b, b` for two repetitions.
pub fn duplicate_scenarios(set: &ScenarioSet, rpt_per_elmnt: usize) -> ScenarioSet {
    info!(rpt_per_elmnt, "duplicating scenarios");
    let mut out = ScenarioSet {
        failed: set.failed.clone(),
        ..Default::default()
    };
    for (id, grid) in set.iter() {
        for _ in 0..rpt_per_elmnt {
            out.ids.push(id.to_owned());
            out.grids.push(grid.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::NewtonEngine;
    use crate::basic::solver::DefaultSolver;
    use crate::measurement::{gen_meas, gen_meas_picker};
    use crate::sensitivity::{ImpedanceBase, gen_h4all};
    use crate::testcases::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn base_grid() -> Grid {
        let engine: NewtonEngine = NewtonEngine::default();
        let mut grid = Grid::from(simple_3bus());
        grid.solve(&engine).unwrap();
        let h = gen_h4all(&grid.net, ImpedanceBase::Exact).unwrap();
        let t = gen_meas_picker(&grid.net);
        gen_meas(&mut grid, &t, &h, 0.01).unwrap();
        grid
    }

    #[test]
    fn test_single_scenario_is_base() {
        let base = base_grid();
        let engine: NewtonEngine = NewtonEngine::default();
        let mut rng = StdRng::seed_from_u64(1);
        let set = gen_clean_scen_unfrm(&base, 1, "train", &engine, &mut rng).unwrap();
        assert_eq!(set.ids, vec!["train0"]);
        assert_eq!(set.grids, vec![base]);
        assert!(set.failed.is_empty());
    }

    #[test]
    fn test_zero_scenarios_rejected() {
        let base = base_grid();
        let engine: NewtonEngine = NewtonEngine::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            gen_clean_scen_unfrm(&base, 0, "s", &engine, &mut rng),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_scenarios_scale_loads() {
        let base = base_grid();
        let engine: NewtonEngine = NewtonEngine::default();
        let mut rng = StdRng::seed_from_u64(42);
        let set = gen_clean_scen_unfrm(&base, 5, "s", &engine, &mut rng).unwrap();
        assert_eq!(set.ids, vec!["s0", "s1", "s2", "s3", "s4"]);

        let mut rng = StdRng::seed_from_u64(42);
        for grid in &set.grids[1..] {
            let factors = draw_load_factors(2, &mut rng);
            for ((load, base_load), f) in grid.net.loads().iter().zip(base.net.loads()).zip(&factors) {
                assert!(LOAD_FACTOR_RANGE.contains(f));
                assert_eq!(load.p_mw, base_load.p_mw * f);
                assert_eq!(load.q_mvar, base_load.q_mvar * f);
            }
            let res = grid.res().unwrap();
            assert_eq!(grid.measurement.len(), base.measurement.len());
            assert_eq!(grid.measurement[0].value, res.res_line[0].p_from_mw);
            assert_eq!(grid.measurement[0].std_dev, base.measurement[0].std_dev);
        }
        // the base copy is untouched
        assert_eq!(base.net.loads()[0].p_mw, 1.0);
    }

    #[test]
    fn test_seeded_ensembles_match() {
        let base = base_grid();
        let engine: NewtonEngine = NewtonEngine::default();
        let a = gen_clean_scen_unfrm(&base, 4, "s", &engine, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = gen_clean_scen_unfrm(&base, 4, "s", &engine, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a.grids, b.grids);
    }

    #[test]
    fn test_failed_scenarios_are_excluded() {
        let mut base = base_grid();
        base.net.scale_loads(&[5000.0, 5000.0]).unwrap();
        let engine = NewtonEngine::<DefaultSolver>::new(1e-8, 10);
        let mut rng = StdRng::seed_from_u64(5);
        let set = gen_clean_scen_unfrm(&base, 3, "s", &engine, &mut rng).unwrap();
        assert_eq!(set.ids, vec!["s0"]);
        let failed: Vec<&str> = set.failed.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(failed, vec!["s1", "s2"]);
        for (_, e) in &set.failed {
            assert!(matches!(e, PowerFlowError::NotConverged { .. } | PowerFlowError::LinearSolve(_)));
        }
    }

    #[test]
    fn test_duplicate() {
        let base = base_grid();
        let set = ScenarioSet {
            ids: vec!["a".into(), "b".into()],
            grids: vec![base.clone(), Grid::default()],
            failed: Vec::new(),
        };
        let dup = duplicate_scenarios(&set, 3);
        assert_eq!(dup.ids, vec!["a", "a", "a", "b", "b", "b"]);
        assert_eq!(dup.grids[2], base);
        assert_eq!(dup.grids[3], Grid::default());
    }
}
