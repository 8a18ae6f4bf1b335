use crate::basic::PowerFlowEngine;
use crate::basic::system::PfResults;
use crate::error::PowerFlowError;
use crate::io::pandapower::Network;
use crate::measurement::MeasurementTable;

/// A network together with its latest power-flow results and registered
/// measurements. Cloning yields a fully independent scenario.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    pub net: Network,
    pub res: Option<PfResults>,
    pub measurement: MeasurementTable,
}

impl From<Network> for Grid {
    fn from(net: Network) -> Self {
        Self {
            net,
            ..Default::default()
        }
    }
}

impl Grid {
    /// Solves the network. Results are kept only when the solve succeeds.
    pub fn solve(&mut self, engine: &dyn PowerFlowEngine) -> Result<&PfResults, PowerFlowError> {
        self.res = None;
        let res = engine.solve(&self.net)?;
        Ok(self.res.insert(res))
    }

    pub fn res(&self) -> Option<&PfResults> {
        self.res.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::NewtonEngine;
    use crate::testcases::simple_3bus;

    #[test]
    fn test_failed_solve_clears_results() {
        let mut grid = Grid::from(simple_3bus());
        let engine: NewtonEngine = NewtonEngine::default();
        assert!(grid.solve(&engine).is_ok());
        assert!(grid.res().is_some());

        grid.net.scale_loads(&[1000.0, 1000.0]).unwrap();
        let engine = NewtonEngine::<crate::basic::solver::DefaultSolver>::new(1e-8, 10);
        assert!(grid.solve(&engine).is_err());
        assert!(grid.res().is_none());
    }
}
