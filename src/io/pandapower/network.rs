use super::file_io::*;
use crate::error::NetworkError;

/// Read-only views over the optional element tables.
impl Network {
    pub fn lines(&self) -> &[Line] {
        self.line.as_deref().unwrap_or(&[])
    }
    pub fn trafos(&self) -> &[Transformer] {
        self.trafo.as_deref().unwrap_or(&[])
    }
    pub fn loads(&self) -> &[Load] {
        self.load.as_deref().unwrap_or(&[])
    }
    pub fn gens(&self) -> &[Gen] {
        self.r#gen.as_deref().unwrap_or(&[])
    }
    pub fn sgens(&self) -> &[SGen] {
        self.sgen.as_deref().unwrap_or(&[])
    }
    pub fn shunts(&self) -> &[Shunt] {
        self.shunt.as_deref().unwrap_or(&[])
    }
    pub fn ext_grids(&self) -> &[ExtGrid] {
        self.ext_grid.as_deref().unwrap_or(&[])
    }

    /// Number of buses, which is also the number of angle states in the DC model.
    pub fn n_buses(&self) -> usize {
        self.bus.len()
    }

    /// Bus indices in table order, the order used by the result tables.
    pub fn bus_order(&self) -> Vec<usize> {
        self.bus.iter().map(|b| b.index as usize).collect()
    }

    /// Looks up a bus record by its index.
    pub fn bus_by_index(&self, index: i64) -> Option<&Bus> {
        self.bus.iter().find(|b| b.index == index)
    }

    /// Buses held by in-service external grids, deduplicated, in table order.
    pub fn slack_buses(&self) -> Vec<usize> {
        let mut out: Vec<usize> = Vec::new();
        for ext in self.ext_grids().iter().filter(|e| e.in_service) {
            let bus = ext.bus as usize;
            if !out.contains(&bus) {
                out.push(bus);
            }
        }
        out
    }

    /// Checks the dense bus index invariant and every element's bus references.
    pub fn validate(&self) -> Result<(), NetworkError> {
        let n = self.bus.len();
        let mut seen = vec![false; n];
        for bus in &self.bus {
            if bus.index < 0 || bus.index as usize >= n {
                return Err(NetworkError::NonDenseBusIndex {
                    index: bus.index,
                    n,
                });
            }
            let slot = &mut seen[bus.index as usize];
            if *slot {
                return Err(NetworkError::DuplicateBus(bus.index));
            }
            *slot = true;
        }

        let check = |element: &'static str, id: usize, bus: i64| {
            if bus < 0 || bus as usize >= n {
                Err(NetworkError::UnknownBus { element, id, bus })
            } else {
                Ok(())
            }
        };
        for (id, l) in self.lines().iter().enumerate() {
            check("line", id, l.from_bus)?;
            check("line", id, l.to_bus)?;
        }
        for (id, t) in self.trafos().iter().enumerate() {
            check("trafo", id, t.hv_bus)?;
            check("trafo", id, t.lv_bus)?;
        }
        for (id, x) in self.loads().iter().enumerate() {
            check("load", id, x.bus)?;
        }
        for (id, x) in self.gens().iter().enumerate() {
            check("gen", id, x.bus)?;
        }
        for (id, x) in self.sgens().iter().enumerate() {
            check("sgen", id, x.bus)?;
        }
        for (id, x) in self.shunts().iter().enumerate() {
            check("shunt", id, x.bus)?;
        }
        for (id, x) in self.ext_grids().iter().enumerate() {
            check("ext_grid", id, x.bus)?;
        }
        Ok(())
    }

    /// Multiplies active and reactive demand of every load by its factor.
    ///
    /// `factors` must hold one entry per load; otherwise nothing is scaled.
    pub fn scale_loads(&mut self, factors: &[f64]) -> Result<(), NetworkError> {
        let expected = self.loads().len();
        if expected != factors.len() {
            return Err(NetworkError::LoadFactorCount {
                expected,
                got: factors.len(),
            });
        }
        if let Some(loads) = self.load.as_mut() {
            loads.iter_mut().zip(factors).for_each(|(load, f)| {
                load.p_mw *= f;
                load.q_mvar *= f;
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcases::simple_3bus;

    #[test]
    fn test_validate_ok() {
        assert_eq!(simple_3bus().validate(), Ok(()));
    }

    #[test]
    fn test_non_dense_bus() {
        let mut net = simple_3bus();
        net.bus[2].index = 7;
        assert_eq!(
            net.validate(),
            Err(NetworkError::NonDenseBusIndex { index: 7, n: 3 })
        );
    }

    #[test]
    fn test_duplicate_bus() {
        let mut net = simple_3bus();
        net.bus[2].index = 1;
        assert_eq!(net.validate(), Err(NetworkError::DuplicateBus(1)));
    }

    #[test]
    fn test_dangling_line() {
        let mut net = simple_3bus();
        net.line.as_mut().unwrap()[1].to_bus = 5;
        assert_eq!(
            net.validate(),
            Err(NetworkError::UnknownBus {
                element: "line",
                id: 1,
                bus: 5
            })
        );
    }

    #[test]
    fn test_scale_loads() {
        let mut net = simple_3bus();
        let before = net.loads().to_vec();
        net.scale_loads(&[0.5, 2.0]).unwrap();
        assert_eq!(net.loads()[0].p_mw, before[0].p_mw * 0.5);
        assert_eq!(net.loads()[0].q_mvar, before[0].q_mvar * 0.5);
        assert_eq!(net.loads()[1].p_mw, before[1].p_mw * 2.0);
    }

    #[test]
    fn test_scale_loads_wrong_count() {
        let mut net = simple_3bus();
        let before = net.loads().to_vec();
        assert_eq!(
            net.scale_loads(&[0.5]),
            Err(NetworkError::LoadFactorCount {
                expected: 2,
                got: 1
            })
        );
        assert_eq!(net.loads()[0].p_mw, before[0].p_mw);
        assert_eq!(net.loads()[1].q_mvar, before[1].q_mvar);
    }
}
