use super::read_result;
use crate::error::MeasError;
use crate::grid::Grid;

/// Refreshes every registered measurement value from the grid's latest
/// results. Names, standard deviations and kinds are left untouched.
///
/// Nothing is written unless every measurement can be read.
pub fn update_meas(grid: &mut Grid) -> Result<(), MeasError> {
    let res = grid.res.as_ref().ok_or(MeasError::NoResults)?;
    let values = grid
        .measurement
        .iter()
        .map(|m| read_result(res, m.measurement_type, m.element_type, m.element, m.side))
        .collect::<Result<Vec<_>, _>>()?;
    grid.measurement
        .iter_mut()
        .zip(values)
        .for_each(|(m, v)| m.value = v);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::NewtonEngine;
    use crate::measurement::{ElementKind, MeasKind, Side, gen_meas, gen_meas_picker};
    use crate::sensitivity::{ImpedanceBase, gen_h4all};
    use crate::testcases::*;

    #[test]
    fn test_update_after_rescale() {
        let net = simple_4bus_trafo();
        let engine: NewtonEngine = NewtonEngine::default();
        let mut grid = Grid::from(net.clone());
        grid.solve(&engine).unwrap();
        let h = gen_h4all(&net, ImpedanceBase::Exact).unwrap();
        let mut t = gen_meas_picker(&net);
        t.iter_mut().for_each(|e| e.meas_picked |= e.element_type == ElementKind::Bus);
        gen_meas(&mut grid, &t, &h, 0.01).unwrap();
        let before = grid.measurement.clone();

        grid.net.scale_loads(&[0.5, 0.5, 0.5]).unwrap();
        grid.solve(&engine).unwrap();
        update_meas(&mut grid).unwrap();

        assert_eq!(grid.measurement.len(), before.len());
        let res = grid.res().unwrap();
        for (new, old) in grid.measurement.iter().zip(before.iter()) {
            assert_eq!(new.name, old.name);
            assert_eq!(new.std_dev, old.std_dev);
            assert_eq!(new.measurement_type, old.measurement_type);
        }
        let p_hv = grid
            .measurement
            .iter()
            .find(|m| m.element_type == ElementKind::Trafo && m.side == Some(Side::Hv) && m.measurement_type == MeasKind::P)
            .unwrap();
        assert_eq!(p_hv.value, res.res_trafo[0].p_hv_mw);
        let v3 = grid.measurement.iter().find(|m| m.name == "v3").unwrap();
        assert_eq!(v3.value, res.res_bus[3].vm_pu);
    }

    #[test]
    fn test_update_without_results() {
        let mut grid = Grid::from(simple_3bus());
        assert_eq!(update_meas(&mut grid), Err(MeasError::NoResults));
    }

    #[test]
    fn test_update_missing_element() {
        let engine: NewtonEngine = NewtonEngine::default();
        let mut grid = Grid::from(simple_3bus());
        grid.solve(&engine).unwrap();
        grid.measurement
            .register(MeasKind::P, ElementKind::Line, 1.0, 0.1, 9, Some(Side::From), "pfl9_0_1".into());
        assert!(matches!(
            update_meas(&mut grid),
            Err(MeasError::UnknownElement { element: 9, .. })
        ));
        assert_eq!(grid.measurement[0].value, 1.0);
    }
}
