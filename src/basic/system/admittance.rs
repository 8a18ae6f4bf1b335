use nalgebra::Complex;
use serde::{Deserialize, Serialize};

/// Represents the ground node in the network.
pub const GND: i32 = -1;

/// Per-unit admittance value.
#[derive(Clone, Copy, Default, PartialEq, Debug, Serialize, Deserialize)]
pub struct Admittance(pub Complex<f64>);

/// Two terminals of an admittance; the second one may be [`GND`].
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Port2(pub nalgebra::Vector2<i32>);

impl std::ops::Index<usize> for Port2 {
    type Output = i32;
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

/// One admittance between two nodes, the unit of incidence-matrix assembly.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct AdmittanceBranch {
    pub y: Admittance,
    pub port: Port2,
}

/// Pi-equivalent of a line or transformer in per unit.
///
/// `from` is the line from-bus or the transformer HV bus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PiBranch {
    pub from: usize,
    pub to: usize,
    pub y_series: Complex<f64>,
    pub y_from: Complex<f64>,
    pub y_to: Complex<f64>,
    pub in_service: bool,
}

impl PiBranch {
    /// Decomposes the branch into series and ground admittances.
    pub fn admittances(&self) -> impl Iterator<Item = AdmittanceBranch> + '_ {
        let (f, t) = (self.from as i32, self.to as i32);
        [
            (self.y_series, Port2(nalgebra::vector![f, t])),
            (self.y_from, Port2(nalgebra::vector![f, GND])),
            (self.y_to, Port2(nalgebra::vector![t, GND])),
        ]
        .into_iter()
        .filter(|(y, _)| *y != Complex::new(0.0, 0.0))
        .map(|(y, port)| AdmittanceBranch {
            y: Admittance(y),
            port,
        })
    }

    /// Terminal currents `(i_from, i_to)` in per unit, positive into the branch.
    pub fn currents(&self, v_from: Complex<f64>, v_to: Complex<f64>) -> (Complex<f64>, Complex<f64>) {
        let i_series = self.y_series * (v_from - v_to);
        (i_series + self.y_from * v_from, -i_series + self.y_to * v_to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pi_currents_balance() {
        let br = PiBranch {
            from: 0,
            to: 1,
            y_series: Complex::new(2.0, -8.0),
            y_from: Complex::new(0.0, 0.01),
            y_to: Complex::new(0.0, 0.01),
            in_service: true,
        };
        let (vf, vt) = (Complex::new(1.0, 0.0), Complex::from_polar(0.98, -0.02));
        let (i_f, i_t) = br.currents(vf, vt);
        // series current leaves one end and enters the other
        let shunt = br.y_from * vf + br.y_to * vt;
        assert!((i_f + i_t - shunt).norm() < 1e-12);
        assert_eq!(br.admittances().count(), 3);
    }
}
