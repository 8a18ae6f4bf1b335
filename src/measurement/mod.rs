//! Measurement model: selection template, generation from solved networks,
//! refresh from new results and noise.

pub mod generator;
pub mod noise;
pub mod template;
pub mod update;

use derive_more::{Deref, DerefMut, Display, From};
use serde::{Deserialize, Serialize};

use crate::basic::system::PfResults;
use crate::error::MeasError;

pub use generator::{MeasurementMatrices, gen_meas};
pub use noise::{NoiseMode, gen_noisy_meas};
pub use template::{MeasTemplate, TemplateEntry, gen_meas_picker};
pub use update::update_meas;

/// Measured quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum MeasKind {
    #[display("v")]
    V,
    #[display("p")]
    P,
    #[display("q")]
    Q,
    #[display("i")]
    I,
}

/// Network element a measurement is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    #[display("bus")]
    Bus,
    #[display("line")]
    Line,
    #[display("trafo")]
    Trafo,
}

/// Branch terminal. Lines use `From`/`To`, transformers `Hv`/`Lv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[display("from")]
    From,
    #[display("to")]
    To,
    #[display("hv")]
    Hv,
    #[display("lv")]
    Lv,
}

impl Side {
    /// Whether this side names a terminal of the given element type.
    pub fn belongs_to(self, element: ElementKind) -> bool {
        matches!(
            (element, self),
            (ElementKind::Line, Side::From | Side::To) | (ElementKind::Trafo, Side::Hv | Side::Lv)
        )
    }
}

pub(crate) fn side_str(side: Option<Side>) -> String {
    side.map(|s| s.to_string()).unwrap_or_else(|| "none".to_owned())
}

/// One registered measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub measurement_type: MeasKind,
    pub element_type: ElementKind,
    pub element: usize,
    pub side: Option<Side>,
    pub value: f64,
    pub std_dev: f64,
}

/// Measurement name as used for feature columns, e.g. `v3` or `pfl0_1_2`.
///
/// Branch names carry the measured terminal bus first and the opposite bus
/// second.
pub fn meas_name(
    kind: MeasKind,
    element_type: ElementKind,
    element: usize,
    buses: Option<(i64, i64)>,
) -> String {
    match (element_type, buses) {
        (ElementKind::Bus, _) | (_, None) => format!("{kind}{element}"),
        (ElementKind::Line, Some((a, b))) => format!("{kind}fl{element}_{a}_{b}"),
        (ElementKind::Trafo, Some((a, b))) => format!("{kind}ft{element}_{a}_{b}"),
    }
}

/// Measurements of one grid in registration order.
#[derive(Debug, Clone, Default, PartialEq, Deref, DerefMut, From, Serialize, Deserialize)]
pub struct MeasurementTable(pub Vec<Measurement>);

impl MeasurementTable {
    /// Appends a measurement and returns its position.
    #[allow(clippy::too_many_arguments)]
    pub fn register(
        &mut self,
        measurement_type: MeasKind,
        element_type: ElementKind,
        value: f64,
        std_dev: f64,
        element: usize,
        side: Option<Side>,
        name: String,
    ) -> usize {
        self.0.push(Measurement {
            name,
            measurement_type,
            element_type,
            element,
            side,
            value,
            std_dev,
        });
        self.0.len() - 1
    }

    pub fn names(&self) -> Vec<String> {
        self.iter().map(|m| m.name.clone()).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.iter().map(|m| m.value).collect()
    }
}

/// Reads one quantity from the result tables.
pub(crate) fn read_result(
    res: &PfResults,
    kind: MeasKind,
    element_type: ElementKind,
    element: usize,
    side: Option<Side>,
) -> Result<f64, MeasError> {
    let unsupported = || MeasError::Unsupported {
        meas_type: kind.to_string(),
        element_type: element_type.to_string(),
        element,
        side: side_str(side),
    };
    let missing = || MeasError::UnknownElement {
        element_type: element_type.to_string(),
        element,
    };
    match element_type {
        ElementKind::Bus => {
            if side.is_some() {
                return Err(unsupported());
            }
            let r = res.res_bus.get(element).ok_or_else(missing)?;
            match kind {
                MeasKind::V => Ok(r.vm_pu),
                MeasKind::P => Ok(r.p_mw),
                MeasKind::Q => Ok(r.q_mvar),
                MeasKind::I => Err(unsupported()),
            }
        }
        ElementKind::Line => {
            let r = res.res_line.get(element).ok_or_else(missing)?;
            match (kind, side) {
                (MeasKind::P, Some(Side::From)) => Ok(r.p_from_mw),
                (MeasKind::P, Some(Side::To)) => Ok(r.p_to_mw),
                (MeasKind::Q, Some(Side::From)) => Ok(r.q_from_mvar),
                (MeasKind::Q, Some(Side::To)) => Ok(r.q_to_mvar),
                _ => Err(unsupported()),
            }
        }
        ElementKind::Trafo => {
            let r = res.res_trafo.get(element).ok_or_else(missing)?;
            match (kind, side) {
                (MeasKind::P, Some(Side::Hv)) => Ok(r.p_hv_mw),
                (MeasKind::P, Some(Side::Lv)) => Ok(r.p_lv_mw),
                (MeasKind::Q, Some(Side::Hv)) => Ok(r.q_hv_mvar),
                (MeasKind::Q, Some(Side::Lv)) => Ok(r.q_lv_mvar),
                _ => Err(unsupported()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(meas_name(MeasKind::V, ElementKind::Bus, 3, None), "v3");
        assert_eq!(
            meas_name(MeasKind::P, ElementKind::Line, 0, Some((1, 2))),
            "pfl0_1_2"
        );
        assert_eq!(
            meas_name(MeasKind::Q, ElementKind::Trafo, 4, Some((7, 2))),
            "qft4_7_2"
        );
    }

    #[test]
    fn test_sides() {
        assert!(Side::Hv.belongs_to(ElementKind::Trafo));
        assert!(!Side::Hv.belongs_to(ElementKind::Line));
        assert!(!Side::From.belongs_to(ElementKind::Bus));
    }

    #[test]
    fn test_read_result_rejects_current() {
        let res = PfResults {
            res_line: vec![Default::default()],
            ..Default::default()
        };
        let err = read_result(&res, MeasKind::I, ElementKind::Line, 0, Some(Side::From));
        assert!(matches!(err, Err(MeasError::Unsupported { .. })));
        let err = read_result(&res, MeasKind::P, ElementKind::Line, 3, Some(Side::From));
        assert!(matches!(err, Err(MeasError::UnknownElement { element: 3, .. })));
    }
}
