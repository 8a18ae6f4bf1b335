use std::fmt;

use tabled::{Table, Tabled, settings::Style};

use super::results::PfResults;
use crate::io::pandapower::Network;
use crate::measurement::{MeasurementTable, side_str};

/// A wrapper around a float that limits the number of decimal places when printed.
#[derive(Clone, Copy, PartialEq, PartialOrd)]
pub struct FloatWrapper {
    pub value: f64,
    pub precision: usize,
}

impl FloatWrapper {
    pub fn new(value: f64, precision: usize) -> Self {
        FloatWrapper { value, precision }
    }
}

impl fmt::Display for FloatWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1$}", self.value, self.precision)
    }
}

impl fmt::Debug for FloatWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1$}", self.value, self.precision)
    }
}

/// Table row for display Bus results.
#[derive(Debug, Tabled)]
#[allow(non_snake_case)]
struct BusResTable {
    Bus: usize,
    Vm: FloatWrapper,
    Va: FloatWrapper,
    P_mw: FloatWrapper,
    Q_mvar: FloatWrapper,
}

/// Branch result row shared by lines and transformers.
#[derive(Debug, Tabled)]
struct BranchResTable {
    id: usize,
    from: i64,
    to: i64,
    p_from_mw: FloatWrapper,
    q_from_mvar: FloatWrapper,
    p_to_mw: FloatWrapper,
    q_to_mvar: FloatWrapper,
    pl_mw: FloatWrapper,
    ql_mvar: FloatWrapper,
    i_ka: FloatWrapper,
    loading_percent: FloatWrapper,
}

#[derive(Debug, Tabled)]
struct MeasTable {
    name: String,
    kind: String,
    element: String,
    side: String,
    value: FloatWrapper,
    std_dev: FloatWrapper,
}

/// Markdown tables of power-flow results.
pub trait ResultDisplay {
    fn bus_table(&self) -> String;
    fn line_table(&self, net: &Network) -> String;
    fn trafo_table(&self, net: &Network) -> String;
}

impl ResultDisplay for PfResults {
    fn bus_table(&self) -> String {
        let rows = self.bus_rows().map(|(bus, r)| BusResTable {
            Bus: bus,
            Vm: FloatWrapper::new(r.vm_pu, 5),
            Va: FloatWrapper::new(r.va_degree, 5),
            P_mw: FloatWrapper::new(r.p_mw, 5),
            Q_mvar: FloatWrapper::new(r.q_mvar, 5),
        });
        Table::new(rows).with(Style::markdown()).to_string()
    }

    fn line_table(&self, net: &Network) -> String {
        let rows = self
            .res_line
            .iter()
            .zip(net.lines())
            .enumerate()
            .map(|(id, (r, l))| BranchResTable {
                id,
                from: l.from_bus,
                to: l.to_bus,
                p_from_mw: FloatWrapper::new(r.p_from_mw, 3),
                q_from_mvar: FloatWrapper::new(r.q_from_mvar, 3),
                p_to_mw: FloatWrapper::new(r.p_to_mw, 3),
                q_to_mvar: FloatWrapper::new(r.q_to_mvar, 3),
                pl_mw: FloatWrapper::new(r.pl_mw, 3),
                ql_mvar: FloatWrapper::new(r.ql_mvar, 3),
                i_ka: FloatWrapper::new(r.i_ka, 3),
                loading_percent: FloatWrapper::new(r.loading_percent, 1),
            });
        Table::new(rows).with(Style::markdown()).to_string()
    }

    fn trafo_table(&self, net: &Network) -> String {
        let rows = self
            .res_trafo
            .iter()
            .zip(net.trafos())
            .enumerate()
            .map(|(id, (r, t))| BranchResTable {
                id,
                from: t.hv_bus,
                to: t.lv_bus,
                p_from_mw: FloatWrapper::new(r.p_hv_mw, 3),
                q_from_mvar: FloatWrapper::new(r.q_hv_mvar, 3),
                p_to_mw: FloatWrapper::new(r.p_lv_mw, 3),
                q_to_mvar: FloatWrapper::new(r.q_lv_mvar, 3),
                pl_mw: FloatWrapper::new(r.pl_mw, 3),
                ql_mvar: FloatWrapper::new(r.ql_mvar, 3),
                i_ka: FloatWrapper::new(r.i_hv_ka.max(r.i_lv_ka), 3),
                loading_percent: FloatWrapper::new(r.loading_percent, 1),
            });
        Table::new(rows).with(Style::markdown()).to_string()
    }
}

impl MeasurementTable {
    /// Markdown table of the registered measurements.
    pub fn table(&self) -> String {
        let rows = self.iter().map(|m| MeasTable {
            name: m.name.clone(),
            kind: m.measurement_type.to_string(),
            element: format!("{} {}", m.element_type, m.element),
            side: side_str(m.side),
            value: FloatWrapper::new(m.value, 5),
            std_dev: FloatWrapper::new(m.std_dev, 6),
        });
        Table::new(rows).with(Style::markdown()).to_string()
    }
}
