pub(crate) mod dsbus_dv;
pub(crate) mod newtonpf;

pub mod powerflow;
pub mod solver;
pub(crate) mod sparse;
pub mod system;

pub use newtonpf::newton_pf;
pub use powerflow::{DcPowerFlow, NewtonEngine, PowerFlowEngine};
