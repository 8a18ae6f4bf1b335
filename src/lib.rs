pub mod basic;
pub mod config;
pub mod error;
pub mod grid;
pub mod io;
pub mod measurement;
pub mod scenario;
pub mod sensitivity;
pub mod testcases;

pub use error::{Error, Result};

pub mod prelude {
    pub use crate::basic::system::{PfResults, ResultDisplay};
    pub use crate::basic::{DcPowerFlow, NewtonEngine, PowerFlowEngine};
    pub use crate::config::RunConfig;
    pub use crate::error::{ConfigError, MeasError, NetworkError, PowerFlowError};
    pub use crate::grid::Grid;
    pub use crate::io::pandapower;
    pub use crate::measurement::*;
    pub use crate::scenario::*;
    pub use crate::sensitivity::*;
}
