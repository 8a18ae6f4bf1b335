//! Linearized (DC) power-flow sensitivity of branch flows and bus injections
//! with respect to bus voltage angles.

pub mod hmatrix;
pub mod perunit;

pub use hmatrix::{HRow, RowKey, SensitivityMatrix, gen_h4all};
pub use perunit::ImpedanceBase;
