pub mod artifacts;
pub mod pandapower;
