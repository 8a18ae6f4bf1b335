pub mod admittance;
pub mod res_display;
pub mod results;
#[allow(clippy::module_inception)]
pub mod system;

pub use admittance::*;
pub use res_display::ResultDisplay;
pub use results::*;
pub use system::*;
