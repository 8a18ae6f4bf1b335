use std::str::FromStr;

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ConfigError, MeasError};
use crate::grid::Grid;

/// Noise model imposed on clean measurement values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseMode {
    /// `N(value, std_dev)`
    Gaussian,
    /// `U[value - std_dev, value + std_dev)`
    Uniform,
}

impl FromStr for NoiseMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gaussian" => Ok(NoiseMode::Gaussian),
            "uniform" => Ok(NoiseMode::Uniform),
            _ => Err(ConfigError::UnknownNoiseMode(s.to_owned())),
        }
    }
}

impl NoiseMode {
    /// Draws one noisy value around `value` with spread `std_dev`, which must
    /// be finite. A spread too small to move `value` returns it unchanged.
    pub fn sample<R: Rng + ?Sized>(self, value: f64, std_dev: f64, rng: &mut R) -> f64 {
        let s = std_dev.abs();
        match self {
            NoiseMode::Gaussian => match Normal::new(value, s) {
                Ok(d) => d.sample(rng),
                Err(_) => value,
            },
            NoiseMode::Uniform => {
                let (lo, hi) = (value - s, value + s);
                if lo < hi { rng.gen_range(lo..hi) } else { value }
            }
        }
    }
}

/// Replaces every measurement value of every grid by a noisy draw.
///
/// All standard deviations are checked first; on error no value is changed.
pub fn gen_noisy_meas<R: Rng + ?Sized>(
    grids: &mut [Grid],
    mode: NoiseMode,
    rng: &mut R,
) -> Result<(), MeasError> {
    if let Some(m) = grids
        .iter()
        .flat_map(|g| g.measurement.iter())
        .find(|m| !m.std_dev.is_finite())
    {
        return Err(MeasError::InvalidStdDev {
            name: m.name.clone(),
            std_dev: m.std_dev,
        });
    }
    info!(scenarios = grids.len(), ?mode, "adding noise to measurements");
    for grid in grids.iter_mut() {
        for m in grid.measurement.iter_mut() {
            m.value = mode.sample(m.value, m.std_dev, rng);
        }
    }
    Ok(())
}
