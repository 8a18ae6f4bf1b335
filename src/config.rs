//! Run parameters of the dataset pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::measurement::NoiseMode;
use crate::sensitivity::ImpedanceBase;

/// Pipeline settings, usually read from a JSON file.
///
/// Every field is optional in the file; missing fields take the values of
/// [`RunConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Relative instrument error; power std_dev is `|value| * inst_err`.
    pub inst_err: f64,
    /// `gaussian` or `uniform`.
    pub noise_on_meas: String,
    /// Clean load scenarios including the base scenario.
    pub n_l_scenarios: usize,
    /// Noisy copies drawn per clean scenario.
    pub rpt_per_elmnt: usize,
    pub set_id: String,
    /// Seed for load factors and noise. `None` seeds from the OS.
    pub seed: Option<u64>,
    pub impedance_base: ImpedanceBase,
    pub tolerance: f64,
    pub max_iter: usize,
    /// Solve scenarios on the rayon pool; `false` runs on one thread.
    pub parallel: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            inst_err: 0.01,
            noise_on_meas: "gaussian".to_owned(),
            n_l_scenarios: 10,
            rpt_per_elmnt: 1,
            set_id: "s".to_owned(),
            seed: None,
            impedance_base: ImpedanceBase::Exact,
            tolerance: 1e-8,
            max_iter: 100,
            parallel: true,
        }
    }
}

impl RunConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn noise_mode(&self) -> std::result::Result<NoiseMode, ConfigError> {
        self.noise_on_meas.parse()
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let invalid = |field, what: &str| {
            Err(ConfigError::Invalid {
                field,
                what: what.to_owned(),
            })
        };
        if !(self.inst_err >= 0.0 && self.inst_err.is_finite()) {
            return invalid("inst_err", "must be a finite non-negative number");
        }
        if self.n_l_scenarios == 0 {
            return invalid("n_l_scenarios", "at least one scenario is required");
        }
        if self.rpt_per_elmnt == 0 {
            return invalid("rpt_per_elmnt", "must be positive");
        }
        if !(self.tolerance > 0.0) {
            return invalid("tolerance", "must be positive");
        }
        if self.max_iter == 0 {
            return invalid("max_iter", "must be positive");
        }
        self.noise_mode()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let cfg = RunConfig::from_json(r#"{"n_l_scenarios": 50, "seed": 7, "impedance_base": "truncated"}"#).unwrap();
        assert_eq!(cfg.n_l_scenarios, 50);
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.impedance_base, ImpedanceBase::Truncated);
        assert_eq!(cfg.inst_err, 0.01);
        assert_eq!(cfg.noise_mode(), Ok(NoiseMode::Gaussian));
    }

    #[test]
    fn test_unknown_noise_mode() {
        let err = RunConfig::from_json(r#"{"noise_on_meas": "pink"}"#).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::UnknownNoiseMode(ref m)) if m == "pink"
        ));
    }

    #[test]
    fn test_rejects_bad_values() {
        let cfg = RunConfig {
            n_l_scenarios: 0,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "n_l_scenarios", .. })
        ));
        let cfg = RunConfig {
            inst_err: -0.1,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, serde_json::to_string(&RunConfig::default()).unwrap()).unwrap();
        assert_eq!(RunConfig::load(&path).unwrap(), RunConfig::default());
    }
}
