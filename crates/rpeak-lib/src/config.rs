use crate::{detectors::EcgPipelineConfig, error::Result, scoring::ScoringConfig};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration, usually read from a TOML file.
///
/// ```toml
/// [detector]
/// refractory_s = 0.25
///
/// [detector.heart_rate]
/// window_s = 10.0
///
/// [scoring]
/// tolerance_s = 0.075
/// heart_rate = { policy = "within", max_relative_deviation = 0.05 }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpeakConfig {
    pub detector: EcgPipelineConfig,
    pub scoring: ScoringConfig,
}

impl RpeakConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let cfg: RpeakConfig = toml::from_str(text).context("invalid configuration TOML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        self.detector.validate()?;
        self.scoring.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::HeartRateScoring;
    use std::io::Write;

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = RpeakConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, RpeakConfig::default());
        assert_eq!(cfg.scoring.tolerance_s, 0.075);
        assert_eq!(cfg.detector.refractory_s, 0.2);
    }

    #[test]
    fn partial_sections_override_fields() {
        let cfg = RpeakConfig::from_toml_str(
            r#"
            [detector]
            refractory_s = 0.25

            [detector.heart_rate]
            window_s = 10.0

            [scoring]
            edge_margin_s = 0.5
            heart_rate = { policy = "within", max_relative_deviation = 0.05 }
            "#,
        )
        .unwrap();
        assert_eq!(cfg.detector.refractory_s, 0.25);
        assert_eq!(cfg.detector.lowcut_hz, 5.0);
        assert_eq!(cfg.detector.heart_rate.window_s, 10.0);
        assert_eq!(cfg.detector.heart_rate.min_window_s, 2.0);
        assert_eq!(cfg.scoring.edge_margin_s, Some(0.5));
        assert_eq!(
            cfg.scoring.heart_rate,
            HeartRateScoring::Within {
                max_relative_deviation: 0.05
            }
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = RpeakConfig::from_toml_str("[scoring]\ntolerance_s = -1.0\n").unwrap_err();
        assert!(format!("{:#}", err).contains("tolerance_s"));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scoring]\nsampling_rate_hz = 360.0").unwrap();
        let cfg = RpeakConfig::load(file.path()).unwrap();
        assert_eq!(cfg.scoring.sampling_rate_hz, 360.0);
    }
}
