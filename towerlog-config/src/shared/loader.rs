use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::{
    ConverterConfig, LedgerConfig, PathsConfig, TelemetryConfig, ValidationError,
    WarehouseConfig,
};

/// Complete configuration of a loader run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoaderConfig {
    pub paths: PathsConfig,
    pub converter: ConverterConfig,
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl LoaderConfig {
    /// Validates every section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.paths.validate()?;
        self.converter.validate()?;
        self.warehouse.validate()?;
        self.ledger.validate()
    }
}

impl Config for LoaderConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["converter.args"];
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::{Environment, load_config_from};

    const BASE: &str = "\
paths:
  raw_dir: /srv/symphonie/raw
converter:
  program: nrg-convert
warehouse:
  pool_size: 4
";

    fn load(overlay: &str) -> LoaderConfig {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.yaml"), BASE).unwrap();
        fs::write(dir.path().join("dev.yaml"), overlay).unwrap();

        load_config_from(dir.path(), Environment::Dev).unwrap()
    }

    #[test]
    fn missing_sections_take_defaults() {
        let config = load("{}\n");

        assert_eq!(config.paths.txt_dir.to_str(), Some(PathsConfig::DEFAULT_TXT_DIR));
        assert_eq!(config.converter.args, vec!["{input}", "{output}"]);
        assert_eq!(config.converter.max_attempts, ConverterConfig::DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.warehouse.pool_size, 4);
        assert_eq!(config.warehouse.loggers_table, "NRG_Loggers");
        assert_eq!(config.ledger.uploaded_by, LedgerConfig::DEFAULT_UPLOADED_BY);
        assert!(config.telemetry.metrics_listen.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_unusable_values() {
        let mut config = load("converter:\n  program: nrg-convert\n  max_attempts: 0\n");
        assert_eq!(
            config.validate(),
            Err(ValidationError::Zero {
                field: "converter.max_attempts"
            })
        );

        config.converter.max_attempts = 1;
        config.warehouse.data_table_prefix = " ".to_owned();
        assert_eq!(
            config.validate(),
            Err(ValidationError::Empty {
                field: "warehouse.data_table_prefix"
            })
        );

        config.warehouse.data_table_prefix = "NRG_Tower_SN".to_owned();
        config.paths.txt_dir = config.paths.raw_dir.clone();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidFieldValue {
                field: "paths.txt_dir",
                ..
            })
        ));
    }
}
