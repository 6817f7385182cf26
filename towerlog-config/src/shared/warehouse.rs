use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;
use crate::shared::base::non_empty;

/// The DuckDB database receiving measurements and site metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WarehouseConfig {
    #[serde(default = "default_path")]
    pub path: PathBuf,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// Schema holding every table.
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Measurement tables are named `{data_table_prefix}_{site number}`.
    #[serde(default = "default_data_table_prefix")]
    pub data_table_prefix: String,
    #[serde(default = "default_loggers_table")]
    pub loggers_table: String,
    #[serde(default = "default_sensors_table")]
    pub sensors_table: String,
}

impl WarehouseConfig {
    pub const DEFAULT_PATH: &'static str = "duckdb_data/towers.duckdb";

    pub const DEFAULT_POOL_SIZE: u32 = 2;

    pub const DEFAULT_SCHEMA: &'static str = "main";

    pub const DEFAULT_DATA_TABLE_PREFIX: &'static str = "NRG_Tower_SN";

    pub const DEFAULT_LOGGERS_TABLE: &'static str = "NRG_Loggers";

    pub const DEFAULT_SENSORS_TABLE: &'static str = "NRG_Sensors";

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.pool_size == 0 {
            return Err(ValidationError::Zero {
                field: "warehouse.pool_size",
            });
        }

        non_empty("warehouse.schema", &self.schema)?;
        non_empty("warehouse.data_table_prefix", &self.data_table_prefix)?;
        non_empty("warehouse.loggers_table", &self.loggers_table)?;
        non_empty("warehouse.sensors_table", &self.sensors_table)?;

        if self.loggers_table.eq_ignore_ascii_case(&self.sensors_table) {
            return Err(ValidationError::InvalidFieldValue {
                field: "warehouse.sensors_table",
                constraint: "must differ from `warehouse.loggers_table`".to_owned(),
            });
        }

        Ok(())
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            pool_size: default_pool_size(),
            schema: default_schema(),
            data_table_prefix: default_data_table_prefix(),
            loggers_table: default_loggers_table(),
            sensors_table: default_sensors_table(),
        }
    }
}

fn default_path() -> PathBuf {
    PathBuf::from(WarehouseConfig::DEFAULT_PATH)
}

fn default_pool_size() -> u32 {
    WarehouseConfig::DEFAULT_POOL_SIZE
}

fn default_schema() -> String {
    WarehouseConfig::DEFAULT_SCHEMA.to_owned()
}

fn default_data_table_prefix() -> String {
    WarehouseConfig::DEFAULT_DATA_TABLE_PREFIX.to_owned()
}

fn default_loggers_table() -> String {
    WarehouseConfig::DEFAULT_LOGGERS_TABLE.to_owned()
}

fn default_sensors_table() -> String {
    WarehouseConfig::DEFAULT_SENSORS_TABLE.to_owned()
}
