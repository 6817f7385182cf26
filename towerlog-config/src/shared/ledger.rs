use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;
use crate::shared::base::non_empty;

/// The local database recording which binary files were processed.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LedgerConfig {
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// Recorded with every ledger entry.
    #[serde(default = "default_uploaded_by")]
    pub uploaded_by: String,
}

impl LedgerConfig {
    pub const DEFAULT_PATH: &'static str = "duckdb_data/rld_ledger.db";

    pub const DEFAULT_UPLOADED_BY: &'static str = "towerlog";

    pub fn validate(&self) -> Result<(), ValidationError> {
        non_empty("ledger.uploaded_by", &self.uploaded_by)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            uploaded_by: default_uploaded_by(),
        }
    }
}

fn default_path() -> PathBuf {
    PathBuf::from(LedgerConfig::DEFAULT_PATH)
}

fn default_uploaded_by() -> String {
    LedgerConfig::DEFAULT_UPLOADED_BY.to_owned()
}
