use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Directories the loader reads from and stages into.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PathsConfig {
    /// Directory where loggers drop their binary `.rld` files. Never modified.
    pub raw_dir: PathBuf,
    /// Staging directory holding copies of pending binary files. Cleared on every run.
    #[serde(default = "default_rld_dir")]
    pub rld_dir: PathBuf,
    /// Directory receiving decrypted text files. Cleared on every run.
    #[serde(default = "default_txt_dir")]
    pub txt_dir: PathBuf,
}

impl PathsConfig {
    pub const DEFAULT_RLD_DIR: &'static str = "RLD_INPUT";

    pub const DEFAULT_TXT_DIR: &'static str = "TXT_OUTPUT";

    /// Rejects staging directories that alias the raw directory, since staging is cleared.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, staging) in [("paths.rld_dir", &self.rld_dir), ("paths.txt_dir", &self.txt_dir)] {
            if staging == &self.raw_dir {
                return Err(ValidationError::InvalidFieldValue {
                    field,
                    constraint: "must differ from `paths.raw_dir`".to_owned(),
                });
            }
        }

        if self.rld_dir == self.txt_dir {
            return Err(ValidationError::InvalidFieldValue {
                field: "paths.txt_dir",
                constraint: "must differ from `paths.rld_dir`".to_owned(),
            });
        }

        Ok(())
    }
}

fn default_rld_dir() -> PathBuf {
    PathBuf::from(PathsConfig::DEFAULT_RLD_DIR)
}

fn default_txt_dir() -> PathBuf {
    PathBuf::from(PathsConfig::DEFAULT_TXT_DIR)
}
