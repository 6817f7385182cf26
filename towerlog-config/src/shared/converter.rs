use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;
use crate::shared::base::non_empty;

/// External decrypt utility turning `.rld` files into `_meas.txt` exports.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConverterConfig {
    /// Program to execute.
    pub program: String,
    /// Program arguments. `{input}` and `{output}` are replaced by the staging directories.
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Number of conversion attempts before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between two attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Upper bound on a single attempt, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ConverterConfig {
    pub const INPUT_PLACEHOLDER: &'static str = "{input}";

    pub const OUTPUT_PLACEHOLDER: &'static str = "{output}";

    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    pub const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;

    pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

    pub fn validate(&self) -> Result<(), ValidationError> {
        non_empty("converter.program", &self.program)?;

        if self.max_attempts == 0 {
            return Err(ValidationError::Zero {
                field: "converter.max_attempts",
            });
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::Zero {
                field: "converter.timeout_secs",
            });
        }

        Ok(())
    }
}

fn default_args() -> Vec<String> {
    vec![
        ConverterConfig::INPUT_PLACEHOLDER.to_owned(),
        ConverterConfig::OUTPUT_PLACEHOLDER.to_owned(),
    ]
}

fn default_max_attempts() -> u32 {
    ConverterConfig::DEFAULT_MAX_ATTEMPTS
}

fn default_retry_delay_ms() -> u64 {
    ConverterConfig::DEFAULT_RETRY_DELAY_MS
}

fn default_timeout_secs() -> u64 {
    ConverterConfig::DEFAULT_TIMEOUT_SECS
}
