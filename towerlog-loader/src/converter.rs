use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use towerlog::error::{ErrorKind, LoadResult};
use towerlog::{bail, load_error};
use towerlog_config::shared::ConverterConfig;
use tracing::{debug, info, warn};

/// Turns the binary files of one directory into text exports in another.
pub trait LogConverter {
    /// Converts every file in `input_dir`, writing the exports to `output_dir`.
    fn convert(
        &self,
        input_dir: &Path,
        output_dir: &Path,
    ) -> impl Future<Output = LoadResult<()>> + Send;
}

/// Runs an external decrypt utility once per conversion.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandConverter {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(
            &config.program,
            config.args.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Returns the arguments with both directory placeholders substituted.
    fn resolved_args(&self, input_dir: &Path, output_dir: &Path) -> Vec<String> {
        let input = input_dir.display().to_string();
        let output = output_dir.display().to_string();

        self.args
            .iter()
            .map(|arg| {
                arg.replace(ConverterConfig::INPUT_PLACEHOLDER, &input)
                    .replace(ConverterConfig::OUTPUT_PLACEHOLDER, &output)
            })
            .collect()
    }
}

impl LogConverter for CommandConverter {
    async fn convert(&self, input_dir: &Path, output_dir: &Path) -> LoadResult<()> {
        let args = self.resolved_args(input_dir, output_dir);
        debug!(program = %self.program.display(), ?args, "running converter");

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, output).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return Err(load_error!(
                    ErrorKind::ConverterFailed,
                    "Failed to start converter",
                    self.program.display(),
                    source: err
                ));
            }
            Err(_) => {
                bail!(
                    ErrorKind::ConverterFailed,
                    "Converter timed out",
                    format!("{}s", self.timeout.as_secs())
                );
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                ErrorKind::ConverterFailed,
                "Converter exited unsuccessfully",
                format!("{}: {}", output.status, stderr.trim())
            );
        }

        Ok(())
    }
}

/// Runs `converter` until it succeeds or `max_attempts` attempts have failed.
///
/// Waits `retry_delay` between attempts. Returns the number of attempts used.
pub async fn convert_with_retries<C>(
    converter: &C,
    input_dir: &Path,
    output_dir: &Path,
    max_attempts: u32,
    retry_delay: Duration,
) -> LoadResult<u32>
where
    C: LogConverter,
{
    for attempt in 1..=max_attempts {
        match converter.convert(input_dir, output_dir).await {
            Ok(()) => {
                info!(attempt, "converted binary files to text");
                return Ok(attempt);
            }
            Err(err) => {
                warn!(attempt, max_attempts, error = %err, "conversion attempt failed");
                if attempt < max_attempts {
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }
    }

    Err(load_error!(
        ErrorKind::ConverterFailed,
        "Conversion attempts exhausted",
        max_attempts
    ))
}
