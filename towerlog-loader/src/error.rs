use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

use towerlog::error::LoadError;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Result type for loader operations.
pub type LoaderResult<T> = Result<T, LoaderError>;

/// Captured backtrace wrapper so variants can carry one without a derive.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type of the loader binary.
///
/// Wraps [`LoadError`] for failures of the load itself and adds variants for startup
/// infrastructure.
#[derive(Debug)]
pub enum LoaderError {
    Load(LoadError),
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    Io(std::io::Error, CapturedBacktrace),
}

impl LoaderError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            LoaderError::Load(_) => "load error",
            LoaderError::Config(_, _) => "configuration error",
            LoaderError::Io(_, _) => "i/o error",
        }
    }

    pub fn backtrace(&self) -> &Backtrace {
        match self {
            LoaderError::Load(err) => err.backtrace(),
            LoaderError::Config(_, cb) => &cb.0,
            LoaderError::Io(_, cb) => &cb.0,
        }
    }

    /// Creates a configuration error from any error source.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        LoaderError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns a user-oriented report for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("loader failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {self}\n"));

        let mut source = Error::source(self);
        let mut idx = 1usize;
        while let Some(err) = source {
            out.push_str(&format!("cause {idx}: {err}\n"));
            source = err.source();
            idx += 1;
        }

        if should_render_backtrace() {
            out.push_str("backtrace:\n");
            out.push_str(&self.backtrace().to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderError::Load(err) => write!(f, "[{:?}] {}", err.kind(), err.description()),
            LoaderError::Config(source, _) => write!(f, "configuration error: {source}"),
            LoaderError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for LoaderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LoaderError::Load(err) => err.source(),
            LoaderError::Config(source, _) => Some(source.as_ref()),
            LoaderError::Io(source, _) => Some(source),
        }
    }
}

impl From<std::io::Error> for LoaderError {
    fn from(err: std::io::Error) -> Self {
        LoaderError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<LoadError> for LoaderError {
    fn from(err: LoadError) -> Self {
        LoaderError::Load(err)
    }
}

#[cfg(test)]
mod tests {
    use towerlog::error::ErrorKind;
    use towerlog::load_error;

    use super::*;

    #[test]
    fn report_lists_category_and_causes() {
        let io = std::io::Error::other("disk unplugged");
        let err = LoaderError::from(load_error!(
            ErrorKind::LedgerError,
            "Failed to read ledger",
            source: io
        ));

        let report = err.render_report();
        assert!(report.starts_with("loader failed\ncategory: load error\n"));
        assert!(report.contains("error: [LedgerError] Failed to read ledger\n"));
        assert!(report.contains("cause 1: disk unplugged\n"));
    }

    #[test]
    fn config_errors_keep_their_message() {
        let err = LoaderError::config(std::io::Error::other("missing base.yaml"));

        assert_eq!(err.category(), "configuration error");
        assert_eq!(err.to_string(), "configuration error: missing base.yaml");
    }
}
