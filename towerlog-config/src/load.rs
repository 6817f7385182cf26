use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory holding the configuration layers, relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Extensions tried, in order, for every layer.
const LAYER_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Environment overrides look like `APP_WAREHOUSE__POOL_SIZE`.
const ENV_PREFIX: &str = "APP";
const ENV_PREFIX_SEPARATOR: &str = "_";
const ENV_SEPARATOR: &str = "__";

const LIST_SEPARATOR: &str = ",";

/// Implemented by configuration structures loaded through [`load_config`].
pub trait Config {
    /// Dotted keys, such as `converter.args`, whose environment overrides are comma-separated
    /// lists. Commas in every other override are kept verbatim.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// A configuration file stacked under the environment overrides.
#[derive(Debug, Clone, Copy)]
enum Layer {
    Base,
    Environment(Environment),
}

impl Layer {
    fn stem(self) -> &'static str {
        match self {
            Layer::Base => "base",
            Layer::Environment(environment) => environment.as_str(),
        }
    }

    fn label(self) -> String {
        match self {
            Layer::Base => "base configuration".to_owned(),
            Layer::Environment(environment) => format!("{environment} environment configuration"),
        }
    }
}

/// Errors raised while loading configuration files and overrides.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    #[error("could not locate {kind_description} in `{directory}`; attempted: {attempted}")]
    ConfigurationFileMissing {
        kind_description: String,
        directory: PathBuf,
        attempted: String,
    },

    #[error("failed to load {kind_description} from `{path}`: {source}")]
    ConfigurationFileLoad {
        kind_description: String,
        path: PathBuf,
        source: config::ConfigError,
    },

    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] config::ConfigError),

    /// `APP_ENVIRONMENT` holds an unsupported value.
    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] io::Error),

    #[error("failed to build configuration: {0}")]
    Builder(#[source] config::ConfigError),
}

/// Loads configuration from `./configuration` for the environment named by `APP_ENVIRONMENT`.
///
/// See [`load_config_from`] for the layering rules.
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let base_path = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    let environment = Environment::load()?;

    load_config_from(&base_path.join(CONFIGURATION_DIR), environment)
}

/// Loads layered configuration from `directory`.
///
/// `base.(yaml|yml|json)` comes first, then `{environment}.(yaml|yml|json)`, then the `APP_`
/// process environment. Both files are required.
pub fn load_config_from<T>(directory: &Path, environment: Environment) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    load_layers(directory, environment, None)
}

/// Stacks the file layers and the overrides in `variables`, or the process environment when
/// `variables` is [`None`].
fn load_layers<T>(
    directory: &Path,
    environment: Environment,
    variables: Option<HashMap<String, String>>,
) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            directory.to_path_buf(),
        ));
    }

    let mut builder = config::Config::builder();
    for layer in [Layer::Base, Layer::Environment(environment)] {
        let path = find_layer_file(directory, layer)?;
        builder = builder.add_source(config::File::from(path.as_path()));

        // Building after each file attributes a parse error to that file.
        builder
            .build_cloned()
            .map_err(|source| LoadConfigError::ConfigurationFileLoad {
                kind_description: layer.label(),
                path,
                source,
            })?;
    }

    builder
        .add_source(environment_overrides::<T>(variables))
        .build()
        .map_err(LoadConfigError::Builder)?
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

fn environment_overrides<T>(variables: Option<HashMap<String, String>>) -> config::Environment
where
    T: Config,
{
    let overrides = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .source(variables);

    if T::LIST_PARSE_KEYS.is_empty() {
        return overrides;
    }

    T::LIST_PARSE_KEYS.iter().fold(
        overrides.try_parsing(true).list_separator(LIST_SEPARATOR),
        |overrides, key| overrides.with_list_parse_key(key),
    )
}

fn find_layer_file(directory: &Path, layer: Layer) -> Result<PathBuf, LoadConfigError> {
    let candidates: Vec<PathBuf> = LAYER_EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{}.{extension}", layer.stem())))
        .collect();

    if let Some(found) = candidates.iter().find(|path| path.is_file()) {
        return Ok(found.clone());
    }

    Err(LoadConfigError::ConfigurationFileMissing {
        kind_description: layer.label(),
        directory: directory.to_path_buf(),
        attempted: candidates
            .iter()
            .map(|path| format!("`{}`", path.display()))
            .collect::<Vec<_>>()
            .join(", "),
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Sample {
        name: String,
        attempts: u32,
    }

    impl Config for Sample {
        const LIST_PARSE_KEYS: &'static [&'static str] = &[];
    }

    #[derive(Debug, Deserialize)]
    struct Converter {
        program: String,
        args: Vec<String>,
    }

    #[derive(Debug, Deserialize)]
    struct WithArgs {
        converter: Converter,
    }

    impl Config for WithArgs {
        const LIST_PARSE_KEYS: &'static [&'static str] = &["converter.args"];
    }

    fn variables(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
                .collect(),
        )
    }

    #[test]
    fn environment_file_overrides_base() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.yaml"), "name: tower\nattempts: 3\n").unwrap();
        fs::write(dir.path().join("prod.yml"), "attempts: 5\n").unwrap();

        let sample: Sample = load_layers(dir.path(), Environment::Prod, variables(&[])).unwrap();

        assert_eq!(sample.name, "tower");
        assert_eq!(sample.attempts, 5);
    }

    #[test]
    fn converter_args_override_is_split_on_commas() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("base.yaml"),
            "converter:\n  program: nrg-rld-convert\n  args: [\"{input}\"]\n",
        )
        .unwrap();
        fs::write(dir.path().join("dev.yaml"), "{}\n").unwrap();

        let loaded: WithArgs = load_layers(
            dir.path(),
            Environment::Dev,
            variables(&[
                ("APP_CONVERTER__ARGS", "--input,{input},--output,{output}"),
                ("APP_CONVERTER__PROGRAM", "/opt/nrg/convert,v2"),
            ]),
        )
        .unwrap();

        assert_eq!(
            loaded.converter.args,
            vec!["--input", "{input}", "--output", "{output}"]
        );
        assert_eq!(loaded.converter.program, "/opt/nrg/convert,v2");
    }

    #[test]
    fn commas_are_kept_without_list_keys() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.yaml"), "name: tower\nattempts: 3\n").unwrap();
        fs::write(dir.path().join("dev.yaml"), "attempts: 1\n").unwrap();

        let sample: Sample = load_layers(
            dir.path(),
            Environment::Dev,
            variables(&[("APP_NAME", "ridge,north")]),
        )
        .unwrap();

        assert_eq!(sample.name, "ridge,north");
    }

    #[test]
    fn missing_environment_file_lists_attempts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.yaml"), "name: tower\nattempts: 3\n").unwrap();

        let err = load_layers::<Sample>(dir.path(), Environment::Dev, variables(&[])).unwrap_err();

        assert!(matches!(err, LoadConfigError::ConfigurationFileMissing { .. }));
        assert!(err.to_string().contains("dev.yaml"));
    }

    #[test]
    fn malformed_file_is_reported_with_its_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.yaml"), "name: [unclosed\n").unwrap();
        fs::write(dir.path().join("dev.yaml"), "attempts: 1\n").unwrap();

        let err = load_layers::<Sample>(dir.path(), Environment::Dev, variables(&[])).unwrap_err();

        assert!(matches!(
            err,
            LoadConfigError::ConfigurationFileLoad { ref path, .. } if path.ends_with("base.yaml")
        ));
    }

    #[test]
    fn missing_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("configuration");

        assert!(matches!(
            load_config_from::<Sample>(&missing, Environment::Dev),
            Err(LoadConfigError::MissingConfigurationDirectory(_))
        ));
    }
}
