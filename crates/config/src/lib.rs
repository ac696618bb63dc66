//! Layered configuration for decant.
//!
//! Values are merged, later layers winning:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. A configuration file, either given explicitly or found at
//!    [`Config::default_path`]; TOML, YAML or JSON depending on its extension
//! 3. Environment variables prefixed with [`ENV_PREFIX`] (`DECANT_FORCE_NATIVE=true`)
//!
//! Command-line flags are applied on top by the binary.

mod error;

pub use crate::error::{Error, ErrorKind, Result};
use decant_compress::{Compression, DEFAULT_TERMINATION_TIMEOUT, Options};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;

pub const ENV_PREFIX: &str = "DECANT_";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub disable_gzip: bool,
    pub disable_bzip2: bool,
    pub disable_xz: bool,
    pub force_native: bool,
    /// Seconds to wait for an external decompressor to exit once it's told to stop.
    pub termination_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            disable_gzip: false,
            disable_bzip2: false,
            disable_xz: false,
            force_native: false,
            termination_timeout_secs: DEFAULT_TERMINATION_TIMEOUT.as_secs(),
        }
    }
}

impl Config {
    /// The per-user configuration file, e.g. `~/.config/decant/config.toml` on Linux.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "decant").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Load the configuration from every layer.
    ///
    /// An explicit `path` must exist; the default path is skipped when it doesn't.
    #[instrument]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let figment = Self::figment(path)?.merge(Env::prefixed(ENV_PREFIX));
        Self::extract(&figment)
    }

    /// Defaults merged with the configuration file, without the environment layer.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let figment = Figment::from(Serialized::defaults(Config::default()));
        let path = match path {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.is_file() => path,
                _ => {
                    tracing::debug!("No configuration file found; using defaults");
                    return Ok(figment);
                },
            },
        };
        tracing::debug!(path = %path.display(), "Reading configuration file");
        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or_default().to_ascii_lowercase();
        Ok(match extension.as_str() {
            "toml" => figment.merge(Toml::file(path)),
            "yaml" | "yml" => figment.merge(Yaml::file(path)),
            "json" => figment.merge(Json::file(path)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(extension)),
        })
    }

    /// Extract and validate a configuration from any figment.
    pub fn extract(figment: &Figment) -> Result<Self> {
        let config: Config = match figment.extract() {
            Ok(config) => config,
            Err(e) => exn::bail!(ErrorKind::Invalid(e.to_string())),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.termination_timeout_secs == 0 {
            exn::bail!(ErrorKind::InvalidValue { field: "termination_timeout_secs", reason: "must be at least 1" });
        }
        Ok(())
    }

    pub fn termination_timeout(&self) -> Duration {
        Duration::from_secs(self.termination_timeout_secs)
    }
}

impl From<&Config> for Options {
    fn from(config: &Config) -> Self {
        let disabled = [
            (config.disable_gzip, Compression::Gzip),
            (config.disable_bzip2, Compression::Bzip2),
            (config.disable_xz, Compression::Xz),
        ];
        disabled
            .into_iter()
            .filter(|(disabled, _)| *disabled)
            .fold(Options::default(), |options, (_, format)| options.disable(format))
            .force_native(config.force_native)
            .with_termination_timeout(config.termination_timeout())
    }
}
