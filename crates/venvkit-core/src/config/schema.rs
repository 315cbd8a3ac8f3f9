//! Typed configuration structs.
//!
//! Provisioning settings are layered: CLI > environment > config file > defaults.

use anyhow::{bail, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::env_keys::{observability as obv_keys, provision as keys};
use super::file::ConfigFile;
use super::loader::{env_bool, env_optional, env_or};

pub const DEFAULT_ENV_NAME: &str = "venv";
pub const DEFAULT_REQUIREMENTS_FILE: &str = "requirements.txt";

/// What to do when a complete environment already exists at the target path.
///
/// Incomplete environments (no completion marker) are always recreated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistingEnvPolicy {
    /// Keep the environment; only the installer steps run again.
    #[default]
    Reuse,
    /// Delete the environment and create it from scratch.
    Recreate,
}

impl FromStr for ExistingEnvPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "reuse" => Ok(Self::Reuse),
            "recreate" => Ok(Self::Recreate),
            other => bail!("Unknown existing-environment policy '{}' (expected reuse|recreate)", other),
        }
    }
}

impl fmt::Display for ExistingEnvPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reuse => f.write_str("reuse"),
            Self::Recreate => f.write_str("recreate"),
        }
    }
}

/// One configuration layer. `None` means "not set at this layer".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub base_dir: Option<PathBuf>,
    pub python: Option<PathBuf>,
    pub requirements: Option<PathBuf>,
    pub env_name: Option<String>,
    pub on_existing: Option<ExistingEnvPolicy>,
    pub verify: Option<bool>,
}

impl SettingsOverrides {
    /// Values set in `self` win over `lower`.
    pub fn or(self, lower: SettingsOverrides) -> SettingsOverrides {
        SettingsOverrides {
            base_dir: self.base_dir.or(lower.base_dir),
            python: self.python.or(lower.python),
            requirements: self.requirements.or(lower.requirements),
            env_name: self.env_name.or(lower.env_name),
            on_existing: self.on_existing.or(lower.on_existing),
            verify: self.verify.or(lower.verify),
        }
    }

    /// Layer read from `VENVKIT_*` variables.
    pub fn from_env() -> Result<Self> {
        let on_existing = env_optional(keys::VENVKIT_ON_EXISTING, &[])
            .map(|s| s.parse::<ExistingEnvPolicy>())
            .transpose()?;
        let verify = env_optional(keys::VENVKIT_VERIFY, &[])
            .map(|_| env_bool(keys::VENVKIT_VERIFY, &[], false));
        Ok(Self {
            base_dir: env_optional(keys::VENVKIT_BASE_DIR, &[]).map(PathBuf::from),
            python: env_optional(keys::VENVKIT_PYTHON, keys::PYTHON_ALIASES).map(PathBuf::from),
            requirements: env_optional(keys::VENVKIT_REQUIREMENTS, &[]).map(PathBuf::from),
            env_name: env_optional(keys::VENVKIT_ENV_NAME, &[]),
            on_existing,
            verify,
        })
    }
}

/// Fully resolved provisioning inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionSettings {
    /// Directory that holds the environment.
    pub base_dir: PathBuf,
    /// Interpreter used to create the environment; `None` = discover.
    pub python: Option<PathBuf>,
    pub requirements: PathBuf,
    /// Name of the environment directory inside `base_dir`.
    pub env_name: String,
    pub on_existing: ExistingEnvPolicy,
    pub verify: bool,
}

impl ProvisionSettings {
    /// Resolve settings for the current process: `.env`, config file, env vars, then `cli`.
    /// `config_file` overrides config file discovery and must exist.
    pub fn resolve(cli: SettingsOverrides, config_file: Option<&Path>) -> Result<Self> {
        super::loader::load_dotenv();
        let file = match config_file {
            Some(path) => Some(ConfigFile::load(path)?),
            None => {
                let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
                ConfigFile::discover(&cwd)?
            }
        };
        let layered = cli
            .or(SettingsOverrides::from_env()?)
            .or(file.map(SettingsOverrides::from).unwrap_or_default());
        Self::from_layers(layered)
    }

    /// Apply defaults to a merged layer and validate it.
    pub fn from_layers(layered: SettingsOverrides) -> Result<Self> {
        let env_name = layered
            .env_name
            .unwrap_or_else(|| DEFAULT_ENV_NAME.to_string());
        validate_env_name(&env_name)?;
        Ok(Self {
            base_dir: layered.base_dir.unwrap_or_else(|| PathBuf::from(".")),
            python: layered.python,
            requirements: layered
                .requirements
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REQUIREMENTS_FILE)),
            env_name,
            on_existing: layered.on_existing.unwrap_or_default(),
            verify: layered.verify.unwrap_or(false),
        })
    }

    /// `<base_dir>/<env_name>`
    pub fn env_dir(&self) -> PathBuf {
        self.base_dir.join(&self.env_name)
    }
}

/// The env name must be a single, normal path component.
fn validate_env_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        bail!("Invalid environment name '{}'", name);
    }
    let mut comps = Path::new(trimmed).components();
    match (comps.next(), comps.next()) {
        (Some(std::path::Component::Normal(_)), None) => Ok(()),
        _ => bail!(
            "Invalid environment name '{}': must be a single directory name",
            name
        ),
    }
}

/// Observability settings: quiet mode, log filter, JSON output, audit log path.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            super::loader::load_dotenv();
            Self {
                quiet: env_bool(obv_keys::VENVKIT_QUIET, &[], false),
                log_level: env_or(obv_keys::VENVKIT_LOG_LEVEL, &[], || {
                    "venvkit=info".to_string()
                }),
                log_json: env_bool(obv_keys::VENVKIT_LOG_JSON, &[], false),
                audit_log: env_optional(obv_keys::VENVKIT_AUDIT_LOG, &[]),
            }
        })
    }
}
