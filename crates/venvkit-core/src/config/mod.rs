//! Unified configuration layer.
//!
//! All environment reads are centralised here; provisioning code consumes
//! structured settings and never calls `std::env::var` itself.
//!
//! - `loader`: `env_or`, `env_optional`, `env_bool`, `.env` loading
//! - `file`: optional `venvkit.yaml` config file
//! - `schema`: `ProvisionSettings`, `ObservabilityConfig`
//! - `env_keys`: key constants

pub mod env_keys;
pub mod file;
pub mod loader;
pub mod schema;

pub use file::ConfigFile;
pub use loader::{env_bool, env_optional, env_or, load_dotenv, load_dotenv_from_dir};
pub use schema::{ExistingEnvPolicy, ObservabilityConfig, ProvisionSettings, SettingsOverrides};
