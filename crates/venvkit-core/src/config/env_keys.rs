//! Environment variable keys.
//!
//! Primary keys use the `VENVKIT_*` prefix.

/// Provisioning inputs
pub mod provision {
    pub const VENVKIT_BASE_DIR: &str = "VENVKIT_BASE_DIR";
    pub const VENVKIT_PYTHON: &str = "VENVKIT_PYTHON";
    pub const PYTHON_ALIASES: &[&str] = &["PYTHON"];
    pub const VENVKIT_REQUIREMENTS: &str = "VENVKIT_REQUIREMENTS";
    pub const VENVKIT_ENV_NAME: &str = "VENVKIT_ENV_NAME";
    /// "reuse" (default) or "recreate"
    pub const VENVKIT_ON_EXISTING: &str = "VENVKIT_ON_EXISTING";
    pub const VENVKIT_VERIFY: &str = "VENVKIT_VERIFY";
    /// Path to a YAML config file (default: `./venvkit.yaml`)
    pub const VENVKIT_CONFIG: &str = "VENVKIT_CONFIG";
}

/// Logging and audit
pub mod observability {
    pub const VENVKIT_QUIET: &str = "VENVKIT_QUIET";
    pub const VENVKIT_LOG_LEVEL: &str = "VENVKIT_LOG_LEVEL";
    pub const VENVKIT_LOG_JSON: &str = "VENVKIT_LOG_JSON";
    pub const VENVKIT_AUDIT_LOG: &str = "VENVKIT_AUDIT_LOG";
}

/// Platform variables read during interpreter discovery.
pub mod platform {
    /// Windows per-user application data root (`%LOCALAPPDATA%`).
    pub const LOCALAPPDATA: &str = "LOCALAPPDATA";
    pub const PATH: &str = "PATH";
    pub const VIRTUAL_ENV: &str = "VIRTUAL_ENV";
    pub const PYTHONHOME: &str = "PYTHONHOME";
}
