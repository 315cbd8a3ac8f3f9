//! Optional YAML config file (`venvkit.yaml`).
//!
//! Recognised fields: `base_dir`, `python`, `requirements`, `env_name`,
//! `on_existing`, `verify`. Unknown fields are rejected. Relative paths are
//! resolved against the directory containing the file; a bare `python`
//! value such as `python3` stays a PATH lookup.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::env_keys::provision as keys;
use super::loader::env_optional;
use super::schema::{ExistingEnvPolicy, SettingsOverrides};

/// Default file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "venvkit.yaml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub base_dir: Option<PathBuf>,
    pub python: Option<PathBuf>,
    pub requirements: Option<PathBuf>,
    pub env_name: Option<String>,
    pub on_existing: Option<ExistingEnvPolicy>,
    pub verify: Option<bool>,
}

impl ConfigFile {
    /// Parse a config file and anchor its relative paths at the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut cfg: ConfigFile = if content.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid config file: {}", path.display()))?
        };
        let anchor = path.parent().unwrap_or_else(|| Path::new("."));
        for p in [&mut cfg.base_dir, &mut cfg.requirements].into_iter().flatten() {
            if p.is_relative() {
                *p = anchor.join(&*p);
            }
        }
        if let Some(p) = cfg.python.as_mut() {
            if p.is_relative() && !is_bare_name(p) {
                *p = anchor.join(&*p);
            }
        }
        Ok(cfg)
    }

    /// Locate the config file: `$VENVKIT_CONFIG` (must exist) or `./venvkit.yaml` (optional).
    pub fn discover(cwd: &Path) -> Result<Option<Self>> {
        if let Some(explicit) = env_optional(keys::VENVKIT_CONFIG, &[]) {
            return Self::load(Path::new(&explicit)).map(Some);
        }
        let default = cwd.join(DEFAULT_CONFIG_FILE);
        if default.is_file() {
            tracing::debug!("Using config file {}", default.display());
            return Self::load(&default).map(Some);
        }
        Ok(None)
    }
}

/// `python3.12` is a PATH lookup; `bin/python` or `./python` is a file.
fn is_bare_name(p: &Path) -> bool {
    p.components().count() == 1
}

impl From<ConfigFile> for SettingsOverrides {
    fn from(f: ConfigFile) -> Self {
        SettingsOverrides {
            base_dir: f.base_dir,
            python: f.python,
            requirements: f.requirements,
            env_name: f.env_name,
            on_existing: f.on_existing,
            verify: f.verify,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_anchors_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(
            &path,
            "base_dir: ./envs\nrequirements: requirements-dev.txt\npython: python3\nenv_name: tools\non_existing: recreate\nverify: true\n",
        )
        .unwrap();

        let cfg = ConfigFile::load(&path).unwrap();
        assert_eq!(cfg.base_dir, Some(dir.path().join("./envs")));
        assert_eq!(cfg.requirements, Some(dir.path().join("requirements-dev.txt")));
        assert_eq!(cfg.python, Some(PathBuf::from("python3")));
        assert_eq!(cfg.env_name.as_deref(), Some("tools"));
        assert_eq!(cfg.on_existing, Some(ExistingEnvPolicy::Recreate));
        assert_eq!(cfg.verify, Some(true));

        std::fs::write(&path, "python: python3.12\n").unwrap();
        let cfg = ConfigFile::load(&path).unwrap();
        assert_eq!(cfg.python, Some(PathBuf::from("python3.12")));

        std::fs::write(&path, "python: ./tools/python\n").unwrap();
        let cfg = ConfigFile::load(&path).unwrap();
        assert_eq!(cfg.python, Some(dir.path().join("./tools/python")));
    }

    #[test]
    fn test_absolute_paths_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.yaml");
        let abs = dir.path().join("abs-base");
        std::fs::write(&path, format!("base_dir: {}\n", abs.display())).unwrap();
        let cfg = ConfigFile::load(&path).unwrap();
        assert_eq!(cfg.base_dir, Some(abs));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.yaml");
        std::fs::write(&path, "base_dir: envs\ncache: true\n").unwrap();
        assert!(ConfigFile::load(&path).is_err());
    }

    #[test]
    fn test_empty_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.yaml");
        std::fs::write(&path, "\n").unwrap();
        assert_eq!(ConfigFile::load(&path).unwrap(), ConfigFile::default());
    }
}
