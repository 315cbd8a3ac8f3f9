//! Virtual environment layout and explicit activation.
//!
//! Activation is a value applied to each child `Command`; nothing here
//! touches the current process environment.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

use venvkit_core::config::env_keys::platform;

use crate::error::ProvisionError;

/// Marker file written after a successful provisioning run.
pub const ENV_MARKER_FILE: &str = ".venvkit_complete";

/// On-disk state of the environment directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvState {
    Missing,
    /// Directory exists but no completion marker (interrupted or foreign).
    Incomplete,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenvLayout {
    root: PathBuf,
}

impl VenvLayout {
    /// Relative roots are resolved against the current directory so activation
    /// still points at the env after a child or shell changes directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `Scripts/` on Windows-style envs, `bin/` otherwise.
    pub fn scripts_dir(&self) -> PathBuf {
        let windows_style = self.root.join("Scripts");
        if windows_style.join("python.exe").exists()
            || (cfg!(windows) && !self.root.join("bin").join("python").exists())
        {
            windows_style
        } else {
            self.root.join("bin")
        }
    }

    /// Interpreter inside the environment.
    pub fn python(&self) -> PathBuf {
        let dir = self.scripts_dir();
        if dir.ends_with("Scripts") {
            dir.join("python.exe")
        } else {
            dir.join("python")
        }
    }

    pub fn marker_path(&self) -> PathBuf {
        self.root.join(ENV_MARKER_FILE)
    }

    pub fn state(&self) -> EnvState {
        if !self.root.exists() {
            EnvState::Missing
        } else if self.marker_path().is_file() {
            EnvState::Complete
        } else {
            EnvState::Incomplete
        }
    }

    /// Activation that prepends this env to the current process `PATH`.
    pub fn activation(&self) -> Result<Activation, ProvisionError> {
        let inherited = std::env::var_os(platform::PATH);
        Activation::new(self, inherited.as_deref())
    }
}

/// Shell dialect for rendering activation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Posix,
    PowerShell,
}

/// Child-process environment that makes the venv's tools win PATH lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub virtual_env: PathBuf,
    pub path: OsString,
}

impl Activation {
    pub fn new(layout: &VenvLayout, inherited_path: Option<&OsStr>) -> Result<Self, ProvisionError> {
        let scripts = layout.scripts_dir();
        let mut entries = vec![scripts.clone()];
        if let Some(existing) = inherited_path {
            entries.extend(std::env::split_paths(existing).filter(|p| p != &scripts));
        }
        let path = std::env::join_paths(entries)
            .map_err(|e| ProvisionError::path(&scripts, format!("cannot be placed on PATH: {}", e)))?;
        Ok(Self {
            virtual_env: layout.root().to_path_buf(),
            path,
        })
    }

    pub fn apply(&self, cmd: &mut Command) {
        cmd.env(platform::VIRTUAL_ENV, &self.virtual_env)
            .env(platform::PATH, &self.path)
            .env_remove(platform::PYTHONHOME);
    }

    /// Lines a user can eval to activate the env in an interactive shell.
    pub fn render(&self, shell: Shell) -> String {
        let venv = self.virtual_env.to_string_lossy();
        let path = self.path.to_string_lossy();
        match shell {
            Shell::Posix => format!(
                "export {}='{}'\nexport {}='{}'\nunset {}\n",
                platform::VIRTUAL_ENV,
                venv.replace('\'', r"'\''"),
                platform::PATH,
                path.replace('\'', r"'\''"),
                platform::PYTHONHOME
            ),
            Shell::PowerShell => format!(
                "$env:{} = '{}'\n$env:{} = '{}'\nRemove-Item Env:{} -ErrorAction SilentlyContinue\n",
                platform::VIRTUAL_ENV,
                venv.replace('\'', "''"),
                platform::PATH,
                path.replace('\'', "''"),
                platform::PYTHONHOME
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let layout = VenvLayout::new(dir.path().join("venv"));
        assert_eq!(layout.state(), EnvState::Missing);
        std::fs::create_dir_all(layout.root()).unwrap();
        assert_eq!(layout.state(), EnvState::Incomplete);
        std::fs::write(layout.marker_path(), "{}").unwrap();
        assert_eq!(layout.state(), EnvState::Complete);
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_layout_paths() {
        let layout = VenvLayout::new("/opt/envs/venv");
        assert_eq!(layout.scripts_dir(), PathBuf::from("/opt/envs/venv/bin"));
        assert_eq!(layout.python(), PathBuf::from("/opt/envs/venv/bin/python"));
    }

    #[test]
    fn test_windows_style_env_detected() {
        let dir = tempfile::tempdir().unwrap();
        let layout = VenvLayout::new(dir.path());
        std::fs::create_dir_all(dir.path().join("Scripts")).unwrap();
        std::fs::write(dir.path().join("Scripts").join("python.exe"), "").unwrap();
        assert_eq!(layout.python(), dir.path().join("Scripts").join("python.exe"));
    }

    #[cfg(unix)]
    #[test]
    fn test_activation_prepends_scripts_dir() {
        let layout = VenvLayout::new("/opt/envs/venv");
        let act = Activation::new(&layout, Some(OsStr::new("/usr/bin:/opt/envs/venv/bin:/bin"))).unwrap();
        assert_eq!(act.virtual_env, PathBuf::from("/opt/envs/venv"));
        assert_eq!(act.path, OsString::from("/opt/envs/venv/bin:/usr/bin:/bin"));

        let bare = Activation::new(&layout, None).unwrap();
        assert_eq!(bare.path, OsString::from("/opt/envs/venv/bin"));
    }

    #[test]
    fn test_relative_root_is_made_absolute() {
        let layout = VenvLayout::new(Path::new(".").join("venv"));
        assert!(layout.root().is_absolute());
        assert!(layout.root().ends_with("venv"));

        let act = Activation::new(&layout, None).unwrap();
        assert!(act.virtual_env.is_absolute());
        let first = std::env::split_paths(&act.path).next().unwrap();
        assert!(first.is_absolute());
        assert!(first.starts_with(std::env::current_dir().unwrap()));
    }

    #[cfg(unix)]
    #[test]
    fn test_activation_rejects_separator_in_path() {
        let layout = VenvLayout::new("/opt/a:b/venv");
        assert!(matches!(
            Activation::new(&layout, None),
            Err(ProvisionError::PathUnavailable { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_activation_applies_to_child() {
        let layout = VenvLayout::new("/opt/envs/venv");
        let act = Activation::new(&layout, Some(OsStr::new("/usr/bin:/bin"))).unwrap();
        let mut cmd = Command::new("env");
        act.apply(&mut cmd);
        let envs: Vec<_> = cmd.get_envs().collect();
        assert!(envs.contains(&(OsStr::new("VIRTUAL_ENV"), Some(OsStr::new("/opt/envs/venv")))));
        assert!(envs.contains(&(OsStr::new("PATH"), Some(OsStr::new("/opt/envs/venv/bin:/usr/bin:/bin")))));
        assert!(envs.contains(&(OsStr::new("PYTHONHOME"), None)));
    }

    #[test]
    fn test_render_shells() {
        let act = Activation {
            virtual_env: PathBuf::from("/e/it's"),
            path: OsString::from("/e/bin"),
        };
        assert_eq!(
            act.render(Shell::Posix),
            "export VIRTUAL_ENV='/e/it'\\''s'\nexport PATH='/e/bin'\nunset PYTHONHOME\n"
        );
        assert!(act
            .render(Shell::PowerShell)
            .starts_with("$env:VIRTUAL_ENV = '/e/it''s'\n$env:PATH = '/e/bin'\n"));
    }
}
