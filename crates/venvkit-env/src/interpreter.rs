//! Locate the Python interpreter used to create environments.
//!
//! Order: explicit setting, per-user install under the platform "local
//! application data" directory, then `python3` / `python` on PATH.

use std::path::{Path, PathBuf};

use venvkit_core::config::env_keys::platform;

/// Executable name inside a per-user Python install directory.
pub const INSTALL_EXE: &str = if cfg!(windows) { "python.exe" } else { "python" };

const PATH_CANDIDATES: &[&str] = &["python3", "python"];

/// Resolve the interpreter. `None` means nothing usable was found.
pub fn resolve_interpreter(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return resolve_explicit(p);
    }
    if let Some(found) = local_app_data_root().and_then(|root| find_in_local_app_data(&root)) {
        tracing::debug!("Using interpreter from local app data: {}", found.display());
        return Some(found);
    }
    PATH_CANDIDATES
        .iter()
        .find_map(|name| which::which(name).ok())
}

/// Bare names are looked up on PATH; anything else must exist as given.
fn resolve_explicit(p: &Path) -> Option<PathBuf> {
    if p.components().count() == 1 && !p.exists() {
        return which::which(p).ok();
    }
    if p.is_file() {
        Some(p.to_path_buf())
    } else {
        None
    }
}

fn local_app_data_root() -> Option<PathBuf> {
    std::env::var_os(platform::LOCALAPPDATA)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Newest `<root>/Programs/Python/Python3XY[-32|-arm64]/<exe>` install.
pub fn find_in_local_app_data(root: &Path) -> Option<PathBuf> {
    let installs = root.join("Programs").join("Python");
    let entries = std::fs::read_dir(&installs).ok()?;
    entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            let version = parse_install_dir(&name)?;
            let exe = entry.path().join(INSTALL_EXE);
            exe.is_file().then_some((version, exe))
        })
        .max_by_key(|(version, _)| *version)
        .map(|(_, exe)| exe)
}

/// `Python312` -> (3, 12); `Python39-32` -> (3, 9).
fn parse_install_dir(name: &str) -> Option<(u32, u32)> {
    let digits = name.strip_prefix("Python")?;
    let digits = digits.split('-').next()?;
    if digits.len() < 2 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let major = digits[..1].parse().ok()?;
    let minor = digits[1..].parse().ok()?;
    Some((major, minor))
}
