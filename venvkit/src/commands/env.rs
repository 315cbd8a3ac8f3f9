//! Environment management commands: show, activate, clean.

use anyhow::{bail, Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use venvkit_core::config::ProvisionSettings;
use venvkit_env::marker::CompletionMarker;
use venvkit_env::{EnvState, Shell, VenvLayout};

/// `venvkit show`
pub fn cmd_show(settings: &ProvisionSettings) -> Result<()> {
    let layout = VenvLayout::new(settings.env_dir());
    print!("{}", render_show(&layout));
    Ok(())
}

fn render_show(layout: &VenvLayout) -> String {
    let mut out = String::new();
    let state = layout.state();
    let _ = writeln!(out, "Environment: {}", layout.root().display());
    let _ = writeln!(
        out,
        "State:       {}",
        match state {
            EnvState::Missing => "missing",
            EnvState::Incomplete => "incomplete (will be recreated on next provision)",
            EnvState::Complete => "complete",
        }
    );
    if state == EnvState::Missing {
        return out;
    }
    let _ = writeln!(out, "Python:      {}", layout.python().display());
    let _ = writeln!(out, "Size:        {}", format_size(dir_size(layout.root())));
    if let Some(marker) = CompletionMarker::read(layout) {
        let _ = writeln!(out, "Created by:  {}", marker.interpreter.display());
        let _ = writeln!(
            out,
            "Requirements: {} ({} entries, sha256 {})",
            marker.requirements_file.display(),
            marker.requirements_count,
            &marker.requirements_sha256[..marker.requirements_sha256.len().min(12)]
        );
        let _ = writeln!(out, "Provisioned: {}", marker.completed_at.to_rfc3339());
    }
    out
}

/// `venvkit activate`
pub fn cmd_activate(settings: &ProvisionSettings, shell: Shell) -> Result<()> {
    let layout = VenvLayout::new(settings.env_dir());
    if layout.state() == EnvState::Missing {
        bail!(
            "No environment at {}; run `venvkit provision` first",
            layout.root().display()
        );
    }
    print!("{}", layout.activation()?.render(shell));
    Ok(())
}

/// `venvkit clean`
pub fn cmd_clean(settings: &ProvisionSettings, dry_run: bool, force: bool) -> Result<()> {
    let layout = VenvLayout::new(settings.env_dir());
    let root = layout.root();

    if !root.exists() {
        eprintln!("No environment found at {}", root.display());
        return Ok(());
    }
    if !root.is_dir() {
        bail!("{} is not a directory; refusing to remove it", root.display());
    }
    if layout.state() == EnvState::Incomplete && !layout.python().exists() {
        // No interpreter and no marker: probably not a venv at all.
        if !force {
            bail!(
                "{} does not look like a virtual environment; pass --force to remove it anyway",
                root.display()
            );
        }
    }

    let size = dir_size(root);
    eprintln!("🗂  Environment {} ({})", root.display(), format_size(size));

    if dry_run {
        eprintln!("(Dry run: nothing removed. Remove --dry-run to delete.)");
        return Ok(());
    }

    if !force {
        eprint!("\nRemove this environment? [y/N] ");
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            eprintln!("Cancelled.");
            return Ok(());
        }
    }

    fs::remove_dir_all(root).with_context(|| format!("Failed to remove {}", root.display()))?;
    eprintln!("✓ Removed {}, freed {}", root.display(), format_size(size));
    Ok(())
}

/// Bytes removed by deleting `root`. Symlinks count as links, not targets,
/// since a venv's `bin/python` points at the base interpreter.
fn dir_size(root: &Path) -> u64 {
    let mut pending = vec![root.to_path_buf()];
    let mut total = 0;
    while let Some(dir) = pending.pop() {
        let Ok(entries) = fs::read_dir(&dir) else { continue };
        for entry in entries.flatten() {
            match entry.file_type() {
                Ok(ft) if ft.is_dir() => pending.push(entry.path()),
                Ok(_) => total += entry.metadata().map(|m| m.len()).unwrap_or(0),
                Err(_) => {}
            }
        }
    }
    total
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    let precision = if unit + 1 == UNITS.len() { 2 } else { 1 };
    format!("{:.*} {}", precision, value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use venvkit_core::config::SettingsOverrides;

    fn settings_in(dir: &Path) -> ProvisionSettings {
        ProvisionSettings::from_layers(SettingsOverrides {
            base_dir: Some(dir.to_path_buf()),
            ..Default::default()
        })
        .unwrap()
    }

    fn fake_env(root: &Path) -> VenvLayout {
        let layout = VenvLayout::new(root);
        let python = layout.python();
        fs::create_dir_all(python.parent().unwrap()).unwrap();
        fs::write(&python, vec![0u8; 2048]).unwrap();
        layout
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_dir_size_recurses() {
        let dir = tempfile::tempdir().unwrap();
        fake_env(dir.path());
        fs::write(dir.path().join("pyvenv.cfg"), "home = /usr/bin\n").unwrap();
        assert_eq!(dir_size(dir.path()), 2048 + 16);
    }

    #[cfg(unix)]
    #[test]
    fn test_dir_size_does_not_follow_symlinks() {
        let base = tempfile::tempdir().unwrap();
        let interpreter = base.path().join("python3");
        fs::write(&interpreter, vec![0u8; 64 * 1024]).unwrap();
        let shared = base.path().join("shared");
        fs::create_dir_all(&shared).unwrap();
        fs::write(shared.join("big.bin"), vec![0u8; 64 * 1024]).unwrap();

        let env = base.path().join("venv");
        fs::create_dir_all(env.join("bin")).unwrap();
        std::os::unix::fs::symlink(&interpreter, env.join("bin").join("python")).unwrap();
        std::os::unix::fs::symlink(&shared, env.join("lib")).unwrap();
        fs::write(env.join("pyvenv.cfg"), "home = /usr/bin\n").unwrap();

        assert!(dir_size(&env) < 4096);
    }

    #[test]
    fn test_show_reports_marker() {
        let dir = tempfile::tempdir().unwrap();
        let layout = fake_env(&dir.path().join("venv"));
        assert!(render_show(&layout).contains("incomplete"));

        CompletionMarker::new(
            PathBuf::from("/usr/bin/python3"),
            PathBuf::from("requirements.txt"),
            "0123456789abcdef".repeat(4),
            2,
        )
        .write(&layout)
        .unwrap();
        let text = render_show(&layout);
        assert!(text.contains("State:       complete"));
        assert!(text.contains("Created by:  /usr/bin/python3"));
        assert!(text.contains("requirements.txt (2 entries, sha256 0123456789ab)"));
    }

    #[test]
    fn test_show_missing_env() {
        let dir = tempfile::tempdir().unwrap();
        let text = render_show(&VenvLayout::new(dir.path().join("venv")));
        assert!(text.ends_with("State:       missing\n"));
    }

    #[test]
    fn test_activate_requires_env() {
        let dir = tempfile::tempdir().unwrap();
        assert!(cmd_activate(&settings_in(dir.path()), Shell::Posix).is_err());
    }

    #[test]
    fn test_clean_force_and_dry_run() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        fake_env(&settings.env_dir());

        cmd_clean(&settings, true, true).unwrap();
        assert!(settings.env_dir().exists());

        cmd_clean(&settings, false, true).unwrap();
        assert!(!settings.env_dir().exists());

        // Nothing left: still succeeds.
        cmd_clean(&settings, false, true).unwrap();
    }

    #[test]
    fn test_clean_refuses_non_venv_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        fs::create_dir_all(settings.env_dir().join("src")).unwrap();
        assert!(cmd_clean(&settings, false, false).is_err());
        assert!(settings.env_dir().exists());
    }
}
