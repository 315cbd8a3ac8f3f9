//! Provisioning errors.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Provisioning stage that invoked an external tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateEnv,
    UpgradeInstaller,
    InstallRequirements,
    Verify,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::CreateEnv => "create venv",
            Step::UpgradeInstaller => "upgrade pip",
            Step::InstallRequirements => "install requirements",
            Step::Verify => "verify packages",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Installed version differs from an exact `==` pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMismatch {
    pub name: String,
    pub required: String,
    pub installed: String,
}

impl fmt::Display for VersionMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (required =={}, installed {})",
            self.name, self.required, self.installed
        )
    }
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Base directory, environment directory or requirements file cannot be created, read or written.
    #[error("Path unavailable: {}: {reason}", .path.display())]
    PathUnavailable { path: PathBuf, reason: String },

    /// An invoked tool exited non-zero or could not be started.
    #[error("{step} failed ({}): `{command}`{}{}", exit_label(.exit_code), packages_suffix(.packages), stderr_suffix(.stderr))]
    InstallFailed {
        step: Step,
        command: String,
        exit_code: Option<i32>,
        /// Failing package names reported by the installer, if any.
        packages: Vec<String>,
        stderr: String,
    },

    #[error("Installed packages do not match requirements: {}", verification_summary(.missing, .mismatched))]
    VerificationFailed {
        missing: Vec<String>,
        mismatched: Vec<VersionMismatch>,
    },
}

impl ProvisionError {
    pub(crate) fn path(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        ProvisionError::PathUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Process exit code for this failure: the tool's own code when known, else 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            ProvisionError::InstallFailed {
                exit_code: Some(code),
                ..
            } => u8::try_from(*code).ok().filter(|c| *c != 0).unwrap_or(1),
            _ => 1,
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {}", c),
        None => "not started".to_string(),
    }
}

fn packages_suffix(packages: &[String]) -> String {
    if packages.is_empty() {
        String::new()
    } else {
        format!("; failing packages: {}", packages.join(", "))
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\n{}", trimmed)
    }
}

fn verification_summary(missing: &[String], mismatched: &[VersionMismatch]) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing {}", missing.join(", ")));
    }
    if !mismatched.is_empty() {
        let list: Vec<String> = mismatched.iter().map(|m| m.to_string()).collect();
        parts.push(format!("version mismatch {}", list.join(", ")));
    }
    parts.join("; ")
}
