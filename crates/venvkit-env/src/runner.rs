//! External tool invocation.
//!
//! `CommandRunner` is the seam between the provisioning pipeline and real
//! processes; `SystemRunner` is the only production implementation.

use regex::Regex;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;
use std::sync::OnceLock;

use venvkit_core::requirements::Requirements;

use crate::error::Step;
use crate::layout::Activation;

/// One planned tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub step: Step,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// `None` for the base interpreter (creating the env), `Some` for env tools.
    pub activation: Option<Activation>,
}

impl ToolInvocation {
    pub fn new<I, S>(step: Step, program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            step,
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            activation: None,
        }
    }

    pub fn activated(mut self, activation: Activation) -> Self {
        self.activation = Some(activation);
        self
    }

    /// Printable command line; arguments with whitespace are quoted.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|a| {
                let s = a.to_string_lossy();
                if s.is_empty() || s.contains(char::is_whitespace) {
                    format!("\"{}\"", s)
                } else {
                    s.into_owned()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(act) = &self.activation {
            act.apply(&mut cmd);
        }
        cmd
    }
}

/// Captured result of a finished tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// `None` when terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub trait CommandRunner {
    /// Run to completion. `Err` only when the process could not be started.
    fn run(&self, invocation: &ToolInvocation) -> std::io::Result<ToolOutput>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &ToolInvocation) -> std::io::Result<ToolOutput> {
        let out = invocation.to_command().output()?;
        Ok(ToolOutput {
            exit_code: out.status.code(),
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        })
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, invocation: &ToolInvocation) -> std::io::Result<ToolOutput> {
        (**self).run(invocation)
    }
}

fn requirement_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        [
            r"No matching distribution found for (\S+)",
            r"Could not find a version that satisfies the requirement (\S+)",
            r"Failed building wheel for (\S+)",
            r"Failed to build installable wheels for some pyproject\.toml based projects \(([^)]+)\)",
            r"(?m)^ERROR: Failed to build ([A-Za-z0-9][A-Za-z0-9._ -]*)\r?$",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid pip output regex"))
        .collect()
    })
}

/// Package names pip reported as failing, in first-seen order.
pub fn failing_packages(output: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for re in requirement_patterns() {
        for caps in re.captures_iter(output) {
            let Some(m) = caps.get(1) else { continue };
            for raw in m.as_str().split([',', ' ']).map(str::trim).filter(|s| !s.is_empty()) {
                let parsed = Requirements::parse(raw);
                let name = parsed
                    .entries
                    .first()
                    .and_then(|e| e.package_name())
                    .unwrap_or(raw)
                    .to_string();
                if !found.contains(&name) {
                    found.push(name);
                }
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_quotes_spaces() {
        let inv = ToolInvocation::new(
            Step::InstallRequirements,
            "/opt/my envs/venv/bin/python",
            ["-m", "pip", "install", "-U", "-r", "reqs.txt"],
        );
        assert_eq!(
            inv.command_line(),
            "\"/opt/my envs/venv/bin/python\" -m pip install -U -r reqs.txt"
        );
    }

    #[test]
    fn test_failing_packages_from_pip_output() {
        let stderr = "\
ERROR: Could not find a version that satisfies the requirement nonexistent-pkg==1.0 (from versions: none)
ERROR: No matching distribution found for nonexistent-pkg==1.0
";
        assert_eq!(failing_packages(stderr), vec!["nonexistent-pkg".to_string()]);
    }

    #[test]
    fn test_failing_packages_build_errors() {
        let out = "\
  Failed building wheel for lxml
ERROR: Failed to build installable wheels for some pyproject.toml based projects (numpy, scipy)
ERROR: Failed to build psycopg2 pyyaml
";
        assert_eq!(
            failing_packages(out),
            vec!["lxml", "numpy", "scipy", "psycopg2", "pyyaml"]
        );
    }

    #[test]
    fn test_failing_packages_crlf_output() {
        let out = "Collecting psycopg2\r\nERROR: Failed to build psycopg2\r\nERROR: No matching distribution found for nope==2.0\r\n";
        assert_eq!(failing_packages(out), vec!["nope", "psycopg2"]);
    }

    #[test]
    fn test_no_failing_packages() {
        assert!(failing_packages("ERROR: Could not open requirements file").is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captures_output() {
        let inv = ToolInvocation::new(Step::Verify, "sh", ["-c", "echo out; echo err >&2; exit 3"]);
        let out = SystemRunner.run(&inv).unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert!(!out.success());
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
    }

    #[test]
    fn test_system_runner_spawn_failure() {
        let inv = ToolInvocation::new(Step::CreateEnv, "/definitely/not/a/python", ["-m", "venv"]);
        assert!(SystemRunner.run(&inv).is_err());
    }
}
