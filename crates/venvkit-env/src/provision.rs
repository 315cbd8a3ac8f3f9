//! Provisioning pipeline: base dir -> venv -> activation -> pip upgrade -> requirements.
//!
//! Steps run strictly in order and the first failure aborts the run. The
//! completion marker is written last, so an interrupted or failed run leaves
//! an incomplete env that the next run recreates.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use venvkit_core::config::env_keys::provision as keys;
use venvkit_core::config::{ExistingEnvPolicy, ProvisionSettings};
use venvkit_core::requirements::{Requirements, RequirementsError};

use crate::error::{ProvisionError, Step};
use crate::info_log;
use crate::interpreter::resolve_interpreter;
use crate::layout::{EnvState, VenvLayout};
use crate::marker::CompletionMarker;
use crate::runner::{failing_packages, CommandRunner, SystemRunner, ToolInvocation, ToolOutput};
use crate::verify;

/// Everything a run would do, computed without side effects.
#[derive(Debug, Clone)]
pub struct ProvisionPlan {
    pub layout: VenvLayout,
    pub state: EnvState,
    /// The existing env directory is deleted before creation.
    pub remove_existing: bool,
    /// Base interpreter; `None` when an existing env is reused.
    pub interpreter: Option<PathBuf>,
    pub requirements: Requirements,
    pub steps: Vec<ToolInvocation>,
}

impl ProvisionPlan {
    pub fn creates_env(&self) -> bool {
        self.steps.iter().any(|s| s.step == Step::CreateEnv)
    }
}

/// Outcome of one tool run, reported as it finishes.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub step: Step,
    pub command: String,
    /// `None` if the tool could not be started or was killed by a signal.
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct ProvisionReport {
    pub env_dir: PathBuf,
    pub python: PathBuf,
    pub created: bool,
    /// Entries in the requirements file (packages and options).
    pub requirements: usize,
    pub verified: bool,
    pub steps: Vec<StepRecord>,
}

pub struct Provisioner<R = SystemRunner> {
    settings: ProvisionSettings,
    runner: R,
}

impl Provisioner<SystemRunner> {
    pub fn new(settings: ProvisionSettings) -> Self {
        Self::with_runner(settings, SystemRunner)
    }
}

impl<R: CommandRunner> Provisioner<R> {
    pub fn with_runner(settings: ProvisionSettings, runner: R) -> Self {
        Self { settings, runner }
    }

    pub fn settings(&self) -> &ProvisionSettings {
        &self.settings
    }

    pub fn layout(&self) -> VenvLayout {
        VenvLayout::new(self.settings.env_dir())
    }

    /// Compute the run for the current on-disk state. Creates nothing.
    pub fn plan(&self) -> Result<ProvisionPlan, ProvisionError> {
        let requirements = read_requirements(&self.settings.requirements)?;
        self.plan_with(requirements)
    }

    pub fn provision(&self) -> Result<ProvisionReport, ProvisionError> {
        self.provision_with(|_| {})
    }

    /// Run the pipeline, calling `on_step` after every tool invocation.
    pub fn provision_with<F>(&self, mut on_step: F) -> Result<ProvisionReport, ProvisionError>
    where
        F: FnMut(&StepRecord),
    {
        ensure_base_dir(&self.settings.base_dir)?;
        let requirements = read_requirements(&self.settings.requirements)?;
        let plan = self.plan_with(requirements)?;
        let layout = &plan.layout;

        if plan.remove_existing {
            info_log!(
                "Removing {} environment at {}",
                if plan.state == EnvState::Incomplete { "incomplete" } else { "existing" },
                layout.root().display()
            );
            std::fs::remove_dir_all(layout.root())
                .map_err(|e| ProvisionError::path(layout.root(), e))?;
        } else if !plan.creates_env() {
            info_log!("Reusing environment at {}", layout.root().display());
        }

        let mut records = Vec::with_capacity(plan.steps.len());
        let mut verified = false;
        for invocation in &plan.steps {
            let output = self.run_step(invocation, |record| {
                on_step(record);
                records.push(record.clone());
            })?;
            match invocation.step {
                Step::CreateEnv => {
                    let python = layout.python();
                    if !python.is_file() {
                        return Err(ProvisionError::InstallFailed {
                            step: Step::CreateEnv,
                            command: invocation.command_line(),
                            exit_code: output.exit_code,
                            packages: Vec::new(),
                            stderr: format!(
                                "environment interpreter missing after creation: {}",
                                python.display()
                            ),
                        });
                    }
                }
                Step::Verify => {
                    let installed = verify::parse_pip_list(&output.stdout).map_err(|e| {
                        ProvisionError::InstallFailed {
                            step: Step::Verify,
                            command: invocation.command_line(),
                            exit_code: output.exit_code,
                            packages: Vec::new(),
                            stderr: format!("unreadable package listing: {}", e),
                        }
                    })?;
                    verify::check(&plan.requirements, &installed)?;
                    verified = true;
                }
                Step::InstallRequirements => {
                    info_log!(
                        "Installed {} requirement(s) from {}",
                        plan.requirements.len(),
                        self.settings.requirements.display()
                    );
                }
                Step::UpgradeInstaller => {}
            }
        }
        if plan.requirements.is_empty() {
            info_log!(
                "No requirements in {}; skipped install",
                self.settings.requirements.display()
            );
        }

        let interpreter = plan
            .interpreter
            .clone()
            .or_else(|| CompletionMarker::read(layout).map(|m| m.interpreter))
            .unwrap_or_else(|| layout.python());
        CompletionMarker::new(
            interpreter,
            self.settings.requirements.clone(),
            plan.requirements.fingerprint.clone(),
            plan.requirements.len(),
        )
        .write(layout)?;

        info_log!("Environment ready at {}", layout.root().display());
        Ok(ProvisionReport {
            env_dir: layout.root().to_path_buf(),
            python: layout.python(),
            created: plan.creates_env(),
            requirements: plan.requirements.len(),
            verified,
            steps: records,
        })
    }

    fn plan_with(&self, requirements: Requirements) -> Result<ProvisionPlan, ProvisionError> {
        let layout = self.layout();
        let state = layout.state();
        if state != EnvState::Missing && !layout.root().is_dir() {
            return Err(ProvisionError::path(
                layout.root(),
                "exists and is not a directory",
            ));
        }
        let create = !matches!(
            (state, self.settings.on_existing),
            (EnvState::Complete, ExistingEnvPolicy::Reuse)
        );

        let mut steps = Vec::new();
        let interpreter = if create {
            let interpreter = resolve_interpreter(self.settings.python.as_deref())
                .ok_or_else(|| self.no_interpreter(&layout))?;
            let mut args: Vec<OsString> = vec!["-m".into(), "venv".into()];
            args.push(layout.root().into());
            steps.push(ToolInvocation::new(Step::CreateEnv, &interpreter, args));
            Some(interpreter)
        } else {
            None
        };

        let activation = layout.activation()?;
        let python = layout.python();
        steps.push(
            ToolInvocation::new(
                Step::UpgradeInstaller,
                &python,
                ["-m", "pip", "install", "-U", "pip"],
            )
            .activated(activation.clone()),
        );
        if !requirements.is_empty() {
            let mut args: Vec<OsString> =
                ["-m", "pip", "install", "-U", "-r"].into_iter().map(OsString::from).collect();
            args.push(self.settings.requirements.as_os_str().to_owned());
            steps.push(
                ToolInvocation::new(Step::InstallRequirements, &python, args)
                    .activated(activation.clone()),
            );
        }
        if self.settings.verify {
            steps.push(
                ToolInvocation::new(Step::Verify, &python, ["-m", "pip", "list", "--format=json"])
                    .activated(activation),
            );
        }

        Ok(ProvisionPlan {
            remove_existing: create && state != EnvState::Missing,
            layout,
            state,
            interpreter,
            requirements,
            steps,
        })
    }

    fn run_step<F>(&self, invocation: &ToolInvocation, mut record: F) -> Result<ToolOutput, ProvisionError>
    where
        F: FnMut(&StepRecord),
    {
        let command = invocation.command_line();
        info_log!("[{}] {}", invocation.step, command);
        let started = Instant::now();
        let result = self.runner.run(invocation);
        let exit_code = result.as_ref().ok().and_then(|o| o.exit_code);
        record(&StepRecord {
            step: invocation.step,
            command: command.clone(),
            exit_code,
            duration: started.elapsed(),
        });

        let output = result.map_err(|e| ProvisionError::InstallFailed {
            step: invocation.step,
            command: command.clone(),
            exit_code: None,
            packages: Vec::new(),
            stderr: e.to_string(),
        })?;
        if !output.stdout.trim().is_empty() {
            tracing::debug!(step = %invocation.step, "stdout:\n{}", output.stdout.trim_end());
        }
        if !output.stderr.trim().is_empty() {
            tracing::debug!(step = %invocation.step, "stderr:\n{}", output.stderr.trim_end());
        }
        if output.success() {
            return Ok(output);
        }

        let packages = if invocation.step == Step::InstallRequirements {
            failing_packages(&format!("{}\n{}", output.stdout, output.stderr))
        } else {
            Vec::new()
        };
        Err(ProvisionError::InstallFailed {
            step: invocation.step,
            command,
            exit_code: output.exit_code,
            packages,
            stderr: output.stderr,
        })
    }

    fn no_interpreter(&self, layout: &VenvLayout) -> ProvisionError {
        let program = self
            .settings
            .python
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "python3".to_string());
        ProvisionError::InstallFailed {
            step: Step::CreateEnv,
            command: format!("{} -m venv {}", program, layout.root().display()),
            exit_code: None,
            packages: Vec::new(),
            stderr: format!(
                "no usable Python interpreter found (set {} or pass --python)",
                keys::VENVKIT_PYTHON
            ),
        }
    }
}

/// Create `base` if needed and prove it is a writable directory.
fn ensure_base_dir(base: &Path) -> Result<(), ProvisionError> {
    if base.exists() && !base.is_dir() {
        return Err(ProvisionError::path(base, "exists and is not a directory"));
    }
    std::fs::create_dir_all(base).map_err(|e| ProvisionError::path(base, e))?;
    tempfile::Builder::new()
        .prefix(".venvkit-probe-")
        .tempfile_in(base)
        .map_err(|e| ProvisionError::path(base, format!("not writable: {}", e)))?;
    Ok(())
}

fn read_requirements(path: &Path) -> Result<Requirements, ProvisionError> {
    Requirements::read(path).map_err(|e| match e {
        RequirementsError::Unreadable { path, source } => ProvisionError::path(path, source),
    })
}
