//! `venvkit provision`

use anyhow::Result;
use std::fmt::Write as _;

use venvkit_core::config::ProvisionSettings;
use venvkit_env::{EnvState, ProvisionPlan, Provisioner};

use crate::observability;

pub fn cmd_provision(settings: ProvisionSettings, dry_run: bool) -> Result<()> {
    let env_dir = settings.env_dir();
    let requirements = settings.requirements.clone();
    let provisioner = Provisioner::new(settings);

    if dry_run {
        observability::audit_provision_started(&env_dir, &requirements, true);
        let plan = provisioner.plan()?;
        print!("{}", render_plan(&plan));
        return Ok(());
    }

    observability::audit_provision_started(&env_dir, &requirements, false);
    let result = provisioner.provision_with(observability::audit_step);
    let error = result.as_ref().err().map(|e| e.to_string());
    observability::audit_provision_finished(&env_dir, error.as_deref());
    let report = result?;

    eprintln!(
        "✓ Environment {} at {}",
        if report.created { "created" } else { "updated" },
        report.env_dir.display()
    );
    eprintln!("  python: {}", report.python.display());
    eprintln!("  requirements: {}", report.requirements);
    if report.verified {
        eprintln!("  verified: installed packages match requirements");
    }
    Ok(())
}

fn state_label(state: EnvState) -> &'static str {
    match state {
        EnvState::Missing => "missing",
        EnvState::Incomplete => "incomplete",
        EnvState::Complete => "complete",
    }
}

/// Human-readable dry-run output.
pub fn render_plan(plan: &ProvisionPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Environment: {} ({})",
        plan.layout.root().display(),
        state_label(plan.state)
    );
    if plan.remove_existing {
        let _ = writeln!(out, "Would remove: {}", plan.layout.root().display());
    }
    let _ = writeln!(out, "Requirements: {} entries", plan.requirements.len());
    let _ = writeln!(out, "Would run:");
    for step in &plan.steps {
        let _ = writeln!(out, "  [{}] {}", step.step, step.command_line());
    }
    out
}
