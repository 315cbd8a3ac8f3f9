//! Observability: tracing init and JSONL audit log.
//!
//! Uses config::ObservabilityConfig for VENVKIT_QUIET, LOG_LEVEL, LOG_JSON, AUDIT_LOG.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;

use chrono::Utc;
use serde_json::json;
use tracing_subscriber::{prelude::*, EnvFilter};
use venvkit_core::config::ObservabilityConfig;
use venvkit_env::StepRecord;

/// Initialize tracing. Call at process startup.
/// When VENVKIT_QUIET=1, only WARN and above are logged.
pub fn init_tracing() {
    let cfg = ObservabilityConfig::from_env();
    let level = if cfg.quiet {
        "venvkit=warn".to_string()
    } else {
        cfg.log_level.clone()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    // Logs go to stderr; stdout carries command output (activate, dry-run).
    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}

fn get_audit_path() -> Option<&'static str> {
    static PATH: OnceLock<Option<String>> = OnceLock::new();
    PATH.get_or_init(|| {
        let path = ObservabilityConfig::from_env().audit_log.clone()?;
        if let Some(parent) = Path::new(&path).parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        Some(path)
    })
    .as_deref()
}

fn append_jsonl(path: &str, record: &serde_json::Value) {
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(f, "{}", line);
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn started_record(env_dir: &Path, requirements: &Path, dry_run: bool) -> serde_json::Value {
    json!({
        "ts": now(),
        "event": "provision_started",
        "env_dir": env_dir.display().to_string(),
        "requirements": requirements.display().to_string(),
        "dry_run": dry_run,
    })
}

fn step_record(record: &StepRecord) -> serde_json::Value {
    json!({
        "ts": now(),
        "event": "step_finished",
        "step": record.step.as_str(),
        "command": record.command,
        "exit_code": record.exit_code,
        "duration_ms": record.duration.as_millis() as u64,
    })
}

fn finished_record(env_dir: &Path, error: Option<&str>) -> serde_json::Value {
    json!({
        "ts": now(),
        "event": "provision_finished",
        "env_dir": env_dir.display().to_string(),
        "success": error.is_none(),
        "error": error,
    })
}

/// Audit: provisioning run begins
pub fn audit_provision_started(env_dir: &Path, requirements: &Path, dry_run: bool) {
    if let Some(path) = get_audit_path() {
        append_jsonl(path, &started_record(env_dir, requirements, dry_run));
    }
}

/// Audit: one tool invocation finished (any exit status)
pub fn audit_step(record: &StepRecord) {
    if let Some(path) = get_audit_path() {
        append_jsonl(path, &step_record(record));
    }
}

/// Audit: provisioning run ended
pub fn audit_provision_finished(env_dir: &Path, error: Option<&str>) {
    if let Some(path) = get_audit_path() {
        append_jsonl(path, &finished_record(env_dir, error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use venvkit_env::Step;

    #[test]
    fn test_records_append_as_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("audit.jsonl");
        let log_str = log.to_str().unwrap();
        let env_dir = Path::new("/opt/envs/venv");

        append_jsonl(log_str, &started_record(env_dir, Path::new("requirements.txt"), false));
        append_jsonl(
            log_str,
            &step_record(&StepRecord {
                step: Step::UpgradeInstaller,
                command: "python -m pip install -U pip".into(),
                exit_code: Some(0),
                duration: Duration::from_millis(1500),
            }),
        );
        append_jsonl(log_str, &finished_record(env_dir, Some("upgrade pip failed")));

        let lines: Vec<serde_json::Value> = std::fs::read_to_string(&log)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["event"], "provision_started");
        assert_eq!(lines[1]["step"], "upgrade pip");
        assert_eq!(lines[1]["duration_ms"], 1500);
        assert_eq!(lines[2]["success"], false);
        assert_eq!(lines[2]["error"], "upgrade pip failed");
    }
}
