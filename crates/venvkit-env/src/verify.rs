//! Post-install check: compare `pip list --format=json` with the requirements file.
//!
//! Only names and exact `==` pins are checked; ranges, markers, options and
//! direct references are not evaluated.

use serde::Deserialize;
use std::collections::HashMap;

use venvkit_core::requirements::{normalize_name, Requirements};

use crate::error::{ProvisionError, VersionMismatch};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
}

pub fn parse_pip_list(json: &str) -> Result<Vec<InstalledPackage>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Check every package entry against the installed set.
pub fn check(requirements: &Requirements, installed: &[InstalledPackage]) -> Result<(), ProvisionError> {
    let by_name: HashMap<String, &str> = installed
        .iter()
        .map(|p| (normalize_name(&p.name), p.version.as_str()))
        .collect();

    let mut missing = Vec::new();
    let mut mismatched = Vec::new();
    for entry in requirements.packages() {
        let Some(name) = entry.package_name() else { continue };
        match by_name.get(&normalize_name(name)) {
            None => missing.push(name.to_string()),
            Some(version) => {
                if let Some(required) = entry.exact_pin() {
                    if !versions_equal(required, version) {
                        mismatched.push(VersionMismatch {
                            name: name.to_string(),
                            required: required.to_string(),
                            installed: version.to_string(),
                        });
                    }
                }
            }
        }
    }

    if missing.is_empty() && mismatched.is_empty() {
        Ok(())
    } else {
        Err(ProvisionError::VerificationFailed { missing, mismatched })
    }
}

/// `1.0` == `1.0.0`; local labels (`+cpu`) must match exactly.
fn versions_equal(required: &str, installed: &str) -> bool {
    if required.eq_ignore_ascii_case(installed) {
        return true;
    }
    let split = |v: &str| -> (Vec<String>, String) {
        let (public, local) = v.split_once('+').unwrap_or((v, ""));
        let mut parts: Vec<String> = public.split('.').map(|s| s.to_lowercase()).collect();
        while parts.len() > 1 && parts.last().map(String::as_str) == Some("0") {
            parts.pop();
        }
        (parts, local.to_lowercase())
    };
    split(required) == split(installed)
}
