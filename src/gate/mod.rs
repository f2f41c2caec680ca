//! Validation gate — hard-failure policies applied after resolution
//!
//! Checks run in a fixed order and each one stops the run when any package
//! fails it. Within a check every offender is collected, so a single run
//! reports the complete list instead of the first hit.

use crate::config::ErrorOnPackage;
use crate::package::{LicensedPackageData, PackageRecord};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub const DEFAULT_PACKAGE_ERROR: &str = "package was declared in errorOnPackageNames option";

/// One package rejected by a check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offender {
    pub package: String,
    pub repository: Option<String>,
    pub licenses: String,
    /// Check-specific reason
    pub reason: Option<String>,
}

impl Offender {
    fn from_record(p: &PackageRecord, reason: Option<String>) -> Self {
        Self {
            package: p.key(),
            repository: p.repository.clone(),
            licenses: p.declared_licenses.to_string(),
            reason,
        }
    }
}

impl fmt::Display for Offender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {}", self.package, reason),
            None => write!(
                f,
                "{} (repo: {}, licenses: {})",
                self.package,
                self.repository.as_deref().unwrap_or("-"),
                self.licenses
            ),
        }
    }
}

fn list(offenders: &[Offender]) -> String {
    offenders
        .iter()
        .map(|o| format!("\n  - {}", o))
        .collect::<String>()
}

/// The first check that failed, with every package that failed it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateFailure {
    #[error("Errors on some packages:{}", list(.0))]
    DisallowedPackages(Vec<Offender>),

    #[error("Cannot use unlicensed packages:{}", list(.0))]
    Unlicensed(Vec<Offender>),

    #[error("Cannot use license texts from README files, as their content is error-prone:{}", list(.0))]
    ReadmeEvidence(Vec<Offender>),
}

impl GateFailure {
    pub fn offenders(&self) -> &[Offender] {
        match self {
            Self::DisallowedPackages(o) | Self::Unlicensed(o) | Self::ReadmeEvidence(o) => o,
        }
    }
}

/// Post-resolution invariant checks
pub struct ValidationGate {
    error_on: HashMap<String, String>,
}

impl ValidationGate {
    pub fn new(error_on_packages: &[ErrorOnPackage]) -> Self {
        let error_on = error_on_packages
            .iter()
            .map(|e| {
                let reason = e
                    .error
                    .clone()
                    .unwrap_or_else(|| DEFAULT_PACKAGE_ERROR.to_string());
                (e.name.clone(), reason)
            })
            .collect();
        Self { error_on }
    }

    /// Run all checks in order and convert the survivors into inventory entries
    pub fn validate(
        &self,
        packages: Vec<PackageRecord>,
    ) -> Result<Vec<LicensedPackageData>, GateFailure> {
        self.check_disallowed(&packages)?;
        check_unlicensed(&packages)?;
        check_readme_evidence(&packages)?;
        Ok(packages.into_iter().map(LicensedPackageData::from).collect())
    }

    /// Packages named in `errorOnPackageNames`. Excluded packages never reach
    /// the gate, so anything present here was not excluded.
    pub fn check_disallowed(&self, packages: &[PackageRecord]) -> Result<(), GateFailure> {
        let offenders: Vec<Offender> = packages
            .iter()
            .filter_map(|p| {
                self.error_on
                    .get(&p.name)
                    .map(|reason| Offender::from_record(p, Some(reason.clone())))
            })
            .collect();
        fail_if_any(offenders, GateFailure::DisallowedPackages)
    }
}

pub fn check_unlicensed(packages: &[PackageRecord]) -> Result<(), GateFailure> {
    let offenders: Vec<Offender> = packages
        .iter()
        .filter(|p| p.declared_licenses.is_unlicensed())
        .map(|p| Offender::from_record(p, None))
        .collect();
    fail_if_any(offenders, GateFailure::Unlicensed)
}

pub fn check_readme_evidence(packages: &[PackageRecord]) -> Result<(), GateFailure> {
    let offenders: Vec<Offender> = packages
        .iter()
        .filter(|p| p.has_readme_evidence())
        .map(|p| Offender::from_record(p, None))
        .collect();
    fail_if_any(offenders, GateFailure::ReadmeEvidence)
}

fn fail_if_any(
    offenders: Vec<Offender>,
    failure: fn(Vec<Offender>) -> GateFailure,
) -> Result<(), GateFailure> {
    if offenders.is_empty() {
        Ok(())
    } else {
        Err(failure(offenders))
    }
}
