//! License resolution — the per-package strategy chain
//!
//! Strategies, in precedence order:
//!
//! 1. **Override**: `<overrides>/<name>@<version>.txt` wins whenever it is
//!    readable, regardless of what the package ships.
//! 2. **Declared file**: a discovered license file that is not a README is
//!    accepted as-is.
//! 3. **Remote fallback**: a README-shaped file is never trusted; for GitHub
//!    repositories the conventional license files at the exact version tag
//!    are raced through the [`CandidateRacer`].
//!
//! Resolution never fails hard. A package that cannot be resolved keeps its
//! README evidence and is rejected later by the validation gate.

use crate::fetch::{CandidateRacer, FetchCache};
use crate::package::{LicenseEvidence, PackageRecord};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The only repository host remote fallback knows how to address
pub const SUPPORTED_HOST_PREFIX: &str = "https://github.com/";

/// Conventional license file names, most trusted first
pub const LICENSE_FILE_NAMES: [&str; 3] = ["LICENSE", "LICENSE.md", "LICENSE.txt"];

/// Which strategy settled a package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Override,
    Declared,
    Remote,
    Unresolved,
}

/// Applies the strategy chain to package records
#[derive(Clone)]
pub struct LicenseResolver {
    racer: CandidateRacer,
    overrides_dir: Option<PathBuf>,
}

impl LicenseResolver {
    pub fn new(cache: Arc<FetchCache>, overrides_dir: Option<PathBuf>) -> Self {
        Self {
            racer: CandidateRacer::new(cache),
            overrides_dir,
        }
    }

    /// Resolve every package concurrently. Output order equals input order.
    pub async fn resolve_all(&self, packages: Vec<PackageRecord>) -> Vec<PackageRecord> {
        join_all(packages.into_iter().map(|mut p| async move {
            self.resolve(&mut p).await;
            p
        }))
        .await
    }

    /// Resolve a single package in place
    pub async fn resolve(&self, package: &mut PackageRecord) -> Resolution {
        if let Some(dir) = &self.overrides_dir {
            if apply_override(package, dir) {
                tracing::info!("Using license override for {}: {}", package.key(), package.evidence);
                return Resolution::Override;
            }
        }

        if !package.has_readme_evidence() {
            return Resolution::Declared;
        }

        self.remote_fallback(package).await
    }

    async fn remote_fallback(&self, package: &mut PackageRecord) -> Resolution {
        let repository = match package.repository.as_deref() {
            Some(repo) if repo.starts_with(SUPPORTED_HOST_PREFIX) => repo,
            other => {
                tracing::warn!(
                    "Cannot find remote license for {} due to unknown repository host: {}",
                    package.key(),
                    other.unwrap_or("(none)")
                );
                return Resolution::Unresolved;
            }
        };

        let candidates = candidate_urls(repository, &package.version);
        match self.racer.first_matching(&candidates, |r| r.ok).await {
            Some(found) => {
                tracing::info!("Found remote license for {}: {}", package.key(), found.url);
                package.evidence = LicenseEvidence::RemoteFile(found.url);
                package.license_text = found.body;
                Resolution::Remote
            }
            None => {
                tracing::warn!(
                    "Failed to fetch remote LICENSE file for {}: none of {:?} gave an OK response",
                    package.key(),
                    LICENSE_FILE_NAMES
                );
                Resolution::Unresolved
            }
        }
    }
}

/// `{repository}/raw/{version}/{name}` for each conventional file name, in
/// precedence order
pub fn candidate_urls(repository: &str, version: &str) -> Vec<String> {
    let base = repository.trim_end_matches('/');
    LICENSE_FILE_NAMES
        .iter()
        .map(|name| format!("{}/raw/{}/{}", base, version, name))
        .collect()
}

/// Path of the override file for a package. Scoped names land in a
/// `@scope/` subdirectory.
pub fn override_path(dir: &Path, package: &PackageRecord) -> PathBuf {
    dir.join(format!("{}.txt", package.key()))
}

/// Replace the license text from the overrides directory. Returns whether an
/// override was applied; a missing or unreadable file is not an error.
fn apply_override(package: &mut PackageRecord, dir: &Path) -> bool {
    let candidate = override_path(dir, package);
    let resolved = match std::fs::canonicalize(&candidate) {
        Ok(p) => p,
        Err(_) => return false,
    };
    match std::fs::read_to_string(&resolved) {
        Ok(text) => {
            package.evidence = LicenseEvidence::OverrideFile(resolved);
            package.license_text = text;
            true
        }
        Err(e) => {
            tracing::debug!("Override {} not readable: {}", resolved.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::DeclaredLicenses;

    #[test]
    fn test_candidate_urls_keep_precedence() {
        let urls = candidate_urls("https://github.com/feross/buffer/", "6.0.3");
        assert_eq!(
            urls,
            vec![
                "https://github.com/feross/buffer/raw/6.0.3/LICENSE",
                "https://github.com/feross/buffer/raw/6.0.3/LICENSE.md",
                "https://github.com/feross/buffer/raw/6.0.3/LICENSE.txt",
            ]
        );
    }

    #[test]
    fn test_scoped_override_path() {
        let p = PackageRecord::new("@babel/core", "7.24.0", DeclaredLicenses::single("MIT"));
        assert_eq!(
            override_path(Path::new("/licenses"), &p),
            PathBuf::from("/licenses/@babel/core@7.24.0.txt")
        );
    }

    #[test]
    fn test_missing_override_is_not_applied() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut p = PackageRecord::new("a", "1.0.0", DeclaredLicenses::single("MIT"))
            .with_local_license("node_modules/a/LICENSE", "MIT text");

        assert!(!apply_override(&mut p, dir.path()));
        assert_eq!(p.license_text, "MIT text");
        assert!(matches!(p.evidence, LicenseEvidence::LocalFile(_)));
    }
}
