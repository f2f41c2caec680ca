//! # Collection engine — orchestrates one run
//!
//! ```text
//! discovery ─► disallowed pre-check ─► LicenseResolver ─► ValidationGate ─► report
//!                                          │
//!                                   CandidateRacer ─► FetchCache ─► Transport
//! ```
//!
//! The engine owns the run's `FetchCache` and hands it to the resolver, so
//! every package of the run shares one single-flight URL table. The engine
//! never exits the process; failures come back as [`CollectError`] and the
//! binary picks the exit code.

use crate::config::CollectConfig;
use crate::discovery;
use crate::fetch::{FetchCache, HttpTransport};
use crate::gate::{GateFailure, ValidationGate};
use crate::package::{LicenseEvidence, LicensedPackageData, PackageRecord};
use crate::report;
use crate::resolve::LicenseResolver;
use crate::{CollectError, CollectResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ─── Run Statistics ────────────────────────────────────────────────

/// How the packages of a run were settled
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub packages: usize,
    pub from_overrides: usize,
    pub from_local_files: usize,
    pub from_remote: usize,
    pub without_license_file: usize,
    /// Network requests actually issued (after deduplication)
    pub requests_issued: usize,
    pub duration_ms: u64,
}

impl RunStats {
    fn tally(packages: &[PackageRecord]) -> Self {
        let mut stats = Self {
            packages: packages.len(),
            ..Default::default()
        };
        for p in packages {
            match p.evidence {
                LicenseEvidence::OverrideFile(_) => stats.from_overrides += 1,
                LicenseEvidence::LocalFile(_) => stats.from_local_files += 1,
                LicenseEvidence::RemoteFile(_) => stats.from_remote += 1,
                LicenseEvidence::None => stats.without_license_file += 1,
            }
        }
        stats
    }
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct Inventory {
    pub packages: Vec<LicensedPackageData>,
    pub stats: RunStats,
}

// ─── Engine ────────────────────────────────────────────────────────

pub struct CollectEngine {
    config: CollectConfig,
    cache: Arc<FetchCache>,
}

impl CollectEngine {
    /// Engine using real HTTP for remote fallback
    pub fn new(config: CollectConfig) -> CollectResult<Self> {
        let transport = HttpTransport::new(config.fetch_timeout())?;
        Ok(Self::with_cache(config, Arc::new(FetchCache::new(transport))))
    }

    /// Engine using a caller-provided fetch cache
    pub fn with_cache(config: CollectConfig, cache: Arc<FetchCache>) -> Self {
        Self { config, cache }
    }

    pub fn config(&self) -> &CollectConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<FetchCache> {
        &self.cache
    }

    /// Full run: discover, resolve, validate and write the JSON inventory.
    /// Nothing is written when any check fails.
    pub async fn run(&self) -> CollectResult<Inventory> {
        let root = self.config.package_root();
        tracing::info!("═══════════════════════════════════════════════════════");
        tracing::info!("License collection: {}", root.display());
        tracing::info!("═══════════════════════════════════════════════════════");
        self.config.log_summary();

        if !root.is_dir() {
            return Err(CollectError::Discovery(format!(
                "Package directory does not exist: {}",
                root.display()
            )));
        }

        let packages = discovery::discover(&root, &self.config)?;
        let inventory = self.process(packages).await?;

        tracing::info!("Found licenses:\n{}", report::render_table(&inventory.packages));

        let output = self.config.output_path();
        report::write_inventory(&inventory.packages, &output)?;
        tracing::info!("Written to: {}", output.display());

        Ok(inventory)
    }

    /// Resolve and validate already-discovered packages
    pub async fn process(&self, packages: Vec<PackageRecord>) -> Result<Inventory, GateFailure> {
        let start = std::time::Instant::now();
        let gate = ValidationGate::new(&self.config.error_on_package_names);

        // ── Step 1: fail before any network traffic on disallowed names ──
        gate.check_disallowed(&packages)?;

        // ── Step 2: strategy chain, all packages concurrently ──
        let resolver = LicenseResolver::new(
            Arc::clone(&self.cache),
            self.config.license_overrides_path.clone(),
        );
        let resolved = resolver.resolve_all(packages).await;

        let mut stats = RunStats::tally(&resolved);
        stats.requests_issued = self.cache.requests_issued();

        // ── Step 3: hard gates ──
        let packages = gate.validate(resolved)?;

        stats.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Resolved {} packages in {}ms ({} overrides, {} remote, {} requests)",
            stats.packages,
            stats.duration_ms,
            stats.from_overrides,
            stats.from_remote,
            stats.requests_issued
        );

        Ok(Inventory { packages, stats })
    }
}
