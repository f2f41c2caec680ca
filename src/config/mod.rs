//! Collector configuration — `.collect-licenses.toml` plus CLI overrides
//!
//! Keys use the same camelCase names as the options object of the npm tool
//! this replaces, so an existing option set can be pasted into TOML as-is:
//!
//! ```toml
//! licenseOverridesPath = "licenses"
//! excludedPackages = ["@fortawesome/fontawesome-free@5.15.3"]
//! excludedSPDXLicenses = ["0BSD"]
//!
//! [[errorOnPackageNames]]
//! name = "@fortawesome/fontawesome-free"
//! error = "not sure version also embeds license in stylesheets"
//! ```

use crate::fetch::http::DEFAULT_TIMEOUT_SECS;
use crate::{CollectError, CollectResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAMES: [&str; 2] = [".collect-licenses.toml", "collect-licenses.toml"];
pub const DEFAULT_OUTPUT_FILE: &str = "licenses.json";

/// A package name that must fail the run unless it was excluded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorOnPackage {
    pub name: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorOnPackage {
    /// Parse `NAME` or `NAME=REASON`
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('=') {
            Some((name, reason)) if !reason.trim().is_empty() => Self {
                name: name.trim().to_string(),
                error: Some(reason.trim().to_string()),
            },
            Some((name, _)) => Self { name: name.trim().to_string(), error: None },
            None => Self { name: raw.trim().to_string(), error: None },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectConfig {
    /// Directory of `name@version.txt` files that replace a package's license text
    #[serde(default)]
    pub license_overrides_path: Option<PathBuf>,

    /// Directory holding `package.json` and `node_modules`
    #[serde(default)]
    pub package_to_check_path: Option<PathBuf>,

    /// Where the JSON inventory is written
    #[serde(default)]
    pub output_file_path: Option<PathBuf>,

    /// `name@version` entries dropped before resolution
    #[serde(default)]
    pub excluded_packages: Vec<String>,

    /// License identifiers dropped before resolution
    #[serde(default, rename = "excludedSPDXLicenses")]
    pub excluded_spdx_licenses: Vec<String>,

    #[serde(default)]
    pub error_on_package_names: Vec<ErrorOnPackage>,

    /// Per-request timeout for remote license fetches
    #[serde(default = "default_timeout")]
    pub fetch_timeout_secs: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            license_overrides_path: None,
            package_to_check_path: None,
            output_file_path: None,
            excluded_packages: vec![],
            excluded_spdx_licenses: vec![],
            error_on_package_names: vec![],
            fetch_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl CollectConfig {
    pub fn from_file(path: &Path) -> CollectResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CollectError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            CollectError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Load the first config file found in `root`, or defaults when there is none.
    /// A file that exists but cannot be parsed is an error.
    pub fn from_project_root(root: &Path) -> CollectResult<Self> {
        for name in CONFIG_FILE_NAMES {
            let path = root.join(name);
            if path.exists() {
                let config = Self::from_file(&path)?;
                tracing::info!("Loaded configuration from {}", path.display());
                return Ok(config);
            }
        }
        Ok(Self::default())
    }

    /// Turn every configured path into an absolute one, relative to `cwd`,
    /// and fill in the defaults.
    pub fn resolve_paths(mut self, cwd: &Path) -> Self {
        let absolute = |p: PathBuf| if p.is_absolute() { p } else { cwd.join(p) };

        self.package_to_check_path = Some(
            self.package_to_check_path
                .take()
                .map(absolute)
                .unwrap_or_else(|| cwd.to_path_buf()),
        );
        self.output_file_path = Some(
            self.output_file_path
                .take()
                .map(absolute)
                .unwrap_or_else(|| cwd.join(DEFAULT_OUTPUT_FILE)),
        );
        self.license_overrides_path = self.license_overrides_path.take().map(absolute);
        self
    }

    pub fn package_root(&self) -> PathBuf {
        self.package_to_check_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_file_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_FILE))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Log the effective configuration
    pub fn log_summary(&self) {
        tracing::info!("Checking packages in package: {}", self.package_root().display());
        match &self.license_overrides_path {
            Some(p) => tracing::info!("Using license overrides from: {}", p.display()),
            None => tracing::info!("Using no license overrides."),
        }
        tracing::info!("Excluding packages: {:?}", self.excluded_packages);
        tracing::info!("Excluding licenses: {:?}", self.excluded_spdx_licenses);
        tracing::info!(
            "Error on non-excluded package names: {:?}",
            self.error_on_package_names
                .iter()
                .map(|e| e.name.as_str())
                .collect::<Vec<_>>()
        );
        tracing::info!("Resulting JSON will be written to: {}", self.output_path().display());
    }
}
