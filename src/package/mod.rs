//! Package records — the unit that flows through discovery, resolution and
//! the validation gate.
//!
//! A `PackageRecord` is created by discovery, enriched by the resolver and
//! finally either rejected by the gate or turned into a `LicensedPackageData`
//! entry of the JSON inventory.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

// ─── Declared Licenses ─────────────────────────────────────────────

/// What the package manifest says about its license
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclaredLicenses {
    /// One or more license identifiers, in manifest order
    Identifiers(Vec<String>),
    /// The manifest explicitly declares the package as `UNLICENSED`
    Unlicensed,
}

impl DeclaredLicenses {
    /// Build from a single manifest string, recognising the `UNLICENSED` sentinel
    pub fn from_manifest(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("UNLICENSED") {
            Self::Unlicensed
        } else {
            Self::Identifiers(vec![trimmed.to_string()])
        }
    }

    pub fn single(id: impl Into<String>) -> Self {
        Self::Identifiers(vec![id.into()])
    }

    pub fn is_unlicensed(&self) -> bool {
        matches!(self, Self::Unlicensed)
    }

    /// Identifiers as they appear in the output inventory
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::Identifiers(ids) => ids.clone(),
            Self::Unlicensed => vec!["UNLICENSED".to_string()],
        }
    }
}

impl fmt::Display for DeclaredLicenses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifiers(ids) => write!(f, "{}", ids.join(", ")),
            Self::Unlicensed => write!(f, "UNLICENSED"),
        }
    }
}

// ─── License Evidence ──────────────────────────────────────────────

/// Where a package's license text came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LicenseEvidence {
    /// A file found inside the installed package
    LocalFile(PathBuf),
    /// A `name@version.txt` file from the overrides directory
    OverrideFile(PathBuf),
    /// A license file downloaded from the package's repository
    RemoteFile(String),
    /// No license file at all
    None,
}

impl LicenseEvidence {
    /// Whether the evidence is a README rather than a dedicated license file
    pub fn is_readme(&self) -> bool {
        match self {
            Self::LocalFile(path) | Self::OverrideFile(path) => is_readme_path(path),
            Self::RemoteFile(url) => url
                .rsplit('/')
                .next()
                .map(is_readme_name)
                .unwrap_or(false),
            Self::None => false,
        }
    }
}

impl fmt::Display for LicenseEvidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalFile(p) => write!(f, "{}", p.display()),
            Self::OverrideFile(p) => write!(f, "override {}", p.display()),
            Self::RemoteFile(url) => write!(f, "{}", url),
            Self::None => write!(f, "(none)"),
        }
    }
}

static README_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^README(|\.txt|\.md|\.markdown)$").expect("valid regex"));

/// `README`, `README.txt`, `README.md` or `README.markdown`, any case
pub fn is_readme_name(file_name: &str) -> bool {
    README_RE.is_match(file_name)
}

/// Same as [`is_readme_name`] applied to the final path component
pub fn is_readme_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(is_readme_name)
        .unwrap_or(false)
}

// ─── Package Record ────────────────────────────────────────────────

/// A third-party package as seen by the resolution pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    /// Normalized source-control URL
    pub repository: Option<String>,
    /// Homepage or author URL
    pub url: Option<String>,
    pub publisher: Option<String>,
    pub email: Option<String>,
    pub declared_licenses: DeclaredLicenses,
    pub evidence: LicenseEvidence,
    pub license_text: String,
}

impl PackageRecord {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        declared_licenses: DeclaredLicenses,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
            repository: None,
            url: None,
            publisher: None,
            email: None,
            declared_licenses,
            evidence: LicenseEvidence::None,
            license_text: String::new(),
        }
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    pub fn with_local_license(mut self, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        self.evidence = LicenseEvidence::LocalFile(path.into());
        self.license_text = text.into();
        self
    }

    /// Unique key `name@version`
    pub fn key(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    pub fn has_readme_evidence(&self) -> bool {
        self.evidence.is_readme()
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} (repo: {}, licenses: {})",
            self.name,
            self.version,
            self.repository.as_deref().unwrap_or("-"),
            self.declared_licenses
        )
    }
}

// ─── Inventory Entry ───────────────────────────────────────────────

/// One element of the output JSON inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicensedPackageData {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    pub licenses: Vec<String>,
    pub license_text: String,
}

impl From<PackageRecord> for LicensedPackageData {
    fn from(p: PackageRecord) -> Self {
        Self {
            licenses: p.declared_licenses.to_vec(),
            name: p.name,
            version: p.version,
            description: p.description,
            repository: p.repository,
            url: p.url,
            publisher: p.publisher,
            license_text: p.license_text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readme_names() {
        for name in ["README", "readme", "README.md", "Readme.Markdown", "README.txt"] {
            assert!(is_readme_name(name), "{name} should be README-shaped");
        }
        for name in ["LICENSE", "README.rst", "README-LICENSE", "LICENSE.md", "READMEs"] {
            assert!(!is_readme_name(name), "{name} should not be README-shaped");
        }
    }

    #[test]
    fn test_evidence_readme_shape() {
        assert!(LicenseEvidence::LocalFile("node_modules/a/README.md".into()).is_readme());
        assert!(!LicenseEvidence::LocalFile("node_modules/a/LICENSE".into()).is_readme());
        assert!(!LicenseEvidence::RemoteFile("https://github.com/a/b/raw/1.0/LICENSE".into()).is_readme());
        assert!(!LicenseEvidence::None.is_readme());
    }

    #[test]
    fn test_unlicensed_sentinel() {
        assert!(DeclaredLicenses::from_manifest("UNLICENSED").is_unlicensed());
        assert!(DeclaredLicenses::from_manifest("unlicensed").is_unlicensed());
        assert_eq!(
            DeclaredLicenses::from_manifest(" MIT "),
            DeclaredLicenses::single("MIT")
        );
    }

    #[test]
    fn test_inventory_entry_json_shape() {
        let mut rec = PackageRecord::new("left-pad", "1.3.0", DeclaredLicenses::single("WTFPL"))
            .with_local_license("node_modules/left-pad/LICENSE", "do what you want");
        rec.publisher = Some("azer".into());

        let json = serde_json::to_value(LicensedPackageData::from(rec)).unwrap();
        assert_eq!(json["name"], "left-pad");
        assert_eq!(json["licenses"], serde_json::json!(["WTFPL"]));
        assert_eq!(json["licenseText"], "do what you want");
        assert_eq!(json["publisher"], "azer");
        assert!(json.get("description").is_none());
        assert!(json.get("repository").is_none());
    }
}
