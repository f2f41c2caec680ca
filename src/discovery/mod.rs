//! npm dependency discovery — produces the raw package records
//!
//! Walks the production dependency graph (`dependencies` and
//! `optionalDependencies`) starting at the project's `package.json`, using
//! Node's resolution rule: a dependency is the nearest
//! `node_modules/<name>` found walking upward from the package requiring it.
//! Private packages are skipped. Records come back in first-discovery order,
//! deduplicated by `name@version`.

use crate::config::CollectConfig;
use crate::package::{is_readme_name, DeclaredLicenses, PackageRecord};
use crate::{CollectError, CollectResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

static LICENSE_FILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(LICENSE|LICENCE|COPYING)([-._].*)?$").expect("valid regex")
});

/// `Name <email> (url)`
static AUTHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([^<(]*?)\s*(?:<([^>]+)>)?\s*(?:\(([^)]+)\))?\s*$").expect("valid regex")
});

/// Declared license of a package that states none
pub const UNKNOWN_LICENSE: &str = "UNKNOWN";

// ─── Walk ──────────────────────────────────────────────────────────

/// Discover all production dependencies below `root` and apply the
/// configured exclusions
pub fn discover(root: &Path, config: &CollectConfig) -> CollectResult<Vec<PackageRecord>> {
    let packages = walk(root)?;
    let total = packages.len();
    let kept = apply_exclusions(packages, config);
    tracing::info!(
        "Discovered {} packages ({} excluded)",
        kept.len(),
        total - kept.len()
    );
    Ok(kept)
}

/// Walk the dependency graph without applying exclusions
pub fn walk(root: &Path) -> CollectResult<Vec<PackageRecord>> {
    let root_manifest = read_manifest(&root.join("package.json")).map_err(|e| {
        CollectError::Discovery(format!("{}: {}", root.display(), e))
    })?;
    // Symlinked installs (pnpm) resolve their dependencies from the real path
    let real_root = std::fs::canonicalize(root)
        .map_err(|e| CollectError::Discovery(format!("{}: {}", root.display(), e)))?;
    let root = real_root.as_path();

    let mut records = Vec::new();
    let mut seen_keys = HashSet::new();
    let mut visited_dirs = HashSet::new();
    let mut queue = VecDeque::new();

    visited_dirs.insert(root.to_path_buf());
    push_record(root, &root_manifest, &mut records, &mut seen_keys);
    enqueue_dependencies(root, &root_manifest, &mut queue);

    while let Some(req) = queue.pop_front() {
        let Some(dir) = locate(root, &req.from, &req.name) else {
            if req.optional {
                tracing::debug!("Optional dependency {} not installed", req.name);
            } else {
                tracing::warn!(
                    "Dependency {} of {} is not installed",
                    req.name,
                    req.from.display()
                );
            }
            continue;
        };

        if !visited_dirs.insert(dir.clone()) {
            continue;
        }

        let manifest = read_manifest(&dir.join("package.json"))
            .map_err(|e| CollectError::Discovery(format!("{}: {}", dir.display(), e)))?;
        push_record(&dir, &manifest, &mut records, &mut seen_keys);
        enqueue_dependencies(&dir, &manifest, &mut queue);
    }

    Ok(records)
}

struct DependencyRequest {
    from: PathBuf,
    name: String,
    optional: bool,
}

fn enqueue_dependencies(dir: &Path, manifest: &Value, queue: &mut VecDeque<DependencyRequest>) {
    for (field, optional) in [("dependencies", false), ("optionalDependencies", true)] {
        if let Some(deps) = manifest[field].as_object() {
            for name in deps.keys() {
                queue.push_back(DependencyRequest {
                    from: dir.to_path_buf(),
                    name: name.clone(),
                    optional,
                });
            }
        }
    }
}

/// Nearest `node_modules/<name>` from `from` upward, never leaving `root`.
/// Returns the real path so symlinked packages see their own siblings.
fn locate(root: &Path, from: &Path, name: &str) -> Option<PathBuf> {
    let mut current = Some(from);
    while let Some(dir) = current {
        let candidate = dir.join("node_modules").join(name);
        if candidate.join("package.json").is_file() {
            return Some(std::fs::canonicalize(&candidate).unwrap_or(candidate));
        }
        if dir == root {
            break;
        }
        current = dir.parent();
    }
    None
}

fn read_manifest(path: &Path) -> Result<Value, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read package.json: {}", e))?;
    serde_json::from_str(&content).map_err(|e| format!("Invalid package.json: {}", e))
}

fn push_record(
    dir: &Path,
    manifest: &Value,
    records: &mut Vec<PackageRecord>,
    seen: &mut HashSet<String>,
) {
    if manifest["private"].as_bool() == Some(true) {
        tracing::debug!("Skipping private package at {}", dir.display());
        return;
    }
    let Some(record) = record_from_manifest(dir, manifest) else {
        tracing::debug!("Skipping unnamed package at {}", dir.display());
        return;
    };
    if seen.insert(record.key()) {
        records.push(record);
    }
}

// ─── Manifest → Record ─────────────────────────────────────────────

/// Build a record from a parsed `package.json` located in `dir`
pub fn record_from_manifest(dir: &Path, manifest: &Value) -> Option<PackageRecord> {
    let name = manifest["name"].as_str()?;
    let version = manifest["version"].as_str().unwrap_or("0.0.0");

    let mut record = PackageRecord::new(name, version, declared_licenses(manifest));
    record.description = non_empty(manifest["description"].as_str());
    record.repository = repository_url(&manifest["repository"]);

    let author = parse_author(&manifest["author"]);
    record.publisher = author.name;
    record.email = author.email;
    record.url = author.url.or_else(|| non_empty(manifest["homepage"].as_str()));

    if let Some(path) = find_license_file(dir) {
        match std::fs::read(&path) {
            Ok(bytes) => {
                record = record.with_local_license(path, String::from_utf8_lossy(&bytes));
            }
            Err(e) => tracing::warn!("Failed to read {}: {}", path.display(), e),
        }
    }

    Some(record)
}

fn declared_licenses(manifest: &Value) -> DeclaredLicenses {
    match &manifest["license"] {
        Value::String(s) if !s.trim().is_empty() => return DeclaredLicenses::from_manifest(s),
        Value::Object(o) => {
            if let Some(t) = o.get("type").and_then(Value::as_str) {
                return DeclaredLicenses::from_manifest(t);
            }
        }
        _ => {}
    }

    // Legacy `licenses: [{ type, url }]`
    if let Some(list) = manifest["licenses"].as_array() {
        let ids: Vec<String> = list
            .iter()
            .filter_map(|l| match l {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Object(o) => o.get("type").and_then(Value::as_str).map(str::to_string),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect();
        if ids.len() == 1 {
            return DeclaredLicenses::from_manifest(&ids[0]);
        }
        if !ids.is_empty() {
            return DeclaredLicenses::Identifiers(ids);
        }
    }

    DeclaredLicenses::single(UNKNOWN_LICENSE)
}

/// First dedicated license file in `dir` (sorted by name), else a README
pub fn find_license_file(dir: &Path) -> Option<PathBuf> {
    let mut readme = None;
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let name = entry.file_name().to_string_lossy();
        if LICENSE_FILE_RE.is_match(&name) {
            return Some(entry.path().to_path_buf());
        }
        if readme.is_none() && is_readme_name(&name) {
            readme = Some(entry.path().to_path_buf());
        }
    }
    readme
}

/// Normalize a manifest `repository` field to a browsable `https://` URL
pub fn repository_url(field: &Value) -> Option<String> {
    let raw = match field {
        Value::String(s) => s.as_str(),
        Value::Object(o) => o.get("url").and_then(Value::as_str)?,
        _ => return None,
    };
    normalize_repository(raw)
}

pub fn normalize_repository(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let mut url = raw.strip_prefix("git+").unwrap_or(raw).to_string();

    if let Some(rest) = url.strip_prefix("github:") {
        url = format!("https://github.com/{}", rest);
    } else if let Some(rest) = url.strip_prefix("git://") {
        url = format!("https://{}", rest);
    } else if let Some(rest) = url.strip_prefix("ssh://git@") {
        url = format!("https://{}", rest);
    } else if let Some(rest) = url.strip_prefix("git@") {
        url = format!("https://{}", rest.replacen(':', "/", 1));
    } else if !url.contains(':') && url.matches('/').count() == 1 {
        // `user/repo` shorthand
        url = format!("https://github.com/{}", url);
    }

    let url = url.trim_end_matches('/');
    let url = url.strip_suffix(".git").unwrap_or(url);
    Some(url.to_string())
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Author {
    name: Option<String>,
    email: Option<String>,
    url: Option<String>,
}

fn parse_author(field: &Value) -> Author {
    match field {
        Value::String(s) => match AUTHOR_RE.captures(s) {
            Some(caps) => Author {
                name: non_empty(caps.get(1).map(|m| m.as_str())),
                email: non_empty(caps.get(2).map(|m| m.as_str())),
                url: non_empty(caps.get(3).map(|m| m.as_str())),
            },
            None => Author { name: non_empty(Some(s.as_str())), ..Default::default() },
        },
        Value::Object(o) => Author {
            name: non_empty(o.get("name").and_then(Value::as_str)),
            email: non_empty(o.get("email").and_then(Value::as_str)),
            url: non_empty(o.get("url").and_then(Value::as_str)),
        },
        _ => Author::default(),
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

// ─── Exclusions ────────────────────────────────────────────────────

/// Drop `excludedPackages` entries and packages whose every declared license
/// is in `excludedSPDXLicenses`
pub fn apply_exclusions(packages: Vec<PackageRecord>, config: &CollectConfig) -> Vec<PackageRecord> {
    let excluded_keys: HashSet<&str> = config.excluded_packages.iter().map(String::as_str).collect();
    let excluded_licenses: HashSet<String> = config
        .excluded_spdx_licenses
        .iter()
        .map(|l| l.to_uppercase())
        .collect();

    packages
        .into_iter()
        .filter(|p| {
            if excluded_keys.contains(p.key().as_str()) {
                tracing::debug!("Excluding package {}", p.key());
                return false;
            }
            // UNLICENSED matches as its own identifier
            let ids = p.declared_licenses.to_vec();
            if !ids.is_empty()
                && !excluded_licenses.is_empty()
                && ids.iter().all(|id| excluded_licenses.contains(&id.to_uppercase()))
            {
                tracing::debug!("Excluding {} by license {}", p.key(), p.declared_licenses);
                return false;
            }
            true
        })
        .collect()
}
