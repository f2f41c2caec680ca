//! Report output — the JSON inventory file and the console summary table

use crate::package::LicensedPackageData;
use crate::CollectResult;
use std::path::Path;

/// Write the inventory as a JSON array indented by two spaces, creating
/// parent directories
pub fn write_inventory(packages: &[LicensedPackageData], output: &Path) -> CollectResult<()> {
    let content = serde_json::to_string_pretty(packages)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, content)?;
    Ok(())
}

/// Render a `package | repo | licenses` table for the console
pub fn render_table(packages: &[LicensedPackageData]) -> String {
    let rows: Vec<[String; 3]> = packages
        .iter()
        .map(|p| {
            [
                format!("{}@{}", p.name, p.version),
                p.repository.clone().unwrap_or_default(),
                p.licenses.join(", "),
            ]
        })
        .collect();

    let header = ["package", "repo", "licenses"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: [&str; 3]| {
        format!(
            "{:<w0$} │ {:<w1$} │ {}",
            cells[0],
            cells[1],
            cells[2],
            w0 = widths[0],
            w1 = widths[1]
        )
        .trim_end()
        .to_string()
    };

    let mut out = line(header);
    out.push('\n');
    out.push_str(&format!(
        "{}─┼─{}─┼─{}",
        "─".repeat(widths[0]),
        "─".repeat(widths[1]),
        "─".repeat(widths[2])
    ));
    for row in &rows {
        out.push('\n');
        out.push_str(&line([row[0].as_str(), row[1].as_str(), row[2].as_str()]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, repo: Option<&str>) -> LicensedPackageData {
        LicensedPackageData {
            name: name.into(),
            version: "1.0.0".into(),
            description: None,
            repository: repo.map(str::to_string),
            url: None,
            publisher: None,
            licenses: vec!["MIT".into(), "Apache-2.0".into()],
            license_text: "text".into(),
        }
    }

    #[test]
    fn test_table_rows() {
        let table = render_table(&[entry("a", Some("https://github.com/x/a")), entry("bb", None)]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("package"));
        assert!(lines[2].starts_with("a@1.0.0 "));
        assert!(lines[2].contains("https://github.com/x/a"));
        assert!(lines[3].ends_with("MIT, Apache-2.0"));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("build/licenses.json");
        write_inventory(&[entry("a", None)], &out).unwrap();

        let parsed: Vec<LicensedPackageData> =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(parsed, vec![entry("a", None)]);
    }

    #[test]
    fn test_inventory_layout() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("licenses.json");
        write_inventory(&[entry("a", None)], &out).unwrap();

        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.starts_with("[\n  {\n    \"name\": \"a\","));
        assert!(written.contains("\"licenseText\": \"text\""));
        assert!(!written.contains("\"description\""));
    }
}
