//! collect-licenses CLI
//!
//! Writes the license inventory of an npm project and exits non-zero when
//! discovery fails or any package fails a license check.

use clap::Parser;
use collect_licenses::{CollectConfig, CollectEngine, CollectResult, ErrorOnPackage};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "collect-licenses")]
#[command(author, version, about = "Collect third-party license texts into a JSON inventory")]
struct Cli {
    /// Directory containing package.json and node_modules [default: .]
    #[arg(long, short = 'p')]
    path: Option<PathBuf>,

    /// Where to write the JSON inventory [default: ./licenses.json]
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Directory of `name@version.txt` license overrides
    #[arg(long)]
    overrides: Option<PathBuf>,

    /// Exclude a package, as `name@version` (repeatable)
    #[arg(long = "exclude-package", value_name = "NAME@VERSION")]
    exclude_packages: Vec<String>,

    /// Exclude packages by SPDX license identifier (repeatable)
    #[arg(long = "exclude-license", value_name = "SPDX")]
    exclude_licenses: Vec<String>,

    /// Fail when this package is present, as `name` or `name=reason` (repeatable)
    #[arg(long = "error-on", value_name = "NAME[=REASON]")]
    error_on: Vec<String>,

    /// Per-request timeout for remote license fetches, in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Configuration file [default: .collect-licenses.toml in the package directory]
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

impl Cli {
    fn into_config(self, cwd: &Path) -> CollectResult<CollectConfig> {
        let root = self
            .path
            .as_ref()
            .map(|p| if p.is_absolute() { p.clone() } else { cwd.join(p) })
            .unwrap_or_else(|| cwd.to_path_buf());

        let mut config = match &self.config {
            Some(file) => CollectConfig::from_file(file)?,
            None => CollectConfig::from_project_root(&root)?,
        };

        config.package_to_check_path = Some(root);
        if self.output.is_some() {
            config.output_file_path = self.output;
        }
        if self.overrides.is_some() {
            config.license_overrides_path = self.overrides;
        }
        if let Some(secs) = self.timeout {
            config.fetch_timeout_secs = secs;
        }
        config.excluded_packages.extend(self.exclude_packages);
        config.excluded_spdx_licenses.extend(self.exclude_licenses);
        config
            .error_on_package_names
            .extend(self.error_on.iter().map(|s| ErrorOnPackage::parse(s)));

        Ok(config.resolve_paths(cwd))
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "collect_licenses=debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CollectResult<()> {
    let cwd = std::env::current_dir()?;
    let config = cli.into_config(&cwd)?;
    let engine = CollectEngine::new(config)?;
    engine.run().await?;
    Ok(())
}
