//! # collect-licenses — third-party license inventory for npm projects
//!
//! Collects the license text of every production dependency into a JSON
//! inventory and refuses to produce one when licensing is unclear.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       CollectEngine                          │
//! │  ┌───────────┐   ┌─────────────────┐   ┌──────────────────┐  │
//! │  │ Discovery │──►│ LicenseResolver │──►│ ValidationGate   │  │
//! │  │ (npm walk)│   │ override → file │   │ disallowed names │  │
//! │  └───────────┘   │ → remote        │   │ UNLICENSED       │  │
//! │                  └────────┬────────┘   │ README evidence  │  │
//! │                           │            └────────┬─────────┘  │
//! │                  ┌────────▼────────┐            │            │
//! │                  │ CandidateRacer  │     JSON inventory      │
//! │                  │ FetchCache      │                         │
//! │                  │ (single-flight) │                         │
//! │                  └─────────────────┘                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Resolution order
//!
//! - **Override**: `<overrides>/<name>@<version>.txt` always wins
//! - **Declared file**: a real `LICENSE`-style file shipped with the package
//! - **Remote**: when the package only ships a README, `LICENSE`,
//!   `LICENSE.md` and `LICENSE.txt` are fetched from the GitHub repository at
//!   the exact version tag; the first in that order that exists is used
//!
//! A README is never accepted as license evidence.

pub mod config;
pub mod discovery;
pub mod engine;
pub mod fetch;
pub mod gate;
pub mod package;
pub mod report;
pub mod resolve;

// Re-exports for convenience
pub use config::{CollectConfig, ErrorOnPackage};
pub use engine::{CollectEngine, Inventory, RunStats};
pub use fetch::{CandidateRacer, FetchCache, FetchError, FetchResult, Transport};
pub use gate::{GateFailure, ValidationGate};
pub use package::{DeclaredLicenses, LicenseEvidence, LicensedPackageData, PackageRecord};
pub use resolve::LicenseResolver;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("Failed to find licenses: {0}")]
    Discovery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Gate(#[from] GateFailure),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type CollectResult<T> = Result<T, CollectError>;
