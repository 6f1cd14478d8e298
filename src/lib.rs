// src/lib.rs - Conformance suites and datastore seeding for the OCL API

pub mod client;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod matchers;
pub mod model;
pub mod runner;
pub mod seed;
pub mod suites;
pub mod url;

// Re-export commonly used items for convenience
pub use client::{ApiClient, ApiResponse};
pub use config::Config;
pub use error::{ConformanceError, Result};
pub use fixtures::{Entity, Fixtures};
pub use model::{Actor, ContainerKind, OwnerKind, PublicAccess};
pub use runner::{run_all, run_suite, CaseOutcome, CaseStatus, RunnableSuite, SuiteReport};
pub use seed::{create_datastore, seed, Datastore, MemoryDatastore, SeedProfile, SeedReport};
pub use suites::{Case, Suite};

#[cfg(feature = "mongo")]
pub use seed::MongoDatastore;

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Feature flags available in this build
#[derive(Debug, Clone)]
pub struct Features {
    pub cli: bool,
    pub mongo: bool,
}

impl Features {
    pub fn new() -> Self {
        Self {
            cli: cfg!(feature = "cli"),
            mongo: cfg!(feature = "mongo"),
        }
    }

    pub fn has_mongo(&self) -> bool {
        self.mongo
    }

    pub fn list_enabled(&self) -> Vec<&'static str> {
        let mut features = Vec::new();
        if self.cli {
            features.push("cli");
        }
        if self.mongo {
            features.push("mongo");
        }
        features
    }
}

impl Default for Features {
    fn default() -> Self {
        Self::new()
    }
}

/// Get build information
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: VERSION,
        features: Features::new(),
        git_sha: option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
    }
}

/// Build information structure
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub features: Features,
    pub git_sha: &'static str,
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ocl-conformance v{} ({})\nFeatures: {:?}",
            self.version,
            self.git_sha,
            self.features.list_enabled(),
        )
    }
}
