//! Configuration objects for imprint-core.
//!
//! The core crate does not read environment variables or config files on
//! its own. Higher layers (CLI, service wrappers) construct a `SiteConfig`
//! explicitly and hand it down, which keeps the core deterministic and
//! testable.

use std::path::{Path, PathBuf};

use crate::errors::{ImprintError, ImprintResult};

/// Runtime environment of a site process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    pub fn parse(s: &str) -> ImprintResult<Self> {
        match s {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ImprintError::invalid_argument(format!(
                "unknown environment: {other} (expected development|production)"
            ))),
        }
    }
}

/// Per-site configuration consumed by the schema/publishing core.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Site root directory. Relative paths below resolve against it.
    pub root: PathBuf,

    pub environment: Environment,

    /// Reload the schema catalog definition on every request. Development
    /// convenience; ignored in production.
    pub reload_classes: bool,

    /// Identity map backing file. Its absence at startup selects the
    /// transient map strategy.
    pub schema_map: PathBuf,

    /// Schema catalog definition file.
    pub schema_def: PathBuf,
}

impl SiteConfig {
    pub fn for_root(root: impl Into<PathBuf>, environment: Environment) -> Self {
        let root = root.into();
        Self {
            schema_map: root.join("schema.uid"),
            schema_def: root.join("schema.json"),
            root,
            environment,
            reload_classes: environment == Environment::Development,
        }
    }

    pub fn schema_map_path(&self) -> &Path {
        &self.schema_map
    }

    /// Whether the validator's auto-assignment path for pure additions is
    /// permitted. Outside controlled migration tooling this is a
    /// development-only affordance.
    pub fn allow_schema_bootstrap(&self) -> bool {
        self.environment != Environment::Production
    }
}

/// Validate a site configuration.
pub fn validate_config(cfg: &SiteConfig) -> ImprintResult<()> {
    if cfg.root.as_os_str().is_empty() {
        return Err(ImprintError::invalid_argument("site root must not be empty"));
    }

    if cfg.schema_map == cfg.schema_def {
        return Err(ImprintError::invalid_argument(
            "schema map and schema definition must be distinct files",
        ));
    }

    if cfg.environment == Environment::Production && cfg.reload_classes {
        return Err(ImprintError::invalid_argument(
            "reload_classes is not permitted in production",
        ));
    }

    Ok(())
}
