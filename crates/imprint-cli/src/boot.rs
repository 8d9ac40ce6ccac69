//! Shared site boot sequence for the commands.
//!
//! Each command loads the same stack: site config, schema catalog,
//! identity map (strategy chosen by backing-file presence), store, and
//! the site revision pointers persisted in the store.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};

use imprint_core::config::{validate_config, Environment, SiteConfig};
use imprint_core::schema::catalog::SchemaCatalog;
use imprint_core::schema::map::{open_map, IdentityMap, PersistentMap};
use imprint_core::site::{Site, SiteStateStore};
use imprint_store::{Store, StoreConfig};

pub struct BootedSite {
    pub config: SiteConfig,
    pub catalog: Arc<SchemaCatalog>,
    pub map: Arc<dyn IdentityMap>,
    pub store: Arc<Store>,
    pub site: Arc<Site>,
}

impl BootedSite {
    pub fn map_strategy(&self) -> &'static str {
        if self.config.schema_map.exists() {
            "persistent"
        } else {
            "transient"
        }
    }
}

pub fn boot(site_root: &str, environment: &str) -> Result<BootedSite> {
    let environment = Environment::parse(environment)?;
    let config = SiteConfig::for_root(site_root, environment);
    validate_config(&config)?;

    let catalog = SchemaCatalog::from_json_file(&config.schema_def)
        .with_context(|| format!("loading schema catalog {}", config.schema_def.display()))?;

    let map = open_map(&config.schema_map)
        .with_context(|| format!("loading schema map {}", config.schema_map.display()))?;

    let store = Store::open(StoreConfig::local(&config.root))
        .with_context(|| format!("opening store at {}", config.root.display()))?;
    let state = SiteStateStore::load(&store)?.unwrap_or_default();

    Ok(BootedSite {
        config,
        catalog: Arc::new(catalog),
        map: Arc::from(map),
        store: Arc::new(store),
        site: Arc::new(Site::new(state)),
    })
}

/// Write the initial identity map for a site that has none yet. Only
/// permitted outside production; a production site must deploy a
/// committed map.
pub fn bootstrap_schema_map(booted: &BootedSite) -> Result<PersistentMap> {
    if !booted.config.allow_schema_bootstrap() {
        return Err(anyhow!(
            "no schema map at {} and bootstrap is not permitted in production",
            booted.config.schema_map.display()
        ));
    }
    let map = imprint_core::schema::map::bootstrap_map(&booted.catalog)?;
    map.write_to(&booted.config.schema_map)?;
    Ok(map)
}
