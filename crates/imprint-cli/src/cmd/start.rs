use anyhow::Result;
use serde::Serialize;

use imprint_core::schema::validator::validate;

use crate::args::SiteArgs;
use crate::boot::{boot, bootstrap_schema_map};
use crate::output;

#[derive(Debug, Serialize)]
pub struct StartOut {
    pub site: String,
    pub environment: String,
    pub map_strategy: String,
    pub bootstrapped_schema_map: bool,
    pub types: usize,
    pub published_revision: Option<u64>,
    pub pending_revision: Option<u64>,
}

pub fn run(site: &SiteArgs) -> Result<()> {
    let booted = boot(&site.site, &site.environment)?;

    let bootstrapped = if booted.config.schema_map.exists() {
        validate(&booted.catalog, booted.map.as_ref())?;
        false
    } else {
        // first run: mint and commit the initial uid table
        let map = bootstrap_schema_map(&booted)?;
        validate(&booted.catalog, &map)?;
        output::eprintln_line(&format!(
            "wrote initial schema map ({} entries) to {}",
            map.len(),
            booted.config.schema_map.display()
        ));
        true
    };

    let state = booted.site.state();
    output::print(&StartOut {
        site: site.site.clone(),
        environment: booted.config.environment.as_str().to_string(),
        map_strategy: if bootstrapped {
            "persistent".to_string()
        } else {
            booted.map_strategy().to_string()
        },
        bootstrapped_schema_map: bootstrapped,
        types: booted.catalog.types().len(),
        published_revision: state.published_revision,
        pending_revision: state.pending_revision,
    })?;
    Ok(())
}
