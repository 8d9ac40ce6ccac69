use anyhow::Result;
use serde::Serialize;

use imprint_core::publish::RevisionLog;
use imprint_core::Revision;

use crate::args::SiteArgs;
use crate::boot::boot;
use crate::output;

#[derive(Debug, Serialize)]
pub struct RevisionOut {
    pub published_revision: Option<Revision>,
    pub pending_revision: Option<Revision>,
    pub next_revision: Revision,
    pub published_at: Option<String>,
}

pub fn run(site: &SiteArgs) -> Result<()> {
    let booted = boot(&site.site, &site.environment)?;
    let state = booted.site.state();
    let latest = booted.store.latest()?;

    output::print(&RevisionOut {
        published_revision: state.published_revision,
        pending_revision: state.pending_revision,
        next_revision: state.revision,
        published_at: latest.map(|r| r.published_at),
    })?;
    Ok(())
}
