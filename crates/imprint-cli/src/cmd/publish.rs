use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use serde::Serialize;

use imprint_core::change::{ChangeLog, ChangeRef};
use imprint_core::publish::{
    Collaborators, ContentStore, ProgressSink, Publisher, PublishState, RevisionLog,
};
use imprint_core::site::SiteStateStore;
use imprint_core::Revision;
use imprint_store::StoreRenderer;

use crate::args::SiteArgs;
use crate::boot::boot;
use crate::output;

#[derive(Debug, Serialize)]
pub struct PublishOut {
    pub ok: bool,
    pub revision: Revision,
    pub mode: String,
    pub pages: Option<Vec<String>>,
}

/// Progress sink driving the operator spinner and the optional logfile.
struct CliProgress {
    bar: ProgressBar,
    logfile: Option<Mutex<std::fs::File>>,
}

impl CliProgress {
    fn new(logfile: Option<&str>) -> Result<Self> {
        let bar = if output::is_json() {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new_spinner();
            bar.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
            bar.enable_steady_tick(std::time::Duration::from_millis(80));
            bar
        };

        let logfile = match logfile {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("opening logfile {path}"))?;
                Some(Mutex::new(file))
            }
            None => None,
        };

        Ok(Self { bar, logfile })
    }
}

impl ProgressSink for CliProgress {
    fn transition(&self, state: PublishState, revision: Option<Revision>) {
        let msg = match revision {
            Some(revision) => format!("{} (revision {revision})", state.as_str()),
            None => state.as_str().to_string(),
        };
        self.bar.set_message(msg.clone());

        if let Some(file) = &self.logfile {
            let _ = writeln!(file.lock(), "{msg}");
        }
    }
}

pub fn run(site: &SiteArgs, changes: Option<&[u64]>, logfile: Option<&str>) -> Result<()> {
    let booted = boot(&site.site, &site.environment)?;
    let progress = Arc::new(CliProgress::new(logfile)?);

    let publisher = Publisher::new(
        Arc::clone(&booted.site),
        Arc::clone(&booted.catalog),
        Arc::clone(&booted.map),
        Collaborators {
            content: Arc::clone(&booted.store) as Arc<dyn ContentStore>,
            renderer: Arc::new(StoreRenderer::for_store(&booted.store)),
            changes: Arc::clone(&booted.store) as Arc<dyn ChangeLog>,
            revisions: Arc::clone(&booted.store) as Arc<dyn RevisionLog>,
            site_state: Arc::clone(&booted.store) as Arc<dyn SiteStateStore>,
        },
    )
    .with_progress(Arc::clone(&progress) as Arc<dyn ProgressSink>);

    let (revision, mode, pages) = match changes {
        Some(ids) => {
            let refs: Vec<ChangeRef> = ids.iter().map(|id| ChangeRef::from(*id)).collect();
            let revision = publisher.publish_changes(refs)?;
            let pages = booted.store.revision_pages(revision)?;
            (revision, "selective", Some(pages))
        }
        None => {
            let revision = publisher.publish_all()?;
            (revision, "full", None)
        }
    };

    progress.bar.finish_and_clear();
    if !output::is_json() {
        output::eprintln_line(&format!("published revision {revision}"));
    }

    output::print(&PublishOut {
        ok: true,
        revision,
        mode: mode.to_string(),
        pages,
    })?;
    Ok(())
}
