//! Revision history and site state persistence.
//!
//! The revision log is append-only, one JSON record per line. The site
//! state file is a single JSON document rewritten atomically; the
//! publishing pipeline orders its writes so that the published-pointer
//! update here is the last durable write of a successful publish.

use std::io::Write;

use imprint_core::publish::{RevisionLog, RevisionRecord};
use imprint_core::site::{SiteState, SiteStateStore};
use imprint_core::ImprintResult;

use crate::{Store, StoreError};

impl Store {
    /// Full revision history, oldest first.
    pub fn revision_history(&self) -> Result<Vec<RevisionRecord>, StoreError> {
        let path = self.revision_log_path();
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let mut records = Vec::new();
        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            let record = serde_json::from_str(line)
                .map_err(|e| StoreError::serde(&path, e.to_string()))?;
            records.push(record);
        }
        Ok(records)
    }
}

impl RevisionLog for Store {
    fn record(&self, record: &RevisionRecord) -> ImprintResult<()> {
        let _guard = self.log_guard();
        let path = self.revision_log_path();
        let mut line = serde_json::to_string(record)
            .map_err(|e| StoreError::serde(&path, e.to_string()))?;
        line.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| StoreError::io(&path, e))?;
        file.sync_all().map_err(|e| StoreError::io(&path, e))?;
        Ok(())
    }

    fn latest(&self) -> ImprintResult<Option<RevisionRecord>> {
        Ok(self.revision_history()?.into_iter().last())
    }
}

impl SiteStateStore for Store {
    fn load(&self) -> ImprintResult<Option<SiteState>> {
        let path = self.site_state_path();
        match std::fs::read_to_string(&path) {
            Ok(raw) => {
                let state = serde_json::from_str(&raw)
                    .map_err(|e| StoreError::serde(&path, e.to_string()))?;
                Ok(Some(state))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&path, e).into()),
        }
    }

    fn save(&self, state: &SiteState) -> ImprintResult<()> {
        let path = self.site_state_path();
        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| StoreError::serde(&path, e.to_string()))?;
        Self::write_atomic(&path, &bytes)?;
        Ok(())
    }
}
