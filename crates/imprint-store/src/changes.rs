//! Durable pending change log.
//!
//! A single JSON file holds the id counter and the pending set. Mutations
//! load, modify and atomically rewrite the file under the store's log
//! lock. The file survives aborted publishes untouched; only a durably
//! published revision destroys its consumed changes.

use serde::{Deserialize, Serialize};

use imprint_core::change::{Change, ChangeId, ChangeLog};
use imprint_core::ImprintResult;

use crate::{Store, StoreError};

#[derive(Debug, Default, Serialize, Deserialize)]
struct ChangeFile {
    next_id: ChangeId,
    changes: Vec<Change>,
}

impl Store {
    fn load_changes(&self) -> Result<ChangeFile, StoreError> {
        let path = self.changes_path();
        match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| StoreError::serde(&path, e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ChangeFile::default()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    fn save_changes(&self, file: &ChangeFile) -> Result<(), StoreError> {
        let path = self.changes_path();
        let bytes = serde_json::to_vec_pretty(file)
            .map_err(|e| StoreError::serde(&path, e.to_string()))?;
        Self::write_atomic(&path, &bytes)
    }
}

impl ChangeLog for Store {
    fn record(&self, page_id: &str) -> ImprintResult<Change> {
        let _guard = self.log_guard();
        let mut file = self.load_changes()?;
        file.next_id += 1;
        let change = Change {
            id: file.next_id,
            page_id: page_id.to_string(),
        };
        file.changes.push(change.clone());
        self.save_changes(&file)?;
        Ok(change)
    }

    fn pending(&self) -> ImprintResult<Vec<Change>> {
        let _guard = self.log_guard();
        Ok(self.load_changes()?.changes)
    }

    fn get(&self, id: ChangeId) -> ImprintResult<Option<Change>> {
        let _guard = self.log_guard();
        Ok(self.load_changes()?.changes.into_iter().find(|c| c.id == id))
    }

    fn destroy(&self, id: ChangeId) -> ImprintResult<()> {
        let _guard = self.log_guard();
        let mut file = self.load_changes()?;
        file.changes.retain(|c| c.id != id);
        self.save_changes(&file)?;
        Ok(())
    }

    fn clear(&self) -> ImprintResult<()> {
        let _guard = self.log_guard();
        let mut file = self.load_changes()?;
        file.changes.clear();
        self.save_changes(&file)?;
        Ok(())
    }
}
