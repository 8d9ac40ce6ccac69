//! The uid <-> schema reference identity map.
//!
//! Two interchangeable strategies behind one trait:
//!
//! - `PersistentMap` loads a committed uid table from a backing file at
//!   construction. `schema_id` is lookup-only: an unmapped construct is a
//!   validation error surfaced by the validator, never silently healed.
//!   The file is never rewritten as a side effect; `write_to` exists for
//!   explicit bootstrap/migration only.
//! - `TransientMap` mints a fresh uid on first sight of a logical name and
//!   caches the association for the process lifetime. There is no
//!   persisted history to diff against, so it never reports orphans. Used
//!   for tests and first-run bootstrap.
//!
//! `open_map` makes the one-time strategy selection: persistent when the
//! backing file exists, transient otherwise.

use std::collections::BTreeMap;
use std::path::Path;

use parking_lot::Mutex;

use crate::errors::{ImprintError, ImprintResult};
use crate::schema::catalog::SchemaCatalog;
use crate::schema::reference::{SchemaReference, Target};
use crate::uid::{Uid, UidGenerator};

pub trait IdentityMap: Send + Sync {
    /// Stable uid for a logical schema name, if one is known.
    fn schema_id(&self, schema_name: &str) -> Option<Uid>;

    /// The parsed reference recorded under a uid.
    fn reference(&self, uid: &Uid) -> Option<SchemaReference>;

    /// Resolve a uid to its live target. `None` means the construct was
    /// removed or renamed (or the uid is unknown); never an error.
    fn resolve<'a>(&self, uid: &Uid, catalog: &'a SchemaCatalog) -> Option<Target<'a>>;

    /// Entries whose target no longer resolves against the live catalog.
    fn orphaned_ids(&self, catalog: &SchemaCatalog) -> Vec<(Uid, SchemaReference)>;
}

/// File-backed map. Sole writer of its backing file.
#[derive(Debug, Clone)]
pub struct PersistentMap {
    map: BTreeMap<Uid, SchemaReference>,
    inverse: BTreeMap<String, Uid>,
}

impl PersistentMap {
    /// Load from the backing file: a JSON object of uid -> reference
    /// string records.
    pub fn load(path: &Path) -> ImprintResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let table: BTreeMap<String, String> = serde_json::from_str(&raw)
            .map_err(|e| ImprintError::serialization(format!("schema map {}: {e}", path.display())))?;
        Self::from_entries(table)
    }

    pub fn from_entries(
        entries: impl IntoIterator<Item = (impl Into<Uid>, impl AsRef<str>)>,
    ) -> ImprintResult<Self> {
        let mut map = BTreeMap::new();
        let mut inverse = BTreeMap::new();
        for (uid, reference) in entries {
            let uid: Uid = uid.into();
            let reference = SchemaReference::parse(reference.as_ref())?;
            if inverse
                .insert(reference.reference().to_string(), uid.clone())
                .is_some()
            {
                return Err(ImprintError::invariant(format!(
                    "duplicate schema reference in map: {reference}"
                )));
            }
            if map.insert(uid.clone(), reference).is_some() {
                return Err(ImprintError::invariant(format!("duplicate uid in map: {uid}")));
            }
        }
        Ok(Self { map, inverse })
    }

    /// Write the table out. Bootstrap/migration tooling only; the map is
    /// never rewritten as a side effect of validation or publishing.
    pub fn write_to(&self, path: &Path) -> ImprintResult<()> {
        let table: BTreeMap<&str, &str> = self
            .map
            .iter()
            .map(|(uid, r)| (uid.as_str(), r.reference()))
            .collect();
        let json = serde_json::to_string_pretty(&table)
            .map_err(|e| ImprintError::serialization(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Uid, &SchemaReference)> {
        self.map.iter()
    }
}

impl IdentityMap for PersistentMap {
    fn schema_id(&self, schema_name: &str) -> Option<Uid> {
        self.inverse.get(schema_name).cloned()
    }

    fn reference(&self, uid: &Uid) -> Option<SchemaReference> {
        self.map.get(uid).cloned()
    }

    fn resolve<'a>(&self, uid: &Uid, catalog: &'a SchemaCatalog) -> Option<Target<'a>> {
        self.map.get(uid)?.resolve(catalog, self)
    }

    fn orphaned_ids(&self, catalog: &SchemaCatalog) -> Vec<(Uid, SchemaReference)> {
        self.map
            .iter()
            .filter(|(_, reference)| reference.resolve(catalog, self).is_none())
            .map(|(uid, reference)| (uid.clone(), reference.clone()))
            .collect()
    }
}

#[derive(Debug, Default)]
struct TransientState {
    map: BTreeMap<Uid, String>,
    inverse: BTreeMap<String, Uid>,
}

/// In-memory map that mints uids on demand. Test/bootstrap contexts only.
#[derive(Debug, Default)]
pub struct TransientMap {
    generator: UidGenerator,
    state: Mutex<TransientState>,
}

impl TransientMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the minted table, for bootstrapping a persistent map.
    pub fn entries(&self) -> Vec<(Uid, String)> {
        let state = self.state.lock();
        state
            .map
            .iter()
            .map(|(uid, name)| (uid.clone(), name.clone()))
            .collect()
    }
}

impl IdentityMap for TransientMap {
    fn schema_id(&self, schema_name: &str) -> Option<Uid> {
        let mut state = self.state.lock();
        if let Some(uid) = state.inverse.get(schema_name) {
            return Some(uid.clone());
        }
        let uid = self.generator.generate();
        state.map.insert(uid.clone(), schema_name.to_string());
        state.inverse.insert(schema_name.to_string(), uid.clone());
        Some(uid)
    }

    fn reference(&self, uid: &Uid) -> Option<SchemaReference> {
        let state = self.state.lock();
        let name = state.map.get(uid)?;
        SchemaReference::parse(name).ok()
    }

    fn resolve<'a>(&self, uid: &Uid, catalog: &'a SchemaCatalog) -> Option<Target<'a>> {
        self.reference(uid)?.resolve(catalog, self)
    }

    fn orphaned_ids(&self, _catalog: &SchemaCatalog) -> Vec<(Uid, SchemaReference)> {
        Vec::new()
    }
}

/// Mint a full uid table for a catalog. This is the addition-only
/// auto-assignment path: it is how a site without a committed map gets its
/// first one, and it is only reachable from bootstrap/migration tooling.
pub fn bootstrap_map(catalog: &SchemaCatalog) -> ImprintResult<PersistentMap> {
    use crate::schema::catalog::{schema_name, Category};

    let transient = TransientMap::new();
    for type_def in catalog.types() {
        let owner = transient
            .schema_id(&type_def.schema_name())
            .ok_or_else(|| ImprintError::invariant("transient map refused to mint a uid"))?;
        for category in Category::MEMBERS {
            for prototype in type_def.prototypes(category) {
                transient.schema_id(&schema_name(category, Some(&owner), &prototype.name));
            }
        }
    }
    PersistentMap::from_entries(transient.entries())
}

/// One-time strategy selection: persistent when the backing file exists,
/// transient otherwise.
pub fn open_map(path: &Path) -> ImprintResult<Box<dyn IdentityMap>> {
    if path.exists() {
        Ok(Box::new(PersistentMap::load(path)?))
    } else {
        Ok(Box::new(TransientMap::new()))
    }
}
