//! imprint-core
//!
//! Core primitives for Imprint:
//! - Schema identity map (stable uid <-> schema reference, file-backed)
//! - Schema drift validation with a structured modification report
//! - Change tracking for pending content edits
//! - Revisioned publishing pipeline with rollback-safe failure handling
//!
//! The core crate does not touch the network and performs filesystem I/O
//! only through explicit loaders (identity map backing file, schema
//! catalog definition). Durable content storage lives in `imprint-store`;
//! process concerns (flags, output, exit codes) live in `imprint-cli`.

pub mod change;
pub mod config;
pub mod errors;
pub mod publish;
pub mod schema;
pub mod site;
pub mod uid;

pub use crate::errors::{ImprintError, ImprintResult};

/// A monotonically increasing revision number. Revision 0 is never
/// published; the first publish produces revision 1.
pub type Revision = u64;

/// Identifier of a content page within the opaque content store.
pub type PageId = String;

/// Convenience re-exports.
pub mod prelude {
    pub use crate::change::{Change, ChangeId, ChangeLog, ChangeRef, ChangeSet};
    pub use crate::config::{Environment, SiteConfig};
    pub use crate::publish::{
        ContentStore, ProgressSink, PublishNotifier, PublishOutcome, PublishState, Publisher,
        PublishingMethod, Renderer, RevisionLog, RevisionRecord,
    };
    pub use crate::schema::catalog::{Category, Prototype, SchemaCatalog, TypeDef};
    pub use crate::schema::map::{bootstrap_map, open_map, IdentityMap, PersistentMap, TransientMap};
    pub use crate::schema::reference::SchemaReference;
    pub use crate::schema::validator::{validate, SchemaModification};
    pub use crate::site::{Site, SiteState, SiteStateStore};
    pub use crate::uid::{Uid, UidGenerator};
    pub use crate::{ImprintError, ImprintResult, PageId, Revision};
}
