//! Schema identity subsystem.
//!
//! Content-defining types (and their boxes, fields, styles and layouts)
//! are code artifacts that get renamed and restructured across
//! deployments. To keep stored content traceable, each construct is
//! assigned a short stable uid, recorded in a file-backed identity map.
//! The validator cross-checks the live catalog against the map at publish
//! time and raises a structured modification report on drift.

pub mod catalog;
pub mod map;
pub mod reference;
pub mod validator;

pub use catalog::{Category, Prototype, SchemaCatalog, TypeDef};
pub use map::{bootstrap_map, open_map, IdentityMap, PersistentMap, TransientMap};
pub use reference::{SchemaReference, Target};
pub use validator::{validate, SchemaModification};
