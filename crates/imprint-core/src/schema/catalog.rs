//! The live schema catalog.
//!
//! A `SchemaCatalog` is the in-process description of every
//! content-defining type together with its declared member prototypes.
//! It is the "live" side that the identity map is validated against: the
//! map records what was deployed, the catalog records what the code
//! declares now.
//!
//! Catalogs are loadable from a JSON definition file and constructible
//! programmatically (tests, embedded sites).

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{ImprintError, ImprintResult};
use crate::uid::Uid;

/// Closed set of schema construct categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Type,
    Box,
    Field,
    Style,
    Layout,
}

impl Category {
    pub const MEMBERS: [Category; 4] = [
        Category::Box,
        Category::Field,
        Category::Style,
        Category::Layout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Box => "box",
            Self::Field => "field",
            Self::Style => "style",
            Self::Layout => "layout",
        }
    }

    pub fn parse(s: &str) -> ImprintResult<Self> {
        match s {
            "type" => Ok(Self::Type),
            "box" => Ok(Self::Box),
            "field" => Ok(Self::Field),
            "style" => Ok(Self::Style),
            "layout" => Ok(Self::Layout),
            other => Err(ImprintError::invalid_argument(format!(
                "unknown schema category: {other}"
            ))),
        }
    }
}

/// A named member declared by a type (box, field, style or layout).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prototype {
    pub name: String,
}

impl Prototype {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A content-defining type and its member prototype tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    #[serde(default)]
    pub boxes: Vec<Prototype>,
    #[serde(default)]
    pub fields: Vec<Prototype>,
    #[serde(default)]
    pub styles: Vec<Prototype>,
    #[serde(default)]
    pub layouts: Vec<Prototype>,
}

impl TypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            boxes: Vec::new(),
            fields: Vec::new(),
            styles: Vec::new(),
            layouts: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(Prototype::new(name));
        self
    }

    pub fn with_box(mut self, name: impl Into<String>) -> Self {
        self.boxes.push(Prototype::new(name));
        self
    }

    pub fn with_style(mut self, name: impl Into<String>) -> Self {
        self.styles.push(Prototype::new(name));
        self
    }

    pub fn with_layout(mut self, name: impl Into<String>) -> Self {
        self.layouts.push(Prototype::new(name));
        self
    }

    pub fn prototypes(&self, category: Category) -> &[Prototype] {
        match category {
            Category::Type => &[],
            Category::Box => &self.boxes,
            Category::Field => &self.fields,
            Category::Style => &self.styles,
            Category::Layout => &self.layouts,
        }
    }

    pub fn prototype(&self, category: Category, name: &str) -> Option<&Prototype> {
        self.prototypes(category).iter().find(|p| p.name == name)
    }

    /// The logical reference string of the type itself: `type//Name`.
    pub fn schema_name(&self) -> String {
        schema_name(Category::Type, None, &self.name)
    }
}

/// Format a logical schema reference: `category/owner-uid/name`. Types
/// carry an empty owner segment.
pub fn schema_name(category: Category, owner: Option<&Uid>, name: &str) -> String {
    match owner {
        Some(uid) => format!("{}/{}/{}", category.as_str(), uid, name),
        None => format!("{}//{}", category.as_str(), name),
    }
}

/// The full set of live content-defining types.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaCatalog {
    types: Vec<TypeDef>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_type(&mut self, def: TypeDef) -> ImprintResult<()> {
        if self.type_def(&def.name).is_some() {
            return Err(ImprintError::invalid_argument(format!(
                "duplicate type name: {}",
                def.name
            )));
        }
        self.types.push(def);
        Ok(())
    }

    pub fn type_def(&self, name: &str) -> Option<&TypeDef> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn types(&self) -> &[TypeDef] {
        &self.types
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn from_json_str(s: &str) -> ImprintResult<Self> {
        let catalog: SchemaCatalog = serde_json::from_str(s)
            .map_err(|e| ImprintError::serialization(format!("schema catalog: {e}")))?;
        catalog.validate_basic()?;
        Ok(catalog)
    }

    pub fn from_json_file(path: &Path) -> ImprintResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Structural invariants: type names unique, member names unique
    /// within each category of a type.
    pub fn validate_basic(&self) -> ImprintResult<()> {
        let mut names: BTreeMap<&str, ()> = BTreeMap::new();
        for t in &self.types {
            if names.insert(&t.name, ()).is_some() {
                return Err(ImprintError::invalid_argument(format!(
                    "duplicate type name: {}",
                    t.name
                )));
            }
            for category in Category::MEMBERS {
                let mut members: BTreeMap<&str, ()> = BTreeMap::new();
                for p in t.prototypes(category) {
                    if members.insert(&p.name, ()).is_some() {
                        return Err(ImprintError::invalid_argument(format!(
                            "type {} declares duplicate {} name: {}",
                            t.name,
                            category.as_str(),
                            p.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
