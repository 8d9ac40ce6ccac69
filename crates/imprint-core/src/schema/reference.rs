//! Parsed logical schema references.
//!
//! A reference is the string `category/owner-uid/name` stored on the map
//! side of the identity table. It is immutable once parsed and resolves
//! lazily against a live catalog: types by global name lookup, members by
//! first resolving their owner uid through the map and then looking up the
//! owner's prototype table.
//!
//! Resolution never fails with an error. A miss (unknown type, dangling
//! owner uid, removed member) is `None`; interpreting the miss is the
//! validator's job.

use std::fmt;

use crate::errors::{ImprintError, ImprintResult};
use crate::schema::catalog::{Category, Prototype, SchemaCatalog, TypeDef};
use crate::schema::map::IdentityMap;
use crate::uid::Uid;

const SEP: char = '/';

/// A live schema construct reached by resolving a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    Type(&'a TypeDef),
    Prototype {
        owner: &'a TypeDef,
        prototype: &'a Prototype,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaReference {
    reference: String,
    category: Category,
    owner_uid: Option<Uid>,
    name: String,
}

impl SchemaReference {
    pub fn parse(reference: &str) -> ImprintResult<Self> {
        let mut parts = reference.splitn(3, SEP);
        let (category, owner, name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(c), Some(o), Some(n)) if !n.is_empty() => (c, o, n),
            _ => {
                return Err(ImprintError::invalid_argument(format!(
                    "malformed schema reference: {reference}"
                )))
            }
        };

        let category = Category::parse(category)?;
        let owner_uid = if owner.is_empty() {
            None
        } else {
            Some(Uid::from(owner))
        };

        if category == Category::Type && owner_uid.is_some() {
            return Err(ImprintError::invalid_argument(format!(
                "type reference must not carry an owner uid: {reference}"
            )));
        }
        if category != Category::Type && owner_uid.is_none() {
            return Err(ImprintError::invalid_argument(format!(
                "{} reference requires an owner uid: {reference}",
                category.as_str()
            )));
        }

        Ok(Self {
            reference: reference.to_string(),
            category,
            owner_uid,
            name: name.to_string(),
        })
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn owner_uid(&self) -> Option<&Uid> {
        self.owner_uid.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve against the live catalog. Member categories resolve their
    /// owner through the map first; a broken owner chain is a plain miss.
    pub fn resolve<'a>(
        &self,
        catalog: &'a SchemaCatalog,
        map: &dyn IdentityMap,
    ) -> Option<Target<'a>> {
        match self.category {
            Category::Type => catalog.type_def(&self.name).map(Target::Type),
            member => {
                let owner_uid = self.owner_uid.as_ref()?;
                let owner = match map.resolve(owner_uid, catalog)? {
                    Target::Type(t) => t,
                    Target::Prototype { .. } => return None,
                };
                owner
                    .prototype(member, &self.name)
                    .map(|prototype| Target::Prototype { owner, prototype })
            }
        }
    }
}

impl fmt::Display for SchemaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reference)
    }
}
