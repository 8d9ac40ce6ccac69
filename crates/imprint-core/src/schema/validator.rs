//! Schema drift detection.
//!
//! `validate` walks every live type (with its declared boxes, fields,
//! styles and layouts), asks the identity map for each construct's uid,
//! and separately collects map entries whose live target no longer
//! resolves. Constructs without a uid are *additions*; dangling map
//! entries are *removals or renames*. Additions are safe to auto-assign
//! under a transient map; removals are never auto-resolved because a
//! dangling uid may mean either deletion or rename, and disambiguating
//! that needs an operator. Drift therefore always surfaces as a
//! structured report inside `ImprintError::SchemaModification`.

use std::collections::BTreeMap;
use std::fmt;

use crate::errors::{ImprintError, ImprintResult};
use crate::schema::catalog::{schema_name, Category, SchemaCatalog};
use crate::schema::map::IdentityMap;
use crate::schema::reference::SchemaReference;

/// Structured drift report. Diagnostic only: nothing in the core consumes
/// it to mutate the map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaModification {
    /// Constructs declared by the catalog but absent from the map, keyed
    /// by category as (owning type name, construct name). For types the
    /// two components coincide.
    missing_from_map: BTreeMap<Category, Vec<(String, String)>>,
    /// Map entries whose target no longer resolves.
    missing_from_schema: Vec<SchemaReference>,
}

impl SchemaModification {
    pub fn is_empty(&self) -> bool {
        self.missing_from_map.values().all(|v| v.is_empty()) && self.missing_from_schema.is_empty()
    }

    fn record_missing(&mut self, category: Category, owner: &str, name: &str) {
        self.missing_from_map
            .entry(category)
            .or_default()
            .push((owner.to_string(), name.to_string()));
    }

    /// Additions in a category, with their owning type names.
    pub fn added(&self, category: Category) -> &[(String, String)] {
        self.missing_from_map
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn added_names(&self, category: Category) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for (_, name) in self.added(category) {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
        names
    }

    pub fn added_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for (owner, _) in self.added(Category::Type) {
            if !names.contains(&owner.as_str()) {
                names.push(owner);
            }
        }
        names
    }

    pub fn added_boxes(&self) -> Vec<&str> {
        self.added_names(Category::Box)
    }

    pub fn added_fields(&self) -> Vec<&str> {
        self.added_names(Category::Field)
    }

    pub fn added_styles(&self) -> Vec<&str> {
        self.added_names(Category::Style)
    }

    pub fn added_layouts(&self) -> Vec<&str> {
        self.added_names(Category::Layout)
    }

    fn removed(&self, category: Category) -> Vec<&SchemaReference> {
        self.missing_from_schema
            .iter()
            .filter(|r| r.category() == category)
            .collect()
    }

    pub fn removed_types(&self) -> Vec<&SchemaReference> {
        self.removed(Category::Type)
    }

    pub fn removed_boxes(&self) -> Vec<&SchemaReference> {
        self.removed(Category::Box)
    }

    pub fn removed_fields(&self) -> Vec<&SchemaReference> {
        self.removed(Category::Field)
    }

    pub fn removed_styles(&self) -> Vec<&SchemaReference> {
        self.removed(Category::Style)
    }

    pub fn removed_layouts(&self) -> Vec<&SchemaReference> {
        self.removed(Category::Layout)
    }

    pub fn missing_from_schema(&self) -> &[SchemaReference] {
        &self.missing_from_schema
    }
}

impl fmt::Display for SchemaModification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let added: usize = self.missing_from_map.values().map(Vec::len).sum();
        let removed = self.missing_from_schema.len();
        write!(f, "{added} added, {removed} removed or renamed")?;

        for (category, entries) in &self.missing_from_map {
            for (owner, name) in entries {
                write!(f, "; +{} {owner}::{name}", category.as_str())?;
            }
        }
        for reference in &self.missing_from_schema {
            write!(f, "; -{reference}")?;
        }
        Ok(())
    }
}

/// Cross-check the live catalog against the identity map. Returns silently
/// when consistent; fails with the full modification report otherwise.
pub fn validate(catalog: &SchemaCatalog, map: &dyn IdentityMap) -> ImprintResult<()> {
    let mut report = SchemaModification::default();

    for type_def in catalog.types() {
        match map.schema_id(&type_def.schema_name()) {
            Some(owner_uid) => {
                for category in Category::MEMBERS {
                    for prototype in type_def.prototypes(category) {
                        let name = schema_name(category, Some(&owner_uid), &prototype.name);
                        if map.schema_id(&name).is_none() {
                            report.record_missing(category, &type_def.name, &prototype.name);
                        }
                    }
                }
            }
            None => {
                // an unmapped type implies every member is unmapped too
                report.record_missing(Category::Type, &type_def.name, &type_def.name);
                for category in Category::MEMBERS {
                    for prototype in type_def.prototypes(category) {
                        report.record_missing(category, &type_def.name, &prototype.name);
                    }
                }
            }
        }
    }

    for (_, reference) in map.orphaned_ids(catalog) {
        report.missing_from_schema.push(reference);
    }

    if report.is_empty() {
        Ok(())
    } else {
        Err(ImprintError::SchemaModification(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::catalog::TypeDef;
    use crate::schema::map::{PersistentMap, TransientMap};

    fn catalog() -> SchemaCatalog {
        let mut c = SchemaCatalog::new();
        c.insert_type(
            TypeDef::new("Article")
                .with_field("title")
                .with_field("body")
                .with_box("comments"),
        )
        .unwrap();
        c
    }

    fn consistent_map() -> PersistentMap {
        PersistentMap::from_entries([
            ("u1", "type//Article"),
            ("u2", "field/u1/title"),
            ("u3", "field/u1/body"),
            ("u4", "box/u1/comments"),
        ])
        .unwrap()
    }

    fn report(result: ImprintResult<()>) -> SchemaModification {
        match result {
            Err(ImprintError::SchemaModification(report)) => report,
            other => panic!("expected schema modification error, got {other:?}"),
        }
    }

    #[test]
    fn consistent_schema_validates_silently() {
        validate(&catalog(), &consistent_map()).unwrap();
    }

    #[test]
    fn transient_map_never_reports_drift() {
        let map = TransientMap::new();
        validate(&catalog(), &map).unwrap();
        validate(&catalog(), &map).unwrap();
    }

    #[test]
    fn addition_only_drift_reports_exactly_the_new_field() {
        // the consistent catalog plus one newly declared field
        let catalog = {
            let mut c = SchemaCatalog::new();
            c.insert_type(
                TypeDef::new("Article")
                    .with_field("title")
                    .with_field("body")
                    .with_field("summary")
                    .with_box("comments"),
            )
            .unwrap();
            c
        };

        let report = report(validate(&catalog, &consistent_map()));
        assert_eq!(report.added_fields(), vec!["summary"]);
        assert!(report.added_types().is_empty());
        assert!(report.added_boxes().is_empty());
        assert!(report.added_styles().is_empty());
        assert!(report.added_layouts().is_empty());
        assert!(report.removed_types().is_empty());
        assert!(report.removed_fields().is_empty());
        assert!(report.removed_boxes().is_empty());
        assert!(report.removed_styles().is_empty());
        assert!(report.removed_layouts().is_empty());
    }

    #[test]
    fn removed_field_reported_as_orphan() {
        let catalog = {
            let mut c = SchemaCatalog::new();
            c.insert_type(TypeDef::new("Article").with_field("title").with_box("comments"))
                .unwrap();
            c
        };

        let report = report(validate(&catalog, &consistent_map()));
        let removed = report.removed_fields();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].name(), "body");
        assert!(report.added_fields().is_empty());
    }

    #[test]
    fn unmapped_type_reports_type_and_members() {
        let mut catalog = catalog();
        catalog
            .insert_type(TypeDef::new("HomePage").with_field("intro").with_layout("wide"))
            .unwrap();

        let report = report(validate(&catalog, &consistent_map()));
        assert_eq!(report.added_types(), vec!["HomePage"]);
        assert_eq!(report.added_fields(), vec!["intro"]);
        assert_eq!(report.added_layouts(), vec!["wide"]);
    }

    #[test]
    fn validation_is_idempotent() {
        let catalog = {
            let mut c = SchemaCatalog::new();
            c.insert_type(TypeDef::new("Article").with_field("title"))
                .unwrap();
            c
        };
        let map = PersistentMap::from_entries([
            ("u1", "type//Article"),
            ("u2", "field/u1/title"),
            ("u3", "field/u1/gone"),
        ])
        .unwrap();

        let first = report(validate(&catalog, &map));
        let second = report(validate(&catalog, &map));
        assert_eq!(first, second);
    }

    #[test]
    fn report_display_names_each_entry() {
        let mut catalog = catalog();
        catalog.insert_type(TypeDef::new("HomePage")).unwrap();

        let report = report(validate(&catalog, &consistent_map()));
        let text = report.to_string();
        assert!(text.contains("+type HomePage::HomePage"), "{text}");
    }
}
