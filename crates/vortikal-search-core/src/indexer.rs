//! Writing resources into the index

use tantivy::indexer::{LogMergePolicy, NoMergePolicy};
use tantivy::{IndexWriter, TantivyDocument, Term};
use tracing::debug;
use vortikal_core::{Acl, Path, Property, PropertyValue};

use crate::error::{SearchError, SearchResult};
use crate::index_manager::IndexManager;
use crate::schema::{FALSE_TERM, FieldKind, IndexSchema, TRUE_TERM};

/// A resource as handed over by the repository for indexing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedResource {
    pub uri: Path,
    pub resource_type: String,
    pub properties: Vec<Property>,
    pub acl: Acl,
    pub published: bool,
    pub in_unpublished_collection: bool,
}

impl IndexedResource {
    /// Published resource with no properties and an empty ACL
    #[must_use]
    pub fn new(uri: Path, resource_type: impl Into<String>) -> Self {
        Self {
            uri,
            resource_type: resource_type.into(),
            properties: Vec::new(),
            acl: Acl::default(),
            published: true,
            in_unpublished_collection: false,
        }
    }

    #[must_use]
    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    #[must_use]
    pub fn with_acl(mut self, acl: Acl) -> Self {
        self.acl = acl;
        self
    }

    #[must_use]
    pub const fn published(mut self, published: bool) -> Self {
        self.published = published;
        self
    }

    #[must_use]
    pub const fn in_unpublished_collection(mut self, inside: bool) -> Self {
        self.in_unpublished_collection = inside;
        self
    }
}

/// Single writer over an [`IndexManager`]'s index.
///
/// Changes become visible to new views after [`PropertySetIndexer::commit`].
pub struct PropertySetIndexer<'a> {
    manager: &'a IndexManager,
    writer: IndexWriter,
    pending: usize,
}

impl<'a> PropertySetIndexer<'a> {
    pub(crate) fn new(manager: &'a IndexManager) -> SearchResult<Self> {
        let writer = manager
            .index()
            .writer_with_num_threads(1, manager.config().writer_memory_bytes)
            .map_err(|e| SearchError::query("opening index writer", e))?;
        Ok(Self {
            manager,
            writer,
            pending: 0,
        })
    }

    /// Keep every commit as its own segment (no background merging)
    #[must_use]
    pub fn without_merges(self) -> Self {
        self.writer.set_merge_policy(Box::new(NoMergePolicy));
        self
    }

    /// Restore tantivy's default log merge policy
    #[must_use]
    pub fn with_merges(self) -> Self {
        self.writer
            .set_merge_policy(Box::new(LogMergePolicy::default()));
        self
    }

    /// Add a resource. Does not remove an existing document with the same URI.
    pub fn add(&mut self, resource: &IndexedResource) -> SearchResult<()> {
        let doc = build_document(self.manager.schema(), resource)?;
        self.writer
            .add_document(doc)
            .map_err(|e| SearchError::query("adding document", e))?;
        self.pending += 1;
        Ok(())
    }

    /// Replace whatever is indexed under the resource's URI
    pub fn update(&mut self, resource: &IndexedResource) -> SearchResult<()> {
        let doc = build_document(self.manager.schema(), resource)?;
        self.delete(&resource.uri);
        self.writer
            .add_document(doc)
            .map_err(|e| SearchError::query("adding document", e))?;
        self.pending += 1;
        Ok(())
    }

    pub fn delete(&mut self, uri: &Path) {
        let fields = self.manager.schema().fields();
        self.writer
            .delete_term(Term::from_field_text(fields.uri, uri.as_str()));
        self.pending += 1;
    }

    /// Delete `uri` and every resource below it
    pub fn delete_subtree(&mut self, uri: &Path) {
        let fields = self.manager.schema().fields();
        self.writer
            .delete_term(Term::from_field_text(fields.uri, uri.as_str()));
        self.writer
            .delete_term(Term::from_field_text(fields.uri_ancestors, uri.as_str()));
        self.pending += 1;
    }

    /// Operations buffered since the last commit
    #[must_use]
    pub const fn pending(&self) -> usize {
        self.pending
    }

    /// Commit with the schema hash as payload and refresh the reader.
    pub fn commit(&mut self) -> SearchResult<u64> {
        let mut prepared = self
            .writer
            .prepare_commit()
            .map_err(|e| SearchError::query("preparing commit", e))?;
        prepared.set_payload(self.manager.schema().hash());
        let opstamp = prepared
            .commit()
            .map_err(|e| SearchError::query("committing", e))?;
        debug!(opstamp, operations = self.pending, "index commit");
        self.pending = 0;
        self.manager.refresh()?;
        Ok(opstamp)
    }

    /// Drop every change since the last commit
    pub fn rollback(&mut self) -> SearchResult<()> {
        self.writer
            .rollback()
            .map_err(|e| SearchError::query("rolling back", e))?;
        self.pending = 0;
        Ok(())
    }
}

fn invalid(resource: &IndexedResource, reason: impl std::fmt::Display) -> SearchError {
    SearchError::InvalidArgument(format!("cannot index {}: {reason}", resource.uri))
}

fn build_document(
    schema: &IndexSchema,
    resource: &IndexedResource,
) -> SearchResult<TantivyDocument> {
    let fields = schema.fields();
    let mut doc = TantivyDocument::default();

    doc.add_text(fields.uri, resource.uri.as_str());
    doc.add_text(fields.name, resource.uri.name());
    doc.add_u64(fields.uri_depth, resource.uri.depth() as u64);
    for ancestor in resource.uri.ancestors() {
        doc.add_text(fields.uri_ancestors, ancestor.as_str());
    }

    let types = schema
        .resource_types()
        .ancestors_and_self(&resource.resource_type)?;
    doc.add_text(fields.resource_type, &resource.resource_type);
    for resource_type in types {
        doc.add_text(fields.resource_types, resource_type);
    }

    for principal in resource.acl.read_principals() {
        doc.add_text(fields.acl_read, principal.to_string());
    }
    doc.add_text(fields.acl, serde_json::to_string(&resource.acl)?);
    doc.add_text(fields.published, bool_term(resource.published));
    doc.add_text(
        fields.in_unpublished_collection,
        bool_term(resource.in_unpublished_collection),
    );

    for property in &resource.properties {
        let registered = schema
            .property(property.key())
            .ok_or_else(|| invalid(resource, format_args!("unknown property {}", property.key())))?;
        if property.values().len() > 1 && !registered.definition.multiple {
            return Err(invalid(
                resource,
                format_args!("property {} is single-valued", property.key()),
            ));
        }
        for value in property.values() {
            registered
                .definition
                .check_value(value)
                .map_err(|e| invalid(resource, e))?;
            match (registered.kind, value) {
                (FieldKind::I64, PropertyValue::Integer(v)) => doc.add_i64(registered.field, *v),
                (FieldKind::I64, PropertyValue::Timestamp(ts)) => {
                    doc.add_i64(registered.field, ts.timestamp_millis());
                }
                (_, PropertyValue::String(s) | PropertyValue::Text(s)) => {
                    doc.add_text(registered.field, s);
                }
                (_, PropertyValue::Boolean(b)) => doc.add_text(registered.field, bool_term(*b)),
                (_, PropertyValue::Principal(p)) => doc.add_text(registered.field, p.to_string()),
                (_, other) => {
                    return Err(invalid(
                        resource,
                        format_args!("{} cannot hold {other}", property.key()),
                    ));
                }
            }
        }
        doc.add_text(fields.properties_present, &registered.name);
    }
    Ok(doc)
}

const fn bool_term(value: bool) -> &'static str {
    if value { TRUE_TERM } else { FALSE_TERM }
}
