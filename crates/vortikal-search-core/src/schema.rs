//! Tantivy schema definition, tokenizer chain, and schema versioning
//!
//! The index holds one document per resource with:
//! - System fields (uri, name, depth, ancestors, type, ACL, publish state)
//!   used by the query and filter compilers
//! - One field per registered property definition, named `p_<prefix>_<name>`
//! - A schema hash stored as the commit payload so an index written with a
//!   different property set is detected on open

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tantivy::Index;
use tantivy::schema::{
    FAST, Field, INDEXED, IndexRecordOption, STORED, STRING, Schema, SchemaBuilder,
    TextFieldIndexing, TextOptions,
};
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, TextAnalyzer};
use vortikal_core::{PropertyKey, PropertyType, PropertyTypeDefinition, ResourceTypeTree};

use crate::error::{SearchError, SearchResult};

/// Name of the custom tokenizer registered with Tantivy
pub const TOKENIZER_NAME: &str = "vtk_default";

/// Tokens longer than this many bytes are dropped by the tokenizer
pub const MAX_TOKEN_BYTES: usize = 256;

/// Current schema version, bump when system fields or the tokenizer change
const SCHEMA_VERSION: &str = "v1";

/// Indexed representation of boolean `true` (publish flags, boolean properties)
pub const TRUE_TERM: &str = "true";
/// Indexed representation of boolean `false`
pub const FALSE_TERM: &str = "false";

// ── Field handles ────────────────────────────────────────────────────────────

/// System field handles of the resource index.
#[derive(Debug, Clone, Copy)]
pub struct FieldHandles {
    /// Resource path (string, indexed + stored + fast)
    pub uri: Field,
    /// Last path segment (string, indexed + stored + fast)
    pub name: Field,
    /// Number of path segments below the root (u64, indexed + stored + fast)
    pub uri_depth: Field,
    /// Every proper ancestor path (multi-valued string)
    pub uri_ancestors: Field,
    /// Resource type name (string, indexed + stored + fast)
    pub resource_type: Field,
    /// Resource type plus all ancestor types (multi-valued string)
    pub resource_types: Field,
    /// Principals holding a read-granting privilege (multi-valued string)
    pub acl_read: Field,
    /// Full ACL as JSON (stored only)
    pub acl: Field,
    /// `"true"` / `"false"`
    pub published: Field,
    /// `"true"` / `"false"`
    pub in_unpublished_collection: Field,
    /// Field names of the properties present on the resource
    pub properties_present: Field,
}

/// How a property's values are laid out in the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Raw string term, fast field (String, Boolean, Principal)
    Str,
    /// i64 term, fast field (Integer, Timestamp as epoch millis)
    I64,
    /// Tokenized with [`TOKENIZER_NAME`], positions recorded
    Text,
}

impl FieldKind {
    #[must_use]
    pub const fn for_type(value_type: PropertyType) -> Self {
        match value_type {
            PropertyType::String | PropertyType::Boolean | PropertyType::Principal => Self::Str,
            PropertyType::Integer | PropertyType::Timestamp => Self::I64,
            PropertyType::Text => Self::Text,
        }
    }
}

/// A registered property definition and its index field
#[derive(Debug, Clone)]
pub struct PropertyField {
    pub definition: Arc<PropertyTypeDefinition>,
    pub field: Field,
    pub name: String,
    pub kind: FieldKind,
}

/// Index field name for a property key
#[must_use]
pub fn property_field_name(key: &PropertyKey) -> String {
    format!("p_{}_{}", key.namespace(), key.name())
}

// ── Schema construction ──────────────────────────────────────────────────────

/// The full index schema: system fields, property fields, resource types.
#[derive(Debug)]
pub struct IndexSchema {
    schema: Schema,
    fields: FieldHandles,
    properties: BTreeMap<PropertyKey, PropertyField>,
    resource_types: ResourceTypeTree,
    hash: String,
}

impl IndexSchema {
    /// Build the schema for a set of property definitions.
    ///
    /// # Errors
    /// Returns [`SearchError::InvalidArgument`] if two definitions share a
    /// key or map onto the same field name.
    pub fn build(
        definitions: impl IntoIterator<Item = PropertyTypeDefinition>,
        resource_types: ResourceTypeTree,
    ) -> SearchResult<Self> {
        let mut builder = SchemaBuilder::new();
        let fields = add_system_fields(&mut builder);

        let mut taken: HashSet<String> = builder_field_names();
        let mut properties = BTreeMap::new();
        for definition in definitions {
            let name = property_field_name(&definition.key);
            if properties.contains_key(&definition.key) || !taken.insert(name.clone()) {
                return Err(SearchError::InvalidArgument(format!(
                    "property {} registered twice (field {name})",
                    definition.key
                )));
            }
            let kind = FieldKind::for_type(definition.value_type);
            let field = match kind {
                FieldKind::Str => builder.add_text_field(&name, STRING | STORED | FAST),
                FieldKind::I64 => builder.add_i64_field(&name, INDEXED | STORED | FAST),
                FieldKind::Text => builder.add_text_field(&name, text_options() | STORED),
            };
            properties.insert(
                definition.key.clone(),
                PropertyField {
                    definition: Arc::new(definition),
                    field,
                    name,
                    kind,
                },
            );
        }

        let schema = builder.build();
        let hash = compute_hash(&schema, &resource_types);
        Ok(Self {
            schema,
            fields,
            properties,
            resource_types,
            hash,
        })
    }

    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub const fn fields(&self) -> &FieldHandles {
        &self.fields
    }

    #[must_use]
    pub fn property(&self, key: &PropertyKey) -> Option<&PropertyField> {
        self.properties.get(key)
    }

    /// Look up a property field, failing for unregistered keys.
    ///
    /// # Errors
    /// Returns [`SearchError::InvalidArgument`] for an unknown key.
    pub fn require_property(&self, key: &PropertyKey) -> SearchResult<&PropertyField> {
        self.property(key)
            .ok_or_else(|| SearchError::InvalidArgument(format!("unknown property {key}")))
    }

    /// Registered properties in key order
    pub fn properties(&self) -> impl Iterator<Item = &PropertyField> {
        self.properties.values()
    }

    #[must_use]
    pub const fn resource_types(&self) -> &ResourceTypeTree {
        &self.resource_types
    }

    /// Deterministic SHA-256 over fields, tokenizer, resource types and
    /// schema version (hex encoded)
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Short form of [`IndexSchema::hash`] (first 12 hex chars)
    #[must_use]
    pub fn hash_short(&self) -> &str {
        &self.hash[..12.min(self.hash.len())]
    }
}

fn text_options() -> TextOptions {
    TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(TOKENIZER_NAME)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions),
    )
}

const SYSTEM_FIELD_NAMES: [&str; 11] = [
    "uri",
    "name",
    "uri_depth",
    "uri_ancestors",
    "resource_type",
    "resource_types",
    "acl_read",
    "acl",
    "published",
    "in_unpublished_collection",
    "properties_present",
];

fn builder_field_names() -> HashSet<String> {
    SYSTEM_FIELD_NAMES.iter().map(|s| (*s).to_owned()).collect()
}

fn add_system_fields(builder: &mut SchemaBuilder) -> FieldHandles {
    FieldHandles {
        uri: builder.add_text_field("uri", STRING | STORED | FAST),
        name: builder.add_text_field("name", STRING | STORED | FAST),
        uri_depth: builder.add_u64_field("uri_depth", INDEXED | STORED | FAST),
        uri_ancestors: builder.add_text_field("uri_ancestors", STRING),
        resource_type: builder.add_text_field("resource_type", STRING | STORED | FAST),
        resource_types: builder.add_text_field("resource_types", STRING),
        acl_read: builder.add_text_field("acl_read", STRING),
        acl: builder.add_text_field("acl", STORED),
        published: builder.add_text_field("published", STRING),
        in_unpublished_collection: builder.add_text_field("in_unpublished_collection", STRING),
        properties_present: builder.add_text_field("properties_present", STRING),
    }
}

// ── Tokenizer registration ───────────────────────────────────────────────────

/// The `vtk_default` analyzer.
///
/// Chain:
/// 1. `SimpleTokenizer`: splits on whitespace + punctuation
/// 2. `LowerCaser`: normalizes to lowercase
/// 3. `RemoveLongFilter(256)`: drops tokens > 256 bytes
#[must_use]
pub fn text_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .filter(RemoveLongFilter::limit(MAX_TOKEN_BYTES))
        .build()
}

/// Register the `vtk_default` tokenizer with a Tantivy index.
///
/// Must be called after `Index::create_*` / `Index::open_*` and before any
/// indexing or searching.
pub fn register_tokenizer(index: &Index) {
    index.tokenizers().register(TOKENIZER_NAME, text_analyzer());
}

/// Run `text` through the `vtk_default` analyzer
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let mut analyzer = text_analyzer();
    let mut stream = analyzer.token_stream(text);
    let mut tokens = Vec::new();
    while stream.advance() {
        tokens.push(stream.token().text.clone());
    }
    tokens
}

// ── Schema versioning ────────────────────────────────────────────────────────

fn compute_hash(schema: &Schema, resource_types: &ResourceTypeTree) -> String {
    let mut entries: Vec<String> = schema
        .fields()
        .map(|(field, entry)| {
            let name = entry.name();
            let field_type = format!("{:?}", entry.field_type());
            format!("{name}:{field_type}:{}", field.field_id())
        })
        .collect();
    entries.sort();

    let mut hasher = Sha256::new();
    hasher.update(SCHEMA_VERSION.as_bytes());
    hasher.update(b"\n");
    hasher.update(TOKENIZER_NAME.as_bytes());
    hasher.update(b"\n");
    for entry in &entries {
        hasher.update(entry.as_bytes());
        hasher.update(b"\n");
    }
    for type_name in resource_types.types() {
        hasher.update(type_name.as_bytes());
        hasher.update(b"<");
        hasher.update(resource_types.parent(type_name).unwrap_or("").as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tantivy::TantivyDocument;
    use tantivy::collector::TopDocs;
    use tantivy::query::TermQuery;
    use tantivy::schema::Value;
    use tantivy::Term;

    fn key(name: &str) -> PropertyKey {
        PropertyKey::new("resource", name).unwrap()
    }

    fn types() -> ResourceTypeTree {
        ResourceTypeTree::new().with_type("resource", None).unwrap()
    }

    fn sample() -> IndexSchema {
        IndexSchema::build(
            [
                PropertyTypeDefinition::new(key("title"), PropertyType::String),
                PropertyTypeDefinition::new(key("body"), PropertyType::Text),
                PropertyTypeDefinition::new(key("size"), PropertyType::Integer),
            ],
            types(),
        )
        .unwrap()
    }

    #[test]
    fn property_fields_are_named_by_key() {
        let schema = sample();
        let title = schema.property(&key("title")).unwrap();
        assert_eq!(title.name, "p_resource_title");
        assert_eq!(title.kind, FieldKind::Str);
        assert_eq!(schema.schema().get_field_name(title.field), "p_resource_title");
        assert_eq!(schema.property(&key("size")).unwrap().kind, FieldKind::I64);
        assert_eq!(
            property_field_name(&PropertyKey::default_ns("x").unwrap()),
            "p__x"
        );
    }

    #[test]
    fn schema_field_count() {
        let schema = sample();
        assert_eq!(schema.schema().fields().count(), SYSTEM_FIELD_NAMES.len() + 3);
        assert_eq!(schema.properties().count(), 3);
    }

    #[test]
    fn duplicate_definitions_rejected() {
        let err = IndexSchema::build(
            [
                PropertyTypeDefinition::new(key("title"), PropertyType::String),
                PropertyTypeDefinition::new(key("title"), PropertyType::Text),
            ],
            types(),
        )
        .unwrap_err();
        assert!(matches!(err, SearchError::InvalidArgument(_)));
    }

    #[test]
    fn unknown_property_is_invalid_argument() {
        let schema = sample();
        assert!(matches!(
            schema.require_property(&key("missing")),
            Err(SearchError::InvalidArgument(_))
        ));
    }

    #[test]
    fn schema_hash_deterministic_and_sensitive() {
        let a = sample();
        let b = sample();
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.hash().len(), 64);
        assert_eq!(a.hash_short().len(), 12);

        let other = IndexSchema::build(
            [PropertyTypeDefinition::new(key("title"), PropertyType::String)],
            types(),
        )
        .unwrap();
        assert_ne!(a.hash(), other.hash());
    }

    #[test]
    fn tokenizer_lowercases_splits_and_drops_long_tokens() {
        let long_token = "a".repeat(300);
        let input = format!("Hello, World! {long_token} end");
        assert_eq!(tokenize(&input), vec!["hello", "world", "end"]);
    }

    #[test]
    fn can_index_and_find_text_property() {
        let schema = sample();
        let index = Index::create_in_ram(schema.schema().clone());
        register_tokenizer(&index);
        let body = schema.property(&key("body")).unwrap().field;

        let mut writer = index.writer(15_000_000).unwrap();
        let mut doc = TantivyDocument::default();
        doc.add_text(schema.fields().uri, "/a");
        doc.add_text(body, "The Quick brown fox");
        writer.add_document(doc).unwrap();
        writer.commit().unwrap();

        let searcher = index.reader().unwrap().searcher();
        let query = TermQuery::new(
            Term::from_field_text(body, "quick"),
            IndexRecordOption::Basic,
        );
        let hits = searcher.search(&query, &TopDocs::with_limit(10)).unwrap();
        assert_eq!(hits.len(), 1);
        let stored: TantivyDocument = searcher.doc(hits[0].1).unwrap();
        assert_eq!(
            stored.get_first(schema.fields().uri).and_then(|v| v.as_str()),
            Some("/a")
        );
    }
}
