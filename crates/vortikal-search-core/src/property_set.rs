//! Lazily materialized result records
//!
//! A [`PropertySet`] captures the raw stored values of the selected
//! properties when it is built from an index document. Decoding a raw value
//! into a typed [`Property`] happens on first access of that property and is
//! memoized; properties that are never read are never decoded.

use std::sync::{Arc, OnceLock};

use chrono::DateTime;
use tantivy::schema::Value;
use tantivy::{DocAddress, Searcher, TantivyDocument};
use tracing::warn;
use vortikal_core::{
    Acl, Path, Principal, Property, PropertyKey, PropertyType, PropertyTypeDefinition,
    PropertyValue,
};

use crate::error::{SearchError, SearchResult};
use crate::schema::{FALSE_TERM, FieldKind, IndexSchema, TRUE_TERM};
use crate::selection::PropertySelection;

/// A stored value exactly as read from the index
#[derive(Debug, Clone, PartialEq, Eq)]
enum RawValue {
    Str(String),
    I64(i64),
}

#[derive(Debug)]
struct Slot {
    definition: Arc<PropertyTypeDefinition>,
    raw: Vec<RawValue>,
    decoded: OnceLock<Option<Property>>,
}

impl Slot {
    fn get(&self) -> Option<&Property> {
        self.decoded
            .get_or_init(|| decode(&self.definition, &self.raw))
            .as_ref()
    }
}

/// One search hit: URI, resource type, selected properties, optional ACL
#[derive(Debug)]
pub struct PropertySet {
    uri: Path,
    resource_type: String,
    slots: Vec<Slot>,
    acl: Option<Acl>,
}

impl PropertySet {
    /// Build a property-set from already typed properties
    #[must_use]
    pub fn from_properties(
        uri: Path,
        resource_type: impl Into<String>,
        properties: Vec<Property>,
        acl: Option<Acl>,
    ) -> Self {
        let slots = properties
            .into_iter()
            .map(|property| Slot {
                definition: Arc::clone(property.definition()),
                raw: Vec::new(),
                decoded: OnceLock::from(Some(property)),
            })
            .collect();
        Self {
            uri,
            resource_type: resource_type.into(),
            slots,
            acl,
        }
    }

    /// Load the stored document at `address`, keeping only what `selection`
    /// asks for.
    pub(crate) fn load(
        searcher: &Searcher,
        schema: &IndexSchema,
        address: DocAddress,
        selection: &PropertySelection,
    ) -> SearchResult<Self> {
        let doc: TantivyDocument = searcher
            .doc(address)
            .map_err(|e| SearchError::query("loading stored document", e))?;
        Self::from_document(schema, &doc, selection)
    }

    fn from_document(
        schema: &IndexSchema,
        doc: &TantivyDocument,
        selection: &PropertySelection,
    ) -> SearchResult<Self> {
        let fields = schema.fields();
        let uri = doc
            .get_first(fields.uri)
            .and_then(|v| v.as_str().map(str::to_owned))
            .ok_or_else(|| SearchError::IndexNotReady("stored document without uri".into()))?;
        let uri = Path::parse(&uri)?;
        let resource_type = doc
            .get_first(fields.resource_type)
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default();

        let mut slots = Vec::new();
        for property in schema.properties() {
            if !selection.is_included_property(&property.definition) {
                continue;
            }
            let raw: Vec<RawValue> = doc
                .get_all(property.field)
                .filter_map(|value| match property.kind {
                    FieldKind::I64 => value.as_i64().map(RawValue::I64),
                    FieldKind::Str | FieldKind::Text => {
                        value.as_str().map(|s| RawValue::Str(s.to_owned()))
                    }
                })
                .collect();
            if raw.is_empty() {
                continue;
            }
            slots.push(Slot {
                definition: Arc::clone(&property.definition),
                raw,
                decoded: OnceLock::new(),
            });
        }

        let acl = if selection.is_include_acl() {
            match doc.get_first(fields.acl).and_then(|v| v.as_str().map(str::to_owned)) {
                Some(json) => Some(serde_json::from_str(&json)?),
                None => Some(Acl::default()),
            }
        } else {
            None
        };

        Ok(Self {
            uri,
            resource_type,
            slots,
            acl,
        })
    }

    #[must_use]
    pub const fn uri(&self) -> &Path {
        &self.uri
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.uri.name()
    }

    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Typed property, decoded on first access
    #[must_use]
    pub fn property(&self, key: &PropertyKey) -> Option<&Property> {
        self.slot(key).and_then(Slot::get)
    }

    /// First value of a property
    #[must_use]
    pub fn value(&self, key: &PropertyKey) -> Option<&PropertyValue> {
        self.property(key).map(Property::value)
    }

    /// Whether the property was loaded (does not decode it)
    #[must_use]
    pub fn contains(&self, key: &PropertyKey) -> bool {
        self.slot(key).is_some()
    }

    /// Keys of the loaded properties
    pub fn property_keys(&self) -> impl Iterator<Item = &PropertyKey> {
        self.slots.iter().map(|slot| &slot.definition.key)
    }

    /// All loaded properties, decoding any not yet read
    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.slots.iter().filter_map(Slot::get)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The ACL, when the selection asked for it
    #[must_use]
    pub const fn acl(&self) -> Option<&Acl> {
        self.acl.as_ref()
    }

    fn slot(&self, key: &PropertyKey) -> Option<&Slot> {
        self.slots.iter().find(|slot| &slot.definition.key == key)
    }
}

fn decode(definition: &Arc<PropertyTypeDefinition>, raw: &[RawValue]) -> Option<Property> {
    let wanted = if definition.multiple { raw.len() } else { 1 };
    let mut values = Vec::with_capacity(wanted);
    for value in raw.iter().take(wanted) {
        match decode_value(definition.value_type, value) {
            Some(decoded) => values.push(decoded),
            None => {
                warn!(
                    property = %definition.key,
                    raw = ?value,
                    "undecodable stored property value"
                );
                return None;
            }
        }
    }
    Property::new(Arc::clone(definition), values).ok()
}

fn decode_value(value_type: PropertyType, raw: &RawValue) -> Option<PropertyValue> {
    match (value_type, raw) {
        (PropertyType::String, RawValue::Str(s)) => Some(PropertyValue::String(s.clone())),
        (PropertyType::Text, RawValue::Str(s)) => Some(PropertyValue::Text(s.clone())),
        (PropertyType::Boolean, RawValue::Str(s)) => match s.as_str() {
            TRUE_TERM => Some(PropertyValue::Boolean(true)),
            FALSE_TERM => Some(PropertyValue::Boolean(false)),
            _ => None,
        },
        (PropertyType::Principal, RawValue::Str(s)) => {
            Principal::parse(s).ok().map(PropertyValue::Principal)
        }
        (PropertyType::Integer, RawValue::I64(v)) => Some(PropertyValue::Integer(*v)),
        (PropertyType::Timestamp, RawValue::I64(ms)) => {
            DateTime::from_timestamp_millis(*ms).map(PropertyValue::Timestamp)
        }
        _ => None,
    }
}
