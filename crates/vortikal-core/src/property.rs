//! Typed resource properties
//!
//! Every property is identified by a [`PropertyKey`] (namespace prefix plus
//! name) and described by a [`PropertyTypeDefinition`]. Values are
//! [`PropertyValue`]s whose variant must agree with the definition's
//! [`PropertyType`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::acl::Principal;
use crate::error::{CoreError, CoreResult};

/// Identity of a property: `(namespace prefix, name)`.
///
/// The empty prefix denotes the default namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PropertyKey {
    namespace: String,
    name: String,
}

impl PropertyKey {
    /// Create a key.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidPropertyKey`] if the name is empty or either
    /// part contains `:` or whitespace.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> CoreResult<Self> {
        let namespace = namespace.into();
        let name = name.into();
        let invalid = |s: &str| s.contains(':') || s.chars().any(char::is_whitespace);
        if name.is_empty() || invalid(&name) || invalid(&namespace) {
            return Err(CoreError::InvalidPropertyKey(format!("{namespace}:{name}")));
        }
        Ok(Self { namespace, name })
    }

    /// Key in the default namespace
    ///
    /// # Errors
    /// See [`PropertyKey::new`].
    pub fn default_ns(name: impl Into<String>) -> CoreResult<Self> {
        Self::new(String::new(), name)
    }

    /// Parse `prefix:name` or `name`.
    ///
    /// # Errors
    /// See [`PropertyKey::new`].
    pub fn parse(raw: &str) -> CoreResult<Self> {
        match raw.split_once(':') {
            Some((prefix, name)) => Self::new(prefix, name),
            None => Self::default_ns(raw),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}:{}", self.namespace, self.name)
        }
    }
}

impl TryFrom<String> for PropertyKey {
    type Error = CoreError;

    fn try_from(value: String) -> CoreResult<Self> {
        Self::parse(&value)
    }
}

impl From<PropertyKey> for String {
    fn from(key: PropertyKey) -> Self {
        key.to_string()
    }
}

/// Value type of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    /// Exact-match string
    String,
    /// Tokenized full text
    Text,
    /// Signed 64-bit integer
    Integer,
    /// Boolean
    Boolean,
    /// Point in time (millisecond precision in the index)
    Timestamp,
    /// A user, group or pseudo principal
    Principal,
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
            Self::Principal => "principal",
        };
        f.write_str(name)
    }
}

/// Describes a property: its key, value type and cardinality
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyTypeDefinition {
    pub key: PropertyKey,
    pub value_type: PropertyType,
    #[serde(default)]
    pub multiple: bool,
}

impl PropertyTypeDefinition {
    /// Single-valued definition
    #[must_use]
    pub const fn new(key: PropertyKey, value_type: PropertyType) -> Self {
        Self {
            key,
            value_type,
            multiple: false,
        }
    }

    /// Multi-valued definition
    #[must_use]
    pub const fn multiple(key: PropertyKey, value_type: PropertyType) -> Self {
        Self {
            key,
            value_type,
            multiple: true,
        }
    }

    /// Check that `value` has this definition's type.
    ///
    /// # Errors
    /// Returns [`CoreError::ValueTypeMismatch`] on disagreement.
    pub fn check_value(&self, value: &PropertyValue) -> CoreResult<()> {
        if value.value_type() == self.value_type {
            Ok(())
        } else {
            Err(CoreError::ValueTypeMismatch {
                key: self.key.to_string(),
                expected: self.value_type.to_string(),
                actual: value.value_type().to_string(),
            })
        }
    }
}

/// A typed property value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    String(String),
    Text(String),
    Integer(i64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Principal(Principal),
}

impl PropertyValue {
    /// The [`PropertyType`] this value belongs to
    #[must_use]
    pub const fn value_type(&self) -> PropertyType {
        match self {
            Self::String(_) => PropertyType::String,
            Self::Text(_) => PropertyType::Text,
            Self::Integer(_) => PropertyType::Integer,
            Self::Boolean(_) => PropertyType::Boolean,
            Self::Timestamp(_) => PropertyType::Timestamp,
            Self::Principal(_) => PropertyType::Principal,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_timestamp(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Timestamp(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) | Self::Text(s) => write!(f, "{s:?}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Principal(p) => write!(f, "{p}"),
        }
    }
}

/// A property instance: definition plus one or more values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    definition: Arc<PropertyTypeDefinition>,
    values: Vec<PropertyValue>,
}

impl Property {
    /// Create a property, validating value types and cardinality.
    ///
    /// # Errors
    /// Returns [`CoreError::ValueTypeMismatch`] for a wrongly typed value,
    /// [`CoreError::EmptyProperty`] without values, and
    /// [`CoreError::MultipleValuesNotAllowed`] for several values on a
    /// single-valued definition.
    pub fn new(
        definition: Arc<PropertyTypeDefinition>,
        values: Vec<PropertyValue>,
    ) -> CoreResult<Self> {
        if values.is_empty() {
            return Err(CoreError::EmptyProperty(definition.key.to_string()));
        }
        if values.len() > 1 && !definition.multiple {
            return Err(CoreError::MultipleValuesNotAllowed(
                definition.key.to_string(),
            ));
        }
        for value in &values {
            definition.check_value(value)?;
        }
        Ok(Self { definition, values })
    }

    /// Single-valued shorthand
    ///
    /// # Errors
    /// See [`Property::new`].
    pub fn single(definition: Arc<PropertyTypeDefinition>, value: PropertyValue) -> CoreResult<Self> {
        Self::new(definition, vec![value])
    }

    #[must_use]
    pub fn definition(&self) -> &Arc<PropertyTypeDefinition> {
        &self.definition
    }

    #[must_use]
    pub fn key(&self) -> &PropertyKey {
        &self.definition.key
    }

    /// First (or only) value
    #[must_use]
    pub fn value(&self) -> &PropertyValue {
        &self.values[0]
    }

    #[must_use]
    pub fn values(&self) -> &[PropertyValue] {
        &self.values
    }
}
