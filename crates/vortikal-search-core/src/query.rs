//! Abstract query tree
//!
//! A [`Query`] is an immutable, side-effect-free predicate tree. It is
//! compiled to a tantivy query by a [`QueryCompiler`](crate::query_compiler::QueryCompiler)
//! against whatever index view is current, and can be compiled any number of
//! times.

use std::fmt;

use serde::{Deserialize, Serialize};
use vortikal_core::{Path, PropertyKey, PropertyValue};

use crate::error::{SearchError, SearchResult};

/// Comparison operator for property and depth predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl ComparisonOp {
    const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }
}

/// Resource type matching mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeOp {
    /// Exactly this type
    Eq,
    /// This type or any descendant type
    In,
}

/// A predicate over indexed resources
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Query {
    And { children: Vec<Query> },
    Or { children: Vec<Query> },
    Not { child: Box<Query> },
    MatchAll,
    PropertyTerm {
        key: PropertyKey,
        op: ComparisonOp,
        value: PropertyValue,
    },
    PropertyTermIn {
        key: PropertyKey,
        values: Vec<PropertyValue>,
    },
    PropertyExists { key: PropertyKey },
    UriTerm { uri: Path },
    UriSet { uris: Vec<Path> },
    /// Resources strictly below `uri`, plus `uri` itself if `include_self`
    UriPrefix { uri: Path, include_self: bool },
    UriDepth { depth: u64, op: ComparisonOp },
    NameTerm { name: String },
    TypeTerm { resource_type: String, op: TypeOp },
}

impl Query {
    /// Conjunction.
    ///
    /// # Errors
    /// Returns [`SearchError::InvalidArgument`] for an empty child list.
    pub fn and(children: Vec<Self>) -> SearchResult<Self> {
        non_empty("and", &children)?;
        Ok(Self::And { children })
    }

    /// Disjunction.
    ///
    /// # Errors
    /// Returns [`SearchError::InvalidArgument`] for an empty child list.
    pub fn or(children: Vec<Self>) -> SearchResult<Self> {
        non_empty("or", &children)?;
        Ok(Self::Or { children })
    }

    #[must_use]
    pub fn not(child: Self) -> Self {
        Self::Not {
            child: Box::new(child),
        }
    }

    #[must_use]
    pub const fn property(key: PropertyKey, op: ComparisonOp, value: PropertyValue) -> Self {
        Self::PropertyTerm { key, op, value }
    }

    /// Property equals one of `values`.
    ///
    /// # Errors
    /// Returns [`SearchError::InvalidArgument`] for an empty value list.
    pub fn property_in(key: PropertyKey, values: Vec<PropertyValue>) -> SearchResult<Self> {
        non_empty("property-in", &values)?;
        Ok(Self::PropertyTermIn { key, values })
    }

    #[must_use]
    pub const fn exists(key: PropertyKey) -> Self {
        Self::PropertyExists { key }
    }

    #[must_use]
    pub const fn uri(uri: Path) -> Self {
        Self::UriTerm { uri }
    }

    /// URI is one of `uris`.
    ///
    /// # Errors
    /// Returns [`SearchError::InvalidArgument`] for an empty URI list.
    pub fn uri_set(uris: Vec<Path>) -> SearchResult<Self> {
        non_empty("uri-set", &uris)?;
        Ok(Self::UriSet { uris })
    }

    #[must_use]
    pub const fn uri_prefix(uri: Path, include_self: bool) -> Self {
        Self::UriPrefix { uri, include_self }
    }

    #[must_use]
    pub const fn uri_depth(depth: u64, op: ComparisonOp) -> Self {
        Self::UriDepth { depth, op }
    }

    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self::NameTerm { name: name.into() }
    }

    #[must_use]
    pub fn type_eq(resource_type: impl Into<String>) -> Self {
        Self::TypeTerm {
            resource_type: resource_type.into(),
            op: TypeOp::Eq,
        }
    }

    #[must_use]
    pub fn type_in(resource_type: impl Into<String>) -> Self {
        Self::TypeTerm {
            resource_type: resource_type.into(),
            op: TypeOp::In,
        }
    }
}

fn non_empty<T>(what: &str, items: &[T]) -> SearchResult<()> {
    if items.is_empty() {
        Err(SearchError::InvalidArgument(format!(
            "{what} requires at least one element"
        )))
    } else {
        Ok(())
    }
}

fn write_joined<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
    separator: &str,
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And { children } => {
                f.write_str("(")?;
                write_joined(f, children, " AND ")?;
                f.write_str(")")
            }
            Self::Or { children } => {
                f.write_str("(")?;
                write_joined(f, children, " OR ")?;
                f.write_str(")")
            }
            Self::Not { child } => write!(f, "NOT {child}"),
            Self::MatchAll => f.write_str("*"),
            Self::PropertyTerm { key, op, value } => write!(f, "{key} {} {value}", op.symbol()),
            Self::PropertyTermIn { key, values } => {
                write!(f, "{key} IN [")?;
                write_joined(f, values, ", ")?;
                f.write_str("]")
            }
            Self::PropertyExists { key } => write!(f, "{key} EXISTS"),
            Self::UriTerm { uri } => write!(f, "uri = {uri}"),
            Self::UriSet { uris } => {
                f.write_str("uri IN [")?;
                write_joined(f, uris, ", ")?;
                f.write_str("]")
            }
            Self::UriPrefix { uri, include_self } => {
                write!(f, "uri PREFIX {uri}")?;
                if *include_self {
                    f.write_str(" (self)")?;
                }
                Ok(())
            }
            Self::UriDepth { depth, op } => write!(f, "depth {} {depth}", op.symbol()),
            Self::NameTerm { name } => write!(f, "name = {name:?}"),
            Self::TypeTerm { resource_type, op } => match op {
                TypeOp::Eq => write!(f, "type = {resource_type}"),
                TypeOp::In => write!(f, "type IN {resource_type}"),
            },
        }
    }
}
