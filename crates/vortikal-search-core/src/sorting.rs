//! Sort specifications

use std::fmt;

use serde::{Deserialize, Serialize};
use vortikal_core::PropertyKey;

/// What to sort on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortTarget {
    Uri,
    Name,
    Type,
    Property(PropertyKey),
}

impl fmt::Display for SortTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uri => f.write_str("uri"),
            Self::Name => f.write_str("name"),
            Self::Type => f.write_str("type"),
            Self::Property(key) => write!(f, "{key}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// One `(target, direction)` sort key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortField {
    pub target: SortTarget,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortField {
    #[must_use]
    pub const fn ascending(target: SortTarget) -> Self {
        Self {
            target,
            direction: SortDirection::Ascending,
        }
    }

    #[must_use]
    pub const fn descending(target: SortTarget) -> Self {
        Self {
            target,
            direction: SortDirection::Descending,
        }
    }
}

/// Ordered list of sort keys; earlier keys take precedence.
///
/// An empty sorting means "no explicit order": relevance order for
/// `execute`, index storage order for `iterate_matching`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sorting {
    fields: Vec<SortField>,
}

impl Default for Sorting {
    /// URI ascending
    fn default() -> Self {
        Self::by(SortField::ascending(SortTarget::Uri))
    }
}

impl Sorting {
    #[must_use]
    pub const fn new(fields: Vec<SortField>) -> Self {
        Self { fields }
    }

    #[must_use]
    pub fn by(field: SortField) -> Self {
        Self {
            fields: vec![field],
        }
    }

    /// Append a lower-precedence key
    #[must_use]
    pub fn then_by(mut self, field: SortField) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn fields(&self) -> &[SortField] {
        &self.fields
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Sorting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let dir = match field.direction {
                SortDirection::Ascending => "asc",
                SortDirection::Descending => "desc",
            };
            write!(f, "{} {dir}", field.target)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_uri_ascending() {
        let sorting = Sorting::default();
        assert_eq!(sorting.fields(), &[SortField::ascending(SortTarget::Uri)]);
        assert_eq!(sorting.to_string(), "uri asc");
    }

    #[test]
    fn then_by_appends() {
        let title = PropertyKey::new("resource", "title").unwrap();
        let sorting = Sorting::by(SortField::descending(SortTarget::Property(title)))
            .then_by(SortField::ascending(SortTarget::Name));
        assert_eq!(sorting.fields().len(), 2);
        assert_eq!(sorting.to_string(), "resource:title desc, name asc");
        assert!(Sorting::new(Vec::new()).is_empty());
    }
}
