//! Property selection: which stored fields (and whether the ACL) are loaded
//! into each result

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use vortikal_core::{PropertyKey, PropertyTypeDefinition};

/// Policy deciding, per query, which properties a result materializes.
///
/// Evaluation is pure, so a selection can be shared freely between
/// concurrent searches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropertySelection {
    /// Load no properties and no ACL (uri and type only)
    Nothing,
    /// Load every property, no ACL
    #[default]
    All,
    /// Load every property and the ACL
    AllWithAcl,
    /// Load only the listed properties, ACL per `include_acl`
    Only {
        properties: BTreeSet<PropertyKey>,
        include_acl: bool,
    },
}

impl PropertySelection {
    pub const NONE: Self = Self::Nothing;
    pub const ALL: Self = Self::All;
    pub const ALL_WITH_ACL: Self = Self::AllWithAcl;

    /// Allow-list selection
    #[must_use]
    pub fn only(properties: impl IntoIterator<Item = PropertyKey>, include_acl: bool) -> Self {
        Self::Only {
            properties: properties.into_iter().collect(),
            include_acl,
        }
    }

    #[must_use]
    pub fn is_included_property(&self, definition: &PropertyTypeDefinition) -> bool {
        match self {
            Self::Nothing => false,
            Self::All | Self::AllWithAcl => true,
            Self::Only { properties, .. } => properties.contains(&definition.key),
        }
    }

    #[must_use]
    pub const fn is_include_acl(&self) -> bool {
        match self {
            Self::Nothing | Self::All => false,
            Self::AllWithAcl => true,
            Self::Only { include_acl, .. } => *include_acl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vortikal_core::PropertyType;

    fn def(name: &str) -> PropertyTypeDefinition {
        PropertyTypeDefinition::new(
            PropertyKey::new("resource", name).unwrap(),
            PropertyType::String,
        )
    }

    #[test]
    fn canonical_policies() {
        let title = def("title");
        assert!(!PropertySelection::NONE.is_included_property(&title));
        assert!(!PropertySelection::NONE.is_include_acl());
        assert!(PropertySelection::ALL.is_included_property(&title));
        assert!(!PropertySelection::ALL.is_include_acl());
        assert!(PropertySelection::ALL_WITH_ACL.is_included_property(&title));
        assert!(PropertySelection::ALL_WITH_ACL.is_include_acl());
        assert_eq!(PropertySelection::default(), PropertySelection::ALL);
    }

    #[test]
    fn allow_list() {
        let title = def("title");
        let selection = PropertySelection::only([title.key.clone()], true);
        assert!(selection.is_included_property(&title));
        assert!(!selection.is_included_property(&def("owner")));
        assert!(selection.is_include_acl());
        assert!(!PropertySelection::only([], false).is_include_acl());
    }

    #[test]
    fn serde_tagged() {
        let selection = PropertySelection::only([def("title").key], false);
        let json = serde_json::to_string(&selection).unwrap();
        assert!(json.contains("\"kind\":\"only\""));
        let back: PropertySelection = serde_json::from_str(&json).unwrap();
        assert_eq!(back, selection);
    }
}
