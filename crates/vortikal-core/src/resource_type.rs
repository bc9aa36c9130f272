//! Resource type hierarchy
//!
//! Resource types form a tree (`resource` → `file` → `image`, ...). Type
//! queries with the `In` operator match a type or any of its descendants, so
//! every indexed document carries its type plus all ancestor types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Named resource types, each with an optional parent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTypeTree {
    parents: BTreeMap<String, Option<String>>,
}

impl ResourceTypeTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type under `parent` (or as a root type).
    ///
    /// # Errors
    /// [`CoreError::UnknownResourceType`] if the parent is not registered,
    /// [`CoreError::DuplicateResourceType`] if `name` already exists.
    pub fn add_type(&mut self, name: &str, parent: Option<&str>) -> CoreResult<()> {
        if self.parents.contains_key(name) {
            return Err(CoreError::DuplicateResourceType(name.to_owned()));
        }
        if let Some(parent) = parent
            && !self.parents.contains_key(parent)
        {
            return Err(CoreError::UnknownResourceType(parent.to_owned()));
        }
        self.parents
            .insert(name.to_owned(), parent.map(str::to_owned));
        Ok(())
    }

    /// Builder form of [`ResourceTypeTree::add_type`]
    ///
    /// # Errors
    /// See [`ResourceTypeTree::add_type`].
    pub fn with_type(mut self, name: &str, parent: Option<&str>) -> CoreResult<Self> {
        self.add_type(name, parent)?;
        Ok(self)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.parents.contains_key(name)
    }

    #[must_use]
    pub fn parent(&self, name: &str) -> Option<&str> {
        self.parents.get(name).and_then(Option::as_deref)
    }

    /// `name` followed by its ancestors, nearest first.
    ///
    /// # Errors
    /// [`CoreError::UnknownResourceType`] if `name` is not registered.
    pub fn ancestors_and_self(&self, name: &str) -> CoreResult<Vec<&str>> {
        let (first, mut parent) = self
            .parents
            .get_key_value(name)
            .ok_or_else(|| CoreError::UnknownResourceType(name.to_owned()))?;
        let mut chain = vec![first.as_str()];
        while let Some(current) = parent.as_deref() {
            let (key, next) = self
                .parents
                .get_key_value(current)
                .ok_or_else(|| CoreError::UnknownResourceType(current.to_owned()))?;
            chain.push(key.as_str());
            parent = next;
        }
        Ok(chain)
    }

    /// Whether `name` equals `ancestor` or descends from it
    #[must_use]
    pub fn is_a(&self, name: &str, ancestor: &str) -> bool {
        self.ancestors_and_self(name)
            .is_ok_and(|chain| chain.contains(&ancestor))
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.parents.keys().map(String::as_str)
    }
}
