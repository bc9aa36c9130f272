//! Absolute resource paths
//!
//! A [`Path`] is the identity of a resource in the repository and the
//! primary key of an indexed document. Paths are always absolute, use `/`
//! as separator, and never end with a slash (except the root itself).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Separator between path segments
pub const SEPARATOR: char = '/';

/// A validated, absolute resource path such as `/` or `/docs/report.html`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Path(String);

impl Path {
    /// The repository root `/`
    #[must_use]
    pub fn root() -> Self {
        Self(SEPARATOR.to_string())
    }

    /// Parse and validate a path.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidPath`] for empty or relative paths, a
    /// trailing slash, or empty segments (`//`).
    pub fn parse(raw: &str) -> CoreResult<Self> {
        if raw == "/" {
            return Ok(Self::root());
        }
        if !raw.starts_with(SEPARATOR) {
            return Err(CoreError::InvalidPath(format!("not absolute: {raw:?}")));
        }
        if raw.ends_with(SEPARATOR) {
            return Err(CoreError::InvalidPath(format!("trailing slash: {raw:?}")));
        }
        if raw[1..].split(SEPARATOR).any(str::is_empty) {
            return Err(CoreError::InvalidPath(format!("empty segment: {raw:?}")));
        }
        Ok(Self(raw.to_owned()))
    }

    /// The path as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the root path
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// Number of segments below the root (`/` = 0, `/a` = 1, `/a/b` = 2)
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0.matches(SEPARATOR).count()
        }
    }

    /// Last segment of the path; the root's name is `/`
    #[must_use]
    pub fn name(&self) -> &str {
        if self.is_root() {
            return &self.0;
        }
        self.0
            .rfind(SEPARATOR)
            .map_or(self.0.as_str(), |pos| &self.0[pos + 1..])
    }

    /// Parent path, or `None` for the root
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind(SEPARATOR) {
            Some(0) | None => Some(Self::root()),
            Some(pos) => Some(Self(self.0[..pos].to_owned())),
        }
    }

    /// All proper ancestors, root first
    #[must_use]
    pub fn ancestors(&self) -> Vec<Self> {
        let mut ancestors = Vec::with_capacity(self.depth());
        let mut current = self.parent();
        while let Some(path) = current {
            current = path.parent();
            ancestors.push(path);
        }
        ancestors.reverse();
        ancestors
    }

    /// Whether `self` is a proper ancestor of `other`
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        if self.is_root() {
            return !other.is_root();
        }
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == b'/'
    }

    /// Append a child segment.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidPath`] if the segment is empty or contains `/`.
    pub fn extend(&self, segment: &str) -> CoreResult<Self> {
        if segment.is_empty() || segment.contains(SEPARATOR) {
            return Err(CoreError::InvalidPath(format!(
                "invalid segment {segment:?}"
            )));
        }
        if self.is_root() {
            Ok(Self(format!("/{segment}")))
        } else {
            Ok(Self(format!("{}/{segment}", self.0)))
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Path {
    type Error = CoreError;

    fn try_from(value: String) -> CoreResult<Self> {
        Self::parse(&value)
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.0
    }
}

impl std::str::FromStr for Path {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Self::parse(s)
    }
}
