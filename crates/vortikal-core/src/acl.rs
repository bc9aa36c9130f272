//! Principals, privileges and access control lists

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Kind of principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    User,
    Group,
    /// Synthetic principals such as "everyone" or "any authenticated user"
    Pseudo,
}

impl PrincipalKind {
    const fn prefix(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Pseudo => "pseudo",
        }
    }
}

/// A user, group or pseudo principal, rendered as `kind:name`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Principal {
    kind: PrincipalKind,
    name: String,
}

/// Name of the pseudo principal matching everyone, including anonymous access
pub const PSEUDO_ALL: &str = "all";
/// Name of the pseudo principal matching every authenticated user
pub const PSEUDO_AUTHENTICATED: &str = "authenticated";

impl Principal {
    #[must_use]
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            kind: PrincipalKind::User,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            kind: PrincipalKind::Group,
            name: name.into(),
        }
    }

    /// `pseudo:all`
    #[must_use]
    pub fn all() -> Self {
        Self {
            kind: PrincipalKind::Pseudo,
            name: PSEUDO_ALL.to_owned(),
        }
    }

    /// `pseudo:authenticated`
    #[must_use]
    pub fn authenticated() -> Self {
        Self {
            kind: PrincipalKind::Pseudo,
            name: PSEUDO_AUTHENTICATED.to_owned(),
        }
    }

    /// Parse `user:alice`, `group:staff` or `pseudo:all`.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidPrincipal`] for an unknown kind or empty name.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let (kind, name) = raw
            .split_once(':')
            .ok_or_else(|| CoreError::InvalidPrincipal(raw.to_owned()))?;
        let kind = match kind {
            "user" => PrincipalKind::User,
            "group" => PrincipalKind::Group,
            "pseudo" => PrincipalKind::Pseudo,
            _ => return Err(CoreError::InvalidPrincipal(raw.to_owned())),
        };
        if name.is_empty() {
            return Err(CoreError::InvalidPrincipal(raw.to_owned()));
        }
        Ok(Self {
            kind,
            name: name.to_owned(),
        })
    }

    #[must_use]
    pub const fn kind(&self) -> PrincipalKind {
        self.kind
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.prefix(), self.name)
    }
}

impl TryFrom<String> for Principal {
    type Error = CoreError;

    fn try_from(value: String) -> CoreResult<Self> {
        Self::parse(&value)
    }
}

impl From<Principal> for String {
    fn from(principal: Principal) -> Self {
        principal.to_string()
    }
}

/// Privileges grantable in an [`Acl`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privilege {
    All,
    ReadWrite,
    ReadWriteUnpublished,
    AddComment,
    Read,
    ReadProcessed,
}

impl Privilege {
    /// Whether holding this privilege makes the resource visible in searches
    #[must_use]
    pub const fn grants_read(self) -> bool {
        !matches!(self, Self::AddComment)
    }
}

/// Access control list: privilege → principals holding it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl {
    #[serde(default)]
    entries: BTreeMap<Privilege, BTreeSet<Principal>>,
}

impl Acl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `privilege` to `principal` (idempotent)
    pub fn grant(&mut self, privilege: Privilege, principal: Principal) {
        self.entries.entry(privilege).or_default().insert(principal);
    }

    /// Builder form of [`Acl::grant`]
    #[must_use]
    pub fn with(mut self, privilege: Privilege, principal: Principal) -> Self {
        self.grant(privilege, principal);
        self
    }

    /// Revoke `privilege` from `principal`; returns whether it was held
    pub fn revoke(&mut self, privilege: Privilege, principal: &Principal) -> bool {
        let Some(holders) = self.entries.get_mut(&privilege) else {
            return false;
        };
        let removed = holders.remove(principal);
        if holders.is_empty() {
            self.entries.remove(&privilege);
        }
        removed
    }

    #[must_use]
    pub fn has_privilege(&self, privilege: Privilege, principal: &Principal) -> bool {
        self.entries
            .get(&privilege)
            .is_some_and(|holders| holders.contains(principal))
    }

    /// Principals holding `privilege`
    pub fn principals(&self, privilege: Privilege) -> impl Iterator<Item = &Principal> {
        self.entries.get(&privilege).into_iter().flatten()
    }

    /// Every principal holding at least one read-granting privilege
    #[must_use]
    pub fn read_principals(&self) -> BTreeSet<&Principal> {
        self.entries
            .iter()
            .filter(|(privilege, _)| privilege.grants_read())
            .flat_map(|(_, holders)| holders.iter())
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
