//! Authorization tokens and principal resolution
//!
//! The searcher never interprets tokens itself: a [`PrincipalResolver`]
//! turns an optional token into a [`Visibility`], which the filter compiler
//! then encodes as an ACL clause.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use vortikal_core::Principal;

use crate::error::{SearchError, SearchResult};

/// Opaque session token handed in by the calling layer
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AuthToken(String);

impl AuthToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// What a caller is allowed to see
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// No ACL restriction (system/root context)
    Unrestricted,
    /// Resources whose read principals intersect this set
    Principals(BTreeSet<Principal>),
}

impl Visibility {
    /// Anonymous / public context: only `pseudo:all`
    #[must_use]
    pub fn anonymous() -> Self {
        Self::Principals(BTreeSet::from([Principal::all()]))
    }
}

/// Maps an optional token to the principals it acts as.
pub trait PrincipalResolver: Send + Sync {
    /// `None` is the unauthenticated/public context.
    ///
    /// # Errors
    /// Returns [`SearchError::InvalidToken`] for a token it does not know.
    fn resolve(&self, token: Option<&AuthToken>) -> SearchResult<Visibility>;
}

#[derive(Debug, Clone)]
struct Session {
    user: String,
    groups: Vec<String>,
}

/// In-memory resolver over a fixed table of sessions.
///
/// - no token → `pseudo:all`
/// - known session → the user, its groups, `pseudo:authenticated`, `pseudo:all`
/// - root session → unrestricted
#[derive(Debug, Clone, Default)]
pub struct StaticPrincipalResolver {
    sessions: HashMap<String, Session>,
    root_tokens: HashSet<String>,
}

impl StaticPrincipalResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_session(
        mut self,
        token: impl Into<String>,
        user: impl Into<String>,
        groups: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.sessions.insert(
            token.into(),
            Session {
                user: user.into(),
                groups: groups.into_iter().map(Into::into).collect(),
            },
        );
        self
    }

    #[must_use]
    pub fn with_root(mut self, token: impl Into<String>) -> Self {
        self.root_tokens.insert(token.into());
        self
    }
}

impl PrincipalResolver for StaticPrincipalResolver {
    fn resolve(&self, token: Option<&AuthToken>) -> SearchResult<Visibility> {
        let Some(token) = token else {
            return Ok(Visibility::anonymous());
        };
        if self.root_tokens.contains(token.as_str()) {
            return Ok(Visibility::Unrestricted);
        }
        let session = self
            .sessions
            .get(token.as_str())
            .ok_or(SearchError::InvalidToken)?;
        let mut principals = BTreeSet::from([
            Principal::all(),
            Principal::authenticated(),
            Principal::user(session.user.clone()),
        ]);
        principals.extend(session.groups.iter().cloned().map(Principal::group));
        Ok(Visibility::Principals(principals))
    }
}
