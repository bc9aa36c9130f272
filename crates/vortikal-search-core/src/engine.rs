//! Entry point trait for the repository layer
//!
//! Object safe, so callers can hold a `Arc<dyn SearchEngine>` without
//! knowing the index backend.

use crate::auth::AuthToken;
use crate::error::SearchResult;
use crate::property_set::PropertySet;
use crate::request::SearchRequest;
use crate::results::ResultSet;

pub trait SearchEngine: Send + Sync {
    /// Run the request and return one result window plus the total hit count.
    ///
    /// # Errors
    /// `InvalidArgument` for a malformed request, `InvalidToken` for an
    /// unknown token, `Query` when the index fails.
    fn execute(&self, token: Option<&AuthToken>, request: &SearchRequest)
    -> SearchResult<ResultSet>;

    /// Stream matches to `callback` until it returns `Ok(false)`, the limit
    /// is reached, or the matches run out.
    ///
    /// # Errors
    /// As [`SearchEngine::execute`], plus `Unsupported` for a sort other
    /// than a single ascending field. Errors from `callback` are returned
    /// unchanged.
    fn iterate(
        &self,
        token: Option<&AuthToken>,
        request: &SearchRequest,
        callback: &mut dyn FnMut(PropertySet) -> SearchResult<bool>,
    ) -> SearchResult<()>;
}
