//! A window of search results

use crate::property_set::PropertySet;

/// Property-sets for one `[cursor, cursor + limit)` window, plus the total
/// number of matches in the index view.
#[derive(Debug, Default)]
pub struct ResultSet {
    results: Vec<PropertySet>,
    total_hits: usize,
}

impl ResultSet {
    #[must_use]
    pub const fn new(results: Vec<PropertySet>, total_hits: usize) -> Self {
        Self {
            results,
            total_hits,
        }
    }

    /// Number of property-sets in this window
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&PropertySet> {
        self.results.get(index)
    }

    /// Matches in the whole view, independent of cursor and limit
    #[must_use]
    pub const fn total_hits(&self) -> usize {
        self.total_hits
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PropertySet> {
        self.results.iter()
    }

    #[must_use]
    pub fn into_results(self) -> Vec<PropertySet> {
        self.results
    }
}

impl IntoIterator for ResultSet {
    type Item = PropertySet;
    type IntoIter = std::vec::IntoIter<PropertySet>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a PropertySet;
    type IntoIter = std::slice::Iter<'a, PropertySet>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vortikal_core::Path;

    fn set(uri: &str) -> PropertySet {
        PropertySet::from_properties(Path::parse(uri).unwrap(), "file", Vec::new(), None)
    }

    #[test]
    fn window_and_total_are_independent() {
        let results = ResultSet::new(vec![set("/a"), set("/b")], 7);
        assert_eq!(results.len(), 2);
        assert_eq!(results.total_hits(), 7);
        assert_eq!(results.get(1).unwrap().uri().as_str(), "/b");
        assert!(results.get(2).is_none());
        let uris: Vec<&str> = results.iter().map(|p| p.uri().as_str()).collect();
        assert_eq!(uris, ["/a", "/b"]);
        assert_eq!(results.into_iter().count(), 2);
    }

    #[test]
    fn empty_window_keeps_total() {
        let results = ResultSet::new(Vec::new(), 5);
        assert!(results.is_empty());
        assert_eq!(results.total_hits(), 5);
    }
}
