//! Search engine tuning knobs, loaded from the environment

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable for the internal ranked-hit ceiling.
pub const MAX_RANKED_HITS_ENV: &str = "VTK_SEARCH_MAX_RANKED_HITS";
/// Default ceiling on ranked hits requested from the index per `execute`.
pub const DEFAULT_MAX_RANKED_HITS: usize = 50_000;

/// Environment variable for the slow-query warning threshold (milliseconds).
pub const SLOW_QUERY_WARN_MS_ENV: &str = "VTK_SEARCH_SLOW_QUERY_WARN_MS";
/// Default slow-query warning threshold in milliseconds.
pub const DEFAULT_SLOW_QUERY_WARN_MS: u64 = 1_000;

/// Environment variable for the index writer memory budget (bytes).
pub const WRITER_MEMORY_BYTES_ENV: &str = "VTK_SEARCH_WRITER_MEMORY_BYTES";
/// Default index writer memory budget.
pub const DEFAULT_WRITER_MEMORY_BYTES: usize = 50_000_000;

/// Configuration shared by the searcher and the index manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Upper bound on ranked hits pulled from the index, whatever the
    /// request's `cursor + limit` asks for.
    pub max_ranked_hits: usize,
    /// Queries taking at least this long log a warning.
    pub slow_query_warn: Duration,
    /// Memory budget handed to the tantivy index writer.
    pub writer_memory_bytes: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_ranked_hits: DEFAULT_MAX_RANKED_HITS,
            slow_query_warn: Duration::from_millis(DEFAULT_SLOW_QUERY_WARN_MS),
            writer_memory_bytes: DEFAULT_WRITER_MEMORY_BYTES,
        }
    }
}

impl SearchConfig {
    /// Load config from environment variables.
    ///
    /// Unset or unparsable variables fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let max_ranked_hits = lookup(MAX_RANKED_HITS_ENV)
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_MAX_RANKED_HITS);

        let slow_query_ms = lookup(SLOW_QUERY_WARN_MS_ENV)
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_SLOW_QUERY_WARN_MS);

        let writer_memory_bytes = lookup(WRITER_MEMORY_BYTES_ENV)
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_WRITER_MEMORY_BYTES);

        Self {
            max_ranked_hits,
            slow_query_warn: Duration::from_millis(slow_query_ms),
            writer_memory_bytes,
        }
    }

    #[must_use]
    pub const fn with_max_ranked_hits(mut self, max_ranked_hits: usize) -> Self {
        self.max_ranked_hits = max_ranked_hits;
        self
    }

    #[must_use]
    pub const fn with_slow_query_warn(mut self, threshold: Duration) -> Self {
        self.slow_query_warn = threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = SearchConfig::default();
        assert_eq!(config.max_ranked_hits, 50_000);
        assert_eq!(config.slow_query_warn, Duration::from_secs(1));
        assert_eq!(config.writer_memory_bytes, 50_000_000);
        assert_eq!(SearchConfig::from_lookup(|_| None), config);
    }

    #[test]
    fn env_overrides() {
        let config = SearchConfig::from_lookup(lookup_from(&[
            (MAX_RANKED_HITS_ENV, "100"),
            (SLOW_QUERY_WARN_MS_ENV, " 25 "),
            (WRITER_MEMORY_BYTES_ENV, "20000000"),
        ]));
        assert_eq!(config.max_ranked_hits, 100);
        assert_eq!(config.slow_query_warn, Duration::from_millis(25));
        assert_eq!(config.writer_memory_bytes, 20_000_000);
    }

    #[test]
    fn unparsable_values_fall_back() {
        let config = SearchConfig::from_lookup(lookup_from(&[
            (MAX_RANKED_HITS_ENV, "lots"),
            (SLOW_QUERY_WARN_MS_ENV, "-5"),
        ]));
        assert_eq!(config.max_ranked_hits, DEFAULT_MAX_RANKED_HITS);
        assert_eq!(
            config.slow_query_warn,
            Duration::from_millis(DEFAULT_SLOW_QUERY_WARN_MS)
        );
    }

    #[test]
    fn builders() {
        let config = SearchConfig::default()
            .with_max_ranked_hits(3)
            .with_slow_query_warn(Duration::ZERO);
        assert_eq!(config.max_ranked_hits, 3);
        assert_eq!(config.slow_query_warn, Duration::ZERO);
    }
}
