//! Maps changefeed file paths to `(topic, table)` pairs.
//!
//! Changefeed sinks name their files
//! `/<topic>/<YYYY-MM-DD>/<timestamp>-<uniquer>-<table>-<schema>.ndjson` and
//! mark resolved timestamps with `/<topic>/<YYYY-MM-DD>/<timestamp>.RESOLVED`.
//! Both patterns are anchored at both ends of the path.

use std::sync::LazyLock;

use regex::Regex;

/// Table reported for resolved-timestamp marker files.
pub const RESOLVED_TABLE: &str = "RESOLVED";

static RESOLVED_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/([^/]+)/(\d{4}-\d{2}-\d{2})/(\d+)\.RESOLVED$").expect("resolved-file pattern")
});

static GENERAL_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/([^/]+)/(\d{4}-\d{2}-\d{2})/(\d+)-([^/]+)-([^/-]+)-([^/-]+)\.ndjson$")
        .expect("general-file pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub topic: String,
    pub table: String,
}

/// Route a path relative to the mount point. `None` means unmatched.
pub fn route(path: &str) -> Option<Route> {
    if let Some(caps) = RESOLVED_FILE.captures(path) {
        return Some(Route {
            topic: caps[1].to_string(),
            table: RESOLVED_TABLE.to_string(),
        });
    }
    GENERAL_FILE.captures(path).map(|caps| Route {
        topic: caps[1].to_string(),
        table: caps[5].to_string(),
    })
}

/// Strip the mount prefix from a request path.
///
/// The remainder must start at a segment boundary: `/v1` strips `/v1/a` but
/// not `/v1a`.
pub fn strip_prefix<'a>(prefix: &str, path: &'a str) -> Option<&'a str> {
    path.strip_prefix(prefix).filter(|rest| rest.starts_with('/'))
}
