//! Unused-key guard.
//!
//! A typo in a YAML layer (`poling:` instead of `polling:`) would otherwise
//! be silently ignored and the default used. The guard lists every leaf of
//! the merged document that no [`AdapterConfig`](crate::AdapterConfig) field
//! reads.

use std::fmt;

use anyhow::{bail, Result};
use serde::Serialize;
use serde_json::Value;

/// JSON pointers read by `AdapterConfig`. A leaf is consumed when it equals
/// one of these or lies beneath one.
pub const CONSUMED_POINTERS: &[&str] = &[
    "/polling/interval_seconds",
    "/area/latitude",
    "/area/longitude",
    "/area/radius_km",
    "/api/base_url",
    "/api/timeout_seconds",
    "/device/description",
    "/logging/level",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnusedKeyReport {
    /// Unused leaf pointers, sorted.
    pub unused: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused.is_empty()
    }
}

impl fmt::Display for UnusedKeyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return f.write_str("no unused config keys");
        }
        write!(f, "{} unused config key(s): {}", self.unused.len(), self.unused.join(", "))
    }
}

/// Report the leaves of `config_json` that nothing reads.
///
/// With [`UnusedKeyPolicy::Fail`] a non-empty report is an error.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let mut leaves = Vec::new();
    collect_leaves(config_json, String::new(), &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|leaf| !CONSUMED_POINTERS.iter().any(|p| covers(p, leaf)))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport { unused };
    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!("CONFIG_UNUSED_KEYS {report}");
    }
    Ok(report)
}

/// `/a/b` covers `/a/b` and `/a/b/c`, not `/a/bc`.
fn covers(prefix: &str, leaf: &str) -> bool {
    match leaf.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn collect_leaves(v: &Value, at: String, out: &mut Vec<String>) {
    match v {
        Value::Object(map) if !map.is_empty() => {
            for (k, child) in map {
                collect_leaves(child, format!("{at}/{}", escape_token(k)), out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (i, child) in items.iter().enumerate() {
                collect_leaves(child, format!("{at}/{i}"), out);
            }
        }
        _ => {
            if at.is_empty() {
                // A scalar (or empty) root has no keys to report.
                return;
            }
            out.push(at);
        }
    }
}

/// RFC 6901 escaping.
fn escape_token(k: &str) -> String {
    k.replace('~', "~0").replace('/', "~1")
}
