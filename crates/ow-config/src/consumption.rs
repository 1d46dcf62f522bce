//! Config consumption map + unused-key guard.
//!
//! "Consumed pointers" are JSON Pointer prefixes of keys that [`WatchConfig`]
//! actually reads. A leaf under any consumed prefix is consumed; anything
//! else is reported as unused (usually a typo such as `poll_intervall`).
//!
//! [`WatchConfig`]: crate::WatchConfig

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every pointer read by `WatchConfig::from_json`. Keep in sync with
/// `watch.rs`.
pub const CONSUMED_POINTERS: &[&str] = &[
    "/source/snapshot_url",
    "/source/landing_url",
    "/source/request_timeout_seconds",
    "/polling/poll_interval_seconds",
    "/polling/retry_delay_seconds",
    "/storage/state_file",
    "/storage/opened_log",
    "/storage/closed_log",
    "/storage/latest_file",
    "/credentials/cookie_file",
    "/credentials/refresh_command",
    "/credentials/refresh_timeout_seconds",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Minimal set of unused leaf pointers (sorted)
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Produce an unused-key report.
/// `Fail` returns an error when unused keys exist; `Warn` always returns the report.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let mut leaves: Vec<String> = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|lp| !CONSUMED_POINTERS.iter().any(|cp| is_prefix_pointer(cp, lp)))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS: {} unused config leaf key(s) detected: {:?}",
            report.unused_leaf_pointers.len(),
            report.unused_leaf_pointers.iter().take(12).collect::<Vec<_>>()
        );
    }

    Ok(report)
}

/// True if `prefix` is a JSON-pointer prefix of `leaf`:
/// "/a/b" consumes "/a/b" and "/a/b/0" but not "/a/bc".
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if leaf == prefix {
        return true;
    }
    leaf.strip_prefix(prefix)
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}

pub(crate) fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) if !map.is_empty() => {
            for (k, vv) in map {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) if !arr.is_empty() => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{}/{}", prefix, i);
                collect_leaf_pointers(vv, &next, out);
            }
        }
        _ => {
            if prefix.is_empty() {
                // The root document itself is a scalar or empty container.
                return;
            }
            out.push(prefix.to_string());
        }
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_respects_token_boundary() {
        assert!(is_prefix_pointer("/credentials/refresh_command", "/credentials/refresh_command/0"));
        assert!(is_prefix_pointer("/polling/retry_delay_seconds", "/polling/retry_delay_seconds"));
        assert!(!is_prefix_pointer("/storage/state_file", "/storage/state_file_backup"));
    }

    #[test]
    fn empty_containers_are_leaves() {
        let v = serde_json::json!({"credentials": {"refresh_command": []}, "x": {}});
        let mut out = Vec::new();
        collect_leaf_pointers(&v, "", &mut out);
        out.sort();
        assert_eq!(out, vec!["/credentials/refresh_command", "/x"]);
    }
}
