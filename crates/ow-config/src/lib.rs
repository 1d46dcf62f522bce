//! ow-config
//!
//! Layered YAML configuration for the order watcher.
//!
//! - Files merge in order: earlier docs are base, later docs override.
//! - The merged document is hashed (`config_hash`) so a run can be tied to
//!   the exact configuration it used.
//! - Literal secrets are refused; cookies live in the cookie jar file, never
//!   in config.
//! - The typed view is [`WatchConfig`]; keys it does not read are reported
//!   by [`report_unused_keys`].

mod consumption;
mod watch;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

pub use consumption::{report_unused_keys, UnusedKeyPolicy, UnusedKeyReport, CONSUMED_POINTERS};
pub use watch::{
    CredentialsConfig, PollingConfig, SourceConfig, StorageConfig, WatchConfig,
    MIN_RETRY_DELAY_SECONDS,
};

/// Literal values that look like credentials. Config stores paths and
/// URLs only.
const SECRET_PREFIXES: &[&str] = &[
    "Bearer ",    // HTTP auth header value
    "eyJ",        // JWT (base64 '{"')
    "sk-",        // API secret keys
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
];

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        // An empty overlay file parses to null; it overrides nothing.
        if v_json.is_null() {
            continue;
        }
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    // serde_json::Map is key-sorted, so this is canonical regardless of
    // key order in the YAML sources.
    let canonical_json = serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Load layered YAML and build the validated typed view in one step.
pub fn load_watch_config(paths: &[&str]) -> Result<(LoadedConfig, WatchConfig)> {
    let loaded = load_layered_yaml(paths)?;
    let cfg = WatchConfig::from_json(&loaded.config_json)?;
    Ok((loaded, cfg))
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    consumption::collect_leaf_pointers(v, "", &mut leaves);

    for ptr in leaves {
        if let Some(s) = v.pointer(&ptr).and_then(Value::as_str) {
            if looks_like_secret(s) {
                bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
            }
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim_start();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}
