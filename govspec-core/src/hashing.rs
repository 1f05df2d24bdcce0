//! Hashing System - Model and Export Digests
//!
//! Provides deterministic, reproducible hashes for audit trails. In release
//! builds nothing volatile reaches a digest.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, to_string, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::contract::{BuildMode, HashAlgorithm, HashConfig, HashEncoding};
use crate::model::SpecTree;

/// Volatile provenance stamped into development exports only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolatileStamp {
    pub generated_at: DateTime<Utc>,
    pub export_id: Uuid,
}

impl VolatileStamp {
    /// `None` in release mode.
    pub fn capture(mode: BuildMode) -> Option<Self> {
        match mode {
            BuildMode::Release => None,
            BuildMode::Development => Some(Self {
                generated_at: Utc::now(),
                export_id: Uuid::new_v4(),
            }),
        }
    }

    pub fn timestamp(&self) -> String {
        self.generated_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Digest with the contract's algorithm and encoding, truncated to its prefix length.
pub fn digest(data: &[u8], config: &HashConfig) -> String {
    let full = match (config.algorithm, config.encoding) {
        (HashAlgorithm::Sha256, HashEncoding::Hex) => sha256_hex(data),
    };
    full.chars().take(config.truncate).collect()
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    to_string(&sort_value(&v))
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let sorted_map: serde_json::Map<String, Value> = sorted
                .into_iter()
                .map(|(k, v)| (k.clone(), sort_value(v)))
                .collect();
            Value::Object(sorted_map)
        }
        Value::Array(arr) => {
            Value::Array(arr.iter().map(sort_value).collect())
        }
        _ => v.clone()
    }
}

/// Model hash over the normalized tree.
///
/// The stamp only participates in development mode, where the caller passes one.
pub fn compute_model_hash(
    tree: &SpecTree,
    config: &HashConfig,
    stamp: Option<&VolatileStamp>,
) -> Result<String, serde_json::Error> {
    let canonical = match stamp {
        None => canonical_json(tree)?,
        Some(stamp) => canonical_json(&json!({ "model": tree, "stamp": stamp }))?,
    };
    Ok(digest(canonical.as_bytes(), config))
}

/// Export hash over the rendered governed spec text.
pub fn compute_export_hash(content: &str, config: &HashConfig) -> String {
    digest(content.as_bytes(), config)
}

/// Hash of an input that never became a spec tree.
pub fn compute_raw_hash(value: &Value, config: &HashConfig) -> String {
    digest(sort_value(value).to_string().as_bytes(), config)
}

// We need hex encoding
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}
