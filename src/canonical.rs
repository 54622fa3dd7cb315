use serde_json::Value;
use sha2::{Digest, Sha256};

/// Number of hex chars kept from a SHA-256 digest inside signed messages.
///
/// 16 hex chars = 64 bits. This weakens collision resistance relative to the
/// full digest and is part of the wire contract: clients sign the truncated
/// form, so both sides must truncate identically.
pub const HASH_PREFIX_LEN: usize = 16;

/// First 16 hex chars of sha256 over the UTF-8 bytes of `input`.
pub fn sha256_prefix(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let full = hex::encode(hasher.finalize());
    full[..HASH_PREFIX_LEN].to_string()
}

/// Full sha256 hex digest (used for agent id derivation, not signed messages).
pub fn sha256_hex(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}

/// Deterministic JSON serialization: object keys sorted lexicographically,
/// arrays serialized element-wise, recursively. Two structurally equal values
/// always produce the same string regardless of field insertion order.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        serde_json::to_string(k).unwrap_or_default(),
                        canonical_json(&map[k])
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", parts.join(","))
        }
        // Scalars have a single serde_json rendering.
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// `register:<handle>:<timestampMs>`
pub fn register_message(handle: &str, timestamp_ms: u64) -> String {
    format!("register:{}:{}", handle, timestamp_ms)
}

/// `ship:<agentId>:<sha256(title)[0:16]>:<sha256(canonicalJSON(artifacts))[0:16]>:<timestampMs>`
///
/// `artifacts` must be the serde_json view of the artifact array exactly as
/// it will be persisted; the title hash covers the persisted title.
pub fn ship_message(agent_id: &str, title: &str, artifacts: &Value, timestamp_ms: u64) -> String {
    format!(
        "ship:{}:{}:{}:{}",
        agent_id,
        sha256_prefix(title),
        sha256_prefix(&canonical_json(artifacts)),
        timestamp_ms
    )
}

/// `ack:<shipId>:<agentId>:<timestampMs>`
pub fn ack_message(ship_id: &str, agent_id: &str, timestamp_ms: u64) -> String {
    format!("ack:{}:{}:{}", ship_id, agent_id, timestamp_ms)
}

/// Profile attribute updates reuse the ship scheme with a synthetic title and
/// an empty artifact array, e.g. `color:#aabbcc`.
pub fn attribute_message(agent_id: &str, attribute: &str, value: &str, timestamp_ms: u64) -> String {
    let synthetic = format!("{}:{}", attribute, value);
    ship_message(agent_id, &synthetic, &Value::Array(vec![]), timestamp_ms)
}
