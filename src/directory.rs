use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::enrich::{ArtifactMeta, Card};

/// A registered agent identity. The public key is the identity anchor; there
/// is no password and no session, and the key is immutable for a given id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: String,
    pub handle: String,
    pub public_key: String,
    pub first_seen_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_shipped_ms: Option<u64>,
    pub total_ships: u64,
    pub activity_7d: u64,
}

/// An artifact as persisted: the submitted type/value plus any caller meta.
/// Enrichment augments display data elsewhere but never rewrites these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredArtifact {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ArtifactMeta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipStatus {
    Reachable,
    Unreachable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipRecord {
    pub ship_id: String,
    pub agent_id: String,
    pub title: String,
    pub description: String,
    pub ship_type: String,
    pub primary_artifact_type: String,
    pub artifacts: Vec<StoredArtifact>,
    pub timestamp_ms: u64,
    pub status: ShipStatus,
    pub enriched_card: Card,
    pub changelog: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<String>>,
}

pub trait AgentDirectory: Send + Sync {
    fn get(&self, agent_id: &str) -> Option<Agent>;
    fn by_handle(&self, handle: &str) -> Option<Agent>;
    /// Fails if the handle or id is already taken.
    fn insert(&self, agent: Agent) -> Result<()>;
    /// Bump ship counters after a successful persist.
    fn record_ship(&self, agent_id: &str, now_ms: u64);
    /// Agents that respond to new ships with acknowledgements.
    fn responder_ids(&self) -> Vec<String>;
}

pub trait CollectionRegistry: Send + Sync {
    fn is_open(&self, slug: &str) -> bool;
}

pub trait ShipStore: Send + Sync {
    fn insert(&self, record: ShipRecord) -> Result<ShipRecord>;
    fn get(&self, ship_id: &str) -> Option<ShipRecord>;
}

/// Fire-and-forget acknowledgement fan-out target. Failures are logged and
/// swallowed by the caller; they never affect an already-returned response.
pub trait AckSink: Send + Sync {
    fn add(&self, ship_id: &str, responding_agent_id: &str, emoji: &str) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryDirectory {
    inner: Mutex<HashMap<String, Agent>>,
    responders: Mutex<Vec<String>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_responder(&self, agent_id: impl Into<String>) {
        self.responders.lock().unwrap().push(agent_id.into());
    }
}

impl AgentDirectory for InMemoryDirectory {
    fn get(&self, agent_id: &str) -> Option<Agent> {
        self.inner.lock().unwrap().get(agent_id).cloned()
    }

    fn by_handle(&self, handle: &str) -> Option<Agent> {
        self.inner
            .lock()
            .unwrap()
            .values()
            .find(|a| a.handle == handle)
            .cloned()
    }

    fn insert(&self, agent: Agent) -> Result<()> {
        let mut map = self.inner.lock().unwrap();
        if map.contains_key(&agent.agent_id) {
            return Err(anyhow!("agent id already registered"));
        }
        if map.values().any(|a| a.handle == agent.handle) {
            return Err(anyhow!("handle already taken"));
        }
        map.insert(agent.agent_id.clone(), agent);
        Ok(())
    }

    fn record_ship(&self, agent_id: &str, now_ms: u64) {
        let mut map = self.inner.lock().unwrap();
        if let Some(a) = map.get_mut(agent_id) {
            a.total_ships += 1;
            a.activity_7d += 1;
            a.last_shipped_ms = Some(now_ms);
        }
    }

    fn responder_ids(&self) -> Vec<String> {
        self.responders.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct InMemoryCollections {
    open: Mutex<HashSet<String>>,
}

impl InMemoryCollections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_collection(&self, slug: impl Into<String>) {
        self.open.lock().unwrap().insert(slug.into());
    }
}

impl CollectionRegistry for InMemoryCollections {
    fn is_open(&self, slug: &str) -> bool {
        self.open.lock().unwrap().contains(slug)
    }
}

#[derive(Default)]
pub struct InMemoryShipStore {
    inner: Mutex<HashMap<String, ShipRecord>>,
}

impl InMemoryShipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ShipStore for InMemoryShipStore {
    fn insert(&self, record: ShipRecord) -> Result<ShipRecord> {
        let mut map = self.inner.lock().unwrap();
        if map.contains_key(&record.ship_id) {
            return Err(anyhow!("duplicate ship id"));
        }
        map.insert(record.ship_id.clone(), record.clone());
        Ok(record)
    }

    fn get(&self, ship_id: &str) -> Option<ShipRecord> {
        self.inner.lock().unwrap().get(ship_id).cloned()
    }
}

/// Records acknowledgements in memory; also what tests inspect to assert the
/// fan-out ran (or didn't).
#[derive(Default)]
pub struct InMemoryAckSink {
    inner: Mutex<Vec<(String, String, String)>>,
}

impl InMemoryAckSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<(String, String, String)> {
        self.inner.lock().unwrap().clone()
    }
}

impl AckSink for InMemoryAckSink {
    fn add(&self, ship_id: &str, responding_agent_id: &str, emoji: &str) -> Result<()> {
        self.inner.lock().unwrap().push((
            ship_id.to_string(),
            responding_agent_id.to_string(),
            emoji.to_string(),
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(id: &str, handle: &str) -> Agent {
        Agent {
            agent_id: id.into(),
            handle: handle.into(),
            public_key: "pk".into(),
            first_seen_ms: 0,
            last_shipped_ms: None,
            total_ships: 0,
            activity_7d: 0,
        }
    }

    #[test]
    fn directory_rejects_duplicate_handle() {
        let dir = InMemoryDirectory::new();
        dir.insert(agent("a1", "octo")).unwrap();
        assert!(dir.insert(agent("a2", "octo")).is_err());
        assert!(dir.insert(agent("a1", "other")).is_err());
    }

    #[test]
    fn record_ship_bumps_counters() {
        let dir = InMemoryDirectory::new();
        dir.insert(agent("a1", "octo")).unwrap();
        dir.record_ship("a1", 99);
        let a = dir.get("a1").unwrap();
        assert_eq!(a.total_ships, 1);
        assert_eq!(a.last_shipped_ms, Some(99));
    }

    #[test]
    fn ship_store_rejects_duplicate_id() {
        let store = InMemoryShipStore::new();
        let rec = ShipRecord {
            ship_id: "s1".into(),
            agent_id: "a1".into(),
            title: "t".into(),
            description: String::new(),
            ship_type: "code".into(),
            primary_artifact_type: "github".into(),
            artifacts: vec![],
            timestamp_ms: 0,
            status: ShipStatus::Unreachable,
            enriched_card: Card::default(),
            changelog: vec![],
            collections: None,
        };
        store.insert(rec.clone()).unwrap();
        assert!(store.insert(rec).is_err());
    }
}
