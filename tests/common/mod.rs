#![allow(dead_code)]

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;

use shipgate::{
    app_state_builder::build_app_state,
    canonical,
    directory::{
        Agent, AgentDirectory, InMemoryAckSink, InMemoryCollections, InMemoryDirectory,
        InMemoryShipStore,
    },
    rate_limit::{ManualClock, Quotas},
    register::derive_agent_id,
    state::AppState,
    submit::ArtifactInput,
    transport::{FetchMethod, RawResponse, Transport},
    url_guard::Resolver,
};

/// Transport fake: responses are scripted by URL prefix, and every outbound
/// call is recorded so tests can assert that none happened.
#[derive(Default)]
pub struct ScriptedTransport {
    rules: Mutex<Vec<(String, RawResponse)>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url_prefix: &str, resp: RawResponse) {
        self.rules
            .lock()
            .unwrap()
            .push((url_prefix.to_string(), resp));
    }

    pub fn respond_ok(&self, url_prefix: &str, body: &str) {
        self.respond(
            url_prefix,
            RawResponse {
                status: 200,
                location: None,
                content_type: Some("text/html".into()),
                body: body.to_string(),
            },
        );
    }

    pub fn respond_redirect(&self, url_prefix: &str, location: &str) {
        self.respond(
            url_prefix,
            RawResponse {
                status: 302,
                location: Some(location.to_string()),
                content_type: None,
                body: String::new(),
            },
        );
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn lookup(&self, url: &str) -> Result<RawResponse> {
        let rules = self.rules.lock().unwrap();
        rules
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .map(|(_, resp)| resp.clone())
            .ok_or_else(|| anyhow!("no scripted response for {url}"))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, method: FetchMethod, url: &str) -> Result<RawResponse> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{:?} {}", method, url));
        self.lookup(url)
    }

    async fn post_json(&self, url: &str, _body: &serde_json::Value) -> Result<RawResponse> {
        self.calls.lock().unwrap().push(format!("Post {}", url));
        self.lookup(url)
    }
}

/// DNS fake: mapped hosts resolve to their scripted addresses, everything
/// else to a stand-in public address.
pub struct ScriptedResolver {
    entries: Mutex<HashMap<String, Vec<IpAddr>>>,
}

pub const PUBLIC_IP: Ipv4Addr = Ipv4Addr::new(93, 184, 216, 34);

impl ScriptedResolver {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn map(&self, host: &str, ip: IpAddr) {
        self.entries
            .lock()
            .unwrap()
            .entry(host.to_string())
            .or_default()
            .push(ip);
    }
}

impl Default for ScriptedResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resolver for ScriptedResolver {
    async fn resolve(&self, host: &str, _port: u16) -> Result<Vec<IpAddr>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(host)
            .cloned()
            .unwrap_or_else(|| vec![IpAddr::V4(PUBLIC_IP)]))
    }
}

pub const TEST_NOW_MS: u64 = 1_700_000_000_000;

/// Caller network address used for submissions in tests.
pub const TEST_ADDR: &str = "203.0.113.50";

pub struct TestEnv {
    pub state: Arc<AppState>,
    pub transport: Arc<ScriptedTransport>,
    pub resolver: Arc<ScriptedResolver>,
    pub clock: Arc<ManualClock>,
    pub directory: Arc<InMemoryDirectory>,
    pub collections: Arc<InMemoryCollections>,
    pub ships: Arc<InMemoryShipStore>,
    pub acks: Arc<InMemoryAckSink>,
}

pub fn env() -> TestEnv {
    env_with_chains(Default::default())
}

pub fn env_with_chains(chain_rpc: HashMap<String, String>) -> TestEnv {
    let transport = Arc::new(ScriptedTransport::new());
    let resolver = Arc::new(ScriptedResolver::new());
    let clock = Arc::new(ManualClock::new(TEST_NOW_MS));
    let directory = Arc::new(InMemoryDirectory::new());
    let collections = Arc::new(InMemoryCollections::new());
    let ships = Arc::new(InMemoryShipStore::new());
    let acks = Arc::new(InMemoryAckSink::new());

    let state = build_app_state(
        directory.clone(),
        collections.clone(),
        ships.clone(),
        acks.clone(),
        transport.clone(),
        resolver.clone(),
        chain_rpc,
        Quotas::default(),
        clock.clone(),
    );

    TestEnv {
        state,
        transport,
        resolver,
        clock,
        directory,
        collections,
        ships,
        acks,
    }
}

pub fn keypair() -> (SigningKey, String) {
    let sk = SigningKey::generate(&mut OsRng);
    let pk_b64 = B64.encode(sk.verifying_key().as_bytes());
    (sk, pk_b64)
}

pub fn sign(sk: &SigningKey, message: &str) -> String {
    B64.encode(sk.sign(message.as_bytes()).to_bytes())
}

/// Seed an agent straight into the directory, the way registration would.
pub fn seed_agent(env: &TestEnv, handle: &str) -> (SigningKey, String) {
    let (sk, pk) = keypair();
    let agent_id = derive_agent_id(&pk);
    env.directory
        .insert(Agent {
            agent_id: agent_id.clone(),
            handle: handle.to_string(),
            public_key: pk,
            first_seen_ms: TEST_NOW_MS,
            last_shipped_ms: None,
            total_ships: 0,
            activity_7d: 0,
        })
        .unwrap();
    (sk, agent_id)
}

/// Signature for a ship submission over the server's canonical message.
pub fn sign_ship(
    sk: &SigningKey,
    agent_id: &str,
    title: &str,
    artifacts: &[ArtifactInput],
    timestamp_ms: u64,
) -> String {
    let artifacts_value = serde_json::to_value(artifacts).unwrap();
    let message = canonical::ship_message(agent_id, title, &artifacts_value, timestamp_ms);
    sign(sk, &message)
}

pub fn github_artifact(url: &str) -> ArtifactInput {
    ArtifactInput {
        kind: Some("github".into()),
        value: url.to_string(),
        chain: None,
        meta: None,
    }
}

pub fn ipfs_artifact(cid: &str) -> ArtifactInput {
    ArtifactInput {
        kind: None,
        value: format!("ipfs://{}", cid),
        chain: None,
        meta: None,
    }
}

pub fn link_artifact(url: &str) -> ArtifactInput {
    ArtifactInput {
        kind: None,
        value: url.to_string(),
        chain: None,
        meta: None,
    }
}
