use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Result;
use reqwest::{redirect, Client};

use crate::{
    config,
    directory::{AckSink, AgentDirectory, CollectionRegistry, ShipStore},
    enrich::Enricher,
    rate_limit::{Clock, InMemoryCounter, Quotas, RateLimiter, SystemClock},
    state::AppState,
    transport::{HttpTransport, Transport},
    url_guard::{Resolver, SystemResolver},
};

/// Build the outbound HTTP client. Redirects are a hard off: every hop is
/// re-validated by the URL safety guard before the next request is issued.
pub fn build_http_client(enrich: Option<&config::EnrichConfig>) -> Result<Client> {
    let timeout = enrich
        .and_then(|e| e.timeout_secs)
        .unwrap_or(config::DEFAULT_ENRICH_TIMEOUT_SECS);
    let connect_timeout = enrich
        .and_then(|e| e.connect_timeout_secs)
        .unwrap_or(config::DEFAULT_ENRICH_CONNECT_TIMEOUT_SECS);
    let user_agent = enrich
        .and_then(|e| e.user_agent.clone())
        .unwrap_or_else(|| format!("shipgate/{}", env!("CARGO_PKG_VERSION")));

    Ok(Client::builder()
        .redirect(redirect::Policy::none())
        .connect_timeout(Duration::from_secs(connect_timeout))
        .timeout(Duration::from_secs(timeout))
        .user_agent(user_agent)
        .build()?)
}

/// Wire the shared AppState. Keeps `main.rs` focused on config/CLI parsing
/// and server startup; tests call this with in-memory fakes.
#[allow(clippy::too_many_arguments)]
pub fn build_app_state(
    directory: Arc<dyn AgentDirectory>,
    collections: Arc<dyn CollectionRegistry>,
    ships: Arc<dyn ShipStore>,
    acks: Arc<dyn AckSink>,
    transport: Arc<dyn Transport>,
    resolver: Arc<dyn Resolver>,
    chain_rpc: HashMap<String, String>,
    quotas: Quotas,
    clock: Arc<dyn Clock>,
) -> Arc<AppState> {
    let counter = InMemoryCounter::new(ArcClock(clock.clone()));
    Arc::new(AppState {
        directory,
        collections,
        ships,
        acks,
        limiter: RateLimiter::new(Box::new(counter), quotas),
        enricher: Enricher::new(transport, resolver, chain_rpc),
        clock,
    })
}

/// Production wiring: system clock, real HTTP transport.
pub fn build_default_state(
    directory: Arc<dyn AgentDirectory>,
    collections: Arc<dyn CollectionRegistry>,
    ships: Arc<dyn ShipStore>,
    acks: Arc<dyn AckSink>,
    cfg: Option<&config::Config>,
    quotas: Quotas,
) -> Result<Arc<AppState>> {
    let http = build_http_client(cfg.and_then(|c| c.enrich.as_ref()))?;
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(http));
    let chains = cfg.and_then(|c| c.chains.clone()).unwrap_or_default();
    Ok(build_app_state(
        directory,
        collections,
        ships,
        acks,
        transport,
        Arc::new(SystemResolver),
        chains,
        quotas,
        Arc::new(SystemClock),
    ))
}

struct ArcClock(Arc<dyn Clock>);

impl Clock for ArcClock {
    fn now_ms(&self) -> u64 {
        self.0.now_ms()
    }
}
