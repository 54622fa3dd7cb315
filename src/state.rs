use std::sync::Arc;

use crate::{
    directory::{AckSink, AgentDirectory, CollectionRegistry, ShipStore},
    enrich::Enricher,
    rate_limit::{Clock, RateLimiter},
};

/// Shared application state. Everything behind a trait here is swappable:
/// collaborators for persistence and acks, the rate-limit counter, the
/// enrichment transport, and the clock.
pub struct AppState {
    pub directory: Arc<dyn AgentDirectory>,
    pub collections: Arc<dyn CollectionRegistry>,
    pub ships: Arc<dyn ShipStore>,
    pub acks: Arc<dyn AckSink>,
    pub limiter: RateLimiter,
    pub enricher: Enricher,
    pub clock: Arc<dyn Clock>,
}
