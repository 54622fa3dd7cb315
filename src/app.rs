use crate::{register, state, submit};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub async fn health() -> &'static str {
    "ok"
}

/// Request bodies are JSON with up to 10 artifacts and 20 changelog entries;
/// anything near this limit is hostile.
const MAX_BODY_BYTES: usize = 256 * 1024;

/// Build the main router.
///
/// `/health` is unprotected; the `/v1` routes carry a body limit. There is
/// no token layer: every write operation authenticates itself with an
/// Ed25519 signature over its canonical message.
pub fn build_router(state: Arc<state::AppState>) -> Router {
    let v1 = Router::new()
        .route("/v1/agents/register", post(register::register_handler))
        .route("/v1/ships", post(submit::submit_ship_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    Router::new()
        .route("/health", get(health))
        .merge(v1)
        .with_state(state)
}
