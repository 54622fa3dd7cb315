use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::info;

use crate::{
    canonical,
    directory::Agent,
    error::ApiError,
    rate_limit::OpClass,
    signature,
    state::AppState,
};

pub const MIN_HANDLE_CHARS: usize = 3;
pub const MAX_HANDLE_CHARS: usize = 32;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub handle: String,
    pub public_key: String,
    pub signature: String,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub agent_id: String,
    pub handle: String,
}

fn validate_handle(handle: &str) -> Result<String, ApiError> {
    let h = handle.trim().to_ascii_lowercase();
    let len = h.chars().count();
    if !(MIN_HANDLE_CHARS..=MAX_HANDLE_CHARS).contains(&len) {
        return Err(ApiError::Validation(format!(
            "handle must be {}..={} chars",
            MIN_HANDLE_CHARS, MAX_HANDLE_CHARS
        )));
    }
    if !h
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ApiError::Validation(
            "handle may only contain letters, digits, '-' and '_'".into(),
        ));
    }
    Ok(h)
}

/// Stable agent id derived from the registered public key.
pub fn derive_agent_id(public_key_b64: &str) -> String {
    let digest = canonical::sha256_hex(public_key_b64.trim().as_bytes());
    format!("agent_{}", &digest[..16])
}

/// Registration creates the identity the rest of the pipeline trusts. The
/// claimed key signs its own registration message, proving key possession;
/// the principal for rate limiting is the caller network address, since no
/// agent id exists yet.
pub async fn register_agent(
    state: &AppState,
    req: RegisterRequest,
    principal: &str,
) -> Result<RegisterResponse, ApiError> {
    let now_ms = state.clock.now_ms();

    state
        .limiter
        .check(OpClass::Register, principal, now_ms)
        .map_err(|e| ApiError::RateLimited {
            retry_after_secs: e.retry_after_secs,
        })?;

    let handle = validate_handle(&req.handle)?;

    // Key must decode before we bother verifying anything.
    signature::decode_public_key(&req.public_key)?;

    signature::check_freshness(req.timestamp_ms, now_ms)?;
    let message = canonical::register_message(&handle, req.timestamp_ms);
    signature::verify(&req.public_key, &message, &req.signature)?;

    let agent_id = derive_agent_id(&req.public_key);
    let agent = Agent {
        agent_id: agent_id.clone(),
        handle: handle.clone(),
        public_key: req.public_key.trim().to_string(),
        first_seen_ms: now_ms,
        last_shipped_ms: None,
        total_ships: 0,
        activity_7d: 0,
    };

    state
        .directory
        .insert(agent)
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    info!(%agent_id, %handle, "agent registered");

    Ok(RegisterResponse { agent_id, handle })
}

pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = addr.ip().to_string();
    let resp = register_agent(&state, req, &principal).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}
