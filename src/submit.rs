use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    canonical,
    classify::{infer_kind, ArtifactKind},
    directory::{AckSink, ShipRecord, ShipStatus, StoredArtifact},
    enrich::{select_card, ArtifactMeta, Card},
    error::ApiError,
    injection,
    rate_limit::OpClass,
    sanitize::{
        sanitize_text, MAX_ARTIFACTS, MAX_ARTIFACT_VALUE_CHARS, MAX_CHANGELOG_ENTRIES,
        MAX_CHANGELOG_ENTRY_CHARS, MAX_DESCRIPTION_CHARS, MAX_TITLE_CHARS,
    },
    signature,
    state::AppState,
    url_guard,
};

/// An artifact as submitted. These four fields are exactly what the ship
/// signature covers (via canonical JSON), so their serde view must stay
/// byte-stable: optional fields are omitted when absent, never null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactInput {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ArtifactMeta>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitShipRequest {
    pub agent_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub changelog: Vec<String>,
    pub artifacts: Vec<ArtifactInput>,
    #[serde(default)]
    pub ship_type: Option<String>,
    #[serde(default)]
    pub collections: Option<Vec<String>>,
    pub signature: String,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitShipResponse {
    pub ship_id: String,
    pub status: ShipStatus,
    pub enriched_card: Card,
}

/// The submission pipeline. Fixed gate order: cheap and deterministic checks
/// first, so most invalid submissions are rejected before any network call,
/// and enrichment (the only non-deterministic stage) runs last.
///
/// `caller` is the network address of the submitting connection.
pub async fn submit_ship(
    state: &AppState,
    req: SubmitShipRequest,
    caller: &str,
) -> Result<SubmitShipResponse, ApiError> {
    let now_ms = state.clock.now_ms();

    // 1. Rate limit, before any other work. Known agents get their own
    // bucket; an unknown agent id falls back to the caller address, so
    // rotating made-up ids never buys a fresh quota.
    let principal = if state.directory.get(&req.agent_id).is_some() {
        req.agent_id.clone()
    } else {
        caller.to_string()
    };
    state
        .limiter
        .check(OpClass::ShipSubmit, &principal, now_ms)
        .map_err(|e| ApiError::RateLimited {
            retry_after_secs: e.retry_after_secs,
        })?;

    // 2. Structural validation.
    if req.agent_id.trim().is_empty() {
        return Err(ApiError::Validation("agentId is required".into()));
    }
    if req.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }
    if req.artifacts.is_empty() || req.artifacts.len() > MAX_ARTIFACTS {
        return Err(ApiError::Validation(format!(
            "artifacts must contain 1..={} entries",
            MAX_ARTIFACTS
        )));
    }
    if req.changelog.is_empty() || req.changelog.len() > MAX_CHANGELOG_ENTRIES {
        return Err(ApiError::Validation(format!(
            "changelog must contain 1..={} entries",
            MAX_CHANGELOG_ENTRIES
        )));
    }
    for a in &req.artifacts {
        if let Some(kind) = a.kind.as_deref() {
            if ArtifactKind::parse(kind).is_none() {
                return Err(ApiError::Validation(format!(
                    "unknown artifact type: {}",
                    kind
                )));
            }
        }
    }
    if let Some(slugs) = &req.collections {
        for slug in slugs {
            if !state.collections.is_open(slug) {
                return Err(ApiError::NotFound(format!("collection {}", slug)));
            }
        }
    }

    // 3. Sanitize, then reject on adversarial content. Sanitization is
    // cosmetic and always applied; injection detection on title,
    // description, and changelog is a hard gate.
    let title = sanitize_text(&req.title, MAX_TITLE_CHARS, false);
    if title.is_empty() {
        return Err(ApiError::Validation("title is empty after sanitization".into()));
    }
    let description = sanitize_text(&req.description, MAX_DESCRIPTION_CHARS, true);
    let changelog: Vec<String> = req
        .changelog
        .iter()
        .map(|e| sanitize_text(e, MAX_CHANGELOG_ENTRY_CHARS, true))
        .collect();

    if let Some(m) = injection::detect_submission(&title, &description, &changelog) {
        return Err(ApiError::Validation(format!(
            "adversarial content in {}: {}",
            m.field, m.pattern
        )));
    }

    // 4. Per-artifact bounds and URL safety, still before any network call.
    for a in &req.artifacts {
        let len = a.value.chars().count();
        if len == 0 || len > MAX_ARTIFACT_VALUE_CHARS {
            return Err(ApiError::Validation(format!(
                "artifact value must be 1..={} chars",
                MAX_ARTIFACT_VALUE_CHARS
            )));
        }
        let lower = a.value.trim().to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            url_guard::is_safe(&a.value)
                .map_err(|e| ApiError::Validation(format!("blocked URL: {}", e)))?;
        }
    }

    // 5. The agent must exist before we can check its signature.
    let agent = state
        .directory
        .get(&req.agent_id)
        .ok_or_else(|| ApiError::NotFound("agent".into()))?;

    // 6. Freshness, then signature over the canonical message recomputed
    // from the fields being persisted (sanitized title, submitted artifacts).
    signature::check_freshness(req.timestamp_ms, now_ms)?;
    let artifacts_value = serde_json::to_value(&req.artifacts)
        .map_err(|e| ApiError::Validation(format!("artifacts not serializable: {}", e)))?;
    let message = canonical::ship_message(&req.agent_id, &title, &artifacts_value, req.timestamp_ms);
    signature::verify(&agent.public_key, &message, &req.signature)?;

    // 7. Type inference: explicit type wins, otherwise shape predicates.
    let kinds: Vec<ArtifactKind> = req
        .artifacts
        .iter()
        .map(|a| {
            a.kind
                .as_deref()
                .and_then(ArtifactKind::parse)
                .unwrap_or_else(|| infer_kind(&a.value))
        })
        .collect();
    let primary = kinds[0];
    let ship_type = req
        .ship_type
        .as_deref()
        .map(|t| sanitize_text(t, 50, false))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| primary.ship_type().to_string());

    // 8. Enrichment: one outbound probe per artifact, run concurrently.
    // Failures degrade status and card quality, never the decision.
    let probes = req
        .artifacts
        .iter()
        .zip(&kinds)
        .map(|(a, kind)| state.enricher.enrich(*kind, &a.value, a.chain.as_deref(), a.meta.as_ref()));
    let enrichments = futures::future::join_all(probes).await;

    let all_reachable = enrichments.iter().all(|e| e.reachable);
    let status = if all_reachable {
        ShipStatus::Reachable
    } else {
        ShipStatus::Unreachable
    };

    let results: Vec<(ArtifactKind, crate::enrich::Enrichment)> =
        kinds.iter().copied().zip(enrichments).collect();
    let card = select_card(primary, &results, &title);

    // 9. Persist. This is the authoritative moment; nothing after it can
    // roll the ship back.
    let ship_id = format!("ship_{}", Uuid::new_v4().simple());
    let record = ShipRecord {
        ship_id: ship_id.clone(),
        agent_id: req.agent_id.clone(),
        title,
        description,
        ship_type,
        primary_artifact_type: primary.as_str().to_string(),
        artifacts: req
            .artifacts
            .iter()
            .zip(&kinds)
            .map(|(a, kind)| StoredArtifact {
                kind: kind.as_str().to_string(),
                value: a.value.clone(),
                chain: a.chain.clone(),
                meta: a.meta.clone(),
            })
            .collect(),
        timestamp_ms: req.timestamp_ms,
        status,
        enriched_card: card.clone(),
        changelog,
        collections: req.collections.clone(),
    };
    let record = state.ships.insert(record).map_err(ApiError::Persistence)?;
    state.directory.record_ship(&req.agent_id, now_ms);

    info!(ship_id = %record.ship_id, agent_id = %record.agent_id, status = ?record.status, "ship accepted");

    // 10. Best-effort acknowledgement fan-out; never affects the response.
    let responders = state.directory.responder_ids();
    spawn_ack_fanout(
        state.acks.clone(),
        responders,
        record.ship_id.clone(),
        req.agent_id,
    );

    Ok(SubmitShipResponse {
        ship_id: record.ship_id,
        status: record.status,
        enriched_card: card,
    })
}

const ACK_EMOJI: &[&str] = &["🚀", "🎉", "🔥", "👏", "⚓"];
const MAX_ACK_RESPONDERS: usize = 5;

fn pick_emoji(ship_id: &str) -> &'static str {
    let sum: usize = ship_id.bytes().map(|b| b as usize).sum();
    ACK_EMOJI[sum % ACK_EMOJI.len()]
}

fn spawn_ack_fanout(
    acks: Arc<dyn AckSink>,
    responders: Vec<String>,
    ship_id: String,
    submitter: String,
) {
    tokio::spawn(async move {
        for responder in responders
            .into_iter()
            .filter(|r| *r != submitter)
            .take(MAX_ACK_RESPONDERS)
        {
            if let Err(e) = acks.add(&ship_id, &responder, pick_emoji(&ship_id)) {
                warn!(%ship_id, %responder, error = %e, "ack fan-out failed");
            }
        }
    });
}

pub async fn submit_ship_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<SubmitShipRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = addr.ip().to_string();
    let resp = submit_ship(&state, req, &caller).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}
