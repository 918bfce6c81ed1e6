use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::Json;
use rollbook_ledger::{
    AuditReport, AuditStatistics, BusinessEvent, EventReceipt, EventRecorder, LedgerEntry,
    RecordVerification,
};
use rollbook_store::MirrorRow;
use rollbook_types::EventKind;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn info_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": "rollbook-server",
        "version": env!("CARGO_PKG_VERSION"),
        "entries": state.ledger().len().await,
        "eventKinds": EventKind::ALL.iter().map(EventKind::as_str).collect::<Vec<_>>(),
    }))
}

/// Body of `POST /v1/events` and `POST /v1/ledger/records/verify`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRequest {
    pub kind: String,
    pub record: Value,
    #[serde(default)]
    pub blockchain_hash: Option<String>,
}

impl EventRequest {
    fn into_event(self) -> ServerResult<BusinessEvent> {
        let kind: EventKind = self
            .kind
            .parse()
            .map_err(|e| ServerError::BadRequest(format!("{e}")))?;
        if !kind.is_business() {
            return Err(ServerError::BadRequest(format!(
                "{kind} is not a business event"
            )));
        }
        BusinessEvent::from_parts(kind, self.record)
            .map_err(|e| ServerError::BadRequest(e.to_string()))
    }
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> ServerResult<T> {
    body.map(|Json(v)| v)
        .map_err(|e| ServerError::BadRequest(e.body_text()))
}

pub async fn record_event_handler(
    State(state): State<AppState>,
    body: Result<Json<EventRequest>, JsonRejection>,
) -> ServerResult<Json<EventReceipt>> {
    let event = json_body(body)?.into_event()?;
    let receipt = state
        .recorder
        .record(&event)
        .await
        .map_err(ServerError::Recording)?;
    Ok(Json(receipt))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub broken_indices: Vec<i64>,
    pub statistics: AuditStatistics,
    pub chain: Vec<MirrorRow>,
}

/// Full audit of the persisted mirror.
pub async fn verify_ledger_handler(
    State(state): State<AppState>,
) -> ServerResult<Json<VerifyResponse>> {
    let rows = state.mirror().all().await?;
    let AuditReport {
        valid,
        issues,
        broken_indices,
        warnings,
        statistics,
    } = rollbook_ledger::MirrorAudit::audit(&rows);
    Ok(Json(VerifyResponse {
        is_valid: valid,
        issues,
        warnings,
        broken_indices,
        statistics,
        chain: rows,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ChainQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainResponse {
    pub chain: Vec<LedgerEntry>,
    pub total_blocks: usize,
    pub is_valid: bool,
}

pub async fn chain_handler(
    State(state): State<AppState>,
    Query(query): Query<ChainQuery>,
) -> Json<ChainResponse> {
    let limit = query.limit.unwrap_or(state.config.chain_limit_default);
    let ledger = state.ledger();
    Json(ChainResponse {
        chain: ledger.last_n(limit).await,
        total_blocks: ledger.len().await,
        is_valid: ledger.verify().await.valid,
    })
}

pub async fn stats_handler(State(state): State<AppState>) -> ServerResult<Json<Value>> {
    let ledger = state.ledger();
    let mut counts = serde_json::Map::new();
    for kind in EventKind::ALL {
        counts.insert(
            kind.as_str().to_string(),
            json!(ledger.by_kind(kind).await.len()),
        );
    }
    let tail = ledger.tail().await;
    let verification = ledger.verify().await;
    let persisted = state.mirror().count().await?;
    let recent = state.mirror().latest(state.config.recent_blocks).await?;

    Ok(Json(json!({
        "ledger": {
            "totalBlocks": ledger.len().await,
            "isValid": verification.valid,
            "brokenAt": verification.broken_at,
            "genesisHash": ledger.genesis().await.digest(),
            "latestHash": tail.digest(),
            "latestTimestamp": tail.timestamp(),
            "countsByKind": counts,
        },
        "mirror": {
            "totalBlocks": persisted,
            "recentBlocks": recent,
        },
    })))
}

pub async fn blocks_by_kind_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> ServerResult<Json<Value>> {
    let kind: EventKind = kind
        .parse()
        .map_err(|e| ServerError::BadRequest(format!("{e}")))?;
    let blocks = state.mirror().by_kind(kind.as_str()).await?;
    Ok(Json(json!({
        "type": kind,
        "count": blocks.len(),
        "blocks": blocks,
    })))
}

pub async fn block_by_hash_handler(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> ServerResult<Json<MirrorRow>> {
    state
        .mirror()
        .by_digest(&hash)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound("block not found".into()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordVerifyResponse {
    pub verification: RecordVerification,
    pub block: MirrorRow,
}

/// Check a business record, as it is stored now, against its ledger entry.
pub async fn verify_record_handler(
    State(state): State<AppState>,
    body: Result<Json<EventRequest>, JsonRejection>,
) -> ServerResult<Json<RecordVerifyResponse>> {
    let mut request = json_body(body)?;
    let hash = request
        .blockchain_hash
        .take()
        .ok_or_else(|| ServerError::BadRequest("blockchainHash is required".into()))?;
    let event = request.into_event()?;
    let block = state
        .mirror()
        .by_digest(&hash)
        .await?
        .ok_or_else(|| ServerError::NotFound("block not found".into()))?;
    let verification = EventRecorder::verify_record(&event, &block)?;
    Ok(Json(RecordVerifyResponse {
        verification,
        block,
    }))
}
