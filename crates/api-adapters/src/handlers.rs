//! # Handlers
//!
//! Thin adapters from HTTP requests to the flag services. Bodies are parsed
//! by hand so missing or malformed JSON gets the same error shape as every
//! other client error.

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::DomainError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use services::{FlagLookup, ListingBody};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::extract::ClientIp;
use crate::metrics::{Operation, Outcome};
use crate::state::AppState;

const INVALID_JSON: &str = "Invalid JSON in request body";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToggleRequest {
    tile_path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest {
    #[serde(default)]
    tile_hashes: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
    #[serde(rename = "lastKey")]
    pub last_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FlagState {
    flagged: bool,
    flagged_at: String,
    flag_status: &'static str,
    tile_path: String,
}

#[derive(Debug, Serialize)]
struct LookupResponse {
    success: bool,
    flags: BTreeMap<String, FlagState>,
    count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    unprocessed: Vec<String>,
}

impl From<FlagLookup> for LookupResponse {
    fn from(lookup: FlagLookup) -> Self {
        let flags: BTreeMap<String, FlagState> = lookup
            .flags
            .into_iter()
            .map(|(tile_hash, record)| {
                let state = FlagState {
                    flagged: true,
                    flagged_at: record.flagged_at.unwrap_or_default(),
                    flag_status: record.flag_status.as_str(),
                    tile_path: record.tile_path,
                };
                (tile_hash.into_inner(), state)
            })
            .collect();
        Self {
            success: true,
            count: flags.len(),
            flags,
            unprocessed: lookup
                .unprocessed
                .into_iter()
                .map(|hash| hash.into_inner())
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct AdminListResponse<'a> {
    success: bool,
    #[serde(flatten)]
    listing: ListingBody<'a>,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `POST /tiles/{tileHash}/flag`
pub async fn flag_tile(
    State(state): State<AppState>,
    Path(tile_hash): Path<String>,
    ClientIp(client_ip): ClientIp,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let request: ToggleRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ToggleRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|_| ApiError::BadRequest(INVALID_JSON.into()))?
    };

    let result = state
        .flags
        .flag_tile(&tile_hash, request.tile_path.as_deref(), &client_ip)
        .await;
    state.metrics.observe(Operation::Flag, Outcome::of(&result));

    match result {
        Ok(record) => {
            info!(tile_hash = %record.tile_hash, %client_ip, "tile flagged");
            Ok(Json(json!({
                "success": true,
                "action": "flagged",
                "tileHash": record.tile_hash.as_str(),
            })))
        }
        // Conflicts only follow a successful parse, so the trimmed text is the key.
        Err(DomainError::Conflict(_)) => Err(ApiError::AlreadyFlagged {
            tile_hash: tile_hash.trim().to_string(),
        }),
        Err(err) => Err(err.into()),
    }
}

/// `DELETE /tiles/{tileHash}/flag`
pub async fn unflag_tile(
    State(state): State<AppState>,
    Path(tile_hash): Path<String>,
) -> ApiResult<Json<Value>> {
    let result = state.flags.unflag_tile(&tile_hash).await;
    state.metrics.observe(Operation::Unflag, Outcome::of(&result));

    let removed = result?;
    info!(tile_hash = %removed, "tile unflagged");
    Ok(Json(json!({
        "success": true,
        "action": "unflagged",
        "tileHash": removed.as_str(),
    })))
}

/// `POST /tiles/flags`
pub async fn lookup_flags(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::BadRequest("Request body required".into()));
    }
    let request: LookupRequest =
        serde_json::from_slice(&body).map_err(|_| ApiError::BadRequest(INVALID_JSON.into()))?;
    let tile_hashes = request.tile_hashes.unwrap_or_default();

    let result = state.flags.lookup(&tile_hashes).await;
    state.metrics.observe(Operation::Lookup, Outcome::of(&result));

    let lookup = result?;
    if !lookup.unprocessed.is_empty() {
        warn!(unprocessed = lookup.unprocessed.len(), "lookup returned unprocessed keys");
    }
    Ok(Json(LookupResponse::from(lookup)).into_response())
}

/// `GET /admin/flags?limit=&lastKey=`
pub async fn list_flags(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(params) = params.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let result = state
        .lister
        .list(params.limit, params.last_key.as_deref())
        .await;
    state.metrics.observe(Operation::List, Outcome::of(&result));

    let listing = result?;
    Ok(Json(AdminListResponse {
        success: true,
        listing: listing.body(),
    })
    .into_response())
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> ApiResult<Response> {
    let text = state
        .metrics
        .encode()
        .map_err(|err| ApiError::Internal(format!("metrics encoding failed: {err}")))?;
    Ok((
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        text,
    )
        .into_response())
}
