//! API route handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gatewatch_core::error::GatewatchError;
use gatewatch_core::types::{TrackKind, TrackedSubscription};
use serde::Deserialize;

use crate::server::AppState;

pub const MSG_USER_NOT_FOUND: &str = "❌ User not found";
pub const MSG_TRACK_ADDED: &str = "✅ Tracking added";
pub const MSG_TRACK_REMOVED: &str = "✅ Tracking removed";
pub const MSG_NO_TRACKS: &str = "No tracked people.";

const MAX_ALIAS_CHARS: usize = 100;

/// Handler error → JSON `{"error": ...}` with a status code.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(GatewatchError),
}

impl From<GatewatchError> for ApiError {
    fn from(e: GatewatchError) -> Self {
        if e.is_client_error() {
            ApiError::BadRequest(e.to_string())
        } else {
            ApiError::Internal(e)
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(e) => {
                tracing::error!("❌ Request failed: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

type ApiResult = Result<Json<serde_json::Value>, ApiError>;

/// `chatId` as sent by clients: a JSON number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ChatIdInput {
    Number(i64),
    Text(String),
}

impl ChatIdInput {
    fn parse(&self) -> Result<i64, ApiError> {
        match self {
            ChatIdInput::Number(n) => Ok(*n),
            ChatIdInput::Text(s) => parse_chat_id(s),
        }
    }
}

fn parse_chat_id(raw: &str) -> Result<i64, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::BadRequest("chatId is required".into()));
    }
    raw.parse()
        .map_err(|_| ApiError::BadRequest("chatId must be numeric".into()))
}

fn require_run(run: &str) -> Result<String, ApiError> {
    let run = run.trim();
    if run.is_empty() {
        return Err(ApiError::BadRequest("run is required".into()));
    }
    Ok(run.to_string())
}

fn check_alias(alias: Option<&str>) -> Result<(), ApiError> {
    if let Some(alias) = alias {
        let len = alias.chars().count();
        if len == 0 || len > MAX_ALIAS_CHARS {
            return Err(ApiError::BadRequest(format!(
                "alias must be 1-{MAX_ALIAS_CHARS} characters"
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTrackRequest {
    pub chat_id: ChatIdInput,
    pub run: String,
    #[serde(default)]
    pub alias: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTrackRequest {
    pub chat_id: ChatIdInput,
    pub run: String,
}

/// Chat-friendly listing of a chat's subscriptions.
pub fn format_track_list(tracks: &[TrackedSubscription]) -> String {
    if tracks.is_empty() {
        return MSG_NO_TRACKS.to_string();
    }
    let lines: Vec<String> = tracks
        .iter()
        .map(|t| format!("- {} {}", t.run, t.label()))
        .collect();
    format!("📋 Tracked:\n{}", lines.join("\n"))
}

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "gatewatch",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// `POST /track`: subscribe a chat to a person.
pub async fn create_track(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateTrackRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let chat_id = req.chat_id.parse()?;
    let run = require_run(&req.run)?;
    check_alias(req.alias.as_deref())?;
    let chat = chat_id.to_string();

    let Some(user) = state.directory.find_by_run(&run).await? else {
        tracing::info!("🔍 No directory entry for run {run}");
        state.channel.send_message(&chat, MSG_USER_NOT_FOUND).await?;
        return Err(ApiError::NotFound("User not found".into()));
    };
    let subject_id = user.subject_id();

    let existing = state.store.list_by_chat(chat_id, TrackKind::Track).await?;
    if let Some(found) = existing.into_iter().find(|t| t.subject_id == subject_id) {
        state.channel.send_message(&chat, MSG_TRACK_ADDED).await?;
        return Ok(Json(serde_json::json!({ "data": found })));
    }

    // Seed from the person's latest access so history isn't re-announced.
    let recent = state.access.fetch_recent().await?;
    let seen = recent.into_iter().find(|e| e.subject_id == subject_id);

    let sub = TrackedSubscription {
        chat_id,
        subject_id,
        run,
        display_name: user.full_name(),
        alias: req.alias,
        kind: TrackKind::Track,
        last_entry_at: seen.as_ref().map(|e| e.entry_at.clone()),
        last_exit_at: seen.and_then(|e| e.exit_at),
    };
    let inserted = state.store.create(&sub).await?;
    tracing::info!(
        "➕ Chat {} now tracks {} ({})",
        sub.chat_id,
        sub.run,
        if inserted { "new" } else { "existing" }
    );

    state.channel.send_message(&chat, MSG_TRACK_ADDED).await?;
    Ok(Json(serde_json::json!({ "data": sub })))
}

/// `DELETE /track`: drop a subscription, matching run case-insensitively.
pub async fn delete_track(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DeleteTrackRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let chat_id = req.chat_id.parse()?;
    let run = require_run(&req.run)?;

    let removed = state.store.remove_by_run(chat_id, &run, TrackKind::Track).await?;
    tracing::info!("➖ Chat {chat_id} untracked {run} ({removed} rows)");

    state
        .channel
        .send_message(&chat_id.to_string(), MSG_TRACK_REMOVED)
        .await?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}

/// `GET /track/{chat_id}`: list a chat's subscriptions.
pub async fn list_tracks(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
) -> ApiResult {
    let chat_id = parse_chat_id(&chat_id)?;
    let tracks = state.store.list_by_chat(chat_id, TrackKind::Track).await?;
    Ok(Json(serde_json::json!({ "data": tracks })))
}

/// `GET /track/send/{chat_id}`: push the chat's subscription list to the chat.
pub async fn send_tracks(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
) -> ApiResult {
    let chat_id = parse_chat_id(&chat_id)?;
    let tracks = state.store.list_by_chat(chat_id, TrackKind::Track).await?;
    state
        .channel
        .send_message(&chat_id.to_string(), &format_track_list(&tracks))
        .await?;
    Ok(Json(serde_json::json!({ "sent": tracks.len() })))
}
