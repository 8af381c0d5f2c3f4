//! Operator endpoints: manual sends, knowledge ingestion, provider control, reminder triggers.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::{
    base::types::{KnowledgeEntry, Provider, ReminderKind, wib},
    runtime::Runtime,
};

use super::{ApiError, ApiResult};

/// Body of `POST /send-message`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
}

#[instrument(name = "admin::send_message", skip_all)]
pub async fn send_message(State(runtime): State<Runtime>, Json(request): Json<SendMessageRequest>) -> ApiResult<Value> {
    if runtime.config.admin_password.is_some() && !password_matches(&runtime, request.admin_password.as_deref()) {
        return Err(ApiError::new(StatusCode::FORBIDDEN, "Unauthorized"));
    }

    let (Some(to), Some(text)) = (non_empty(request.to), non_empty(request.text)) else {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Missing \"to\" or \"text\" in request body."));
    };

    runtime.chat.send_message(&to, &text).await?;

    Ok(Json(json!({ "success": true, "provider": runtime.chat.provider() })))
}

/// Body of `POST /admin/ingest-knowledge`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub admin_phone: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
}

#[instrument(name = "admin::ingest_knowledge", skip_all)]
pub async fn ingest_knowledge(State(runtime): State<Runtime>, Json(request): Json<IngestRequest>) -> ApiResult<Value> {
    let by_phone = request.admin_phone.as_deref().is_some_and(|phone| runtime.config.is_admin(phone));

    if !by_phone && !password_matches(&runtime, request.admin_password.as_deref()) {
        return Err(ApiError::new(StatusCode::FORBIDDEN, "❌ Unauthorized: Invalid admin credentials"));
    }

    let (Some(category), Some(topic), Some(content)) = (non_empty(request.category), non_empty(request.topic), non_empty(request.content)) else {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "❌ Missing required fields: category, topic, content"));
    };

    let entry = KnowledgeEntry { category, topic, content };
    let doc_id = runtime.knowledge.ingest(&entry).await?;

    info!("Ingested knowledge {doc_id} ({} / {}).", entry.category, entry.topic);

    Ok(Json(json!({
        "success": true,
        "message": format!("✅ Knowledge ingested: {} / {}", entry.category, entry.topic),
        "docId": doc_id,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/// Body of `POST /api/admin/switch-provider`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchProviderRequest {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
}

#[instrument(name = "admin::switch_provider", skip_all)]
pub async fn switch_provider(State(runtime): State<Runtime>, Json(request): Json<SwitchProviderRequest>) -> ApiResult<Value> {
    if !password_matches(&runtime, request.admin_password.as_deref()) {
        return Err(ApiError::new(StatusCode::FORBIDDEN, "Unauthorized"));
    }

    let provider: Provider = request
        .provider
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(|_| ApiError::new(StatusCode::BAD_REQUEST, "Provider must be \"fonnte\" or \"gowa\""))?;

    let previous = runtime.chat.provider();
    runtime.chat.switch_provider(provider)?;

    Ok(Json(json!({
        "success": true,
        "previous": previous,
        "provider": provider,
        "message": format!("Provider switched from {previous} to {provider}"),
    })))
}

#[instrument(name = "admin::provider_status", skip_all)]
pub async fn provider_status(State(runtime): State<Runtime>) -> ApiResult<Value> {
    let status = runtime.chat.status().await?;

    Ok(Json(json!({ "success": true, "status": status })))
}

/// Body and query of `POST /trigger-reminder`.
#[derive(Debug, Default, Deserialize)]
pub struct TriggerRequest {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[instrument(name = "admin::trigger_reminder", skip_all)]
pub async fn trigger_reminder(State(runtime): State<Runtime>, Query(query): Query<TriggerRequest>, body: Option<Json<TriggerRequest>>) -> ApiResult<Value> {
    let raw = body.and_then(|Json(body)| body.kind).or(query.kind).unwrap_or_default();
    let kind: ReminderKind = raw.parse().map_err(|err: anyhow::Error| ApiError::new(StatusCode::BAD_REQUEST, err.to_string()))?;

    info!("Manual {kind} reminder run.");
    let report = runtime.reminders().run(kind, wib::today()).await?;

    Ok(Json(json!({ "success": true, "report": report })))
}

// Helpers.

fn password_matches(runtime: &Runtime, given: Option<&str>) -> bool {
    match (runtime.config.admin_password.as_deref(), given) {
        (Some(expected), Some(given)) => !expected.is_empty() && expected == given,
        _ => false,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}
