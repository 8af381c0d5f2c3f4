//! HTTP surface for digilife-bot.
//!
//! Provider webhooks feed the routing pipeline in the background. `/inbound` runs it
//! synchronously and reports the chosen route. The rest are read-only data views plus a
//! handful of operator endpoints.

pub mod admin;
pub mod webhook;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, instrument};

use crate::{
    base::types::{GroupAccount, InboundMessage, phone},
    interaction::{
        availability::{compute_availability, format_summary},
        pipeline::process_inbound,
    },
    runtime::Runtime,
};

/// Every route, sharing the runtime as state.
pub fn router(runtime: Runtime) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/inbound", post(inbound))
        .route("/webhook", get(webhook::fonnte_ping).post(webhook::fonnte))
        .route("/api/webhook/gowa", post(webhook::gowa))
        .route("/send-message", post(admin::send_message))
        .route("/availability", get(availability))
        .route("/conversation/{phone}", get(conversation))
        .route("/data/pricing", get(pricing))
        .route("/data/customers", get(customers))
        .route("/data/groups", get(groups))
        .route("/admin/ingest-knowledge", post(admin::ingest_knowledge))
        .route("/api/admin/switch-provider", post(admin::switch_provider))
        .route("/api/admin/provider-status", get(admin::provider_status))
        .route("/trigger-reminder", post(admin::trigger_reminder))
        .with_state(runtime)
}

// Errors.

/// A JSON error body, `{ "success": false, "error": ... }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        error!("Request failed: {err}");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "success": false, "error": self.message }))).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

// Handlers.

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub provider: String,
}

#[instrument(skip_all)]
pub async fn health(State(runtime): State<Runtime>) -> (StatusCode, Json<HealthResponse>) {
    let provider = runtime.chat.provider().to_string();

    match runtime.db.ping().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse { status: "ok", database: "connected", provider })),
        Err(err) => {
            error!("Health check failed: {err}");
            (StatusCode::SERVICE_UNAVAILABLE, Json(HealthResponse { status: "degraded", database: "unreachable", provider }))
        }
    }
}

#[instrument(skip_all)]
pub async fn inbound(State(runtime): State<Runtime>, Json(message): Json<InboundMessage>) -> ApiResult<Value> {
    if message.sender_jid.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Missing senderJid."));
    }

    let decision = process_inbound(message, &runtime).await?;

    Ok(Json(json!({
        "success": true,
        "route": decision.route,
        "replies": decision.replies,
    })))
}

#[instrument(skip_all)]
pub async fn availability(State(runtime): State<Runtime>) -> ApiResult<Value> {
    let (groups, subscriptions) = futures::join!(runtime.catalog.groups(), runtime.catalog.subscriptions());
    let availability = compute_availability(&groups, &subscriptions);

    Ok(Json(json!({
        "success": true,
        "summary": format_summary(&availability),
        "availability": availability,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct ConversationQuery {
    pub limit: Option<i64>,
}

#[instrument(skip_all)]
pub async fn conversation(State(runtime): State<Runtime>, Path(raw): Path<String>, Query(query): Query<ConversationQuery>) -> ApiResult<Value> {
    let phone = phone::digits(&raw);
    if phone.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Invalid phone number."));
    }

    let limit = query.limit.unwrap_or(runtime.config.history_limit).clamp(1, 500);
    let history = runtime.db.conversation_history(&phone, limit).await?;

    Ok(Json(json!({ "success": true, "phone": phone, "count": history.len(), "history": history })))
}

#[instrument(skip_all)]
pub async fn pricing(State(runtime): State<Runtime>) -> ApiResult<Value> {
    let pricing = runtime.catalog.pricing().await;

    Ok(Json(json!({ "success": true, "count": pricing.len(), "data": pricing.as_slice() })))
}

#[instrument(skip_all)]
pub async fn customers(State(runtime): State<Runtime>) -> ApiResult<Value> {
    let subscriptions = runtime.catalog.subscriptions().await;

    Ok(Json(json!({ "success": true, "count": subscriptions.len(), "data": subscriptions.as_slice() })))
}

#[instrument(skip_all)]
pub async fn groups(State(runtime): State<Runtime>) -> ApiResult<Value> {
    let groups: Vec<GroupAccount> = runtime.catalog.groups().await.iter().cloned().map(mask_password).collect();

    Ok(Json(json!({ "success": true, "count": groups.len(), "data": groups })))
}

// Helpers.

fn mask_password(group: GroupAccount) -> GroupAccount {
    let password = if group.password.is_empty() { String::new() } else { "***".to_string() };
    GroupAccount { password, ..group }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_passwords_are_masked() {
        let group = GroupAccount {
            subscription: "YouTube Premium".to_string(),
            code: "YT 1".to_string(),
            email: "family@mail.test".to_string(),
            password: "hunter2".to_string(),
            max_slots: 5,
        };

        assert_eq!(mask_password(group.clone()).password, "***");
        assert_eq!(mask_password(GroupAccount { password: String::new(), ..group }).password, "");
    }

    #[tokio::test]
    async fn errors_render_as_json() {
        let response = ApiError::new(StatusCode::FORBIDDEN, "Unauthorized").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(body, json!({ "success": false, "error": "Unauthorized" }));
    }
}
