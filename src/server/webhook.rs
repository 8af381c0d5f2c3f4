//! Provider webhooks, normalized into [`InboundMessage`].

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use serde_with::{DefaultOnNull, NoneAsEmptyString, serde_as};
use tracing::{info, instrument};

use crate::{
    base::types::{InboundMessage, MediaKind},
    interaction::pipeline::handle_inbound,
    runtime::Runtime,
};

use super::{ApiError, ApiResult};

// Fonnte.

/// The loose Fonnte webhook body; every field is optional and empty strings count as missing.
#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub struct FonntePayload {
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default)]
    pub sender: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default)]
    pub from: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default)]
    pub phone: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default)]
    pub name: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default, rename = "pushName")]
    pub push_name: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default)]
    pub message: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default)]
    pub text: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default)]
    pub caption: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default)]
    pub media: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default)]
    pub file: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default)]
    pub image: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default)]
    pub url: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default, rename = "imageUrl")]
    pub image_url_camel: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default, rename = "mediaUrl")]
    pub media_url: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default, rename = "fileUrl")]
    pub file_url: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default)]
    pub link: Option<String>,
}

impl FonntePayload {
    /// The provider-neutral message, or `None` without a sender.
    pub fn into_inbound(self) -> Option<InboundMessage> {
        let sender = self.sender.or(self.from).or(self.phone)?;
        let caption = self.caption.unwrap_or_default();

        let mut text = self.message.or(self.text).unwrap_or_else(|| caption.clone());
        if text.eq_ignore_ascii_case("non-text message") && !caption.is_empty() {
            text = caption;
        }

        let media_url = self
            .media
            .or(self.file)
            .or(self.image)
            .or(self.url)
            .or(self.image_url)
            .or(self.image_url_camel)
            .or(self.media_url)
            .or(self.file_url)
            .or(self.link);

        Some(InboundMessage {
            chat_jid: self.group_id.unwrap_or_else(|| sender.clone()),
            sender_name: self.name.or(self.push_name).unwrap_or_default(),
            sender_jid: sender,
            text,
            media_kind: media_url.as_ref().map(|_| MediaKind::Image),
            media_url,
        })
    }
}

/// Fonnte pings the webhook URL with `GET` when it is registered.
pub async fn fonnte_ping() -> Json<Value> {
    Json(json!({ "ok": true }))
}

#[instrument(name = "webhook::fonnte", skip_all)]
pub async fn fonnte(State(runtime): State<Runtime>, Json(payload): Json<FonntePayload>) -> ApiResult<Value> {
    let message = payload.into_inbound().ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "Missing sender in webhook payload."))?;

    info!("Fonnte message from {}.", message.sender_jid);
    handle_inbound(message, runtime);

    Ok(Json(json!({ "success": true })))
}

// GOWA.

/// A GOWA webhook event.
#[derive(Debug, Default, Deserialize)]
pub struct GowaEvent {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub payload: Option<GowaPayload>,
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub struct GowaPayload {
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default)]
    pub from: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default)]
    pub from_name: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default)]
    pub text: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default)]
    pub caption: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default)]
    pub image: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default)]
    pub video: Option<String>,
    #[serde_as(as = "DefaultOnNull<NoneAsEmptyString>")]
    #[serde(default)]
    pub audio: Option<String>,
    #[serde(default)]
    pub from_me: bool,
}

/// What to do with a GOWA event.
#[derive(Debug, PartialEq, Eq)]
pub enum GowaOutcome {
    Ignored(String),
    Invalid,
    Message(InboundMessage),
}

impl GowaEvent {
    /// Normalizes the event; media paths are resolved against `base_url`.
    pub fn into_outcome(self, base_url: &str, bot_jid: Option<&str>) -> GowaOutcome {
        let event = self.event.unwrap_or_default();
        if event != "message" {
            return GowaOutcome::Ignored(format!("Event '{event}' ignored"));
        }

        let Some(payload) = self.payload else {
            return GowaOutcome::Invalid;
        };

        let Some(from) = payload.from else {
            return GowaOutcome::Invalid;
        };

        if payload.from_me || bot_jid.is_some_and(|jid| jid == from) {
            return GowaOutcome::Ignored("Own message ignored".to_string());
        }

        let base_url = base_url.trim_end_matches('/');
        let media = match (payload.image, payload.video.or(payload.audio)) {
            (Some(image), _) => Some((format!("{base_url}/{image}"), MediaKind::Image)),
            (None, Some(other)) => Some((format!("{base_url}/{other}"), MediaKind::Document)),
            (None, None) => None,
        };

        let (media_url, media_kind) = media.unzip();

        GowaOutcome::Message(InboundMessage {
            chat_jid: payload.chat_id.unwrap_or_else(|| from.clone()),
            sender_name: payload.from_name.unwrap_or_else(|| from.split('@').next().unwrap_or_default().to_string()),
            sender_jid: from,
            text: payload.caption.or(payload.text).unwrap_or_default(),
            media_url,
            media_kind,
        })
    }
}

#[instrument(name = "webhook::gowa", skip_all)]
pub async fn gowa(State(runtime): State<Runtime>, Json(event): Json<GowaEvent>) -> ApiResult<Value> {
    match event.into_outcome(&runtime.config.gowa_api_url, runtime.config.gowa_bot_jid.as_deref()) {
        GowaOutcome::Ignored(message) => Ok(Json(json!({ "success": true, "message": message }))),
        GowaOutcome::Invalid => Err(ApiError::new(StatusCode::BAD_REQUEST, "Invalid GOWA payload: missing payload.from")),
        GowaOutcome::Message(message) => {
            info!("GOWA message from {}.", message.sender_jid);
            handle_inbound(message, runtime);

            Ok(Json(json!({ "success": true })))
        }
    }
}

// Tests.
