//! Telegram Bot API messenger.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{DeliveryError, Result};
use crate::models::DeliveryConfig;
use crate::services::delivery::Messenger;
use crate::services::render::OutgoingMessage;

const API_BASE: &str = "https://api.telegram.org";

/// Sends messages through the Telegram Bot API.
pub struct TelegramMessenger {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

impl TelegramMessenger {
    pub fn new(token: &str, config: &DeliveryConfig) -> Result<Self> {
        Self::with_api_base(API_BASE, token, config)
    }

    /// Point the messenger at a different Bot API server.
    pub fn with_api_base(api_base: &str, token: &str, config: &DeliveryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
        })
    }

    fn payload(chat_id: &str, message: &OutgoingMessage) -> (&'static str, Value) {
        let mut body = match &message.photo_url {
            Some(photo) => json!({
                "chat_id": chat_id,
                "photo": photo,
                "caption": message.text,
            }),
            None => json!({
                "chat_id": chat_id,
                "text": message.text,
                "disable_web_page_preview": message.button.is_some(),
            }),
        };
        if message.html {
            body["parse_mode"] = json!("HTML");
        }
        if let Some(button) = &message.button {
            body["reply_markup"] = json!({
                "inline_keyboard": [[{ "text": button.label, "url": button.url }]]
            });
        }

        let method = if message.photo_url.is_some() {
            "sendPhoto"
        } else {
            "sendMessage"
        };
        (method, body)
    }
}

/// Map a failed Bot API call onto the delivery error classes.
fn classify(
    status: StatusCode,
    description: &str,
    retry_after: Option<u64>,
    with_photo: bool,
) -> DeliveryError {
    let description = description.to_string();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return DeliveryError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(1),
        };
    }
    if status.is_server_error() {
        return DeliveryError::Transient(description);
    }

    let lower = description.to_lowercase();
    // A bad photo or bad markup can still go through as a smaller payload.
    let recoverable = (with_photo && status == StatusCode::BAD_REQUEST)
        || lower.contains("can't parse entities")
        || lower.contains("wrong file identifier")
        || lower.contains("failed to get http url content");
    if recoverable {
        DeliveryError::Transient(description)
    } else {
        DeliveryError::Permanent(description)
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send(
        &self,
        chat_id: &str,
        message: &OutgoingMessage,
    ) -> std::result::Result<(), DeliveryError> {
        let (method, body) = Self::payload(chat_id, message);
        let url = format!("{}/{}", self.endpoint, method);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transient(format!("{method}: {}", e.without_url())))?;

        let status = response.status();
        let parsed: Option<ApiResponse> = response.json().await.ok();

        match parsed {
            Some(api) if status.is_success() && api.ok => Ok(()),
            Some(api) => Err(classify(
                status,
                api.description.as_deref().unwrap_or("no description"),
                api.parameters.and_then(|p| p.retry_after),
                message.photo_url.is_some(),
            )),
            None if status.is_success() => Ok(()),
            None => Err(classify(
                status,
                status.canonical_reason().unwrap_or("unreadable response"),
                None,
                message.photo_url.is_some(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::render::Button;

    fn message(photo: bool, html: bool, button: bool) -> OutgoingMessage {
        OutgoingMessage {
            text: "🔥 <b>Echo Dot</b>".to_string(),
            html,
            photo_url: photo.then(|| "https://m.media-amazon.com/x.jpg".to_string()),
            button: button.then(|| Button {
                label: "Vai".to_string(),
                url: "https://aff.link/x".to_string(),
            }),
        }
    }

    #[test]
    fn test_photo_payload() {
        let (method, body) = TelegramMessenger::payload("@deals", &message(true, true, true));
        assert_eq!(method, "sendPhoto");
        assert_eq!(body["chat_id"], "@deals");
        assert_eq!(body["photo"], "https://m.media-amazon.com/x.jpg");
        assert_eq!(body["parse_mode"], "HTML");
        assert_eq!(
            body["reply_markup"]["inline_keyboard"][0][0]["url"],
            "https://aff.link/x"
        );
    }

    #[test]
    fn test_plain_payload() {
        let (method, body) = TelegramMessenger::payload("42", &message(false, false, false));
        assert_eq!(method, "sendMessage");
        assert!(body.get("parse_mode").is_none());
        assert!(body.get("reply_markup").is_none());
        assert_eq!(body["disable_web_page_preview"], false);
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(StatusCode::TOO_MANY_REQUESTS, "Too Many Requests", Some(14), false),
            DeliveryError::RateLimited { retry_after_secs: 14 }
        );
        assert!(classify(StatusCode::BAD_GATEWAY, "Bad Gateway", None, false).is_transient());
        assert!(
            classify(StatusCode::BAD_REQUEST, "Bad Request: wrong type of the web page content", None, true)
                .is_transient()
        );
        assert!(
            classify(StatusCode::BAD_REQUEST, "Bad Request: can't parse entities", None, false)
                .is_transient()
        );
        assert!(
            !classify(StatusCode::FORBIDDEN, "Forbidden: bot was blocked by the user", None, false)
                .is_transient()
        );
        assert!(
            !classify(StatusCode::BAD_REQUEST, "Bad Request: chat not found", None, false)
                .is_transient()
        );
    }
}
