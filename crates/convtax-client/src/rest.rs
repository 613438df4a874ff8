//! HTTP connection to the ConversationalTax server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::debug;

use convtax_core::config::CaptureConfig;
use convtax_core::types::{ConversationHistoryEntry, Notification, Platform};

use crate::capture::{AudioUploader, RecordedAudio};
use crate::error::ClientError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct TextIntentBody<'a> {
    #[serde(rename = "textInput")]
    text_input: &'a str,
}

#[derive(Deserialize)]
struct TextReply {
    text: String,
}

#[derive(Deserialize)]
struct HistoryReply {
    entries: Vec<ConversationHistoryEntry>,
}

#[derive(Deserialize)]
struct NotificationsReply {
    notifications: Vec<Notification>,
}

/// Client for the `/lang` endpoints.
#[derive(Debug, Clone)]
pub struct RestConnection {
    http: reqwest::Client,
    base_url: String,
}

impl RestConnection {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Connection to the `[capture] server_url` of the app config.
    pub fn from_config(config: &CaptureConfig) -> Result<Self, ClientError> {
        Self::new(&config.server_url)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a typed message and return the reply text.
    pub async fn send_text(&self, user_id: &str, text: &str) -> Result<String, ClientError> {
        let response = self
            .http
            .post(self.url("/lang/text"))
            .query(&[("u_id", user_id)])
            .json(&TextIntentBody { text_input: text })
            .send()
            .await?;
        let reply: TextReply = check(response).await?.json().await?;
        Ok(reply.text)
    }

    /// Upload a recording as `recording.<ext>` with type `audio/x-<ext>`.
    pub async fn upload_recording(
        &self,
        user_id: &str,
        platform: Platform,
        bytes: Vec<u8>,
        extension: &str,
    ) -> Result<String, ClientError> {
        let part = Part::bytes(bytes)
            .file_name(format!("recording.{}", extension))
            .mime_str(&format!("audio/x-{}", extension))?;
        let form = Form::new().part("file", part);

        debug!(user_id = %user_id, platform = %platform, "Uploading recording");
        let response = self
            .http
            .post(self.url("/lang/audio_upload"))
            .query(&[("u_id", user_id), ("platform", platform.as_str())])
            .header(reqwest::header::ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await?;
        let reply: TextReply = check(response).await?.json().await?;
        Ok(reply.text)
    }

    /// The user's conversation history, most recent first.
    pub async fn conversation_history(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationHistoryEntry>, ClientError> {
        let response = self
            .http
            .get(self.url("/lang/history"))
            .query(&[("u_id", user_id)])
            .send()
            .await?;
        let reply: HistoryReply = check(response).await?.json().await?;
        Ok(reply.entries)
    }

    /// The user's notifications, most recent first.
    pub async fn notifications(&self, user_id: &str) -> Result<Vec<Notification>, ClientError> {
        let response = self
            .http
            .get(self.url("/lang/notifications"))
            .query(&[("u_id", user_id)])
            .send()
            .await?;
        let reply: NotificationsReply = check(response).await?.json().await?;
        Ok(reply.notifications)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl AudioUploader for RestConnection {
    async fn upload_audio(
        &self,
        user_id: &str,
        platform: Platform,
        audio: &RecordedAudio,
    ) -> Result<String, ClientError> {
        self.upload_recording(user_id, platform, audio.bytes.clone(), &audio.extension)
            .await
    }
}
