use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use botdesk_core::config::TelegramConfig;
use botdesk_core::domain::request::FileReference;
use botdesk_core::domain::user::ChatId;

use crate::render::MessageTemplate;
use crate::types::{InlineKeyboardMarkup, Message, TelegramFile, Update, User};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("telegram request `{method}` failed: {reason}")]
    Request { method: String, reason: String },
    #[error("telegram api rejected `{method}`: {description}")]
    Api { method: String, description: String },
    #[error("telegram response for `{method}` could not be decoded: {reason}")]
    Decode { method: String, reason: String },
    #[error("telegram file `{0}` has no downloadable path")]
    MissingFilePath(String),
}

/// Outbound half of the bot transport.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(&self, chat_id: ChatId, message: &MessageTemplate)
        -> Result<(), TransportError>;
    async fn answer_callback(&self, callback_query_id: &str) -> Result<(), TransportError>;
    /// Turns an uploaded file id into a link the operator can open.
    async fn resolve_file(&self, file_id: &str) -> Result<FileReference, TransportError>;
}

/// Deadline for a single Bot API call. Long polls get this on top of their poll timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
    request_timeout: Duration,
}

impl TelegramClient {
    pub fn new(token: SecretString, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            token,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn from_config(config: &TelegramConfig) -> Self {
        Self::new(config.bot_token.clone(), config.api_base_url.clone())
    }

    pub async fn get_me(&self) -> Result<User, TransportError> {
        self.post("getMe", &serde_json::json!({}), self.request_timeout).await
    }

    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<Update>, TransportError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: vec!["message", "callback_query"],
        };
        // A silent half-open connection must surface as an error so the runner reconnects.
        self.post("getUpdates", &request, timeout + self.request_timeout).await
    }

    pub async fn get_file(&self, file_id: &str) -> Result<TelegramFile, TransportError> {
        self.post("getFile", &GetFileRequest { file_id }, self.request_timeout).await
    }

    pub fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.base_url, self.token.expose_secret(), file_path)
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        method: &str,
        body: &B,
        deadline: Duration,
    ) -> Result<T, TransportError> {
        let url = format!("{}/bot{}/{}", self.base_url, self.token.expose_secret(), method);
        // reqwest errors carry the URL, which embeds the token.
        let request = self.http.post(url).timeout(deadline).json(body);
        let response = request.send().await.map_err(|error| {
            TransportError::Request {
                method: method.to_string(),
                reason: error.without_url().to_string(),
            }
        })?;

        let payload: TelegramResponse<T> =
            response.json().await.map_err(|error| TransportError::Decode {
                method: method.to_string(),
                reason: error.without_url().to_string(),
            })?;

        if !payload.ok {
            return Err(TransportError::Api {
                method: method.to_string(),
                description: payload
                    .description
                    .unwrap_or_else(|| "Telegram API error".to_string()),
            });
        }

        payload.result.ok_or_else(|| TransportError::Decode {
            method: method.to_string(),
            reason: "missing result".to_string(),
        })
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send_message(
        &self,
        chat_id: ChatId,
        message: &MessageTemplate,
    ) -> Result<(), TransportError> {
        let request = SendMessageRequest {
            chat_id: chat_id.0,
            text: &message.text,
            parse_mode: message.parse_mode.map(|mode| mode.as_str()),
            reply_markup: message.reply_markup(),
        };
        let _: Message = self.post("sendMessage", &request, self.request_timeout).await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_query_id: &str) -> Result<(), TransportError> {
        let _: bool = self
            .post(
                "answerCallbackQuery",
                &AnswerCallbackQueryRequest { callback_query_id },
                self.request_timeout,
            )
            .await?;
        Ok(())
    }

    async fn resolve_file(&self, file_id: &str) -> Result<FileReference, TransportError> {
        let file = self.get_file(file_id).await?;
        let path = file.file_path.ok_or_else(|| TransportError::MissingFilePath(file.file_id))?;
        Ok(FileReference(self.file_url(&path)))
    }
}

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct GetFileRequest<'a> {
    file_id: &'a str,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct AnswerCallbackQueryRequest<'a> {
    callback_query_id: &'a str,
}
