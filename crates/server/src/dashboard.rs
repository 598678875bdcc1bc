//! Operator dashboard.
//!
//! - `GET  /`              : liveness text
//! - `GET  /admin`         : stored requests, newest first (HTML)
//! - `POST /admin/contact` : forward an operator message to a user (JSON)
//!
//! Both admin routes take `username` and `password` query parameters.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use botdesk_core::config::AdminConfig;
use botdesk_core::domain::request::SubmittedRequest;
use botdesk_core::domain::user::ChatId;
use botdesk_core::errors::{ApplicationError, FailureClass, InterfaceError};
use botdesk_db::RequestRepository;
use botdesk_telegram::render::MessageTemplate;
use botdesk_telegram::ChatTransport;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tera::{Context, Tera};
use tracing::{error, info, warn};

pub const RUNNING_TEXT: &str = "Bot is running!";
pub const AUTH_REQUIRED_TEXT: &str = "Authentication required";
const DASHBOARD_TEMPLATE: &str = "dashboard.html";

#[derive(Clone)]
pub struct AdminCredentials {
    username: String,
    password: SecretString,
}

impl AdminCredentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self { username: username.into(), password }
    }

    pub fn from_config(config: &AdminConfig) -> Self {
        Self::new(config.username.clone(), config.password.clone())
    }

    fn accepts(&self, query: &AdminQuery) -> bool {
        match (query.username.as_deref(), query.password.as_deref()) {
            (Some(username), Some(password)) => {
                username == self.username && password == self.password.expose_secret()
            }
            _ => false,
        }
    }
}

#[derive(Clone)]
pub struct DashboardState {
    requests: Arc<dyn RequestRepository>,
    transport: Arc<dyn ChatTransport>,
    credentials: AdminCredentials,
    templates: Arc<Tera>,
}

impl DashboardState {
    pub fn new(
        requests: Arc<dyn RequestRepository>,
        transport: Arc<dyn ChatTransport>,
        credentials: AdminCredentials,
    ) -> Self {
        Self {
            requests,
            transport,
            credentials,
            templates: init_templates(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminQuery {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContactRequest {
    #[serde(rename = "chatId", default)]
    pub chat_id: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ContactResponse {
    pub message: String,
}

impl ContactResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self { message: message.to_string() })
    }
}

/// One dashboard row. `text` merges the service label with the details.
#[derive(Debug, Serialize)]
struct RequestRow {
    id: String,
    first_name: String,
    last_name: Option<String>,
    username: String,
    chat_id: i64,
    created_at: String,
    text: Option<String>,
    file_url: Option<String>,
}

impl From<&SubmittedRequest> for RequestRow {
    fn from(request: &SubmittedRequest) -> Self {
        let text = match (request.service, request.free_text.as_deref()) {
            (Some(service), Some(details)) => {
                Some(format!("Service: {}, Details: {details}", service.label()))
            }
            (Some(service), None) => Some(format!("Service: {}", service.label())),
            (None, details) => details.map(str::to_string),
        };

        Self {
            id: request.id.to_string(),
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            username: request.username.clone(),
            chat_id: request.chat_id.0,
            created_at: request.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            text,
            file_url: request.file_url.clone(),
        }
    }
}

fn init_templates() -> Arc<Tera> {
    let mut tera = Tera::default();
    if let Err(error) = tera.add_raw_template(
        DASHBOARD_TEMPLATE,
        include_str!("../../../templates/dashboard/index.html"),
    ) {
        error!(error = %error, "dashboard template failed to parse");
    }
    Arc::new(tera)
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(running))
        .route("/admin", get(dashboard_page))
        .route("/admin/contact", post(contact_user))
        .with_state(state)
}

pub async fn running() -> &'static str {
    RUNNING_TEXT
}

pub async fn dashboard_page(
    Query(query): Query<AdminQuery>,
    State(state): State<DashboardState>,
) -> Result<Html<String>, (StatusCode, String)> {
    if !state.credentials.accepts(&query) {
        warn!(event_name = "dashboard.auth_rejected", route = "/admin", "dashboard login rejected");
        return Err((StatusCode::UNAUTHORIZED, AUTH_REQUIRED_TEXT.to_string()));
    }

    let requests = state.requests.list_all().await.map_err(|error| {
        error!(event_name = "dashboard.list_failed", error = %error, "failed to load requests");
        let failure = ApplicationError::Storage(error.to_string()).into_interface("dashboard");
        (status_for(&failure), failure.public_message)
    })?;
    let rows: Vec<RequestRow> = requests.iter().map(RequestRow::from).collect();
    let mut context = Context::new();
    context.insert("requests", &rows);
    context.insert("total", &rows.len());

    let html = state.templates.render(DASHBOARD_TEMPLATE, &context).map_err(|error| {
        error!(event_name = "dashboard.render_failed", error = %error, "dashboard render failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render dashboard".to_string())
    })?;

    info!(event_name = "dashboard.viewed", rows = rows.len(), "dashboard rendered");
    Ok(Html(html))
}

pub async fn contact_user(
    Query(query): Query<AdminQuery>,
    State(state): State<DashboardState>,
    Json(body): Json<ContactRequest>,
) -> (StatusCode, Json<ContactResponse>) {
    if !state.credentials.accepts(&query) {
        warn!(
            event_name = "dashboard.auth_rejected",
            route = "/admin/contact",
            "contact request rejected"
        );
        return (StatusCode::UNAUTHORIZED, ContactResponse::new(AUTH_REQUIRED_TEXT));
    }

    let chat_id = body.chat_id.as_ref().and_then(parse_chat_id);
    let message = body.message.as_deref().map(str::trim).filter(|message| !message.is_empty());
    let (Some(chat_id), Some(message)) = (chat_id, message) else {
        let failure = ApplicationError::InvalidInput("Chat ID and message are required")
            .into_interface("dashboard.contact");
        return contact_failure(failure);
    };

    match state.transport.send_message(chat_id, &MessageTemplate::plain(message)).await {
        Ok(()) => {
            info!(
                event_name = "dashboard.contact_sent",
                chat_id = %chat_id,
                "operator message delivered"
            );
            (StatusCode::OK, ContactResponse::new("Message sent successfully!"))
        }
        Err(error) => {
            let error = ApplicationError::Delivery(error.to_string());
            warn!(
                event_name = "dashboard.contact_failed",
                chat_id = %chat_id,
                error = %error,
                "operator message failed"
            );
            contact_failure(error.into_interface("dashboard.contact"))
        }
    }
}

fn status_for(failure: &InterfaceError) -> StatusCode {
    match failure.class {
        FailureClass::Rejected => StatusCode::BAD_REQUEST,
        FailureClass::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        FailureClass::Failed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn contact_failure(failure: InterfaceError) -> (StatusCode, Json<ContactResponse>) {
    (status_for(&failure), ContactResponse::new(&failure.public_message))
}

/// Browsers send the id from a data attribute as a string.
fn parse_chat_id(value: &Value) -> Option<ChatId> {
    match value {
        Value::Number(number) => number.as_i64().map(ChatId),
        Value::String(text) => text.trim().parse().ok().map(ChatId),
        _ => None,
    }
}
