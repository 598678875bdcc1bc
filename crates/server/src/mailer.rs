use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use botdesk_core::config::NotifierConfig;
use botdesk_core::notify::{LogNotifier, Notification, Notifier, NotifyError};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::info;

/// Recipient used in log-only mode when no operator address is configured.
pub const LOG_ONLY_RECIPIENT: &str = "operator";
pub const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(15);

/// Sends operator mail through an HTTP relay that accepts `{from, to, subject, text}`.
pub struct HttpMailNotifier {
    http: reqwest::Client,
    relay_url: String,
    api_key: Option<SecretString>,
    from: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpMailNotifier {
    pub fn new(
        relay_url: impl Into<String>,
        api_key: Option<SecretString>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            relay_url: relay_url.into(),
            api_key,
            from: from.into(),
            timeout: DEFAULT_RELAY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Notifier for HttpMailNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        let message = RelayMessage {
            from: &self.from,
            to: &notification.to,
            subject: &notification.subject,
            text: &notification.body,
        };

        let mut request = self.http.post(&self.relay_url).timeout(self.timeout).json(&message);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|error| NotifyError::Transport(error.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected(format!("relay responded {status}: {detail}")));
        }

        info!(
            event_name = "notification.mail_relayed",
            subject = %notification.subject,
            "operator mail handed to relay"
        );
        Ok(())
    }
}

/// Picks the notifier and operator address the dispatcher should use.
pub fn notifier_from_config(config: &NotifierConfig) -> (Arc<dyn Notifier>, String) {
    match (config.enabled, config.relay_url.as_deref(), config.to.as_deref()) {
        (true, Some(relay_url), Some(to)) => (
            Arc::new(HttpMailNotifier::new(relay_url, config.api_key.clone(), config.from.clone())),
            to.to_string(),
        ),
        _ => (
            Arc::new(LogNotifier),
            config.to.clone().unwrap_or_else(|| LOG_ONLY_RECIPIENT.to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        extract::State,
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use botdesk_core::config::NotifierConfig;
    use botdesk_core::notify::{Notification, Notifier, NotifyError};
    use serde_json::Value;
    use tokio::sync::Mutex;

    use super::{notifier_from_config, HttpMailNotifier, LOG_ONLY_RECIPIENT};

    #[derive(Clone, Default)]
    struct Captured {
        requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
    }

    async fn capture(
        State(captured): State<Captured>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> StatusCode {
        let authorization = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        captured.requests.lock().await.push((authorization, body));
        StatusCode::ACCEPTED
    }

    async fn spawn_relay(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind relay");
        let address = listener.local_addr().expect("relay address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{address}/send")
    }

    fn notification() -> Notification {
        Notification {
            to: "ops@example.com".to_owned(),
            subject: "New Bot Request Received".to_owned(),
            body: "New bot request from Ada (@ada_l):\n\nInventory bot".to_owned(),
        }
    }

    #[tokio::test]
    async fn posts_message_with_bearer_key() {
        let captured = Captured::default();
        let relay_url = spawn_relay(
            Router::new().route("/send", post(capture)).with_state(captured.clone()),
        )
        .await;

        let notifier = HttpMailNotifier::new(
            relay_url,
            Some("relay-key".to_string().into()),
            "botdesk@example.com",
        );
        notifier.notify(notification()).await.expect("relay accepts");

        let requests = captured.requests.lock().await;
        assert_eq!(requests.len(), 1);
        let (authorization, body) = &requests[0];
        assert_eq!(authorization.as_deref(), Some("Bearer relay-key"));
        assert_eq!(body["from"], "botdesk@example.com");
        assert_eq!(body["to"], "ops@example.com");
        assert_eq!(body["subject"], "New Bot Request Received");
    }

    #[tokio::test]
    async fn relay_rejection_is_reported() {
        let relay_url = spawn_relay(
            Router::new().route("/send", post(|| async { StatusCode::UNPROCESSABLE_ENTITY })),
        )
        .await;

        let notifier = HttpMailNotifier::new(relay_url, None, "botdesk@example.com");
        let error = notifier.notify(notification()).await.expect_err("relay rejects");

        assert!(matches!(error, NotifyError::Rejected(message) if message.contains("422")));
    }

    #[tokio::test]
    async fn stalled_relay_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind relay");
        let address = listener.local_addr().expect("relay address");
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let notifier = HttpMailNotifier::new(format!("http://{address}/send"), None, "botdesk@example.com")
            .with_timeout(Duration::from_millis(200));
        let error = notifier.notify(notification()).await.expect_err("relay never answers");

        assert!(matches!(error, NotifyError::Transport(_)));
    }

    #[test]
    fn disabled_notifier_falls_back_to_log_only() {
        let config = NotifierConfig {
            enabled: false,
            relay_url: None,
            api_key: None,
            from: "botdesk@localhost".to_owned(),
            to: None,
        };

        let (_, recipient) = notifier_from_config(&config);
        assert_eq!(recipient, LOG_ONLY_RECIPIENT);
    }
}
