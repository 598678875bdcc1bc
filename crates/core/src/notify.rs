use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::domain::service::ServiceKind;
use crate::domain::user::UserContext;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    /// Operator e-mail for a new free-text request. Service requests get their own subject.
    pub fn for_request(
        to: impl Into<String>,
        user: &UserContext,
        service: Option<ServiceKind>,
        details: &str,
    ) -> Self {
        let sender = format!("{} (@{})", user.first_name, user.username_or_default());
        let (subject, body) = match service {
            Some(service) => (
                "New Service Inquiry",
                format!(
                    "New service inquiry from {sender}:\n\nService: {}\nDetails: {details}",
                    service.label()
                ),
            ),
            None => ("New Bot Request Received", format!("New bot request from {sender}:\n\n{details}")),
        };

        Self { to: to.into(), subject: subject.to_owned(), body }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification relay rejected message: {0}")]
    Rejected(String),
    #[error("notification transport failure: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Used when no relay is configured: the notification only reaches the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(
            event_name = "notify.logged",
            to = %notification.to,
            subject = %notification.subject,
            "notifier disabled; notification written to log only"
        );
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        match self.sent.lock() {
            Ok(mut sent) => sent.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
        Ok(())
    }
}
