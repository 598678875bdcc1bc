//! Fakes shared by the crate's unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use botdesk_core::domain::request::{FileReference, RequestId, SubmittedRequest};
use botdesk_core::domain::user::{ChatId, UserContext, UserId};
use botdesk_core::notify::{Notification, Notifier, NotifyError};
use botdesk_db::{RepositoryError, RequestRepository};

use crate::client::{ChatTransport, TransportError};
use crate::render::MessageTemplate;

pub fn sample_user() -> UserContext {
    UserContext::new(UserId::new("42"), ChatId(4200), "Ada")
        .with_username("ada_l")
        .with_last_name("Lovelace")
}

#[derive(Default)]
pub struct RecordingTransport {
    messages: Mutex<Vec<(ChatId, MessageTemplate)>>,
    callbacks: Mutex<Vec<String>>,
    failures_remaining: AtomicUsize,
    broken_files: bool,
}

impl RecordingTransport {
    pub fn failing_first(count: usize) -> Self {
        Self { failures_remaining: AtomicUsize::new(count), ..Self::default() }
    }

    pub fn with_broken_files() -> Self {
        Self { broken_files: true, ..Self::default() }
    }

    pub async fn messages(&self) -> Vec<(ChatId, MessageTemplate)> {
        self.messages.lock().await.clone()
    }

    pub async fn texts(&self) -> Vec<String> {
        self.messages.lock().await.iter().map(|(_, message)| message.text.clone()).collect()
    }

    pub async fn answered_callbacks(&self) -> Vec<String> {
        self.callbacks.lock().await.clone()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_message(
        &self,
        chat_id: ChatId,
        message: &MessageTemplate,
    ) -> Result<(), TransportError> {
        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(TransportError::Request {
                method: "sendMessage".to_owned(),
                reason: "connection reset".to_owned(),
            });
        }
        self.messages.lock().await.push((chat_id, message.clone()));
        Ok(())
    }

    async fn answer_callback(&self, callback_query_id: &str) -> Result<(), TransportError> {
        self.callbacks.lock().await.push(callback_query_id.to_owned());
        Ok(())
    }

    async fn resolve_file(&self, file_id: &str) -> Result<FileReference, TransportError> {
        if self.broken_files {
            return Err(TransportError::MissingFilePath(file_id.to_owned()));
        }
        Ok(FileReference(format!("https://files.example/{file_id}")))
    }
}

pub struct FailingRequestRepository;

#[async_trait]
impl RequestRepository for FailingRequestRepository {
    async fn save(&self, _request: SubmittedRequest) -> Result<(), RepositoryError> {
        Err(RepositoryError::Decode("database is locked".to_owned()))
    }

    async fn find_by_id(
        &self,
        _id: &RequestId,
    ) -> Result<Option<SubmittedRequest>, RepositoryError> {
        Ok(None)
    }

    async fn list_recent(&self, _limit: u32) -> Result<Vec<SubmittedRequest>, RepositoryError> {
        Ok(Vec::new())
    }

    async fn list_all(&self) -> Result<Vec<SubmittedRequest>, RepositoryError> {
        Ok(Vec::new())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(0)
    }
}

pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _notification: Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("relay unreachable".to_owned()))
    }
}
