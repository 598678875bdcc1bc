use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use botdesk_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use botdesk_core::domain::request::{RequestId, SubmittedRequest};
use botdesk_core::domain::user::UserContext;
use botdesk_core::flows::{OutboundAction, RequestPayload};
use botdesk_core::notify::{Notification, Notifier};
use botdesk_db::RequestRepository;

use crate::client::ChatTransport;
use crate::render::render_action;

/// What happened while performing one batch of actions.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub messages_sent: usize,
    pub message_failures: usize,
    pub persisted: Option<RequestId>,
    pub persistence_failed: bool,
    notifications: Vec<JoinHandle<()>>,
}

impl DispatchReport {
    pub fn pending_notifications(&self) -> usize {
        self.notifications.len()
    }

    /// Waits for background notifications. Only tests and shutdown need this.
    pub async fn settle(self) {
        for handle in self.notifications {
            if let Err(error) = handle.await {
                warn!(error = %error, "notification task did not complete");
            }
        }
    }
}

/// Performs the side effects the session machine asks for, strictly in order.
///
/// Persistence and notification failures are logged and never stop the
/// remaining messages: the user still gets their confirmation.
pub struct ActionDispatcher {
    transport: Arc<dyn ChatTransport>,
    requests: Arc<dyn RequestRepository>,
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditSink>,
    operator_address: String,
}

impl ActionDispatcher {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        requests: Arc<dyn RequestRepository>,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditSink>,
        operator_address: impl Into<String>,
    ) -> Self {
        Self { transport, requests, notifier, audit, operator_address: operator_address.into() }
    }

    pub async fn dispatch(
        &self,
        user: &UserContext,
        actions: &[OutboundAction],
        audit: &AuditContext,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        for action in actions {
            match action {
                OutboundAction::PersistRequest(payload) => {
                    self.persist(user, payload, audit, &mut report).await;
                }
                OutboundAction::Notify { service, free_text } => {
                    let notification = Notification::for_request(
                        self.operator_address.clone(),
                        user,
                        *service,
                        free_text,
                    );
                    report.notifications.push(self.spawn_notification(notification, audit));
                }
                other => {
                    let Some(message) = render_action(other) else {
                        continue;
                    };
                    match self.transport.send_message(user.chat_id, &message).await {
                        Ok(()) => report.messages_sent += 1,
                        Err(error) => {
                            report.message_failures += 1;
                            warn!(
                                event_name = "egress.telegram.send_failed",
                                correlation_id = %audit.correlation_id,
                                chat_id = %user.chat_id,
                                error = %error,
                                "failed to deliver chat message"
                            );
                        }
                    }
                }
            }
        }

        report
    }

    async fn persist(
        &self,
        user: &UserContext,
        payload: &RequestPayload,
        audit: &AuditContext,
        report: &mut DispatchReport,
    ) {
        let request = SubmittedRequest::new(
            user,
            payload.service,
            payload.free_text.clone(),
            payload.file_reference.as_ref(),
        );
        let request_id = request.id.clone();
        let file_only = request.is_file_only();

        match self.requests.save(request).await {
            Ok(()) => {
                info!(
                    event_name = "persistence.request_saved",
                    correlation_id = %audit.correlation_id,
                    request_id = %request_id,
                    file_only,
                    "submitted request stored"
                );
                self.audit.emit(
                    self.audit_event(audit, "persistence.request_saved", AuditCategory::Persistence)
                        .with_metadata("request_id", request_id.to_string()),
                );
                report.persisted = Some(request_id);
            }
            Err(error) => {
                warn!(
                    event_name = "persistence.request_failed",
                    correlation_id = %audit.correlation_id,
                    error = %error,
                    "failed to store submitted request"
                );
                self.audit.emit(
                    AuditEvent::new(
                        audit.user_id.clone(),
                        audit.chat_id,
                        audit.correlation_id.clone(),
                        "persistence.request_failed",
                        AuditCategory::Persistence,
                        audit.actor.clone(),
                        AuditOutcome::Failed,
                    )
                    .with_metadata("error", error.to_string()),
                );
                report.persistence_failed = true;
            }
        }
    }

    fn spawn_notification(&self, notification: Notification, audit: &AuditContext) -> JoinHandle<()> {
        let notifier = Arc::clone(&self.notifier);
        let sink = Arc::clone(&self.audit);
        let mut event = self.audit_event(audit, "notification.sent", AuditCategory::Notification);
        let correlation_id = audit.correlation_id.clone();

        tokio::spawn(async move {
            let subject = notification.subject.clone();
            match notifier.notify(notification).await {
                Ok(()) => {
                    debug!(
                        event_name = "notification.sent",
                        correlation_id = %correlation_id,
                        subject = %subject,
                        "operator notified"
                    );
                }
                Err(error) => {
                    warn!(
                        event_name = "notification.failed",
                        correlation_id = %correlation_id,
                        error = %error,
                        "operator notification failed"
                    );
                    event.event_type = "notification.failed".to_owned();
                    event.outcome = AuditOutcome::Failed;
                    event = event.with_metadata("error", error.to_string());
                }
            }
            sink.emit(event);
        })
    }

    fn audit_event(
        &self,
        audit: &AuditContext,
        event_type: &str,
        category: AuditCategory,
    ) -> AuditEvent {
        AuditEvent::new(
            audit.user_id.clone(),
            audit.chat_id,
            audit.correlation_id.clone(),
            event_type,
            category,
            audit.actor.clone(),
            AuditOutcome::Success,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use botdesk_core::audit::{AuditCategory, AuditContext, AuditOutcome, InMemoryAuditSink};
    use botdesk_core::domain::request::FileReference;
    use botdesk_core::domain::service::ServiceKind;
    use botdesk_core::flows::{OutboundAction, RequestPayload};
    use botdesk_core::notify::InMemoryNotifier;
    use botdesk_db::{InMemoryRequestRepository, RequestRepository};

    use super::ActionDispatcher;
    use crate::render::{CONTACT_TEXT, FILE_ACK_TEXT};
    use crate::testing::{sample_user, FailingNotifier, FailingRequestRepository, RecordingTransport};

    fn audit() -> AuditContext {
        AuditContext::new(None, None, "upd-1", "telegram")
    }

    #[tokio::test]
    async fn persists_notifies_and_confirms_in_order() {
        let transport = Arc::new(RecordingTransport::default());
        let requests = Arc::new(InMemoryRequestRepository::default());
        let notifier = Arc::new(InMemoryNotifier::default());
        let sink = Arc::new(InMemoryAuditSink::default());
        let dispatcher = ActionDispatcher::new(
            transport.clone(),
            requests.clone(),
            notifier.clone(),
            sink.clone(),
            "ops@example.com",
        );

        let actions = vec![
            OutboundAction::PersistRequest(RequestPayload {
                service: Some(ServiceKind::Automation),
                free_text: Some("Sync invoices nightly".to_owned()),
                file_reference: None,
            }),
            OutboundAction::Notify {
                service: Some(ServiceKind::Automation),
                free_text: "Sync invoices nightly".to_owned(),
            },
            OutboundAction::SendConfirmation { service: Some(ServiceKind::Automation) },
        ];

        let report = dispatcher.dispatch(&sample_user(), &actions, &audit()).await;
        assert_eq!(report.messages_sent, 1);
        assert!(report.persisted.is_some());
        assert_eq!(report.pending_notifications(), 1);
        report.settle().await;

        let stored = requests.list_recent(10).await.expect("list");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].service, Some(ServiceKind::Automation));
        assert_eq!(stored[0].free_text.as_deref(), Some("Sync invoices nightly"));

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "New Service Inquiry");
        assert_eq!(sent[0].to, "ops@example.com");

        let messages = transport.texts().await;
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("✅ Thank you!"));

        let categories: Vec<_> = sink.events().iter().map(|event| event.category.clone()).collect();
        assert!(categories.contains(&AuditCategory::Persistence));
        assert!(categories.contains(&AuditCategory::Notification));
    }

    #[tokio::test]
    async fn persistence_failure_still_confirms() {
        let transport = Arc::new(RecordingTransport::default());
        let sink = Arc::new(InMemoryAuditSink::default());
        let dispatcher = ActionDispatcher::new(
            transport.clone(),
            Arc::new(FailingRequestRepository),
            Arc::new(InMemoryNotifier::default()),
            sink.clone(),
            "ops@example.com",
        );

        let actions = vec![
            OutboundAction::PersistRequest(RequestPayload {
                service: None,
                free_text: None,
                file_reference: Some(FileReference("https://files/doc.pdf".to_owned())),
            }),
            OutboundAction::SendFileAck,
        ];

        let report = dispatcher.dispatch(&sample_user(), &actions, &audit()).await;
        assert!(report.persistence_failed);
        assert!(report.persisted.is_none());
        assert_eq!(transport.texts().await, vec![FILE_ACK_TEXT.to_owned()]);
        assert!(sink
            .events()
            .iter()
            .any(|event| event.outcome == AuditOutcome::Failed
                && event.event_type == "persistence.request_failed"));
    }

    #[tokio::test]
    async fn notifier_failure_is_contained() {
        let transport = Arc::new(RecordingTransport::default());
        let sink = Arc::new(InMemoryAuditSink::default());
        let dispatcher = ActionDispatcher::new(
            transport.clone(),
            Arc::new(InMemoryRequestRepository::default()),
            Arc::new(FailingNotifier),
            sink.clone(),
            "ops@example.com",
        );

        let actions = vec![
            OutboundAction::Notify { service: None, free_text: "Need a bot".to_owned() },
            OutboundAction::SendConfirmation { service: None },
        ];

        let report = dispatcher.dispatch(&sample_user(), &actions, &audit()).await;
        assert_eq!(report.messages_sent, 1);
        report.settle().await;

        assert!(sink.events().iter().any(|event| event.event_type == "notification.failed"));
    }

    #[tokio::test]
    async fn send_failures_are_counted_and_do_not_stop_the_batch() {
        let transport = Arc::new(RecordingTransport::failing_first(1));
        let dispatcher = ActionDispatcher::new(
            transport.clone(),
            Arc::new(InMemoryRequestRepository::default()),
            Arc::new(InMemoryNotifier::default()),
            Arc::new(InMemoryAuditSink::default()),
            "ops@example.com",
        );

        let actions = vec![OutboundAction::ShowMainMenu, OutboundAction::ShowContactInfo];
        let report = dispatcher.dispatch(&sample_user(), &actions, &audit()).await;

        assert_eq!(report.message_failures, 1);
        assert_eq!(report.messages_sent, 1);
        assert_eq!(transport.texts().await, vec![CONTACT_TEXT.to_owned()]);
    }
}
