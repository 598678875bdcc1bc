use std::sync::Arc;

use tracing::{info, warn};

use botdesk_core::audit::{AuditContext, AuditSink};
use botdesk_core::flows::{InboundEvent, OutboundAction, SessionMachine};

use crate::client::ChatTransport;
use crate::dispatch::{ActionDispatcher, DispatchReport};
use crate::events::{is_start_command, IncomingKind, IncomingUpdate};

const AUDIT_ACTOR: &str = "telegram";

/// Glues one classified update through the session machine and back out to the chat.
pub struct ConversationService {
    machine: SessionMachine,
    dispatcher: ActionDispatcher,
    transport: Arc<dyn ChatTransport>,
    audit: Arc<dyn AuditSink>,
}

impl ConversationService {
    pub fn new(
        machine: SessionMachine,
        dispatcher: ActionDispatcher,
        transport: Arc<dyn ChatTransport>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { machine, dispatcher, transport, audit }
    }

    pub async fn handle(&self, update: IncomingUpdate) -> DispatchReport {
        let correlation_id = update.correlation_id();
        let audit = AuditContext::new(
            Some(update.user.user_id.clone()),
            Some(update.user.chat_id),
            correlation_id.clone(),
            AUDIT_ACTOR,
        );

        let event = match update.kind {
            IncomingKind::Text(text) if is_start_command(&text) => InboundEvent::StartCommand,
            IncomingKind::Text(text) => InboundEvent::FreeText(text),
            IncomingKind::Callback { callback_query_id, data } => {
                // Clears the spinner on the button; the reply itself is a separate message.
                if let Err(error) = self.transport.answer_callback(&callback_query_id).await {
                    warn!(
                        event_name = "egress.telegram.callback_answer_failed",
                        correlation_id = %correlation_id,
                        error = %error,
                        "failed to answer callback query"
                    );
                }
                InboundEvent::MenuSelect(data)
            }
            IncomingKind::Document { file_id, file_name } => {
                match self.transport.resolve_file(&file_id).await {
                    Ok(reference) => InboundEvent::FileUpload(reference),
                    Err(error) => {
                        warn!(
                            event_name = "ingress.telegram.file_unresolved",
                            correlation_id = %correlation_id,
                            file_name = file_name.as_deref().unwrap_or("unknown"),
                            error = %error,
                            "could not resolve uploaded file"
                        );
                        return self
                            .dispatcher
                            .dispatch(&update.user, &[OutboundAction::SendRestartHint], &audit)
                            .await;
                    }
                }
            }
        };

        info!(
            event_name = "ingress.telegram.event_mapped",
            correlation_id = %correlation_id,
            user_id = %update.user.user_id,
            event = event.kind(),
            "mapped update to session event"
        );

        let outcome = self
            .machine
            .handle_event_with_audit(&update.user.user_id, event, self.audit.as_ref(), &audit)
            .await;
        self.dispatcher.dispatch(&update.user, &outcome.actions, &audit).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use botdesk_core::audit::InMemoryAuditSink;
    use botdesk_core::catalog::Catalog;
    use botdesk_core::domain::service::ServiceKind;
    use botdesk_core::flows::{InMemorySessionStore, Session, SessionStore};
    use botdesk_core::notify::InMemoryNotifier;
    use botdesk_core::SessionMachine;
    use botdesk_db::{InMemoryRequestRepository, RequestRepository};

    use super::ConversationService;
    use crate::dispatch::ActionDispatcher;
    use crate::events::{IncomingKind, IncomingUpdate};
    use crate::render::{RESTART_HINT_TEXT, WELCOME_TEXT};
    use crate::testing::{sample_user, RecordingTransport};

    struct Harness {
        service: ConversationService,
        transport: Arc<RecordingTransport>,
        store: Arc<InMemorySessionStore>,
        requests: Arc<InMemoryRequestRepository>,
        notifier: Arc<InMemoryNotifier>,
    }

    fn harness(transport: RecordingTransport) -> Harness {
        let transport = Arc::new(transport);
        let store = Arc::new(InMemorySessionStore::default());
        let requests = Arc::new(InMemoryRequestRepository::default());
        let notifier = Arc::new(InMemoryNotifier::default());
        let audit = Arc::new(InMemoryAuditSink::default());
        let machine = SessionMachine::new(Arc::new(Catalog::default()), store.clone());
        let dispatcher = ActionDispatcher::new(
            transport.clone(),
            requests.clone(),
            notifier.clone(),
            audit.clone(),
            "ops@example.com",
        );
        let service = ConversationService::new(machine, dispatcher, transport.clone(), audit);
        Harness { service, transport, store, requests, notifier }
    }

    fn update(id: i64, kind: IncomingKind) -> IncomingUpdate {
        IncomingUpdate { update_id: id, user: sample_user(), kind }
    }

    fn text(id: i64, body: &str) -> IncomingUpdate {
        update(id, IncomingKind::Text(body.to_owned()))
    }

    fn tap(id: i64, data: &str) -> IncomingUpdate {
        update(
            id,
            IncomingKind::Callback { callback_query_id: format!("cb-{id}"), data: data.to_owned() },
        )
    }

    #[tokio::test]
    async fn start_shows_main_menu() {
        let h = harness(RecordingTransport::default());

        h.service.handle(text(1, "/start")).await;

        let messages = h.transport.messages().await;
        assert_eq!(messages.len(), 1);
        assert!(messages[0].1.text.contains(WELCOME_TEXT));
        assert_eq!(messages[0].1.keyboard.len(), 4);
    }

    #[tokio::test]
    async fn callbacks_are_answered_before_the_reply() {
        let h = harness(RecordingTransport::default());

        h.service.handle(tap(7, "contact")).await;

        assert_eq!(h.transport.answered_callbacks().await, vec!["cb-7".to_owned()]);
        assert_eq!(h.transport.texts().await.len(), 1);
    }

    #[tokio::test]
    async fn pricing_flow_quotes_free_text_features() {
        let h = harness(RecordingTransport::default());

        h.service.handle(tap(1, "pricing")).await;
        h.service.handle(text(2, "basic_bot, api_integration")).await;

        let texts = h.transport.texts().await;
        assert_eq!(texts.last().map(String::as_str), Some("💰 Estimated Price: *$80*"));
        assert!(h.store.get(&sample_user().user_id).await.is_idle());
    }

    #[tokio::test]
    async fn service_request_is_stored_and_notified() {
        let h = harness(RecordingTransport::default());

        h.service.handle(tap(1, ServiceKind::CustomBots.token())).await;
        let report = h.service.handle(text(2, "A bot that books meeting rooms")).await;
        report.settle().await;

        let stored = h.requests.list_recent(5).await.expect("list");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].service, Some(ServiceKind::CustomBots));
        assert_eq!(stored[0].username, "ada_l");
        assert_eq!(h.notifier.sent().len(), 1);
        assert!(h.transport.texts().await.last().is_some_and(|text| text.starts_with("✅ Thank you!")));
    }

    #[tokio::test]
    async fn quote_builder_walks_every_question() {
        let h = harness(RecordingTransport::default());

        h.service.handle(tap(1, "quote_builder")).await;
        let answers = [
            "quote_basic_bot,custom_ui,payment_integration",
            "quote_",
            "quote_",
            "quote_",
            "quote_",
        ];
        for (offset, answer) in answers.iter().enumerate() {
            h.service.handle(tap(2 + offset as i64, answer)).await;
        }

        let texts = h.transport.texts().await;
        assert_eq!(texts.iter().filter(|text| text.starts_with("*Question")).count(), 5);
        let last = texts.last().expect("final quote");
        assert!(last.contains("*Total Price: $115*"));
        assert_eq!(h.store.get(&sample_user().user_id).await, Session::Idle);
    }

    #[tokio::test]
    async fn documents_are_stored_with_their_link() {
        let h = harness(RecordingTransport::default());

        h.service
            .handle(update(
                3,
                IncomingKind::Document {
                    file_id: "BQACAgI".to_owned(),
                    file_name: Some("brief.pdf".to_owned()),
                },
            ))
            .await;

        let stored = h.requests.list_recent(5).await.expect("list");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].file_url.as_deref(), Some("https://files.example/BQACAgI"));
        assert!(stored[0].is_file_only());
    }

    #[tokio::test]
    async fn unresolvable_document_gets_restart_hint_without_state_change() {
        let h = harness(RecordingTransport::with_broken_files());

        h.service.handle(tap(1, "pricing")).await;
        h.service
            .handle(update(2, IncomingKind::Document { file_id: "gone".to_owned(), file_name: None }))
            .await;

        assert_eq!(h.transport.texts().await.last().map(String::as_str), Some(RESTART_HINT_TEXT));
        assert_eq!(h.requests.count().await.expect("count"), 0);
        assert_eq!(h.store.get(&sample_user().user_id).await, Session::AwaitingPricingSelection);
    }
}
