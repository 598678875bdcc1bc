use std::sync::Arc;

use tracing::{debug, info};

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::catalog::pricing::{compute_total, price_breakdown};
use crate::catalog::Catalog;
use crate::domain::feature::{parse_feature_list, FeatureId};
use crate::domain::service::ServiceKind;
use crate::domain::user::UserId;
use crate::flows::states::{
    InboundEvent, MenuSelection, OutboundAction, QuoteProgress, RequestPayload, Session,
    TransitionOutcome,
};
use crate::flows::store::SessionStore;

/// Applies one event to a session. Pure: no store access and no I/O.
pub fn transition(catalog: &Catalog, current: &Session, event: &InboundEvent) -> TransitionOutcome {
    let (to, actions) = match (current, event) {
        (Session::AwaitingPricingSelection, InboundEvent::FreeText(text)) => {
            let features = parse_feature_list(text);
            let total = compute_total(&features, &catalog.pricing);
            (Session::Idle, vec![OutboundAction::SendQuote { total }])
        }
        (Session::AwaitingFreeTextRequest { service }, InboundEvent::FreeText(text)) => (
            Session::Idle,
            vec![
                OutboundAction::PersistRequest(RequestPayload {
                    service: *service,
                    free_text: Some(text.clone()),
                    file_reference: None,
                }),
                OutboundAction::Notify { service: *service, free_text: text.clone() },
                OutboundAction::SendConfirmation { service: *service },
            ],
        ),
        (_, InboundEvent::MenuSelect(token)) => select(catalog, current, token),
        (_, InboundEvent::StartCommand) => (Session::Idle, vec![OutboundAction::ShowMainMenu]),
        (_, InboundEvent::FileUpload(reference)) => (
            current.clone(),
            vec![
                OutboundAction::PersistRequest(RequestPayload {
                    service: None,
                    free_text: None,
                    file_reference: Some(reference.clone()),
                }),
                OutboundAction::SendFileAck,
            ],
        ),
        (_, InboundEvent::FreeText(_)) => {
            (current.clone(), vec![OutboundAction::SendUnknownCommandHint])
        }
    };

    TransitionOutcome { from: current.clone(), to, event: event.clone(), actions }
}

fn select(catalog: &Catalog, current: &Session, token: &str) -> (Session, Vec<OutboundAction>) {
    match MenuSelection::parse(token) {
        MenuSelection::QuoteAnswer(features) => match current {
            Session::InQuoteBuilder(progress) => answer_question(catalog, progress, features),
            _ => (Session::Idle, vec![OutboundAction::SendRestartHint]),
        },
        MenuSelection::RequestBot => prompt_for_details(None),
        MenuSelection::Service(service) => prompt_for_details(Some(service)),
        MenuSelection::Pricing => (
            Session::AwaitingPricingSelection,
            vec![OutboundAction::ShowPricingMenu { entries: catalog.pricing.entries().to_vec() }],
        ),
        MenuSelection::QuoteBuilder => ask(catalog, QuoteProgress::start()),
        MenuSelection::MainMenu => (Session::Idle, vec![OutboundAction::ShowMainMenu]),
        MenuSelection::Contact => (current.clone(), vec![OutboundAction::ShowContactInfo]),
        MenuSelection::Unknown(_) => (current.clone(), vec![OutboundAction::SendUnknownCommandHint]),
    }
}

fn prompt_for_details(service: Option<ServiceKind>) -> (Session, Vec<OutboundAction>) {
    (
        Session::AwaitingFreeTextRequest { service },
        vec![OutboundAction::PromptForDetails { service }],
    )
}

fn answer_question(
    catalog: &Catalog,
    progress: &QuoteProgress,
    features: Vec<FeatureId>,
) -> (Session, Vec<OutboundAction>) {
    if progress.question_index >= catalog.script.len() {
        return (Session::Idle, vec![OutboundAction::SendRestartHint]);
    }

    let mut next = progress.clone();
    next.merge(features);
    next.question_index += 1;

    if next.question_index < catalog.script.len() {
        ask(catalog, next)
    } else {
        let breakdown = price_breakdown(&next.selected_features, &catalog.pricing);
        (Session::Idle, vec![OutboundAction::SendFinalQuote { breakdown }])
    }
}

fn ask(catalog: &Catalog, progress: QuoteProgress) -> (Session, Vec<OutboundAction>) {
    match catalog.script.question(progress.question_index) {
        Some(question) => {
            let action = OutboundAction::AskQuestion {
                index: progress.question_index,
                total: catalog.script.len(),
                question: question.clone(),
            };
            (Session::InQuoteBuilder(progress), vec![action])
        }
        None => (Session::Idle, vec![OutboundAction::SendRestartHint]),
    }
}

/// Loads the caller's session, applies the event, and stores the result.
///
/// Callers must serialize events per user; the machine itself holds no lock
/// across the load/store pair.
pub struct SessionMachine {
    catalog: Arc<Catalog>,
    store: Arc<dyn SessionStore>,
}

impl SessionMachine {
    pub fn new(catalog: Arc<Catalog>, store: Arc<dyn SessionStore>) -> Self {
        Self { catalog, store }
    }

    pub async fn handle_event(&self, user: &UserId, event: InboundEvent) -> TransitionOutcome {
        let current = self.store.get(user).await;
        let outcome = transition(&self.catalog, &current, &event);

        if outcome.session_changed() {
            if outcome.to.is_idle() {
                self.store.clear(user).await;
            } else {
                self.store.set(user, outcome.to.clone()).await;
            }
            info!(
                event_name = "session.transition_applied",
                user_id = %user,
                event = outcome.event.kind(),
                from = outcome.from.name(),
                to = outcome.to.name(),
                "session transition applied"
            );
        } else {
            debug!(
                event_name = "session.unchanged",
                user_id = %user,
                event = outcome.event.kind(),
                state = outcome.to.name(),
                actions = outcome.actions.len(),
                "event handled without session change"
            );
        }

        outcome
    }

    pub async fn handle_event_with_audit<A>(
        &self,
        user: &UserId,
        event: InboundEvent,
        sink: &A,
        audit: &AuditContext,
    ) -> TransitionOutcome
    where
        A: AuditSink + ?Sized,
    {
        let outcome = self.handle_event(user, event).await;
        sink.emit(
            AuditEvent::new(
                audit.user_id.clone(),
                audit.chat_id,
                audit.correlation_id.clone(),
                "session.transition_applied",
                AuditCategory::Session,
                audit.actor.clone(),
                AuditOutcome::Success,
            )
            .with_metadata("from", format!("{:?}", outcome.from))
            .with_metadata("to", format!("{:?}", outcome.to))
            .with_metadata("event", format!("{:?}", outcome.event)),
        );
        outcome
    }
}
