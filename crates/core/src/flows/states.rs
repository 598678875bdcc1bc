use serde::{Deserialize, Serialize};

use crate::catalog::pricing::{PriceEntry, QuoteBreakdown};
use crate::catalog::script::{QuoteQuestion, QUOTE_ANSWER_PREFIX};
use crate::domain::feature::{parse_feature_list, FeatureId};
use crate::domain::request::FileReference;
use crate::domain::service::ServiceKind;

/// Answers collected so far. `question_index` is the question awaiting an answer.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuoteProgress {
    pub question_index: usize,
    pub selected_features: Vec<FeatureId>,
}

impl QuoteProgress {
    pub fn start() -> Self {
        Self::default()
    }

    /// Appends features not selected yet, keeping first-seen order.
    pub fn merge<I>(&mut self, features: I)
    where
        I: IntoIterator<Item = FeatureId>,
    {
        for feature in features {
            if !self.selected_features.contains(&feature) {
                self.selected_features.push(feature);
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Session {
    #[default]
    Idle,
    AwaitingFreeTextRequest {
        service: Option<ServiceKind>,
    },
    AwaitingPricingSelection,
    InQuoteBuilder(QuoteProgress),
}

impl Session {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingFreeTextRequest { .. } => "awaiting_free_text_request",
            Self::AwaitingPricingSelection => "awaiting_pricing_selection",
            Self::InQuoteBuilder(_) => "in_quote_builder",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InboundEvent {
    StartCommand,
    MenuSelect(String),
    FreeText(String),
    FileUpload(FileReference),
}

impl InboundEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StartCommand => "start_command",
            Self::MenuSelect(_) => "menu_select",
            Self::FreeText(_) => "free_text",
            Self::FileUpload(_) => "file_upload",
        }
    }
}

/// A button payload after classification. Exact tokens win over the answer prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MenuSelection {
    MainMenu,
    Pricing,
    QuoteBuilder,
    Contact,
    RequestBot,
    Service(ServiceKind),
    QuoteAnswer(Vec<FeatureId>),
    Unknown(String),
}

impl MenuSelection {
    pub const MAIN_MENU: &'static str = "main_menu";
    pub const PRICING: &'static str = "pricing";
    pub const QUOTE_BUILDER: &'static str = "quote_builder";
    pub const CONTACT: &'static str = "contact";
    pub const REQUEST_BOT: &'static str = "request_bot";

    pub fn parse(token: &str) -> Self {
        match token {
            Self::MAIN_MENU => Self::MainMenu,
            Self::PRICING => Self::Pricing,
            Self::QUOTE_BUILDER => Self::QuoteBuilder,
            Self::CONTACT => Self::Contact,
            Self::REQUEST_BOT => Self::RequestBot,
            other => {
                if let Some(service) = ServiceKind::from_token(other) {
                    Self::Service(service)
                } else if let Some(csv) = other.strip_prefix(QUOTE_ANSWER_PREFIX) {
                    Self::QuoteAnswer(parse_feature_list(csv))
                } else {
                    Self::Unknown(other.to_owned())
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPayload {
    pub service: Option<ServiceKind>,
    pub free_text: Option<String>,
    pub file_reference: Option<FileReference>,
}

/// Intent emitted by the session machine. Collaborators perform the I/O.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboundAction {
    ShowMainMenu,
    ShowContactInfo,
    ShowPricingMenu { entries: Vec<PriceEntry> },
    PromptForDetails { service: Option<ServiceKind> },
    AskQuestion { index: usize, total: usize, question: QuoteQuestion },
    SendQuote { total: u64 },
    SendFinalQuote { breakdown: QuoteBreakdown },
    SendConfirmation { service: Option<ServiceKind> },
    SendFileAck,
    SendUnknownCommandHint,
    SendRestartHint,
    PersistRequest(RequestPayload),
    Notify { service: Option<ServiceKind>, free_text: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: Session,
    pub to: Session,
    pub event: InboundEvent,
    pub actions: Vec<OutboundAction>,
}

impl TransitionOutcome {
    pub fn session_changed(&self) -> bool {
        self.from != self.to
    }
}

#[cfg(test)]
mod tests {
    use super::{MenuSelection, QuoteProgress};
    use crate::domain::feature::FeatureId;
    use crate::domain::service::ServiceKind;

    #[test]
    fn exact_tokens_are_matched_before_answer_prefix() {
        assert_eq!(MenuSelection::parse("quote_builder"), MenuSelection::QuoteBuilder);
        assert_eq!(
            MenuSelection::parse("api_integration"),
            MenuSelection::Service(ServiceKind::ApiIntegration)
        );
        assert_eq!(MenuSelection::parse("quote_"), MenuSelection::QuoteAnswer(Vec::new()));
        assert_eq!(
            MenuSelection::parse("quote_basic_bot,custom_ui"),
            MenuSelection::QuoteAnswer(vec![FeatureId::from("basic_bot"), FeatureId::from("custom_ui")])
        );
        assert_eq!(MenuSelection::parse("nope"), MenuSelection::Unknown("nope".to_owned()));
    }

    #[test]
    fn merge_keeps_first_seen_order_without_duplicates() {
        let mut progress = QuoteProgress::start();
        progress.merge(vec![FeatureId::from("basic_bot"), FeatureId::from("custom_ui")]);
        progress.merge(vec![FeatureId::from("custom_ui"), FeatureId::from("hosting")]);

        let names: Vec<&str> = progress.selected_features.iter().map(FeatureId::as_str).collect();
        assert_eq!(names, vec!["basic_bot", "custom_ui", "hosting"]);
    }
}
