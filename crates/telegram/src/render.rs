use botdesk_core::catalog::pricing::{PriceEntry, QuoteBreakdown};
use botdesk_core::catalog::script::QuoteQuestion;
use botdesk_core::domain::service::ServiceKind;
use botdesk_core::flows::states::{MenuSelection, OutboundAction};

use crate::types::{InlineKeyboardButton, InlineKeyboardMarkup};

pub const WELCOME_TEXT: &str = "🚀 *Welcome to the Bot Development Service!*\n\n\
                                What kind of bot are you looking for? Select an option below:";
pub const CONTACT_TEXT: &str = "📩 *Contact us:* @yourusername or email@example.com";
pub const UNKNOWN_COMMAND_TEXT: &str = "I didn't understand that. Use /start to begin.";
pub const RESTART_HINT_TEXT: &str = "Sorry, something went wrong. Please start again with /start";
pub const FILE_ACK_TEXT: &str = "📎 File received! We will review it.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseMode {
    Markdown,
}

impl ParseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "Markdown",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageTemplate {
    pub text: String,
    pub parse_mode: Option<ParseMode>,
    pub keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl MessageTemplate {
    pub fn plain(text: impl Into<String>) -> Self {
        MessageBuilder::new().line(text).build()
    }

    pub fn reply_markup(&self) -> Option<InlineKeyboardMarkup> {
        (!self.keyboard.is_empty())
            .then(|| InlineKeyboardMarkup { inline_keyboard: self.keyboard.clone() })
    }

    pub fn callback_tokens(&self) -> Vec<&str> {
        self.keyboard.iter().flatten().map(|button| button.callback_data.as_str()).collect()
    }
}

#[derive(Default)]
pub struct MessageBuilder {
    lines: Vec<String>,
    parse_mode: Option<ParseMode>,
    keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn markdown(mut self) -> Self {
        self.parse_mode = Some(ParseMode::Markdown);
        self
    }

    pub fn line(mut self, text: impl Into<String>) -> Self {
        self.lines.push(text.into());
        self
    }

    pub fn row<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut RowBuilder),
    {
        let mut builder = RowBuilder::default();
        build(&mut builder);
        if !builder.buttons.is_empty() {
            self.keyboard.push(builder.buttons);
        }
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate {
            text: self.lines.join("\n"),
            parse_mode: self.parse_mode,
            keyboard: self.keyboard,
        }
    }
}

#[derive(Default)]
pub struct RowBuilder {
    buttons: Vec<InlineKeyboardButton>,
}

impl RowBuilder {
    pub fn button(&mut self, label: impl Into<String>, token: impl Into<String>) -> &mut Self {
        self.buttons.push(InlineKeyboardButton { text: label.into(), callback_data: token.into() });
        self
    }
}

pub fn main_menu_message() -> MessageTemplate {
    MessageBuilder::new()
        .markdown()
        .line(WELCOME_TEXT)
        .row(|row| {
            row.button("🤖 Custom Bots", ServiceKind::CustomBots.token())
                .button("🔄 Automation", ServiceKind::Automation.token());
        })
        .row(|row| {
            row.button("📊 API Integration", ServiceKind::ApiIntegration.token())
                .button("📝 Request a Bot", MenuSelection::REQUEST_BOT);
        })
        .row(|row| {
            row.button("💰 Get Pricing", MenuSelection::PRICING)
                .button("🧮 Interactive Quote", MenuSelection::QUOTE_BUILDER);
        })
        .row(|row| {
            row.button("💬 Contact Us", MenuSelection::CONTACT);
        })
        .build()
}

pub fn pricing_menu_message(entries: &[PriceEntry]) -> MessageTemplate {
    let mut builder = MessageBuilder::new()
        .markdown()
        .line("💰 *Pricing Calculator*")
        .line("Choose features for your bot (comma-separated):");
    for entry in entries {
        builder = builder.line(format!("- `{}` ({})", entry.feature, entry.price_label()));
    }
    builder.build()
}

pub fn details_prompt_message(service: Option<ServiceKind>) -> MessageTemplate {
    let prompt = match service {
        Some(ServiceKind::CustomBots) => {
            "What type of custom bot do you need? Please describe your requirements."
        }
        Some(ServiceKind::Automation) => {
            "What process do you need to automate? Please provide some details."
        }
        Some(ServiceKind::ApiIntegration) => {
            "Which API(s) do you need to integrate with? Please specify."
        }
        None => "📝 *Please describe your bot requirements in detail.*",
    };
    MessageBuilder::new().markdown().line(prompt).build()
}

pub fn question_message(index: usize, total: usize, question: &QuoteQuestion) -> MessageTemplate {
    let mut builder = MessageBuilder::new()
        .markdown()
        .line(format!("*Question {}/{}*", index + 1, total))
        .line("")
        .line(question.prompt.clone());
    for option in &question.options {
        builder = builder.row(|row| {
            row.button(option.label.clone(), option.answer_token());
        });
    }
    builder.build()
}

pub fn quote_message(total: u64) -> MessageTemplate {
    MessageBuilder::new().markdown().line(format!("💰 Estimated Price: *${total}*")).build()
}

pub fn final_quote_message(breakdown: &QuoteBreakdown) -> MessageTemplate {
    let mut builder = MessageBuilder::new()
        .markdown()
        .line("💰 *Your Custom Quote*")
        .line("")
        .line("Selected Features:");
    for line in &breakdown.lines {
        builder = builder.line(format!("- {}: ${}", line.feature.display_name(), line.price));
    }
    builder
        .line("")
        .line(format!("*Total Price: ${}*", breakdown.total))
        .line("")
        .line("Would you like to proceed with this quote?")
        .row(|row| {
            row.button("✅ Request This Bot", MenuSelection::REQUEST_BOT)
                .button("🔄 Start Over", MenuSelection::QUOTE_BUILDER);
        })
        .row(|row| {
            row.button("🏠 Back to Main Menu", MenuSelection::MAIN_MENU);
        })
        .build()
}

pub fn confirmation_message(service: Option<ServiceKind>) -> MessageTemplate {
    let text = match service {
        Some(_) => "✅ Thank you! We have received your request and will get back to you soon.",
        None => {
            "✅ Your request has been submitted! You can also upload files related to your project."
        }
    };
    MessageTemplate::plain(text)
}

/// Renders the user-facing message for an action. Side-effect actions render nothing.
pub fn render_action(action: &OutboundAction) -> Option<MessageTemplate> {
    let message = match action {
        OutboundAction::ShowMainMenu => main_menu_message(),
        OutboundAction::ShowContactInfo => MessageBuilder::new().markdown().line(CONTACT_TEXT).build(),
        OutboundAction::ShowPricingMenu { entries } => pricing_menu_message(entries),
        OutboundAction::PromptForDetails { service } => details_prompt_message(*service),
        OutboundAction::AskQuestion { index, total, question } => {
            question_message(*index, *total, question)
        }
        OutboundAction::SendQuote { total } => quote_message(*total),
        OutboundAction::SendFinalQuote { breakdown } => final_quote_message(breakdown),
        OutboundAction::SendConfirmation { service } => confirmation_message(*service),
        OutboundAction::SendFileAck => MessageTemplate::plain(FILE_ACK_TEXT),
        OutboundAction::SendUnknownCommandHint => MessageTemplate::plain(UNKNOWN_COMMAND_TEXT),
        OutboundAction::SendRestartHint => MessageTemplate::plain(RESTART_HINT_TEXT),
        OutboundAction::PersistRequest(_) | OutboundAction::Notify { .. } => return None,
    };
    Some(message)
}
