use botdesk_core::domain::user::{ChatId, UserContext, UserId};

use crate::types::{Update, User};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncomingKind {
    Text(String),
    Callback { callback_query_id: String, data: String },
    Document { file_id: String, file_name: Option<String> },
}

impl IncomingKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Callback { .. } => "callback",
            Self::Document { .. } => "document",
        }
    }
}

/// A Telegram update reduced to what the conversation layer needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingUpdate {
    pub update_id: i64,
    pub user: UserContext,
    pub kind: IncomingKind,
}

impl IncomingUpdate {
    pub fn correlation_id(&self) -> String {
        format!("upd-{}", self.update_id)
    }
}

/// `/start`, any case, optionally addressed as `/start@botname`.
pub fn is_start_command(text: &str) -> bool {
    let command = text.split_whitespace().next().unwrap_or_default();
    let command = command.split('@').next().unwrap_or_default();
    command.eq_ignore_ascii_case("/start")
}

/// Returns `None` for updates from bots and for update types the bot ignores.
pub fn classify_update(update: &Update) -> Option<IncomingUpdate> {
    if let Some(query) = &update.callback_query {
        if query.from.is_bot {
            return None;
        }
        let chat_id = query.message.as_ref().map(|message| message.chat.id).unwrap_or(query.from.id);
        return Some(IncomingUpdate {
            update_id: update.update_id,
            user: user_context(&query.from, chat_id),
            kind: IncomingKind::Callback {
                callback_query_id: query.id.clone(),
                data: query.data.clone().unwrap_or_default(),
            },
        });
    }

    let message = update.message.as_ref()?;
    let from = message.from.as_ref().filter(|user| !user.is_bot)?;
    let kind = if let Some(document) = &message.document {
        IncomingKind::Document {
            file_id: document.file_id.clone(),
            file_name: document.file_name.clone(),
        }
    } else {
        IncomingKind::Text(message.text.clone()?)
    };

    Some(IncomingUpdate { update_id: update.update_id, user: user_context(from, message.chat.id), kind })
}

fn user_context(user: &User, chat_id: i64) -> UserContext {
    UserContext {
        user_id: UserId(user.id.to_string()),
        chat_id: ChatId(chat_id),
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
    }
}
