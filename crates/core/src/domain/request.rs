use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::service::ServiceKind;
use crate::domain::user::{ChatId, UserContext, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(format!("REQ-{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Downloadable link to a file a user uploaded, already resolved by the transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference(pub String);

impl FileReference {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedRequest {
    pub id: RequestId,
    pub user_id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub chat_id: ChatId,
    pub service: Option<ServiceKind>,
    pub free_text: Option<String>,
    pub file_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SubmittedRequest {
    pub fn new(
        user: &UserContext,
        service: Option<ServiceKind>,
        free_text: Option<String>,
        file: Option<&FileReference>,
    ) -> Self {
        Self {
            id: RequestId::generate(),
            user_id: user.user_id.clone(),
            username: user.username_or_default().to_owned(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            chat_id: user.chat_id,
            service,
            free_text,
            file_url: file.map(|reference| reference.0.clone()),
            created_at: Utc::now(),
        }
    }

    pub fn is_file_only(&self) -> bool {
        self.free_text.is_none() && self.file_url.is_some()
    }
}
