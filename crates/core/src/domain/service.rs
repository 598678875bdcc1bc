use std::fmt;

use serde::{Deserialize, Serialize};

/// Service a free-text request is about. `request_bot` carries no service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    CustomBots,
    Automation,
    ApiIntegration,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 3] =
        [ServiceKind::CustomBots, ServiceKind::Automation, ServiceKind::ApiIntegration];

    pub fn token(self) -> &'static str {
        match self {
            Self::CustomBots => "custom_bots",
            Self::Automation => "automation",
            Self::ApiIntegration => "api_integration",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.token() == token)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::CustomBots => "Custom Bots",
            Self::Automation => "Automation",
            Self::ApiIntegration => "API Integration",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[cfg(test)]
mod tests {
    use super::ServiceKind;

    #[test]
    fn tokens_resolve_back_to_their_kind() {
        for kind in ServiceKind::ALL {
            assert_eq!(ServiceKind::from_token(kind.token()), Some(kind));
        }
        assert_eq!(ServiceKind::from_token("request_bot"), None);
    }
}
