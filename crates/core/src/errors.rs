use thiserror::Error;

/// A catalog that breaks the conversation's invariants.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid quote script: {0}")]
    InvalidQuoteScript(String),
}

/// A failed operator action, tagged with the collaborator at fault.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    /// The reason is shown to the caller verbatim.
    #[error("rejected input: {0}")]
    InvalidInput(&'static str),
    #[error("request storage failed: {0}")]
    Storage(String),
    #[error("message delivery failed: {0}")]
    Delivery(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureClass {
    /// The caller sent something unusable.
    Rejected,
    /// Retrying later may succeed.
    Unavailable,
    Failed,
}

/// What an HTTP caller gets to see. Collaborator detail stays in the logs.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{class:?} [{correlation_id}]: {public_message}")]
pub struct InterfaceError {
    pub class: FailureClass,
    pub public_message: String,
    pub correlation_id: String,
}

impl ApplicationError {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::InvalidInput(_) => FailureClass::Rejected,
            Self::Storage(_) => FailureClass::Unavailable,
            Self::Delivery(_) => FailureClass::Failed,
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let class = self.class();
        let public_message = match self {
            Self::InvalidInput(reason) => reason.to_owned(),
            Self::Storage(_) => "Stored requests are temporarily unavailable".to_owned(),
            Self::Delivery(_) => "Failed to send message".to_owned(),
        };
        InterfaceError { class, public_message, correlation_id: correlation_id.into() }
    }
}
