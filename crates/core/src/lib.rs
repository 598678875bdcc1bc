pub mod audit;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod notify;

pub use catalog::pricing::{compute_total, price_breakdown, PriceEntry, PricingTable, QuoteBreakdown};
pub use catalog::script::{QuoteOption, QuoteQuestion, QuoteScript};
pub use catalog::Catalog;
pub use domain::feature::{parse_feature_list, FeatureId};
pub use domain::request::{FileReference, RequestId, SubmittedRequest};
pub use domain::service::ServiceKind;
pub use domain::user::{ChatId, UserContext, UserId};
pub use errors::{ApplicationError, DomainError, FailureClass, InterfaceError};
pub use flows::{
    InMemorySessionStore, InboundEvent, OutboundAction, Session, SessionMachine, SessionStore,
    TransitionOutcome,
};
pub use notify::{InMemoryNotifier, LogNotifier, Notification, Notifier, NotifyError};
