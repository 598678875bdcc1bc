pub mod engine;
pub mod states;
pub mod store;

pub use engine::{transition, SessionMachine};
pub use states::{
    InboundEvent, MenuSelection, OutboundAction, QuoteProgress, RequestPayload, Session,
    TransitionOutcome,
};
pub use store::{InMemorySessionStore, SessionStore};
