//! Telegram Integration - long-polling bot interface
//!
//! This crate provides the Telegram interface for botdesk:
//! - **Client** (`client`) - Bot API calls (`getUpdates`, `sendMessage`, `getFile`)
//! - **Polling** (`polling`) - Long-poll loop with reconnection and per-user queues
//! - **Events** (`events`) - Updates reduced to text, button taps, and documents
//! - **Rendering** (`render`) - Menus, prompts, and quotes as inline-keyboard messages
//!
//! # Getting Started
//!
//! 1. Create a bot with @BotFather and copy its token
//! 2. Set `BOTDESK_TELEGRAM_BOT_TOKEN` (or `TELEGRAM_BOT_TOKEN`)
//! 3. Run `botdesk-server`
//!
//! # Architecture
//!
//! ```text
//! getUpdates → PollingRunner → UserQueues → ConversationService → SessionMachine
//!                                                   ↓
//!                     sendMessage ← ActionDispatcher → RequestRepository / Notifier
//! ```
//!
//! # Key Types
//!
//! - `PollingRunner` - Update loop with reconnection logic
//! - `ConversationService` - Maps one update to a session event and performs the result
//! - `ChatTransport` - Outbound seam; `TelegramClient` implements it
//! - `MessageBuilder` - Constructs inline-keyboard messages

pub mod client;
pub mod dispatch;
pub mod events;
pub mod polling;
pub mod render;
pub mod service;
pub mod types;

#[cfg(test)]
mod testing;

pub use client::{ChatTransport, TelegramClient, TransportError};
pub use dispatch::{ActionDispatcher, DispatchReport};
pub use polling::{PollingRunner, ReconnectPolicy, TelegramUpdateSource, UpdateSource};
pub use service::ConversationService;
