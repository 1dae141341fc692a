//! Turnstile - Join-Request Admission Bot
//!
//! A Telegram bot that gates group admission on membership in a configured
//! set of channels.
//!
//! Key principles:
//! - Fail closed: a channel that cannot be verified counts as unsatisfied
//! - Never approve speculatively: an approval cannot be retracted, so an
//!   unsatisfied request is declined before the user is prompted
//! - No automatic retries: failures are surfaced to owners, not replayed

pub mod bot;
pub mod chat;
pub mod engine;
pub mod owner;
pub mod store;
