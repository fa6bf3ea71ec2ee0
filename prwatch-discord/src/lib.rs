//! prwatch Discord - webhook notifications for merged pull requests
//!
//! Implements [`prwatch_core::Notifier`] by posting a rich embed per PR.

pub mod embed;
mod error;
mod notifier;

pub use error::{Error, Result};
pub use notifier::DiscordNotifier;
