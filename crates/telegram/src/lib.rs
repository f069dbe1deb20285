//! Telegram transport for the relay, built on teloxide.
//!
//! [`bot::start_polling`] long-polls the Bot API and feeds each update to the
//! dispatcher; [`TelegramOutbound`] delivers replies.

pub mod bot;
pub mod error;
pub mod handlers;
pub mod outbound;

pub use {
    bot::{PollExit, Polling, build_bot, start_polling},
    error::{Error, Result},
    outbound::TelegramOutbound,
};

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_support;
