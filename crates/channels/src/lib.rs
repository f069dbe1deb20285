//! Transport seam between the relay pipeline and a chat protocol.
//!
//! A transport turns its native updates into [`Inbound`] values and delivers
//! replies through [`ChannelOutbound`].

pub mod error;
pub mod inbound;
pub mod outbound;

pub use {
    error::{Error, Result},
    inbound::Inbound,
    outbound::{ChannelOutbound, Markup},
};
