//! Sending one chunk, with a plain-text retry when the transport rejects
//! its markup.

use {
    tgrelay_channels::{ChannelOutbound, Markup},
    tgrelay_common::ConversationId,
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use tgrelay_metrics::{counter, relay as relay_metrics};

use crate::formatter::Formatter;

/// How a chunk reached the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivered {
    Formatted,
    /// The formatted payload was refused and the raw chunk went out as plain text.
    Plain,
}

/// Send one chunk, formatted first and as raw plain text if the transport
/// refuses the markup. Any other failure, or a failed plain send, is returned.
pub async fn deliver(
    outbound: &dyn ChannelOutbound,
    formatter: &dyn Formatter,
    to: &ConversationId,
    chunk: &str,
) -> tgrelay_channels::Result<Delivered> {
    let formatted = formatter.format(Some(chunk));
    let markup = formatter.markup();

    match outbound.send(to, &formatted, markup).await {
        Ok(()) => Ok(Delivered::Formatted),
        Err(e) if e.is_markup_rejection() && markup != Markup::Plain => {
            warn!(
                conversation_id = %to,
                ?markup,
                error = %e,
                "formatted send rejected, retrying as plain text"
            );
            #[cfg(feature = "metrics")]
            counter!(relay_metrics::FALLBACK_SENDS_TOTAL).increment(1);

            outbound.send(to, chunk, Markup::Plain).await?;
            debug!(conversation_id = %to, "chunk sent as plain text");
            Ok(Delivered::Plain)
        },
        Err(e) => Err(e),
    }
}
