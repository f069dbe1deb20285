use std::error::Error as StdError;

/// Crate-wide result type for channel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed send errors. [`Error::Markup`] is the only recoverable one: the
/// payload was refused for its formatting and may be resent as plain text.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transport refused the markup (unparseable entities, or the
    /// formatted text grew past the size limit).
    #[error("markup rejected: {message}")]
    Markup { message: String },

    /// Input payload or parameter is invalid.
    #[error("invalid channel input: {message}")]
    InvalidInput { message: String },

    /// Wrapped source error from an external dependency.
    #[error("channel operation failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn markup(message: impl std::fmt::Display) -> Self {
        Self::Markup {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether resending the raw text without markup may succeed.
    #[must_use]
    pub fn is_markup_rejection(&self) -> bool {
        matches!(self, Self::Markup { .. })
    }
}

impl From<tgrelay_common::Error> for Error {
    fn from(err: tgrelay_common::Error) -> Self {
        Self::invalid_input(err)
    }
}
