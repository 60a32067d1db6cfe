/// Configuration and startup errors.
///
/// All variants are reported before any virtual user is spawned; a run that
/// has started only ever finishes with a [`RunResult`](crate::RunResult).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("at least one stage is required")]
    NoStages,

    #[error("at least one page is required for a page rotation")]
    NoPages,

    #[error("invalid threshold `{expr}` on `{metric}`: {reason}")]
    InvalidThreshold {
        metric: String,
        expr: String,
        reason: String,
    },

    #[error("invalid duration `{input}`: {source}")]
    InvalidDuration {
        input: String,
        source: humantime::DurationError,
    },

    #[cfg(feature = "http")]
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
