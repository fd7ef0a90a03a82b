use echomint_types::Height;
use thiserror::Error;

/// Feed failures. A single source failing is recoverable and handled
/// internally by failover; only `SubscriptionFailed` and
/// `AllSourcesExhausted` reach the consumer, and both are fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("block feed subscription failed: {0}")]
    SubscriptionFailed(String),

    #[error("all block sources are unhealthy, next expected height was {0}")]
    AllSourcesExhausted(Height),

    #[error("source {name} failed: {reason}")]
    Source { name: String, reason: String },
}

pub type FeedResult<T> = std::result::Result<T, FeedError>;

impl FeedError {
    pub fn source(ident: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Source { name: ident.into(), reason: reason.to_string() }
    }
}
