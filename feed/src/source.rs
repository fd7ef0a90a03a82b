use crate::errors::FeedResult;
use async_trait::async_trait;
use echomint_types::{Block, Height};

/// One block travelling through the feed, tagged with the source that
/// delivered it (for logs and health bookkeeping)
#[derive(Clone, Debug)]
pub struct FeedItem {
    pub block: Block,
    pub source: String,
}

/// A pull-based upstream: the feed periodically asks it for the block at the
/// next expected height
#[async_trait]
pub trait PollSource: Send + Sync {
    fn ident(&self) -> &str;

    /// `Ok(None)` means the height is not available upstream yet (the feed
    /// is at or past this source's tip); errors count against the source's
    /// health
    async fn fetch_block_at(&self, height: Height) -> FeedResult<Option<Block>>;
}

/// A push-based upstream: delivers blocks as the network produces them.
/// The feed re-establishes the stream (with backoff) when it ends.
#[async_trait]
pub trait PushSource: Send + Sync {
    fn ident(&self) -> &str;

    async fn subscribe(&self) -> FeedResult<async_channel::Receiver<Block>>;
}
