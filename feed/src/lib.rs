mod aggregate;
mod errors;
mod source;

pub use aggregate::{AggregateBlockFeed, FeedConfig};
pub use errors::{FeedError, FeedResult};
pub use source::{FeedItem, PollSource, PushSource};
