use async_trait::async_trait;
use echomint_feed::{FeedError, FeedResult, PollSource};
use echomint_types::{Block, Height};
use std::io::ErrorKind;
use std::path::PathBuf;

/// A poll source over a directory of `<height>.json` block files, as
/// written by an upstream block exporter. Network transports implement the
/// same [`PollSource`]/push contracts externally.
pub struct JsonDirSource {
    name: String,
    dir: PathBuf,
}

impl JsonDirSource {
    pub fn new(dir: PathBuf) -> Self {
        Self { name: format!("dir:{}", dir.display()), dir }
    }
}

#[async_trait]
impl PollSource for JsonDirSource {
    fn ident(&self) -> &str {
        &self.name
    }

    async fn fetch_block_at(&self, height: Height) -> FeedResult<Option<Block>> {
        let path = self.dir.join(format!("{height}.json"));
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(FeedError::source(&self.name, err)),
        };
        let block: Block = serde_json::from_slice(&raw).map_err(|err| FeedError::source(&self.name, err))?;
        if block.height() != height {
            return Err(FeedError::source(&self.name, format!("{} carries height {}", path.display(), block.height())));
        }
        Ok(Some(block))
    }
}
