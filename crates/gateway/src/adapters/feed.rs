//! Raw message sources
//!
//! A `FeedSource` yields raw exchange text one message at a time. Network
//! connections, reconnect and backoff live behind this trait; everything
//! past it is synchronous.

use crate::error::FeedError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

#[async_trait]
pub trait FeedSource: Send {
    /// Next raw message, or `None` once the source is exhausted
    async fn next_message(&mut self) -> Result<Option<String>, FeedError>;
}

/// Replays a recorded session stored as one JSON message per line
pub struct ReplayFeed {
    lines: Lines<BufReader<File>>,
}

impl ReplayFeed {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, FeedError> {
        let file = File::open(path.as_ref()).await?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
        })
    }
}

#[async_trait]
impl FeedSource for ReplayFeed {
    async fn next_message(&mut self) -> Result<Option<String>, FeedError> {
        while let Some(line) = self.lines.next_line().await? {
            let line = line.trim();
            if !line.is_empty() {
                return Ok(Some(line.to_string()));
            }
        }
        Ok(None)
    }
}

/// In-memory source, mostly for tests and fixtures
#[derive(Debug, Default)]
pub struct MemoryFeed {
    messages: VecDeque<String>,
}

impl MemoryFeed {
    pub fn new<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            messages: messages.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[async_trait]
impl FeedSource for MemoryFeed {
    async fn next_message(&mut self) -> Result<Option<String>, FeedError> {
        Ok(self.messages.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_feed_drains_in_order() {
        let mut feed = MemoryFeed::new(["a", "b"]);
        assert_eq!(feed.len(), 2);
        assert_eq!(feed.next_message().await.unwrap().as_deref(), Some("a"));
        assert_eq!(feed.next_message().await.unwrap().as_deref(), Some("b"));
        assert_eq!(feed.next_message().await.unwrap(), None);
        assert!(feed.is_empty());
    }

    #[tokio::test]
    async fn test_replay_feed_skips_blank_lines() {
        let path = std::env::temp_dir().join(format!("argus-replay-{}.jsonl", std::process::id()));
        tokio::fs::write(&path, "{\"a\":1}\n\n  \n{\"b\":2}\n")
            .await
            .unwrap();

        let mut feed = ReplayFeed::open(&path).await.unwrap();
        assert_eq!(feed.next_message().await.unwrap().as_deref(), Some("{\"a\":1}"));
        assert_eq!(feed.next_message().await.unwrap().as_deref(), Some("{\"b\":2}"));
        assert_eq!(feed.next_message().await.unwrap(), None);

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_replay_missing_file() {
        let result = ReplayFeed::open("/definitely/not/here.jsonl").await;
        assert!(matches!(result, Err(FeedError::Io(_))));
    }
}
