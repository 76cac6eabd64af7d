use async_trait::async_trait;
use std::path::PathBuf;

use crate::audio::error::PlayerResult;

/// What the user asked to play, before resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRef {
    /// A URL or a free-text search query.
    Remote(String),
    /// A file on the bot's host (soundboard clips).
    Local(PathBuf),
}

/// Directly streamable locator plus a display title.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMedia {
    pub locator: String,
    pub title: String,
}

/// Turns a URL or search query into something ffmpeg can open.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, query: &str) -> PlayerResult<ResolvedMedia>;
}
