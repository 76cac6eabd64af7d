use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::resolver::{MediaResolver, ResolvedMedia};
use crate::audio::error::{PlayerError, PlayerResult};

/// Resolver backed by the `yt-dlp` binary.
pub struct YtDlpResolver {
    ytdlp_path: PathBuf,
    // Limit concurrent extractions to avoid rate limiting
    rate_limiter: Semaphore,
}

/// Subset of `yt-dlp --dump-json` we care about.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    is_live: Option<bool>,
}

impl YtDlpResolver {
    pub fn new(ytdlp_path: impl Into<PathBuf>) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
            rate_limiter: Semaphore::new(3),
        }
    }

    /// URLs are passed through; anything else becomes a single-result search.
    pub fn target_for(query: &str) -> String {
        if is_http_url(query) {
            query.to_string()
        } else {
            format!("ytsearch1:{}", query)
        }
    }

    fn parse_info(stdout: &str) -> PlayerResult<ResolvedMedia> {
        let line = stdout
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| PlayerError::ResolutionFailed("no results".to_string()))?;

        let info: YtDlpInfo = serde_json::from_str(line)
            .map_err(|e| PlayerError::ResolutionFailed(format!("bad yt-dlp output: {e}")))?;

        let locator = info
            .url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| PlayerError::ResolutionFailed("no streamable format".to_string()))?;

        if info.is_live.unwrap_or(false) {
            debug!("🔴 Resolved a live stream: {:?}", info.webpage_url);
        }

        Ok(ResolvedMedia {
            locator,
            title: info
                .title
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| "Unknown Title".to_string()),
        })
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> PlayerResult<ResolvedMedia> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| PlayerError::ResolutionFailed(e.to_string()))?;

        let target = Self::target_for(query);
        info!("🔍 Resolving: {}", target);

        let output = Command::new(&self.ytdlp_path)
            .args([
                "--no-playlist",
                "--format",
                "bestaudio/best",
                "--dump-json",
                "--skip-download",
                "--no-warnings",
                "--socket-timeout",
                "15",
            ])
            .arg(&target)
            .output()
            .await
            .map_err(|e| PlayerError::ResolutionFailed(format!("could not run yt-dlp: {e}")))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp failed for {}: {}", target, error.trim());
            return Err(PlayerError::ResolutionFailed(error.trim().to_string()));
        }

        let media = Self::parse_info(&String::from_utf8_lossy(&output.stdout))?;
        info!("✅ Resolved {} -> {}", query, media.title);
        Ok(media)
    }
}

fn is_http_url(query: &str) -> bool {
    url::Url::parse(query.trim())
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}
