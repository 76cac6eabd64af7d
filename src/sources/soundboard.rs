use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use super::resolver::SourceRef;
use crate::audio::error::{PlayerError, PlayerResult};

const AUDIO_EXTENSIONS: [&str; 6] = ["ogg", "mp3", "wav", "flac", "m4a", "opus"];

/// Local sound clips served from one directory.
#[derive(Debug, Clone)]
pub struct Soundboard {
    dir: PathBuf,
}

impl Soundboard {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Clip names (file stems), sorted.
    pub async fn clips(&self) -> Vec<String> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("📁 Soundboard directory {} unreadable: {}", self.dir.display(), e);
                return Vec::new();
            }
        };

        let mut clips = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if is_audio_file(&path) {
                if let Some(stem) = path.file_stem() {
                    clips.push(stem.to_string_lossy().into_owned());
                }
            }
        }
        clips.sort();
        clips.dedup();
        clips
    }

    /// Maps a clip name to a local source. The name must be a bare file name
    /// (with or without extension); anything that could escape the directory
    /// is treated as missing.
    pub async fn source_for(&self, clip: &str) -> PlayerResult<SourceRef> {
        let clip = clip.trim();
        let name = Path::new(clip);
        let is_bare_name = !clip.is_empty()
            && name.components().count() == 1
            && matches!(name.components().next(), Some(Component::Normal(_)));
        if !is_bare_name {
            return Err(PlayerError::SourceNotFound(PathBuf::from(clip)));
        }

        if name.extension().is_some() {
            return Ok(SourceRef::Local(self.dir.join(name)));
        }

        for ext in AUDIO_EXTENSIONS {
            let candidate = self.dir.join(format!("{clip}.{ext}"));
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                debug!("🔈 Soundboard clip {} -> {}", clip, candidate.display());
                return Ok(SourceRef::Local(candidate));
            }
        }

        Err(PlayerError::SourceNotFound(self.dir.join(clip)))
    }
}

fn is_audio_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                AUDIO_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false)
}
