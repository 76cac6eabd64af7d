use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by a guild player.
///
/// Every variant maps to a short user-facing message through
/// [`PlayerError::user_message`]; the command surface never shows the
/// `Display` text directly.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("local audio file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("could not resolve source: {0}")]
    ResolutionFailed(String),

    #[error("transcoder failed: {0}")]
    TranscodeFailed(String),

    #[error("no active voice connection")]
    NotConnected,

    #[error("nothing to do: {0}")]
    NoOp(&'static str),

    #[error("voice transport error: {0}")]
    Transport(String),

    #[error("playback was stopped before the request completed")]
    Cancelled,

    #[error("guild player task is no longer running")]
    PlayerGone,
}

impl PlayerError {
    pub fn user_message(&self) -> String {
        match self {
            PlayerError::SourceNotFound(path) => format!(
                "❌ Couldn't find the audio file `{}`",
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string())
            ),
            PlayerError::ResolutionFailed(_) => {
                "❌ Couldn't find anything playable for that request".to_string()
            }
            PlayerError::TranscodeFailed(_) => "❌ Couldn't start the audio stream".to_string(),
            PlayerError::NotConnected => "🔇 Join a voice channel first!".to_string(),
            PlayerError::NoOp(reason) => format!("ℹ️ {}", reason),
            PlayerError::Transport(_) => "❌ Voice connection error, try again".to_string(),
            PlayerError::Cancelled => "⏹️ Playback was stopped before that track loaded".to_string(),
            PlayerError::PlayerGone => "❌ The player for this server crashed".to_string(),
        }
    }

    /// True for conditions that are reported but are not failures.
    pub fn is_noop(&self) -> bool {
        matches!(self, PlayerError::NoOp(_))
    }
}

pub type PlayerResult<T> = Result<T, PlayerError>;
