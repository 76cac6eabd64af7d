//! ffmpeg process management.
//!
//! Each playing track owns exactly one ffmpeg child that decodes the source,
//! applies the `volume`/`atempo` filter chain and writes raw PCM to stdout.
//! The child is wrapped in [`TranscodeProcess`], which kills it on
//! [`TranscodeProcess::terminate`] or when dropped, so a transition that
//! bails out half-way can never leak a decoder.

use async_trait::async_trait;
use std::{
    ffi::OsString,
    io::{BufRead, BufReader, Read},
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{debug, info, warn};

use crate::audio::{
    error::{PlayerError, PlayerResult},
    track::{PlaybackSettings, TrackDescriptor},
};

/// Output format expected by the voice transport.
pub const PCM_SAMPLE_RATE: u32 = 48_000;
pub const PCM_CHANNELS: u32 = 2;

/// Raw s16le interleaved PCM as produced on the transcoder's stdout.
pub type PcmStream = Box<dyn Read + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum TranscodeInput {
    Local(PathBuf),
    Remote {
        url: String,
        reconnect: bool,
        reconnect_delay_max: Duration,
    },
}

/// Declarative description of one ffmpeg invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeConfig {
    pub input: TranscodeInput,
    pub volume: f32,
    pub speed: f32,
    pub sample_rate: u32,
    pub channels: u32,
}

impl TranscodeConfig {
    /// Builds the config for `track`. Local files are resolved to an absolute
    /// path here, which is also where a missing file is detected.
    pub fn for_track(
        track: &TrackDescriptor,
        settings: PlaybackSettings,
        reconnect_delay_max: Duration,
    ) -> PlayerResult<Self> {
        let input = if track.is_local() {
            TranscodeInput::Local(resolve_local_path(Path::new(track.locator()))?)
        } else {
            TranscodeInput::Remote {
                url: track.locator().to_string(),
                reconnect: true,
                reconnect_delay_max,
            }
        };

        Ok(Self {
            input,
            volume: settings.volume(),
            speed: settings.speed(),
            sample_rate: PCM_SAMPLE_RATE,
            channels: PCM_CHANNELS,
        })
    }

    pub fn filter_chain(&self) -> String {
        format!("volume={:.3},atempo={:.3}", self.volume, self.speed)
    }

    /// ffmpeg argv, without the program name.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-nostdin"]
            .iter()
            .map(OsString::from)
            .collect();

        match &self.input {
            TranscodeInput::Local(path) => {
                args.push("-i".into());
                args.push(path.as_os_str().to_owned());
            }
            TranscodeInput::Remote {
                url,
                reconnect,
                reconnect_delay_max,
            } => {
                if *reconnect {
                    args.extend(
                        [
                            "-reconnect".to_string(),
                            "1".to_string(),
                            "-reconnect_streamed".to_string(),
                            "1".to_string(),
                            "-reconnect_delay_max".to_string(),
                            reconnect_delay_max.as_secs().max(1).to_string(),
                        ]
                        .into_iter()
                        .map(OsString::from),
                    );
                }
                args.push("-i".into());
                args.push(url.into());
            }
        }

        args.push("-vn".into());
        args.push("-filter:a".into());
        args.push(self.filter_chain().into());
        args.extend(
            [
                "-f".to_string(),
                "s16le".to_string(),
                "-acodec".to_string(),
                "pcm_s16le".to_string(),
                "-ac".to_string(),
                self.channels.to_string(),
                "-ar".to_string(),
                self.sample_rate.to_string(),
                "pipe:1".to_string(),
            ]
            .into_iter()
            .map(OsString::from),
        );

        args
    }
}

/// Canonical absolute path for a local source, or `SourceNotFound`.
pub fn resolve_local_path(path: &Path) -> PlayerResult<PathBuf> {
    match std::fs::canonicalize(path) {
        Ok(absolute) if absolute.is_file() => Ok(absolute),
        _ => Err(PlayerError::SourceNotFound(path.to_path_buf())),
    }
}

/// Handle to a running transcoder.
pub struct TranscodeProcess {
    label: String,
    child: Option<Child>,
    output: Option<PcmStream>,
    alive: Arc<AtomicBool>,
}

impl TranscodeProcess {
    pub fn from_child(mut child: Child, label: impl Into<String>) -> PlayerResult<Self> {
        let label = label.into();
        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                reap(child, label);
                return Err(PlayerError::TranscodeFailed(
                    "transcoder stdout was not captured".to_string(),
                ));
            }
        };

        if let Some(stderr) = child.stderr.take() {
            let label = label.clone();
            std::thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    warn!("🎚️ ffmpeg [{}]: {}", label, line);
                }
            });
        }

        Ok(Self {
            label,
            child: Some(child),
            output: Some(Box::new(stdout)),
            alive: Arc::new(AtomicBool::new(true)),
        })
    }

    /// A process-less handle around an in-memory PCM reader.
    #[cfg(test)]
    pub fn from_reader(output: PcmStream, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            child: None,
            output: Some(output),
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Cleared once the handle is terminated or dropped.
    #[cfg(test)]
    pub fn alive_flag(&self) -> Arc<AtomicBool> {
        self.alive.clone()
    }

    /// Hands the PCM output to the voice transport. Only the first call
    /// returns `Some`.
    pub fn take_output(&mut self) -> Option<PcmStream> {
        self.output.take()
    }

    pub fn is_running(&mut self) -> bool {
        if !self.alive.load(Ordering::SeqCst) {
            return false;
        }
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => true,
        }
    }

    /// Kills the child without waiting for it to finish on its own. The
    /// exit status is collected off the async workers. Safe to call any
    /// number of times.
    pub fn terminate(&mut self) {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return;
        }
        self.output = None;

        if let Some(mut child) = self.child.take() {
            match child.try_wait() {
                Ok(Some(status)) => debug!("🎚️ ffmpeg [{}] already exited: {}", self.label, status),
                _ => {
                    if let Err(e) = child.kill() {
                        debug!("🎚️ ffmpeg [{}] kill failed: {}", self.label, e);
                    }
                    reap(child, self.label.clone());
                }
            }
        }
    }
}

/// Waits for a killed child on a blocking thread so a wedged ffmpeg never
/// stalls the runtime.
fn reap(mut child: Child, label: String) {
    let wait = move || match child.wait() {
        Ok(status) => debug!("🔪 ffmpeg [{}] terminated: {}", label, status),
        Err(e) => debug!("🔪 ffmpeg [{}] could not be reaped: {}", label, e),
    };

    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn_blocking(wait);
        }
        Err(_) => {
            std::thread::spawn(wait);
        }
    }
}

impl Drop for TranscodeProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl std::fmt::Debug for TranscodeProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscodeProcess")
            .field("label", &self.label)
            .field("pid", &self.child.as_ref().map(Child::id))
            .field("alive", &self.alive.load(Ordering::SeqCst))
            .finish()
    }
}

/// Starts a decode/filter pipeline for a track.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn start(
        &self,
        track: &TrackDescriptor,
        settings: PlaybackSettings,
    ) -> PlayerResult<TranscodeProcess>;
}

pub struct FfmpegTranscoder {
    ffmpeg_path: PathBuf,
    reconnect_delay_max: Duration,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, reconnect_delay_max: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            reconnect_delay_max,
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn start(
        &self,
        track: &TrackDescriptor,
        settings: PlaybackSettings,
    ) -> PlayerResult<TranscodeProcess> {
        let track = track.clone();
        let program = self.ffmpeg_path.clone();
        let reconnect_delay_max = self.reconnect_delay_max;

        // Path canonicalization and fork/exec are blocking.
        tokio::task::spawn_blocking(move || {
            let config = TranscodeConfig::for_track(&track, settings, reconnect_delay_max)?;
            debug!("🎚️ ffmpeg filter chain for {}: {}", track.title(), config.filter_chain());

            let child = Command::new(&program)
                .args(config.args())
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .map_err(|e| {
                    PlayerError::TranscodeFailed(format!("{}: {}", program.display(), e))
                })?;

            info!("🎚️ ffmpeg started for {} (pid {})", track.title(), child.id());
            TranscodeProcess::from_child(child, track.title())
        })
        .await
        .map_err(|e| PlayerError::TranscodeFailed(format!("transcoder task failed: {e}")))?
    }
}
