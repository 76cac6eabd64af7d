//! Voice transport seam.
//!
//! The player only talks to [`VoiceConnector`] / [`VoiceSession`]; the
//! songbird implementation below is what the bot wires in.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{Input, RawAdapter},
    tracks::TrackHandle,
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::audio::{
    error::{PlayerError, PlayerResult},
    pcm::S16ToF32Source,
    transcode::{PcmStream, PCM_CHANNELS, PCM_SAMPLE_RATE},
};

/// Invoked when the transport is done with a stream. Transports fire it at
/// most once per stream; the receiver still has to tolerate late calls.
pub type FinishedCallback = Arc<dyn Fn() + Send + Sync + 'static>;

#[async_trait]
pub trait VoiceConnector: Send + Sync {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> PlayerResult<Box<dyn VoiceSession>>;
}

/// A connected voice session. At most one stream is active at a time.
#[async_trait]
pub trait VoiceSession: Send {
    /// Replaces whatever is playing with `pcm`. `on_finished` fires when the
    /// stream ends on its own, errors, or is stopped.
    async fn stream(&mut self, pcm: PcmStream, on_finished: FinishedCallback) -> PlayerResult<()>;

    async fn pause(&mut self) -> PlayerResult<()>;

    async fn resume(&mut self) -> PlayerResult<()>;

    async fn stop_stream(&mut self) -> PlayerResult<()>;

    async fn disconnect(&mut self) -> PlayerResult<()>;

    /// Whether the transport still considers this session joined to a
    /// channel. False once it was kicked or left.
    async fn is_connected(&mut self) -> bool;
}

pub struct SongbirdConnector {
    manager: Arc<Songbird>,
}

impl SongbirdConnector {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl VoiceConnector for SongbirdConnector {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> PlayerResult<Box<dyn VoiceSession>> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| PlayerError::Transport(format!("join failed: {e}")))?;

        info!("🔊 Connected to voice channel {} in guild {}", channel_id, guild_id);

        Ok(Box::new(SongbirdSession {
            manager: self.manager.clone(),
            guild_id,
            call,
            track: None,
        }))
    }
}

pub struct SongbirdSession {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    call: Arc<tokio::sync::Mutex<Call>>,
    track: Option<TrackHandle>,
}

impl SongbirdSession {
    fn track(&self) -> PlayerResult<&TrackHandle> {
        self.track.as_ref().ok_or(PlayerError::NotConnected)
    }
}

#[async_trait]
impl VoiceSession for SongbirdSession {
    async fn stream(&mut self, pcm: PcmStream, on_finished: FinishedCallback) -> PlayerResult<()> {
        let input: Input =
            RawAdapter::new(S16ToF32Source::new(pcm), PCM_SAMPLE_RATE, PCM_CHANNELS).into();

        let handle = {
            let mut call = self.call.lock().await;
            call.play_only_input(input)
        };

        let notifier = TrackFinishedNotifier {
            guild_id: self.guild_id,
            callback: Arc::new(Mutex::new(Some(on_finished))),
        };

        let registered = handle
            .add_event(Event::Track(TrackEvent::End), notifier.clone())
            .and_then(|_| handle.add_event(Event::Track(TrackEvent::Error), notifier));

        if let Err(e) = registered {
            let _ = handle.stop();
            return Err(PlayerError::Transport(format!("could not watch track: {e}")));
        }

        self.track = Some(handle);
        Ok(())
    }

    async fn pause(&mut self) -> PlayerResult<()> {
        self.track()?
            .pause()
            .map_err(|e| PlayerError::Transport(e.to_string()))
    }

    async fn resume(&mut self) -> PlayerResult<()> {
        self.track()?
            .play()
            .map_err(|e| PlayerError::Transport(e.to_string()))
    }

    async fn stop_stream(&mut self) -> PlayerResult<()> {
        if let Some(track) = self.track.take() {
            // The track may already be gone; that's the state we want anyway.
            if let Err(e) = track.stop() {
                debug!("Track already stopped in guild {}: {}", self.guild_id, e);
            }
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> PlayerResult<()> {
        self.stop_stream().await?;
        self.manager
            .remove(self.guild_id)
            .await
            .map_err(|e| PlayerError::Transport(format!("leave failed: {e}")))?;
        info!("👋 Disconnected from voice in guild {}", self.guild_id);
        Ok(())
    }

    async fn is_connected(&mut self) -> bool {
        self.call.lock().await.current_channel().is_some()
    }
}

/// Fires the player's one-shot callback on track end or error, whichever
/// comes first.
#[derive(Clone)]
struct TrackFinishedNotifier {
    guild_id: GuildId,
    callback: Arc<Mutex<Option<FinishedCallback>>>,
}

#[async_trait]
impl VoiceEventHandler for TrackFinishedNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, _handle) in *tracks {
                if let songbird::tracks::PlayMode::Errored(e) = &state.playing {
                    warn!("❌ Track error in guild {}: {:?}", self.guild_id, e);
                }
            }
        }

        let callback = self.callback.lock().take();
        if let Some(callback) = callback {
            debug!("Track finished in guild {}", self.guild_id);
            callback();
        }

        None
    }
}
