//! In-memory voice transport, transcoder and resolver used by the player tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Notify;

use crate::{
    audio::{
        error::{PlayerError, PlayerResult},
        track::{PlaybackSettings, TrackDescriptor},
        transcode::{PcmStream, TranscodeConfig, TranscodeProcess, Transcoder},
        voice::{FinishedCallback, VoiceConnector, VoiceSession},
    },
    sources::resolver::{MediaResolver, ResolvedMedia},
};

#[derive(Debug, Clone, PartialEq)]
pub enum VoiceEvent {
    Connected(ChannelId),
    Stream,
    Pause,
    Resume,
    StopStream,
    Disconnect,
}

/// Records every transport call. Stopping a stream fires its finished
/// callback, the way songbird raises `TrackEvent::End` for a stopped track.
/// Callbacks are kept after firing so tests can replay late notifications.
#[derive(Clone, Default)]
pub struct FakeConnector {
    events: Arc<Mutex<Vec<VoiceEvent>>>,
    callbacks: Arc<Mutex<Vec<FinishedCallback>>>,
    sessions: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
    refuse: Arc<Mutex<bool>>,
}

impl FakeConnector {
    pub fn events(&self) -> Vec<VoiceEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &VoiceEvent) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }

    pub fn refuse_connections(&self) {
        *self.refuse.lock() = true;
    }

    /// Simulates the most recent stream reaching its end.
    pub fn finish_latest(&self) {
        let callback = self.callbacks.lock().last().cloned();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Fires the callback of the `index`-th stream ever started (0-based),
    /// even if it already fired.
    pub fn finish_stream(&self, index: usize) {
        let callback = self.callbacks.lock().get(index).cloned();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Someone kicked the bot: the newest session is no longer joined.
    pub fn drop_connection(&self) {
        if let Some(joined) = self.sessions.lock().last() {
            joined.store(false, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl VoiceConnector for FakeConnector {
    async fn connect(
        &self,
        _guild_id: GuildId,
        channel_id: ChannelId,
    ) -> PlayerResult<Box<dyn VoiceSession>> {
        if *self.refuse.lock() {
            return Err(PlayerError::Transport("connection refused".to_string()));
        }
        self.events.lock().push(VoiceEvent::Connected(channel_id));
        let joined = Arc::new(AtomicBool::new(true));
        self.sessions.lock().push(joined.clone());
        Ok(Box::new(FakeSession {
            connector: self.clone(),
            joined,
            playing: None,
        }))
    }
}

pub struct FakeSession {
    connector: FakeConnector,
    joined: Arc<AtomicBool>,
    playing: Option<usize>,
}

#[async_trait]
impl VoiceSession for FakeSession {
    async fn stream(&mut self, _pcm: PcmStream, on_finished: FinishedCallback) -> PlayerResult<()> {
        self.stop_stream().await?;
        let mut callbacks = self.connector.callbacks.lock();
        callbacks.push(on_finished);
        self.playing = Some(callbacks.len() - 1);
        drop(callbacks);
        self.connector.events.lock().push(VoiceEvent::Stream);
        Ok(())
    }

    async fn pause(&mut self) -> PlayerResult<()> {
        self.connector.events.lock().push(VoiceEvent::Pause);
        Ok(())
    }

    async fn resume(&mut self) -> PlayerResult<()> {
        self.connector.events.lock().push(VoiceEvent::Resume);
        Ok(())
    }

    async fn stop_stream(&mut self) -> PlayerResult<()> {
        if let Some(index) = self.playing.take() {
            self.connector.events.lock().push(VoiceEvent::StopStream);
            self.connector.finish_stream(index);
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> PlayerResult<()> {
        self.stop_stream().await?;
        self.joined.store(false, Ordering::SeqCst);
        self.connector.events.lock().push(VoiceEvent::Disconnect);
        Ok(())
    }

    async fn is_connected(&mut self) -> bool {
        self.joined.load(Ordering::SeqCst)
    }
}

/// Produces empty PCM streams. Tracks whose title is in the failure set
/// fail to start; local tracks go through the same path checks as ffmpeg.
#[derive(Default)]
pub struct FakeTranscoder {
    failing: Mutex<HashSet<String>>,
    started: Mutex<Vec<(String, PlaybackSettings)>>,
    processes: Mutex<Vec<(String, Arc<AtomicBool>)>>,
}

impl FakeTranscoder {
    pub fn fail_on(&self, title: &str) {
        self.failing.lock().insert(title.to_string());
    }

    /// `(title, settings)` of every successful start, in order.
    pub fn started(&self) -> Vec<(String, PlaybackSettings)> {
        self.started.lock().clone()
    }

    /// Titles of the processes that have not been terminated yet.
    pub fn live(&self) -> Vec<String> {
        self.processes
            .lock()
            .iter()
            .filter(|(_, alive)| alive.load(Ordering::SeqCst))
            .map(|(title, _)| title.clone())
            .collect()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn start(
        &self,
        track: &TrackDescriptor,
        settings: PlaybackSettings,
    ) -> PlayerResult<TranscodeProcess> {
        if self.failing.lock().contains(track.title()) {
            return Err(PlayerError::TranscodeFailed(format!("{} is broken", track.title())));
        }
        TranscodeConfig::for_track(track, settings, Duration::from_secs(5))?;
        self.started
            .lock()
            .push((track.title().to_string(), settings));
        let process = TranscodeProcess::from_reader(Box::new(std::io::empty()), track.title());
        self.processes
            .lock()
            .push((track.title().to_string(), process.alive_flag()));
        Ok(process)
    }
}

/// Resolver that parks every request until the test releases it.
#[derive(Default)]
pub struct GatedResolver {
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl MediaResolver for GatedResolver {
    async fn resolve(&self, query: &str) -> PlayerResult<ResolvedMedia> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(ResolvedMedia {
            locator: format!("https://media.example/{query}"),
            title: query.to_string(),
        })
    }
}
