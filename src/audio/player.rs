//! Per-guild playback state machine.
//!
//! Every guild gets one [`PlayerActor`] running on its own tokio task. The
//! actor is the only owner of the guild's [`PlayerState`]: user commands sent
//! through a [`PlayerHandle`] and "track finished" notifications from the
//! voice transport all arrive on the same channel and are applied one at a
//! time, so transitions never race on shared fields.
//!
//! Two counters keep stale work from resurrecting torn-down state:
//!
//! - `generation` identifies the stream whose finished callback is honoured.
//!   It changes whenever a stream is started or released, so a callback from
//!   a stopped or replaced stream is ignored.
//! - `epoch` is bumped by [`PlayerHandle::stop`]. Requests capture it before
//!   resolving their source and are rejected with [`PlayerError::Cancelled`]
//!   if a stop happened in the meantime.

use serenity::model::id::{ChannelId, GuildId};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        error::{PlayerError, PlayerResult},
        queue::TrackQueue,
        track::{PlaybackSettings, TrackDescriptor},
        transcode::{TranscodeProcess, Transcoder},
        voice::{FinishedCallback, VoiceConnector, VoiceSession},
    },
    sources::resolver::{MediaResolver, SourceRef},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Playing,
    Paused,
}

/// Result of an enqueue request.
#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueOutcome {
    /// The player was idle and the track is now playing.
    Started(TrackDescriptor),
    /// The track is waiting at this 1-based queue position.
    Queued {
        track: TrackDescriptor,
        position: usize,
    },
}

/// Read-only copy of a guild's player state.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub phase: Phase,
    pub current: Option<TrackDescriptor>,
    pub queue: Vec<TrackDescriptor>,
    pub settings: PlaybackSettings,
    pub connected: bool,
    pub transcoding: bool,
}

impl PlayerSnapshot {
    /// `(current title, queued titles)` for status displays.
    pub fn titles(&self) -> (Option<String>, Vec<String>) {
        (
            self.current.as_ref().map(|t| t.title().to_string()),
            self.queue.iter().map(|t| t.title().to_string()).collect(),
        )
    }
}

enum PlayerCommand {
    Enqueue {
        track: TrackDescriptor,
        channel: Option<ChannelId>,
        epoch: u64,
        reply: oneshot::Sender<PlayerResult<EnqueueOutcome>>,
    },
    PlayImmediate {
        track: TrackDescriptor,
        channel: Option<ChannelId>,
        epoch: u64,
        reply: oneshot::Sender<PlayerResult<TrackDescriptor>>,
    },
    Pause {
        reply: oneshot::Sender<PlayerResult<()>>,
    },
    Resume {
        reply: oneshot::Sender<PlayerResult<()>>,
    },
    Skip {
        reply: oneshot::Sender<PlayerResult<Option<TrackDescriptor>>>,
    },
    Stop {
        reply: oneshot::Sender<PlayerResult<()>>,
    },
    Adjust {
        volume: Option<f32>,
        speed: Option<f32>,
        reply: oneshot::Sender<PlayerResult<PlaybackSettings>>,
    },
    VoiceLost,
    TrackFinished {
        generation: u64,
    },
    Snapshot {
        reply: oneshot::Sender<PlayerResult<PlayerSnapshot>>,
    },
}

/// Cheap, cloneable front door to one guild's player.
#[derive(Clone)]
pub struct PlayerHandle {
    guild_id: GuildId,
    commands: mpsc::UnboundedSender<PlayerCommand>,
    epoch: Arc<AtomicU64>,
    resolver: Arc<dyn MediaResolver>,
}

impl PlayerHandle {
    /// Spawns the guild's actor task and returns a handle to it.
    pub fn spawn(
        guild_id: GuildId,
        settings: PlaybackSettings,
        connector: Arc<dyn VoiceConnector>,
        transcoder: Arc<dyn Transcoder>,
        resolver: Arc<dyn MediaResolver>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let epoch = Arc::new(AtomicU64::new(0));

        let actor = PlayerActor {
            guild_id,
            state: PlayerState::new(settings),
            commands: rx,
            notifier: tx.downgrade(),
            epoch: epoch.clone(),
            connector,
            transcoder,
        };
        tokio::spawn(actor.run());

        debug!("🎛️ Player created for guild {}", guild_id);

        Self {
            guild_id,
            commands: tx,
            epoch,
            resolver,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Resolves `source` and appends it to the queue, starting playback if
    /// the player is idle. `channel` is the requester's voice channel, used
    /// when the bot is not connected yet.
    pub async fn enqueue(
        &self,
        source: SourceRef,
        channel: Option<ChannelId>,
    ) -> PlayerResult<EnqueueOutcome> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let track = self.resolve(&source).await?;
        self.request(|reply| PlayerCommand::Enqueue {
            track,
            channel,
            epoch,
            reply,
        })
        .await
    }

    /// Drops whatever is playing or queued and plays `source` right away.
    pub async fn play_immediate(
        &self,
        source: SourceRef,
        channel: Option<ChannelId>,
    ) -> PlayerResult<TrackDescriptor> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let track = self.resolve(&source).await?;
        self.request(|reply| PlayerCommand::PlayImmediate {
            track,
            channel,
            epoch,
            reply,
        })
        .await
    }

    pub async fn pause(&self) -> PlayerResult<()> {
        self.request(|reply| PlayerCommand::Pause { reply }).await
    }

    pub async fn resume(&self) -> PlayerResult<()> {
        self.request(|reply| PlayerCommand::Resume { reply }).await
    }

    /// Returns the track that started in place of the skipped one, if any.
    pub async fn skip(&self) -> PlayerResult<Option<TrackDescriptor>> {
        self.request(|reply| PlayerCommand::Skip { reply }).await
    }

    pub async fn stop(&self) -> PlayerResult<()> {
        // Bump before queueing so requests still resolving observe it.
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.request(|reply| PlayerCommand::Stop { reply }).await
    }

    pub async fn set_volume(&self, volume: f32) -> PlayerResult<PlaybackSettings> {
        self.adjust_settings(Some(volume), None).await
    }

    pub async fn set_speed(&self, speed: f32) -> PlayerResult<PlaybackSettings> {
        self.adjust_settings(None, Some(speed)).await
    }

    /// Clamps and stores the provided values. A playing track restarts from
    /// the beginning so the new filter chain takes effect.
    pub async fn adjust_settings(
        &self,
        volume: Option<f32>,
        speed: Option<f32>,
    ) -> PlayerResult<PlaybackSettings> {
        self.request(|reply| PlayerCommand::Adjust {
            volume,
            speed,
            reply,
        })
        .await
    }

    /// The gateway reported the bot leaving voice. Ignored unless the
    /// player's current session is really gone.
    pub fn voice_lost(&self) {
        let _ = self.commands.send(PlayerCommand::VoiceLost);
    }

    pub async fn snapshot(&self) -> PlayerResult<PlayerSnapshot> {
        self.request(|reply| PlayerCommand::Snapshot { reply }).await
    }

    pub async fn queue_snapshot(&self) -> PlayerResult<(Option<String>, Vec<String>)> {
        Ok(self.snapshot().await?.titles())
    }

    async fn resolve(&self, source: &SourceRef) -> PlayerResult<TrackDescriptor> {
        match source {
            SourceRef::Local(path) => {
                let not_found = || PlayerError::SourceNotFound(path.clone());
                let absolute = tokio::fs::canonicalize(path).await.map_err(|_| not_found())?;
                let metadata = tokio::fs::metadata(&absolute).await.map_err(|_| not_found())?;
                if !metadata.is_file() {
                    return Err(not_found());
                }
                let title = absolute
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_else(|| absolute.display().to_string());
                Ok(TrackDescriptor::local(absolute.to_string_lossy(), title))
            }
            SourceRef::Remote(query) => {
                let media = self.resolver.resolve(query).await?;
                Ok(TrackDescriptor::remote(media.locator, media.title))
            }
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<PlayerResult<T>>) -> PlayerCommand,
    ) -> PlayerResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| PlayerError::PlayerGone)?;
        response.await.map_err(|_| PlayerError::PlayerGone)?
    }
}

/// Everything one guild's player owns.
struct PlayerState {
    queue: TrackQueue,
    current: Option<TrackDescriptor>,
    phase: Phase,
    voice: Option<Box<dyn VoiceSession>>,
    process: Option<TranscodeProcess>,
    settings: PlaybackSettings,
    generation: u64,
}

impl PlayerState {
    fn new(settings: PlaybackSettings) -> Self {
        Self {
            queue: TrackQueue::new(),
            current: None,
            phase: Phase::Idle,
            voice: None,
            process: None,
            settings,
            generation: 0,
        }
    }
}

#[derive(Default)]
struct AdvanceOutcome {
    started: Option<TrackDescriptor>,
    failures: Vec<(TrackDescriptor, PlayerError)>,
}

struct PlayerActor {
    guild_id: GuildId,
    state: PlayerState,
    commands: mpsc::UnboundedReceiver<PlayerCommand>,
    // Weak so the actor doesn't keep its own channel open.
    notifier: mpsc::WeakUnboundedSender<PlayerCommand>,
    epoch: Arc<AtomicU64>,
    connector: Arc<dyn VoiceConnector>,
    transcoder: Arc<dyn Transcoder>,
}

impl PlayerActor {
    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            self.handle(command).await;
        }

        // Every handle is gone; make sure nothing outlives us.
        self.release_stream().await;
        debug!("🎛️ Player task for guild {} finished", self.guild_id);
    }

    async fn handle(&mut self, command: PlayerCommand) {
        match command {
            PlayerCommand::Enqueue {
                track,
                channel,
                epoch,
                reply,
            } => {
                let result = self.enqueue(track, channel, epoch).await;
                let _ = reply.send(result);
            }
            PlayerCommand::PlayImmediate {
                track,
                channel,
                epoch,
                reply,
            } => {
                let result = self.play_immediate(track, channel, epoch).await;
                let _ = reply.send(result);
            }
            PlayerCommand::Pause { reply } => {
                let _ = reply.send(self.pause().await);
            }
            PlayerCommand::Resume { reply } => {
                let _ = reply.send(self.resume().await);
            }
            PlayerCommand::Skip { reply } => {
                let _ = reply.send(self.skip().await);
            }
            PlayerCommand::Stop { reply } => {
                let _ = reply.send(self.stop().await);
            }
            PlayerCommand::Adjust {
                volume,
                speed,
                reply,
            } => {
                let _ = reply.send(self.adjust(volume, speed).await);
            }
            PlayerCommand::VoiceLost => self.voice_lost().await,
            PlayerCommand::TrackFinished { generation } => self.track_finished(generation).await,
            PlayerCommand::Snapshot { reply } => {
                let _ = reply.send(Ok(self.snapshot()));
            }
        }
    }

    fn check_epoch(&self, epoch: u64) -> PlayerResult<()> {
        if epoch != self.epoch.load(Ordering::SeqCst) {
            info!(
                "⏹️ Dropping request in guild {}: playback was stopped while it resolved",
                self.guild_id
            );
            return Err(PlayerError::Cancelled);
        }
        Ok(())
    }

    async fn ensure_voice(&mut self, channel: Option<ChannelId>) -> PlayerResult<()> {
        if self.state.voice.is_some() {
            return Ok(());
        }
        let channel = channel.ok_or(PlayerError::NotConnected)?;
        let session = self.connector.connect(self.guild_id, channel).await?;
        self.state.voice = Some(session);
        Ok(())
    }

    async fn enqueue(
        &mut self,
        track: TrackDescriptor,
        channel: Option<ChannelId>,
        epoch: u64,
    ) -> PlayerResult<EnqueueOutcome> {
        self.check_epoch(epoch)?;
        self.ensure_voice(channel).await?;

        let position = self.state.queue.enqueue(track.clone());
        if self.state.phase != Phase::Idle {
            return Ok(EnqueueOutcome::Queued { track, position });
        }

        let mut outcome = self.advance().await;
        match outcome.started.take() {
            Some(started) if started == track => Ok(EnqueueOutcome::Started(started)),
            Some(started) => {
                // Only reachable if the queue held entries while idle.
                warn!("Started {} instead of the requested track", started.title());
                Ok(EnqueueOutcome::Queued { track, position })
            }
            None => Err(outcome
                .failures
                .into_iter()
                .find(|(failed, _)| *failed == track)
                .map(|(_, e)| e)
                .unwrap_or_else(|| PlayerError::TranscodeFailed("track did not start".to_string()))),
        }
    }

    async fn play_immediate(
        &mut self,
        track: TrackDescriptor,
        channel: Option<ChannelId>,
        epoch: u64,
    ) -> PlayerResult<TrackDescriptor> {
        self.check_epoch(epoch)?;
        self.ensure_voice(channel).await?;

        self.release_stream().await;
        self.state.queue.clear();
        self.state.current = None;
        self.state.phase = Phase::Idle;

        match self.start_stream(&track).await {
            Ok(()) => {
                info!("⚡ Playing now in guild {}: {}", self.guild_id, track.title());
                self.state.current = Some(track.clone());
                self.state.phase = Phase::Playing;
                Ok(track)
            }
            Err(e) => {
                error!("❌ Could not play {} in guild {}: {}", track.title(), self.guild_id, e);
                Err(e)
            }
        }
    }

    /// Moves to the next playable entry, or to Idle when the queue runs out.
    /// Entries that fail to start are logged and skipped.
    async fn advance(&mut self) -> AdvanceOutcome {
        self.release_stream().await;
        self.state.current = None;

        let mut outcome = AdvanceOutcome::default();
        while let Some(track) = self.state.queue.dequeue_next() {
            match self.start_stream(&track).await {
                Ok(()) => {
                    info!("🎵 Now playing in guild {}: {}", self.guild_id, track.title());
                    self.state.current = Some(track.clone());
                    self.state.phase = Phase::Playing;
                    outcome.started = Some(track);
                    return outcome;
                }
                Err(e) => {
                    warn!(
                        "⏭️ Skipping {} in guild {}: {}",
                        track.title(),
                        self.guild_id,
                        e
                    );
                    outcome.failures.push((track, e));
                }
            }
        }

        // Voice stays connected so the next enqueue starts without a rejoin.
        self.state.phase = Phase::Idle;
        info!("📭 Queue finished in guild {}", self.guild_id);
        outcome
    }

    /// Starts the transcoder for `track` and hands its output to the voice
    /// session. On any failure the half-started process is dropped, which
    /// kills it.
    async fn start_stream(&mut self, track: &TrackDescriptor) -> PlayerResult<()> {
        if self.state.voice.is_none() {
            return Err(PlayerError::NotConnected);
        }

        let mut process = self.transcoder.start(track, self.state.settings).await?;
        let output = process.take_output().ok_or_else(|| {
            PlayerError::TranscodeFailed("transcoder produced no output stream".to_string())
        })?;

        self.state.generation += 1;
        let on_finished = self.finished_callback(self.state.generation);

        let voice = self.state.voice.as_mut().ok_or(PlayerError::NotConnected)?;
        voice.stream(output, on_finished).await?;

        self.state.process = Some(process);
        Ok(())
    }

    fn finished_callback(&self, generation: u64) -> FinishedCallback {
        let notifier = self.notifier.clone();
        Arc::new(move || {
            if let Some(commands) = notifier.upgrade() {
                let _ = commands.send(PlayerCommand::TrackFinished { generation });
            }
        })
    }

    /// Kills the transcoder and stops the transport stream. Any finished
    /// callback armed for that stream becomes stale.
    async fn release_stream(&mut self) {
        self.state.generation += 1;

        if let Some(mut process) = self.state.process.take() {
            process.terminate();
        }

        if self.state.current.is_some() {
            if let Some(voice) = self.state.voice.as_mut() {
                if let Err(e) = voice.stop_stream().await {
                    debug!("stop_stream in guild {}: {}", self.guild_id, e);
                }
            }
        }
    }

    async fn pause(&mut self) -> PlayerResult<()> {
        if self.state.phase != Phase::Playing {
            return Err(PlayerError::NoOp("Nothing is playing or it's already paused!"));
        }
        let voice = self.state.voice.as_mut().ok_or(PlayerError::NotConnected)?;
        voice.pause().await?;
        self.state.phase = Phase::Paused;
        info!("⏸️ Paused in guild {}", self.guild_id);
        Ok(())
    }

    async fn resume(&mut self) -> PlayerResult<()> {
        if self.state.phase != Phase::Paused {
            return Err(PlayerError::NoOp("Audio is not paused!"));
        }
        let voice = self.state.voice.as_mut().ok_or(PlayerError::NotConnected)?;
        voice.resume().await?;
        self.state.phase = Phase::Playing;
        info!("▶️ Resumed in guild {}", self.guild_id);
        Ok(())
    }

    async fn skip(&mut self) -> PlayerResult<Option<TrackDescriptor>> {
        if self.state.queue.is_empty() {
            return Err(PlayerError::NoOp("There's nothing queued to skip to!"));
        }
        if let Some(current) = &self.state.current {
            info!("⏭️ Skipping {} in guild {}", current.title(), self.guild_id);
        }
        Ok(self.advance().await.started)
    }

    async fn stop(&mut self) -> PlayerResult<()> {
        let had_anything = self.state.voice.is_some()
            || self.state.current.is_some()
            || !self.state.queue.is_empty();

        self.release_stream().await;
        self.state.queue.clear();
        self.state.current = None;
        self.state.phase = Phase::Idle;

        if let Some(mut voice) = self.state.voice.take() {
            if let Err(e) = voice.disconnect().await {
                warn!("Error leaving voice in guild {}: {}", self.guild_id, e);
            }
        }

        if !had_anything {
            return Err(PlayerError::NoOp("I'm not playing anything!"));
        }
        info!("⏹️ Stopped playback in guild {}", self.guild_id);
        Ok(())
    }

    async fn adjust(
        &mut self,
        volume: Option<f32>,
        speed: Option<f32>,
    ) -> PlayerResult<PlaybackSettings> {
        self.state.settings.apply(volume, speed);
        let settings = self.state.settings;
        info!(
            "🎚️ Settings in guild {}: volume {:.2}, speed {:.2}",
            self.guild_id,
            settings.volume(),
            settings.speed()
        );

        // ffmpeg can't retune a running filter chain; restart the current
        // track from the top instead.
        if self.state.phase == Phase::Playing {
            if let Some(current) = self.state.current.clone() {
                self.state.queue.enqueue_front(current);
                self.advance().await;
            }
        }

        Ok(settings)
    }

    async fn voice_lost(&mut self) {
        // Our own disconnect already cleared the session.
        let Some(voice) = self.state.voice.as_mut() else {
            return;
        };

        // The gateway reports leaves asynchronously: a late event for a
        // session we already stopped must not tear down its replacement.
        if voice.is_connected().await {
            debug!(
                "Ignoring voice disconnect in guild {}: current session is still joined",
                self.guild_id
            );
            return;
        }

        warn!("🔌 Voice connection lost in guild {}", self.guild_id);
        let voice = self.state.voice.take();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.release_stream().await;
        drop(voice);
        self.state.queue.clear();
        self.state.current = None;
        self.state.phase = Phase::Idle;
    }

    async fn track_finished(&mut self, generation: u64) {
        if generation != self.state.generation || self.state.phase == Phase::Idle {
            debug!(
                "Ignoring stale finish notification in guild {} ({} != {})",
                self.guild_id, generation, self.state.generation
            );
            return;
        }

        if let Some(current) = &self.state.current {
            info!("🏁 Finished in guild {}: {}", self.guild_id, current.title());
        }
        self.advance().await;
    }

    fn snapshot(&mut self) -> PlayerSnapshot {
        PlayerSnapshot {
            phase: self.state.phase,
            current: self.state.current.clone(),
            queue: self.state.queue.peek_all().cloned().collect(),
            settings: self.state.settings,
            connected: self.state.voice.is_some(),
            transcoding: self
                .state
                .process
                .as_mut()
                .map(TranscodeProcess::is_running)
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{FakeConnector, FakeTranscoder, GatedResolver, VoiceEvent};
    use crate::sources::resolver::{MockMediaResolver, ResolvedMedia};
    use pretty_assertions::assert_eq;

    const GUILD: GuildId = GuildId::new(42);
    const CHANNEL: ChannelId = ChannelId::new(7);

    struct Harness {
        player: PlayerHandle,
        voice: FakeConnector,
        transcoder: Arc<FakeTranscoder>,
    }

    fn echo_resolver() -> MockMediaResolver {
        let mut resolver = MockMediaResolver::new();
        resolver.expect_resolve().returning(|query: &str| {
            Ok(ResolvedMedia {
                locator: format!("https://media.example/{query}"),
                title: query.to_string(),
            })
        });
        resolver
    }

    fn harness_with(resolver: Arc<dyn MediaResolver>) -> Harness {
        let voice = FakeConnector::default();
        let transcoder = Arc::new(FakeTranscoder::default());
        let player = PlayerHandle::spawn(
            GUILD,
            PlaybackSettings::default(),
            Arc::new(voice.clone()),
            transcoder.clone(),
            resolver,
        );
        Harness {
            player,
            voice,
            transcoder,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(echo_resolver()))
    }

    fn remote(query: &str) -> SourceRef {
        SourceRef::Remote(query.to_string())
    }

    async fn titles(player: &PlayerHandle) -> (Option<String>, Vec<String>) {
        player.queue_snapshot().await.unwrap()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn enqueue_while_idle_connects_and_plays() {
        let h = harness();

        let outcome = h.player.enqueue(remote("tavern"), Some(CHANNEL)).await.unwrap();

        assert_eq!(
            outcome,
            EnqueueOutcome::Started(TrackDescriptor::remote("https://media.example/tavern", "tavern"))
        );
        let snapshot = h.player.snapshot().await.unwrap();
        assert_eq!(snapshot.phase, Phase::Playing);
        assert!(snapshot.connected);
        assert!(snapshot.transcoding);
        assert_eq!(h.voice.events(), vec![VoiceEvent::Connected(CHANNEL), VoiceEvent::Stream]);
    }

    #[tokio::test]
    async fn enqueue_while_playing_reports_position() {
        let h = harness();
        h.player.enqueue(remote("a"), Some(CHANNEL)).await.unwrap();

        let b = h.player.enqueue(remote("b"), None).await.unwrap();
        let c = h.player.enqueue(remote("c"), None).await.unwrap();

        assert!(matches!(b, EnqueueOutcome::Queued { position: 1, .. }));
        assert!(matches!(c, EnqueueOutcome::Queued { position: 2, .. }));
        assert_eq!(titles(&h.player).await, (Some("a".to_string()), strings(&["b", "c"])));
        assert_eq!(h.voice.count(&VoiceEvent::Connected(CHANNEL)), 1);
    }

    #[tokio::test]
    async fn enqueue_without_voice_channel_is_rejected() {
        let h = harness();

        let err = h.player.enqueue(remote("a"), None).await.unwrap_err();

        assert!(matches!(err, PlayerError::NotConnected));
        let snapshot = h.player.snapshot().await.unwrap();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert!(snapshot.queue.is_empty());
        assert!(!snapshot.connected);
    }

    #[tokio::test]
    async fn failed_join_leaves_state_untouched() {
        let h = harness();
        h.voice.refuse_connections();

        let err = h.player.enqueue(remote("a"), Some(CHANNEL)).await.unwrap_err();

        assert!(matches!(err, PlayerError::Transport(_)));
        assert_eq!(titles(&h.player).await, (None, vec![]));
    }

    #[tokio::test]
    async fn finished_tracks_play_in_fifo_order_then_idle() {
        let h = harness();
        for query in ["a", "b", "c"] {
            h.player.enqueue(remote(query), Some(CHANNEL)).await.unwrap();
        }

        h.voice.finish_latest();
        assert_eq!(titles(&h.player).await, (Some("b".to_string()), strings(&["c"])));

        h.voice.finish_latest();
        assert_eq!(titles(&h.player).await, (Some("c".to_string()), vec![]));

        h.voice.finish_latest();
        let snapshot = h.player.snapshot().await.unwrap();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert_eq!(snapshot.current, None);
        // Voice stays up after the queue drains.
        assert!(snapshot.connected);
        assert_eq!(h.voice.count(&VoiceEvent::Disconnect), 0);

        let started: Vec<String> = h.transcoder.started().into_iter().map(|(t, _)| t).collect();
        assert_eq!(started, strings(&["a", "b", "c"]));
    }

    #[tokio::test]
    async fn idle_player_restarts_on_next_enqueue_without_rejoining() {
        let h = harness();
        h.player.enqueue(remote("a"), Some(CHANNEL)).await.unwrap();
        h.voice.finish_latest();

        let outcome = h.player.enqueue(remote("b"), None).await.unwrap();

        assert!(matches!(outcome, EnqueueOutcome::Started(_)));
        assert_eq!(h.voice.count(&VoiceEvent::Connected(CHANNEL)), 1);
    }

    #[tokio::test]
    async fn stale_finish_notifications_are_ignored() {
        let h = harness();
        for query in ["a", "b", "c"] {
            h.player.enqueue(remote(query), Some(CHANNEL)).await.unwrap();
        }

        // Stopping "a" fires its callback; it must not advance past "b".
        let next = h.player.skip().await.unwrap();
        assert_eq!(next.map(|t| t.title().to_string()), Some("b".to_string()));
        assert_eq!(titles(&h.player).await, (Some("b".to_string()), strings(&["c"])));

        // A late duplicate of the first stream's callback is a no-op as well.
        h.voice.finish_stream(0);
        assert_eq!(titles(&h.player).await, (Some("b".to_string()), strings(&["c"])));

        // The live stream's callback still advances.
        h.voice.finish_stream(1);
        assert_eq!(titles(&h.player).await, (Some("c".to_string()), vec![]));
    }

    #[tokio::test]
    async fn every_transition_kills_the_previous_process() {
        let h = harness();
        for query in ["a", "b", "c", "d"] {
            h.player.enqueue(remote(query), Some(CHANNEL)).await.unwrap();
        }
        assert_eq!(h.transcoder.live(), strings(&["a"]));

        h.voice.finish_latest();
        assert_eq!(titles(&h.player).await.0, Some("b".to_string()));
        assert_eq!(h.transcoder.live(), strings(&["b"]));

        h.player.skip().await.unwrap();
        assert_eq!(h.transcoder.live(), strings(&["c"]));

        h.player.set_volume(0.6).await.unwrap();
        assert_eq!(h.transcoder.started().len(), 4);
        assert_eq!(h.transcoder.live(), strings(&["c"]));

        h.player.play_immediate(remote("now"), None).await.unwrap();
        assert_eq!(h.transcoder.live(), strings(&["now"]));

        h.voice.finish_latest();
        let snapshot = h.player.snapshot().await.unwrap();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert!(!snapshot.transcoding);
        assert!(h.transcoder.live().is_empty());
    }

    #[tokio::test]
    async fn stop_kills_the_running_process() {
        let h = harness();
        h.player.enqueue(remote("a"), Some(CHANNEL)).await.unwrap();
        h.player.enqueue(remote("b"), None).await.unwrap();

        h.player.stop().await.unwrap();

        assert!(h.transcoder.live().is_empty());
        assert_eq!(h.transcoder.started().len(), 1);
    }

    #[tokio::test]
    async fn pause_and_resume() {
        let h = harness();

        assert!(h.player.pause().await.unwrap_err().is_noop());
        assert!(h.player.resume().await.unwrap_err().is_noop());

        h.player.enqueue(remote("a"), Some(CHANNEL)).await.unwrap();
        assert!(h.player.resume().await.unwrap_err().is_noop());

        h.player.pause().await.unwrap();
        assert_eq!(h.player.snapshot().await.unwrap().phase, Phase::Paused);
        assert!(h.player.pause().await.unwrap_err().is_noop());

        h.player.resume().await.unwrap();
        assert_eq!(h.player.snapshot().await.unwrap().phase, Phase::Playing);
        assert_eq!(h.voice.count(&VoiceEvent::Pause), 1);
        assert_eq!(h.voice.count(&VoiceEvent::Resume), 1);
    }

    #[tokio::test]
    async fn enqueue_while_paused_stays_paused() {
        let h = harness();
        h.player.enqueue(remote("a"), Some(CHANNEL)).await.unwrap();
        h.player.pause().await.unwrap();

        let outcome = h.player.enqueue(remote("b"), None).await.unwrap();

        assert!(matches!(outcome, EnqueueOutcome::Queued { position: 1, .. }));
        assert_eq!(h.player.snapshot().await.unwrap().phase, Phase::Paused);
    }

    #[tokio::test]
    async fn skip_needs_something_queued() {
        let h = harness();
        assert!(h.player.skip().await.unwrap_err().is_noop());

        h.player.enqueue(remote("a"), Some(CHANNEL)).await.unwrap();
        assert!(h.player.skip().await.unwrap_err().is_noop());
        assert_eq!(titles(&h.player).await, (Some("a".to_string()), vec![]));
    }

    #[tokio::test]
    async fn skip_from_paused_plays_next() {
        let h = harness();
        h.player.enqueue(remote("a"), Some(CHANNEL)).await.unwrap();
        h.player.enqueue(remote("b"), None).await.unwrap();
        h.player.pause().await.unwrap();

        h.player.skip().await.unwrap();

        let snapshot = h.player.snapshot().await.unwrap();
        assert_eq!(snapshot.phase, Phase::Playing);
        assert_eq!(snapshot.current.unwrap().title(), "b");
    }

    #[tokio::test]
    async fn stop_resets_and_disconnects() {
        let h = harness();
        h.player.enqueue(remote("a"), Some(CHANNEL)).await.unwrap();
        h.player.enqueue(remote("b"), None).await.unwrap();
        h.player.set_volume(0.7).await.unwrap();

        h.player.stop().await.unwrap();

        let snapshot = h.player.snapshot().await.unwrap();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert_eq!(snapshot.current, None);
        assert!(snapshot.queue.is_empty());
        assert!(!snapshot.connected);
        assert!(!snapshot.transcoding);
        // Settings survive a stop.
        assert_eq!(snapshot.settings.volume(), 0.7);
        assert_eq!(h.voice.count(&VoiceEvent::Disconnect), 1);

        assert!(h.player.stop().await.unwrap_err().is_noop());
    }

    #[tokio::test]
    async fn stop_during_resolution_cancels_the_request() {
        let resolver = Arc::new(GatedResolver::default());
        let h = harness_with(resolver.clone());

        let player = h.player.clone();
        let pending =
            tokio::spawn(async move { player.enqueue(remote("slow"), Some(CHANNEL)).await });

        resolver.entered.notified().await;
        assert!(h.player.stop().await.unwrap_err().is_noop());
        resolver.release.notify_one();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, PlayerError::Cancelled));
        let snapshot = h.player.snapshot().await.unwrap();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert!(snapshot.queue.is_empty());
        assert!(!snapshot.connected);
        assert!(h.voice.events().is_empty());
    }

    #[tokio::test]
    async fn failed_start_while_idle_reports_the_error() {
        let h = harness();
        h.transcoder.fail_on("broken");

        let err = h.player.enqueue(remote("broken"), Some(CHANNEL)).await.unwrap_err();

        assert!(matches!(err, PlayerError::TranscodeFailed(_)));
        let snapshot = h.player.snapshot().await.unwrap();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert!(snapshot.queue.is_empty());
    }

    #[tokio::test]
    async fn failing_queue_entries_are_skipped() {
        let h = harness();
        h.transcoder.fail_on("broken");
        for query in ["a", "broken", "c"] {
            h.player.enqueue(remote(query), Some(CHANNEL)).await.unwrap();
        }

        h.voice.finish_latest();

        assert_eq!(titles(&h.player).await, (Some("c".to_string()), vec![]));
    }

    #[tokio::test]
    async fn missing_local_file_changes_nothing() {
        let h = harness();
        h.player.enqueue(remote("a"), Some(CHANNEL)).await.unwrap();

        let err = h
            .player
            .enqueue(SourceRef::Local("/no/such/clip.ogg".into()), None)
            .await
            .unwrap_err();

        assert!(matches!(err, PlayerError::SourceNotFound(_)));
        assert_eq!(titles(&h.player).await, (Some("a".to_string()), vec![]));
    }

    #[tokio::test]
    async fn local_clip_plays_from_absolute_path() {
        let h = harness();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("thunder.ogg"), b"x").unwrap();

        let outcome = h
            .player
            .enqueue(SourceRef::Local(dir.path().join("thunder.ogg")), Some(CHANNEL))
            .await
            .unwrap();

        match outcome {
            EnqueueOutcome::Started(track) => {
                assert!(track.is_local());
                assert_eq!(track.title(), "thunder");
                assert!(std::path::Path::new(track.locator()).is_absolute());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn play_immediate_replaces_everything() {
        let h = harness();
        for query in ["a", "b", "c"] {
            h.player.enqueue(remote(query), Some(CHANNEL)).await.unwrap();
        }

        let track = h.player.play_immediate(remote("now"), None).await.unwrap();

        assert_eq!(track.title(), "now");
        assert_eq!(titles(&h.player).await, (Some("now".to_string()), vec![]));

        // The replaced stream's end notification changes nothing.
        h.voice.finish_stream(0);
        assert_eq!(titles(&h.player).await, (Some("now".to_string()), vec![]));
    }

    #[tokio::test]
    async fn adjust_clamps_and_restarts_current_track() {
        let h = harness();
        h.player.enqueue(remote("a"), Some(CHANNEL)).await.unwrap();
        h.player.enqueue(remote("b"), None).await.unwrap();

        let settings = h.player.adjust_settings(Some(3.0), Some(0.1)).await.unwrap();

        assert_eq!(settings, PlaybackSettings::new(1.0, 0.5));
        assert_eq!(
            h.transcoder.started(),
            vec![
                ("a".to_string(), PlaybackSettings::default()),
                ("a".to_string(), PlaybackSettings::new(1.0, 0.5)),
            ]
        );
        assert_eq!(titles(&h.player).await, (Some("a".to_string()), strings(&["b"])));
    }

    #[tokio::test]
    async fn adjust_while_idle_or_paused_only_stores() {
        let h = harness();
        assert_eq!(h.player.set_speed(1.5).await.unwrap().speed(), 1.5);

        h.player.enqueue(remote("a"), Some(CHANNEL)).await.unwrap();
        h.player.pause().await.unwrap();
        h.player.set_volume(0.5).await.unwrap();

        assert_eq!(h.transcoder.started().len(), 1);
        assert_eq!(h.transcoder.started()[0].1, PlaybackSettings::new(0.2, 1.5));
        assert_eq!(h.player.snapshot().await.unwrap().phase, Phase::Paused);
    }

    #[tokio::test]
    async fn voice_lost_resets_the_player() {
        let h = harness();
        h.player.enqueue(remote("a"), Some(CHANNEL)).await.unwrap();
        h.player.enqueue(remote("b"), None).await.unwrap();

        h.voice.drop_connection();
        h.player.voice_lost();

        let snapshot = h.player.snapshot().await.unwrap();
        assert!(h.transcoder.live().is_empty());
        assert_eq!(snapshot.phase, Phase::Idle);
        assert_eq!(snapshot.current, None);
        assert!(snapshot.queue.is_empty());
        assert!(!snapshot.connected);
        assert_eq!(h.voice.count(&VoiceEvent::Disconnect), 0);

        // Reconnecting needs a channel again.
        assert!(matches!(
            h.player.enqueue(remote("c"), None).await,
            Err(PlayerError::NotConnected)
        ));
        h.player.enqueue(remote("c"), Some(CHANNEL)).await.unwrap();
        assert_eq!(h.voice.count(&VoiceEvent::Connected(CHANNEL)), 2);
    }

    #[tokio::test]
    async fn late_disconnect_event_spares_the_new_session() {
        let h = harness();
        h.player.enqueue(remote("a"), Some(CHANNEL)).await.unwrap();
        h.player.stop().await.unwrap();
        h.player.enqueue(remote("b"), Some(CHANNEL)).await.unwrap();
        h.player.enqueue(remote("c"), None).await.unwrap();

        // Gateway event for the leave caused by the stop above.
        h.player.voice_lost();

        let snapshot = h.player.snapshot().await.unwrap();
        assert_eq!(snapshot.phase, Phase::Playing);
        assert_eq!(snapshot.current.map(|t| t.title().to_string()), Some("b".to_string()));
        assert_eq!(snapshot.queue.len(), 1);
        assert!(snapshot.connected);
        assert_eq!(h.transcoder.live(), strings(&["b"]));
        assert_eq!(h.voice.count(&VoiceEvent::Connected(CHANNEL)), 2);

        // The epoch was left alone, so requests keep going through.
        assert!(matches!(
            h.player.enqueue(remote("d"), None).await,
            Ok(EnqueueOutcome::Queued { position: 2, .. })
        ));
    }

    #[tokio::test]
    async fn voice_lost_without_voice_is_ignored() {
        let h = harness();
        h.player.set_volume(0.4).await.unwrap();

        h.player.voice_lost();

        assert_eq!(h.player.snapshot().await.unwrap().settings.volume(), 0.4);
    }
}
