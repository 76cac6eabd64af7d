use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::info;

use crate::{
    audio::{
        player::PlayerHandle,
        track::PlaybackSettings,
        transcode::Transcoder,
        voice::VoiceConnector,
    },
    sources::resolver::MediaResolver,
};

/// One player per guild, created on first use and kept for the life of the
/// process.
pub struct PlayerRegistry {
    players: DashMap<GuildId, PlayerHandle>,
    connector: Arc<dyn VoiceConnector>,
    transcoder: Arc<dyn Transcoder>,
    resolver: Arc<dyn MediaResolver>,
    defaults: PlaybackSettings,
}

impl PlayerRegistry {
    pub fn new(
        connector: Arc<dyn VoiceConnector>,
        transcoder: Arc<dyn Transcoder>,
        resolver: Arc<dyn MediaResolver>,
        defaults: PlaybackSettings,
    ) -> Self {
        Self {
            players: DashMap::new(),
            connector,
            transcoder,
            resolver,
            defaults,
        }
    }

    /// Concurrent first calls for the same guild still produce a single
    /// player: the entry lock covers the spawn.
    pub fn get_or_create(&self, guild_id: GuildId) -> PlayerHandle {
        self.players
            .entry(guild_id)
            .or_insert_with(|| {
                info!("🎛️ New player for guild {}", guild_id);
                PlayerHandle::spawn(
                    guild_id,
                    self.defaults,
                    self.connector.clone(),
                    self.transcoder.clone(),
                    self.resolver.clone(),
                )
            })
            .clone()
    }

    /// Existing player only; used by events that must not create one.
    pub fn get(&self, guild_id: GuildId) -> Option<PlayerHandle> {
        self.players.get(&guild_id).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{FakeConnector, FakeTranscoder};
    use crate::sources::resolver::MockMediaResolver;

    fn registry() -> PlayerRegistry {
        PlayerRegistry::new(
            Arc::new(FakeConnector::default()),
            Arc::new(FakeTranscoder::default()),
            Arc::new(MockMediaResolver::new()),
            PlaybackSettings::default(),
        )
    }

    #[tokio::test]
    async fn one_player_per_guild() {
        let registry = registry();
        assert!(registry.is_empty());
        assert!(registry.get(GuildId::new(1)).is_none());

        let a = registry.get_or_create(GuildId::new(1));
        let b = registry.get_or_create(GuildId::new(1));
        let c = registry.get_or_create(GuildId::new(2));

        assert_eq!(registry.len(), 2);
        assert_eq!(a.guild_id(), b.guild_id());
        assert_eq!(c.guild_id(), GuildId::new(2));
        assert!(registry.get(GuildId::new(1)).is_some());
    }

    #[tokio::test]
    async fn concurrent_first_use_creates_one_player() {
        let registry = Arc::new(registry());
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.get_or_create(GuildId::new(7)).guild_id()
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap(), GuildId::new(7));
        }
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn guilds_are_isolated() {
        let registry = registry();
        let one = registry.get_or_create(GuildId::new(1));
        let two = registry.get_or_create(GuildId::new(2));

        one.set_volume(0.9).await.unwrap();

        assert_eq!(one.snapshot().await.unwrap().settings.volume(), 0.9);
        assert_eq!(two.snapshot().await.unwrap().settings.volume(), 0.2);
    }
}
