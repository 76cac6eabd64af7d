//! # Bot Module
//!
//! Discord glue for the bard bot.
//!
//! - Command registration and dispatch ([`commands`], [`handlers`])
//! - Table commands: dice, death saves, language broadcasts ([`tabletop`])
//! - Event handling (ready, interactions, voice state updates)
//! - Background maintenance tasks
//!
//! ## Architecture
//!
//! [`BardBot`] implements Serenity's [`EventHandler`]. Playback state lives in
//! per-guild player tasks reached through the shared [`PlayerRegistry`]; the
//! bot itself only keeps the table state (death saves, pending broadcasts).

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::{path::Path, sync::Arc};
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;
pub mod tabletop;

use crate::{
    audio::PlayerRegistry,
    config::Config,
    sources::Soundboard,
    tabletop::{DeathSaveTracker, PendingBroadcasts},
};

pub struct BardBot {
    pub config: Arc<Config>,
    /// One player task per guild
    pub players: Arc<PlayerRegistry>,
    pub soundboard: Soundboard,
    pub death_saves: DeathSaveTracker,
    /// Contenido de `/switch-language` esperando a que se elija idioma
    pub pending_broadcasts: PendingBroadcasts,
}

impl BardBot {
    pub fn new(config: Config, players: Arc<PlayerRegistry>) -> Self {
        let soundboard = Soundboard::new(config.soundboard_dir.clone());

        Self {
            config: Arc::new(config),
            players,
            soundboard,
            death_saves: DeathSaveTracker::new(),
            pending_broadcasts: PendingBroadcasts::new(),
        }
    }

    /// Registers slash commands: per guild when `GUILD_ID` is set (instant
    /// updates, for development), globally otherwise.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registering slash commands...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registering commands for guild {}", guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ The bot is not in the configured guild: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id)
                    .await
                    .map_err(|e| {
                        error!("❌ Error registering guild commands: {:?}", e);
                        anyhow::anyhow!("Could not register guild commands. Check the bot has the 'applications.commands' scope in the guild.")
                    })?;
                info!("✅ Guild commands registered for {}", guild_id);
            }
            None => {
                info!("🌐 Registering global commands");
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registering global commands: {:?}", e);
                    anyhow::anyhow!("Could not register global commands. Check the bot has the 'applications.commands' scope.")
                })?;
                info!("✅ Global commands registered");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for BardBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} servers", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error registering commands: {:?}", e);
        }

        let config = self.config.clone();
        let players = self.players.clone();
        let soundboard = self.soundboard.clone();

        tokio::spawn(async move {
            maintenance_tasks(config, players, soundboard).await;
        });
    }

    /// Errors are logged and never take the bot down; Discord shows the user
    /// "This interaction failed" instead.
    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command_interaction) => {
                if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                    error!("Error handling command: {:?}", e);
                }
            }
            Interaction::Component(component_interaction) => {
                if let Err(e) = handlers::handle_component(&ctx, component_interaction, self).await
                {
                    error!("Error handling component: {:?}", e);
                }
            }
            _ => {}
        }
    }

    /// Someone else disconnected the bot: tell the guild's player so it drops
    /// its session and queue.
    async fn voice_state_update(&self, ctx: Context, _old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || new.channel_id.is_some() {
            return;
        }

        if let Some(guild_id) = new.guild_id {
            if let Some(player) = self.players.get(guild_id) {
                info!("🔌 Bot left voice in guild {}", guild_id);
                player.voice_lost();
            }
        }
    }
}

/// Checks that the external binaries answer to `--version`.
pub async fn verify_dependencies(ffmpeg: &Path, ytdlp: &Path) -> Result<()> {
    let ffmpeg_ok = async_process::Command::new(ffmpeg)
        .arg("-version")
        .output()
        .await
        .map(|out| out.status.success())
        .unwrap_or(false);

    let ytdlp_ok = async_process::Command::new(ytdlp)
        .arg("--version")
        .output()
        .await
        .map(|out| out.status.success())
        .unwrap_or(false);

    match (ffmpeg_ok, ytdlp_ok) {
        (true, true) => Ok(()),
        (false, _) => anyhow::bail!("ffmpeg not available at {}", ffmpeg.display()),
        (_, false) => anyhow::bail!("yt-dlp not available at {}", ytdlp.display()),
    }
}

/// Hourly housekeeping: dependency check and a status line.
async fn maintenance_tasks(config: Arc<Config>, players: Arc<PlayerRegistry>, soundboard: Soundboard) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(3600)); // Cada hora

    loop {
        interval.tick().await;

        if let Err(e) = verify_dependencies(&config.ffmpeg_path, &config.ytdlp_path).await {
            warn!("Dependency check failed: {:?}", e);
        }

        info!(
            "🧹 Maintenance done: {} guild players, {} soundboard clips",
            players.len(),
            soundboard.clips().await.len()
        );
    }
}
