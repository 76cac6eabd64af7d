use anyhow::{Context as _, Result};
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod sources;
mod tabletop;
mod ui;

use crate::audio::{
    track::PlaybackSettings, transcode::FfmpegTranscoder, voice::SongbirdConnector, PlayerRegistry,
};
use crate::bot::BardBot;
use crate::config::Config;
use crate::sources::YtDlpResolver;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bard_bot=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎲 Starting Bard Bot v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load().context("could not load configuration")?;

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        bot::verify_dependencies(&config.ffmpeg_path, &config.ytdlp_path).await?;
        println!("OK");
        return Ok(());
    }

    info!("{}", config.summary());

    // Intents: voice states for the voice cache, members for language broadcasts
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES;

    let songbird = Songbird::serenity();

    let players = Arc::new(PlayerRegistry::new(
        Arc::new(SongbirdConnector::new(songbird.clone())),
        Arc::new(FfmpegTranscoder::new(
            config.ffmpeg_path.clone(),
            config.reconnect_delay_max(),
        )),
        Arc::new(YtDlpResolver::new(config.ytdlp_path.clone())),
        PlaybackSettings::new(config.default_volume, config.default_speed),
    ));

    let handler = BardBot::new(config.clone(), players);

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await
        .context("could not build the Discord client")?;

    // Manejar shutdown graceful
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Could not listen for Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Shutdown signal received, exiting...");
        std::process::exit(0);
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
