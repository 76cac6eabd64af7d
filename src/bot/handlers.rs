use anyhow::Result;
use serenity::{
    builder::{CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse},
    model::{
        application::{CommandInteraction, ComponentInteraction},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{
    audio::{player::Phase, EnqueueOutcome, PlayerError},
    bot::{tabletop, BardBot},
    sources::SourceRef,
    ui::{buttons, embeds},
};

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &BardBot) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Command used outside a server"))?;

    info!(
        "📝 /{} used by {} in guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id).await?,
        "soundboard" => handle_soundboard(ctx, &command, bot, guild_id).await?,
        "pause" => handle_pause(ctx, &command, bot, guild_id).await?,
        "resume" => handle_resume(ctx, &command, bot, guild_id).await?,
        "skip" => handle_skip(ctx, &command, bot, guild_id).await?,
        "stop" => handle_stop(ctx, &command, bot, guild_id).await?,
        "queue" => handle_queue(ctx, &command, bot, guild_id).await?,
        "nowplaying" => handle_nowplaying(ctx, &command, bot, guild_id).await?,
        "volume" => handle_volume(ctx, &command, bot, guild_id).await?,
        "speed" => handle_speed(ctx, &command, bot, guild_id).await?,
        "help" => handle_help(ctx, &command).await?,
        "roll" => tabletop::handle_roll(ctx, &command).await?,
        "jungle-rest" => tabletop::handle_jungle_rest(ctx, &command, bot, guild_id).await?,
        "death-roll" => tabletop::handle_death_roll(ctx, &command, bot).await?,
        "up" => tabletop::handle_up(ctx, &command, bot).await?,
        "clear-bot-posts" => tabletop::handle_clear_bot_posts(ctx, &command, bot).await?,
        "switch-language" => tabletop::handle_switch_language(ctx, &command, bot).await?,
        _ => respond_ephemeral(ctx, &command, "❌ Unknown command").await?,
    }

    Ok(())
}

/// Maneja interacciones con componentes (botones, menús, etc.)
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    bot: &BardBot,
) -> Result<()> {
    match component.data.custom_id.as_str() {
        buttons::button_ids::LANGUAGE_SELECT => {
            tabletop::handle_language_selected(ctx, &component, bot).await
        }
        _ => buttons::handle_music_component(ctx, &component, bot).await,
    }
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &BardBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = string_option(command, "query")
        .ok_or_else(|| anyhow::anyhow!("Missing query"))?
        .to_string();

    // Resolving can take a while
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let channel = get_user_voice_channel(ctx, guild_id, command.user.id);
    let player = bot.players.get_or_create(guild_id);

    let response = match player.enqueue(SourceRef::Remote(query), channel).await {
        Ok(EnqueueOutcome::Started(track)) => EditInteractionResponse::new()
            .embed(embeds::create_started_embed(&track))
            .components(buttons::create_player_buttons(Phase::Playing)),
        Ok(EnqueueOutcome::Queued { track, position }) => EditInteractionResponse::new()
            .embed(embeds::create_track_added_embed(&track, position)),
        Err(e) => error_edit(guild_id, "play", &e),
    };

    command.edit_response(&ctx.http, response).await?;
    Ok(())
}

async fn handle_soundboard(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &BardBot,
    guild_id: GuildId,
) -> Result<()> {
    let clip = string_option(command, "clip")
        .ok_or_else(|| anyhow::anyhow!("Missing clip"))?
        .to_string();

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let channel = get_user_voice_channel(ctx, guild_id, command.user.id);
    let player = bot.players.get_or_create(guild_id);

    let result = match bot.soundboard.source_for(&clip).await {
        Ok(source) => player.play_immediate(source, channel).await,
        Err(e) => Err(e),
    };

    let response = match result {
        Ok(track) => EditInteractionResponse::new()
            .content(format!("🔈 Playing **{}**", track.title())),
        Err(PlayerError::SourceNotFound(_)) => {
            let clips = bot.soundboard.clips().await;
            let available = if clips.is_empty() {
                "No clips available".to_string()
            } else {
                clips.join(", ")
            };
            EditInteractionResponse::new().content(format!(
                "❌ Unknown clip `{}`. Available: {}",
                clip, available
            ))
        }
        Err(e) => error_edit(guild_id, "soundboard", &e),
    };

    command.edit_response(&ctx.http, response).await?;
    Ok(())
}

async fn handle_pause(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &BardBot,
    guild_id: GuildId,
) -> Result<()> {
    let result = bot.players.get_or_create(guild_id).pause().await;
    respond_player_result(ctx, command, guild_id, result.map(|_| "⏸️ Paused".to_string())).await
}

async fn handle_resume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &BardBot,
    guild_id: GuildId,
) -> Result<()> {
    let result = bot.players.get_or_create(guild_id).resume().await;
    respond_player_result(ctx, command, guild_id, result.map(|_| "▶️ Resumed".to_string())).await
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &BardBot,
    guild_id: GuildId,
) -> Result<()> {
    let result = bot.players.get_or_create(guild_id).skip().await.map(|next| match next {
        Some(track) => format!("⏭️ Skipped! Now playing **{}**", track.title()),
        None => "⏭️ Skipped, but nothing left in the queue could be played".to_string(),
    });
    respond_player_result(ctx, command, guild_id, result).await
}

async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &BardBot,
    guild_id: GuildId,
) -> Result<()> {
    let result = bot.players.get_or_create(guild_id).stop().await;
    respond_player_result(
        ctx,
        command,
        guild_id,
        result.map(|_| "⏹️ Stopped the music and cleared the queue".to_string()),
    )
    .await
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &BardBot,
    guild_id: GuildId,
) -> Result<()> {
    match bot.players.get_or_create(guild_id).queue_snapshot().await {
        Ok((current, queued)) => {
            let embed = embeds::create_queue_embed(current.as_deref(), &queued);
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new().embed(embed),
                    ),
                )
                .await?;
            Ok(())
        }
        Err(e) => respond_player_result(ctx, command, guild_id, Err(e)).await,
    }
}

async fn handle_nowplaying(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &BardBot,
    guild_id: GuildId,
) -> Result<()> {
    match bot.players.get_or_create(guild_id).snapshot().await {
        Ok(snapshot) => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .embed(embeds::create_now_playing_embed(&snapshot))
                            .components(buttons::create_player_buttons(snapshot.phase)),
                    ),
                )
                .await?;
            Ok(())
        }
        Err(e) => respond_player_result(ctx, command, guild_id, Err(e)).await,
    }
}

async fn handle_volume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &BardBot,
    guild_id: GuildId,
) -> Result<()> {
    let level = number_option(command, "level")
        .ok_or_else(|| anyhow::anyhow!("Missing level"))? as f32;
    let result = bot.players.get_or_create(guild_id).set_volume(level).await;
    respond_settings(ctx, command, guild_id, result).await
}

async fn handle_speed(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &BardBot,
    guild_id: GuildId,
) -> Result<()> {
    let factor = number_option(command, "factor")
        .ok_or_else(|| anyhow::anyhow!("Missing factor"))? as f32;
    let result = bot.players.get_or_create(guild_id).set_speed(factor).await;
    respond_settings(ctx, command, guild_id, result).await
}

async fn handle_help(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::create_help_embed())
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

// Utilidades

async fn respond_settings(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    result: Result<crate::audio::PlaybackSettings, PlayerError>,
) -> Result<()> {
    match result {
        Ok(settings) => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .embed(embeds::create_settings_embed(settings)),
                    ),
                )
                .await?;
            Ok(())
        }
        Err(e) => respond_player_result(ctx, command, guild_id, Err(e)).await,
    }
}

/// Success is shown to the channel; errors and no-ops only to the caller.
async fn respond_player_result(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    result: Result<String, PlayerError>,
) -> Result<()> {
    let (content, ephemeral) = match result {
        Ok(message) => (message, false),
        Err(e) => {
            log_player_error(guild_id, &command.data.name, &e);
            (e.user_message(), true)
        }
    };

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

fn error_edit(guild_id: GuildId, action: &str, error: &PlayerError) -> EditInteractionResponse {
    log_player_error(guild_id, action, error);
    EditInteractionResponse::new().content(error.user_message())
}

fn log_player_error(guild_id: GuildId, action: &str, error: &PlayerError) {
    if error.is_noop() {
        info!("ℹ️ /{} in guild {}: {}", action, guild_id, error);
    } else {
        warn!("❌ /{} failed in guild {}: {}", action, guild_id, error);
    }
}

pub(crate) async fn respond_ephemeral(
    ctx: &Context,
    command: &CommandInteraction,
    content: &str,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

pub(crate) fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

pub(crate) fn integer_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

fn number_option(command: &CommandInteraction, name: &str) -> Option<f64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_f64())
}

/// The caller's current voice channel, from the cache.
pub(crate) fn get_user_voice_channel(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
