use anyhow::Result;
use serenity::{
    all::{ButtonStyle, ComponentInteraction, Context},
    builder::{
        CreateActionRow, CreateButton, CreateInteractionResponse,
        CreateInteractionResponseFollowup, CreateInteractionResponseMessage, CreateSelectMenu,
        CreateSelectMenuKind, CreateSelectMenuOption,
    },
};
use tracing::{debug, info, warn};

use crate::{
    audio::{player::Phase, PlayerError, PlayerHandle},
    bot::BardBot,
    tabletop::language::LANGUAGES,
    ui::embeds,
};

/// IDs personalizados para los componentes
pub mod button_ids {
    pub const PLAY_PAUSE: &str = "music_play_pause";
    pub const SKIP: &str = "music_skip";
    pub const STOP: &str = "music_stop";
    pub const QUEUE: &str = "music_queue";
    pub const VOLUME_UP: &str = "music_volume_up";
    pub const VOLUME_DOWN: &str = "music_volume_down";

    pub const LANGUAGE_SELECT: &str = "language_select";
}

/// Volume change per button press.
pub const VOLUME_STEP: f32 = 0.1;

/// Player controls shown under now-playing messages.
pub fn create_player_buttons(phase: Phase) -> Vec<CreateActionRow> {
    let (play_pause_emoji, play_pause_style) = match phase {
        Phase::Playing => ('⏸', ButtonStyle::Secondary),
        _ => ('▶', ButtonStyle::Success),
    };
    let idle = phase == Phase::Idle;

    let play_pause_btn = CreateButton::new(button_ids::PLAY_PAUSE)
        .emoji(play_pause_emoji)
        .style(play_pause_style)
        .disabled(idle);

    let skip_btn = CreateButton::new(button_ids::SKIP)
        .emoji('⏭')
        .style(ButtonStyle::Primary)
        .disabled(idle);

    let stop_btn = CreateButton::new(button_ids::STOP)
        .emoji('⏹')
        .style(ButtonStyle::Danger);

    let row1 = CreateActionRow::Buttons(vec![play_pause_btn, skip_btn, stop_btn]);

    let vol_down_btn = CreateButton::new(button_ids::VOLUME_DOWN)
        .emoji('🔉')
        .style(ButtonStyle::Secondary);

    let vol_up_btn = CreateButton::new(button_ids::VOLUME_UP)
        .emoji('🔊')
        .style(ButtonStyle::Secondary);

    let queue_btn = CreateButton::new(button_ids::QUEUE)
        .label("Queue")
        .emoji('📋')
        .style(ButtonStyle::Secondary);

    let row2 = CreateActionRow::Buttons(vec![vol_down_btn, vol_up_btn, queue_btn]);

    vec![row1, row2]
}

/// Dropdown used by `/switch-language`.
pub fn create_language_menu() -> CreateActionRow {
    let options = LANGUAGES
        .iter()
        .map(|language| CreateSelectMenuOption::new(*language, *language))
        .collect();

    let menu = CreateSelectMenu::new(
        button_ids::LANGUAGE_SELECT,
        CreateSelectMenuKind::String { options },
    )
    .placeholder("Choose a language...")
    .min_values(1)
    .max_values(1);

    CreateActionRow::SelectMenu(menu)
}

/// Volume after one press of the up/down button.
pub fn stepped_volume(current: f32, up: bool) -> f32 {
    let next = if up {
        current + VOLUME_STEP
    } else {
        current - VOLUME_STEP
    };
    // Keep the display at whole percents despite float drift.
    (next * 100.0).round() / 100.0
}

/// Manejador de interacciones con los botones del reproductor
pub async fn handle_music_component(
    ctx: &Context,
    interaction: &ComponentInteraction,
    bot: &BardBot,
) -> Result<()> {
    let guild_id = interaction
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("No guild ID"))?;
    let player = bot.players.get_or_create(guild_id);

    let custom_id = interaction.data.custom_id.as_str();
    info!("🔘 Button {} pressed by {} in guild {}", custom_id, interaction.user.name, guild_id);

    let outcome: Result<&str, PlayerError> = match custom_id {
        button_ids::PLAY_PAUSE => match player.snapshot().await?.phase {
            Phase::Playing => player.pause().await.map(|_| "⏸️ Paused"),
            _ => player.resume().await.map(|_| "▶️ Resumed"),
        },
        button_ids::SKIP => player.skip().await.map(|_| "⏭️ Skipped"),
        button_ids::STOP => player.stop().await.map(|_| "⏹️ Stopped and cleared the queue"),
        button_ids::VOLUME_DOWN | button_ids::VOLUME_UP => {
            let current = player.snapshot().await?.settings.volume();
            let target = stepped_volume(current, custom_id == button_ids::VOLUME_UP);
            player.set_volume(target).await.map(|_| "🔊 Volume updated")
        }
        button_ids::QUEUE => {
            let (current, queued) = player.queue_snapshot().await?;
            let embed = embeds::create_queue_embed(current.as_deref(), &queued);
            interaction
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .embed(embed)
                            .ephemeral(true),
                    ),
                )
                .await?;
            return Ok(());
        }
        _ => {
            debug!("Componente no manejado: {}", custom_id);
            interaction
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content("⚠️ Unknown control")
                            .ephemeral(true),
                    ),
                )
                .await?;
            return Ok(());
        }
    };

    match outcome {
        Ok(message) => respond_with_updated_now_playing(ctx, interaction, &player, message).await,
        Err(e) => {
            if !e.is_noop() {
                warn!("Button {} failed in guild {}: {}", custom_id, guild_id, e);
            }
            interaction
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content(e.user_message())
                            .ephemeral(true),
                    ),
                )
                .await?;
            Ok(())
        }
    }
}

/// Responde a la interacción con el embed actualizado de "now playing"
async fn respond_with_updated_now_playing(
    ctx: &Context,
    interaction: &ComponentInteraction,
    player: &PlayerHandle,
    ephemeral_message: &str,
) -> Result<()> {
    let snapshot = player.snapshot().await?;

    interaction
        .create_response(
            &ctx.http,
            CreateInteractionResponse::UpdateMessage(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::create_now_playing_embed(&snapshot))
                    .components(create_player_buttons(snapshot.phase)),
            ),
        )
        .await?;

    interaction
        .create_followup(
            &ctx.http,
            CreateInteractionResponseFollowup::new()
                .content(ephemeral_message)
                .ephemeral(true),
        )
        .await?;

    Ok(())
}
