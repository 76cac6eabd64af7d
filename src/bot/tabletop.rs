//! Slash commands for the game table.

use anyhow::Result;
use futures::StreamExt;
use rand::Rng;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseFollowup,
        CreateInteractionResponseMessage, CreateMessage, EditInteractionResponse, GetMessages,
    },
    model::{
        application::{CommandInteraction, ComponentInteraction, ComponentInteractionDataKind},
        id::GuildId,
    },
    prelude::Context,
};
use tracing::{debug, info, warn};

use crate::{
    audio::EnqueueOutcome,
    bot::{
        handlers::{get_user_voice_channel, integer_option, respond_ephemeral, string_option},
        BardBot,
    },
    sources::SourceRef,
    tabletop::{
        dice::{DiceRoll, JungleRest},
        language::{self, Rendition},
    },
    ui::{buttons, embeds},
};

/// Discord returns at most this many messages per history request.
const HISTORY_PAGE: u16 = 100;

pub async fn handle_roll(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let sides = integer_option(command, "number").unwrap_or(0);
    let roll = DiceRoll::roll(&mut rand::thread_rng(), sides);

    let Some(roll) = roll else {
        return respond_ephemeral(ctx, command, "Please provide a positive number!").await;
    };

    let who = display_name(command);
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embeds::create_roll_embed(&roll, &who)),
            ),
        )
        .await?;
    Ok(())
}

/// Rolls the rest and, when the caller is in voice, queues jungle ambience.
pub async fn handle_jungle_rest(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &BardBot,
    guild_id: GuildId,
) -> Result<()> {
    let rest = JungleRest::roll(&mut rand::thread_rng());

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let voice_note = match get_user_voice_channel(ctx, guild_id, command.user.id) {
        Some(channel) => {
            let player = bot.players.get_or_create(guild_id);
            let source = SourceRef::Remote(bot.config.jungle_rest_url.clone());
            match player.enqueue(source, Some(channel)).await {
                Ok(EnqueueOutcome::Started(_)) => "🌴 Now playing jungle sounds!".to_string(),
                Ok(EnqueueOutcome::Queued { position, .. }) => {
                    format!("🌴 Jungle sounds added to the queue (#{})", position)
                }
                Err(e) => {
                    warn!("Jungle ambience failed in guild {}: {}", guild_id, e);
                    e.user_message()
                }
            }
        }
        None => "Join a voice channel to hear jungle sounds!".to_string(),
    };

    command
        .edit_response(
            &ctx.http,
            EditInteractionResponse::new().embed(embeds::create_jungle_rest_embed(&rest, &voice_note)),
        )
        .await?;
    Ok(())
}

pub async fn handle_death_roll(ctx: &Context, command: &CommandInteraction, bot: &BardBot) -> Result<()> {
    let roll: u8 = rand::thread_rng().gen_range(1..=20);
    let outcome = bot.death_saves.roll(command.user.id, roll);
    let mention = format!("<@{}>", command.user.id);

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::create_death_roll_embed(&outcome, &mention, roll)),
            ),
        )
        .await?;
    Ok(())
}

pub async fn handle_up(ctx: &Context, command: &CommandInteraction, bot: &BardBot) -> Result<()> {
    bot.death_saves.reset(command.user.id);

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().content(
                format!(
                    "<@{}>, you're back up! You're fully revived and ready to fight! 💪",
                    command.user.id
                ),
            )),
        )
        .await?;
    Ok(())
}

/// Page sizes needed to scan `limit` messages of history.
pub fn history_pages(limit: u16) -> Vec<u8> {
    let mut pages = Vec::new();
    let mut remaining = limit;
    while remaining > 0 {
        let page = remaining.min(HISTORY_PAGE);
        pages.push(page as u8);
        remaining -= page;
    }
    pages
}

pub async fn handle_clear_bot_posts(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &BardBot,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new().ephemeral(true)),
        )
        .await?;

    let bot_id = ctx.cache.current_user().id;
    let channel_id = command.channel_id;
    let mut before = None;
    let mut deleted = 0usize;
    let mut failed = 0usize;

    for page in history_pages(bot.config.clear_scan_limit) {
        let mut request = GetMessages::new().limit(page);
        if let Some(id) = before {
            request = request.before(id);
        }

        let messages = channel_id.messages(&ctx.http, request).await?;
        let Some(oldest) = messages.last() else {
            break;
        };
        before = Some(oldest.id);
        let exhausted = messages.len() < page as usize;

        for message in messages.iter().filter(|m| m.author.id == bot_id) {
            match message.delete(ctx).await {
                Ok(()) => deleted += 1,
                Err(e) => {
                    debug!("Could not delete message {}: {}", message.id, e);
                    failed += 1;
                }
            }
        }

        if exhausted {
            break;
        }
    }

    info!("🧹 Deleted {} bot messages in channel {}", deleted, channel_id);

    let content = if deleted > 0 {
        format!("Deleted {} messages made by the bot.", deleted)
    } else if failed > 0 {
        "I don't have permission to delete messages in this channel.".to_string()
    } else {
        "No messages from the bot found in this channel.".to_string()
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;
    Ok(())
}

/// Posts the language picker; the message text waits until a language is chosen.
pub async fn handle_switch_language(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &BardBot,
) -> Result<()> {
    let content = string_option(command, "content")
        .ok_or_else(|| anyhow::anyhow!("Missing content"))?
        .to_string();

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content("Choose a language to send the message in:")
                    .components(vec![buttons::create_language_menu()]),
            ),
        )
        .await?;

    let prompt = command.get_response(&ctx.http).await?;
    bot.pending_broadcasts.insert(prompt.id, content);
    debug!("🗣️ Language prompt {} waiting for a choice", prompt.id);
    Ok(())
}

/// DMs the pending message to every player: readable for those who speak the
/// chosen language, gibberish for everyone else.
pub async fn handle_language_selected(
    ctx: &Context,
    component: &ComponentInteraction,
    bot: &BardBot,
) -> Result<()> {
    let guild_id = component
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Component used outside a server"))?;

    let language = match &component.data.kind {
        ComponentInteractionDataKind::StringSelect { values } => values.first().cloned(),
        _ => None,
    }
    .filter(|value| language::is_language(value));

    let (Some(language), Some(content)) =
        (language, bot.pending_broadcasts.get(component.message.id))
    else {
        component
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content("⚠️ This message is no longer available")
                        .ephemeral(true),
                ),
            )
            .await?;
        return Ok(());
    };

    component.defer(&ctx.http).await?;
    info!("🗣️ Broadcasting a {} message in guild {}", language, guild_id);

    let roles = guild_id.roles(&ctx.http).await?;
    let broadcast_role = bot.config.broadcast_role.as_str();

    let mut sent = 0usize;
    let mut members = guild_id.members_iter(&ctx.http).boxed();
    while let Some(member) = members.next().await {
        let member = match member {
            Ok(member) => member,
            Err(e) => {
                warn!("Could not list members of guild {}: {}", guild_id, e);
                break;
            }
        };
        if member.user.bot {
            continue;
        }

        let role_names: Vec<&str> = member
            .roles
            .iter()
            .filter_map(|id| roles.get(id).map(|role| role.name.as_str()))
            .collect();

        if !language::has_role(broadcast_role, role_names.iter().copied()) {
            continue;
        }

        let understood = language::understands(&language, role_names.iter().copied());
        let rendition = Rendition::for_reader(&mut rand::thread_rng(), &content, understood);
        let embed = embeds::create_language_embed(&language, &rendition);

        match member
            .user
            .direct_message(ctx, CreateMessage::new().embed(embed))
            .await
        {
            Ok(_) => sent += 1,
            Err(e) => warn!(
                "Couldn't DM {}, they may have DMs disabled: {}",
                member.user.name, e
            ),
        }
    }

    info!("📨 {} message delivered to {} players", language, sent);

    component
        .create_followup(
            &ctx.http,
            CreateInteractionResponseFollowup::new()
                .content("The message has been sent to everyone in the guild (via DM)."),
        )
        .await?;
    Ok(())
}

fn display_name(command: &CommandInteraction) -> String {
    command
        .member
        .as_ref()
        .map(|member| member.display_name().to_string())
        .unwrap_or_else(|| command.user.display_name().to_string())
}
