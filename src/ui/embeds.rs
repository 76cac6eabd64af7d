use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::{
    audio::{player::Phase, PlaybackSettings, PlayerSnapshot, TrackDescriptor},
    tabletop::{
        death_save::DeathRollOutcome,
        dice::{DiceRoll, JungleRest},
        language::Rendition,
    },
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(46, 204, 113);
    pub const ERROR_RED: Colour = Colour::from_rgb(231, 76, 60);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 152, 219);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎲 Bard Bot";

/// How many queued titles fit in one embed.
const QUEUE_PREVIEW: usize = 15;

pub fn create_now_playing_embed(snapshot: &PlayerSnapshot) -> CreateEmbed {
    let (title, colour) = match snapshot.phase {
        Phase::Playing => ("🎵 Now Playing", colors::SUCCESS_GREEN),
        Phase::Paused => ("⏸️ Paused", colors::WARNING_ORANGE),
        Phase::Idle => ("💤 Nothing playing", colors::INFO_BLUE),
    };

    let description = match &snapshot.current {
        Some(track) => format!("**{}**", track.title()),
        None => "Use `/play` to start the music".to_string(),
    };

    CreateEmbed::default()
        .title(title)
        .description(description)
        .color(colour)
        .field("📜 Up next", snapshot.queue.len().to_string(), true)
        .field("🔊 Volume", format_volume(snapshot.settings.volume()), true)
        .field("⏩ Speed", format_speed(snapshot.settings.speed()), true)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

pub fn create_started_embed(track: &TrackDescriptor) -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 Now Playing")
        .description(format!("**{}**", track.title()))
        .color(colors::SUCCESS_GREEN)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

pub fn create_track_added_embed(track: &TrackDescriptor, position: usize) -> CreateEmbed {
    CreateEmbed::default()
        .title("✅ Added to queue")
        .description(format!("**{}**", track.title()))
        .color(colors::MUSIC_PURPLE)
        .field("📍 Position", position.to_string(), true)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

pub fn create_queue_embed(current: Option<&str>, queued: &[String]) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Queue")
        .color(colors::INFO_BLUE)
        .field(
            "🎵 Now playing",
            current.map_or("Nothing".to_string(), |title| format!("**{}**", title)),
            false,
        );

    embed = embed.field(
        format!("📜 Up next ({})", queued.len()),
        format_queue_lines(queued, QUEUE_PREVIEW),
        false,
    );

    embed
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Numbered list of the first `limit` titles, with a "…and N more" tail.
pub fn format_queue_lines(queued: &[String], limit: usize) -> String {
    if queued.is_empty() {
        return "The queue is empty".to_string();
    }

    let mut lines: Vec<String> = queued
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, title)| format!("**{}.** {}", i + 1, title))
        .collect();

    if queued.len() > limit {
        lines.push(format!("…and {} more", queued.len() - limit));
    }
    lines.join("\n")
}

pub fn create_settings_embed(settings: PlaybackSettings) -> CreateEmbed {
    CreateEmbed::default()
        .title("🎚️ Playback settings")
        .color(colors::MUSIC_PURPLE)
        .field("🔊 Volume", format_volume(settings.volume()), true)
        .field("⏩ Speed", format_speed(settings.speed()), true)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

pub fn create_help_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("🎲 Bard Bot - Guide")
        .color(colors::INFO_BLUE)
        .description("Music, soundboard and table tools for the campaign")
        .field(
            "🎵 Music",
            "• `/play <query>` - Plays a URL or search result\n\
            • `/pause` / `/resume` - Pauses or resumes\n\
            • `/skip` - Skips to the next track\n\
            • `/stop` - Stops, clears the queue and leaves",
            false,
        )
        .field(
            "📜 Queue",
            "• `/queue` - Shows the queue\n\
            • `/nowplaying` - Shows the current track",
            false,
        )
        .field(
            "🎛️ Audio",
            "• `/volume <0-1>` - Sets the volume\n\
            • `/speed <0.5-2>` - Sets the playback speed\n\
            • `/soundboard <clip>` - Plays a sound effect right away",
            false,
        )
        .field(
            "🎲 Table",
            "• `/roll <sides>` - Rolls a die\n\
            • `/jungle-rest` - Rests in the jungle\n\
            • `/death-roll` - Rolls a death save\n\
            • `/up` - Resets your death saves\n\
            • `/switch-language <text>` - Sends a message in a language\n\
            • `/clear-bot-posts` - Deletes the bot's messages here",
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn create_roll_embed(roll: &DiceRoll, who: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("Roll 🎲")
        .description(roll.describe(who))
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new("Standard roll"))
}

pub fn create_jungle_rest_embed(rest: &JungleRest, voice_note: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("Jungle Rest 🌴")
        .description(format!("{}\n\n{}", rest.describe(), voice_note))
        .color(colors::SUCCESS_GREEN)
        .footer(CreateEmbedFooter::new(rest.footer()))
}

pub fn create_death_roll_embed(outcome: &DeathRollOutcome, mention: &str, roll: u8) -> CreateEmbed {
    CreateEmbed::default()
        .title("Death roll ☠️")
        .description(outcome.describe(mention))
        .color(colors::ERROR_RED)
        .footer(CreateEmbedFooter::new(format!("Death roll on a {}!", roll)))
}

/// DM body for one recipient: blue when they speak the language, red when
/// all they get is gibberish.
pub fn create_language_embed(language: &str, rendition: &Rendition) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("{} Message", language))
        .description(rendition.text())
        .color(if rendition.is_clear() {
            colors::INFO_BLUE
        } else {
            colors::ERROR_RED
        })
}

fn format_volume(volume: f32) -> String {
    format!("{}%", (volume * 100.0).round() as u32)
}

fn format_speed(speed: f32) -> String {
    format!("{:.2}x", speed)
}
