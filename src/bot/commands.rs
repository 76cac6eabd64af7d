use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId, Permissions},
    prelude::Context,
};

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

pub fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        soundboard_command(),
        pause_command(),
        resume_command(),
        skip_command(),
        stop_command(),
        queue_command(),
        nowplaying_command(),
        volume_command(),
        speed_command(),
        help_command(),
        roll_command(),
        jungle_rest_command(),
        death_roll_command(),
        up_command(),
        clear_bot_posts_command(),
        switch_language_command(),
    ]
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Play a song from a URL or a search")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "query", "URL or search terms")
                .required(true),
        )
}

fn soundboard_command() -> CreateCommand {
    CreateCommand::new("soundboard")
        .description("Play a sound effect right away")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "clip", "Name of the clip")
                .required(true),
        )
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pause the music")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Resume the music")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Skip to the next song in the queue")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Stop the music, clear the queue and leave the channel")
}

// Comandos de cola

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Show the queue")
}

fn nowplaying_command() -> CreateCommand {
    CreateCommand::new("nowplaying").description("Show what's playing")
}

// Comandos de audio

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Set the playback volume")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Number,
                "level",
                "Volume from 0.0 to 1.0",
            )
            .required(true),
        )
}

fn speed_command() -> CreateCommand {
    CreateCommand::new("speed")
        .description("Set the playback speed")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Number,
                "factor",
                "Speed from 0.5 to 2.0",
            )
            .required(true),
        )
}

fn help_command() -> CreateCommand {
    CreateCommand::new("help").description("Show the available commands")
}

// Comandos de mesa

fn roll_command() -> CreateCommand {
    CreateCommand::new("roll")
        .description("Roll a random number between 0 and the given number")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "number", "Sides of the die")
                .required(true),
        )
}

fn jungle_rest_command() -> CreateCommand {
    CreateCommand::new("jungle-rest")
        .description("Take a rest in the jungle and receive a surprise!")
}

fn death_roll_command() -> CreateCommand {
    CreateCommand::new("death-roll").description("Roll death saves")
}

fn up_command() -> CreateCommand {
    CreateCommand::new("up").description(
        "Revive yourself if you have 3 success rolls or you somehow figured out how not to die!",
    )
}

fn clear_bot_posts_command() -> CreateCommand {
    CreateCommand::new("clear-bot-posts")
        .description("Delete all posts made by the bot in this channel")
        .default_member_permissions(Permissions::MANAGE_MESSAGES)
}

fn switch_language_command() -> CreateCommand {
    CreateCommand::new("switch-language")
        .description("Post a secret message that only specific users can read")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "content", "The secret message")
                .required(true),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn command_names_are_unique_and_valid() {
        let names: Vec<String> = all_commands()
            .into_iter()
            .map(|c| serde_json::to_value(c).unwrap()["name"].as_str().unwrap().to_string())
            .collect();

        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), names.len());

        for name in &names {
            assert!(name.len() <= 32);
            assert!(name.chars().all(|c| c.is_ascii_lowercase() || c == '-'));
        }
    }

    #[test]
    fn descriptions_fit_discord_limit() {
        for command in all_commands() {
            let value = serde_json::to_value(command).unwrap();
            let description = value["description"].as_str().unwrap();
            assert!(!description.is_empty() && description.chars().count() <= 100);
        }
    }
}
