use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::audio::track::{DEFAULT_SPEED, DEFAULT_VOLUME, MAX_SPEED, MAX_VOLUME, MIN_SPEED, MIN_VOLUME};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub default_volume: f32,
    pub default_speed: f32,
    pub reconnect_delay_max: u64, // En segundos

    // Binarios externos
    pub ffmpeg_path: PathBuf,
    pub ytdlp_path: PathBuf,

    // Soundboard
    pub soundboard_dir: PathBuf,
    pub jungle_rest_url: String,

    // Mesa
    pub broadcast_role: String,
    pub clear_scan_limit: u16,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Audio
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| DEFAULT_VOLUME.to_string())
                .parse()?,
            default_speed: std::env::var("DEFAULT_SPEED")
                .unwrap_or_else(|_| DEFAULT_SPEED.to_string())
                .parse()?,
            reconnect_delay_max: std::env::var("RECONNECT_DELAY_MAX")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,

            // Binarios externos
            ffmpeg_path: std::env::var("FFMPEG_PATH")
                .unwrap_or_else(|_| "ffmpeg".to_string())
                .into(),
            ytdlp_path: std::env::var("YTDLP_PATH")
                .unwrap_or_else(|_| "yt-dlp".to_string())
                .into(),

            // Soundboard
            soundboard_dir: std::env::var("SOUNDBOARD_DIR")
                .unwrap_or_else(|_| "./sounds".to_string())
                .into(),
            jungle_rest_url: std::env::var("JUNGLE_REST_URL")
                .unwrap_or_else(|_| Self::default().jungle_rest_url),

            // Mesa
            broadcast_role: std::env::var("BROADCAST_ROLE")
                .unwrap_or_else(|_| "Spiller".to_string()),
            clear_scan_limit: std::env::var("CLEAR_SCAN_LIMIT")
                .unwrap_or_else(|_| "250".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Sanity checks that would otherwise only show up at playback time.
    ///
    /// - Default volume within 0.0..=1.0 and speed within 0.5..=2.0
    /// - Token and role name must not be blank
    /// - Message scan limit must be at least 1
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN is empty");
        }

        if !(MIN_VOLUME..=MAX_VOLUME).contains(&self.default_volume) {
            anyhow::bail!(
                "Default volume must be between {} and {}, got: {}",
                MIN_VOLUME,
                MAX_VOLUME,
                self.default_volume
            );
        }

        if !(MIN_SPEED..=MAX_SPEED).contains(&self.default_speed) {
            anyhow::bail!(
                "Default speed must be between {} and {}, got: {}",
                MIN_SPEED,
                MAX_SPEED,
                self.default_speed
            );
        }

        if self.broadcast_role.trim().is_empty() {
            anyhow::bail!("BROADCAST_ROLE must not be empty");
        }

        if self.clear_scan_limit == 0 {
            anyhow::bail!("CLEAR_SCAN_LIMIT must be greater than 0");
        }

        Ok(())
    }

    pub fn reconnect_delay_max(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_max)
    }

    /// Safe to log: leaves the token out.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: commands {}\n  \
            Audio: {}% vol, {}x speed, reconnect ≤{}s\n  \
            Binaries: ffmpeg={}, yt-dlp={}\n  \
            Soundboard: {}\n  \
            Table: broadcast role '{}', clear scan {} messages",
            self.guild_id
                .map_or("global".to_string(), |id| format!("guild {}", id)),
            (self.default_volume * 100.0).round() as u32,
            self.default_speed,
            self.reconnect_delay_max,
            self.ffmpeg_path.display(),
            self.ytdlp_path.display(),
            self.soundboard_dir.display(),
            self.broadcast_role,
            self.clear_scan_limit,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (sin valor por defecto, debe venir del entorno)
            discord_token: String::new(),
            guild_id: None,

            default_volume: DEFAULT_VOLUME,
            default_speed: DEFAULT_SPEED,
            reconnect_delay_max: 5,

            ffmpeg_path: "ffmpeg".into(),
            ytdlp_path: "yt-dlp".into(),

            soundboard_dir: "./sounds".into(),
            jungle_rest_url: "https://www.youtube.com/watch?v=KEI4qSrkPAs".to_string(),

            broadcast_role: "Spiller".to_string(),
            clear_scan_limit: 250,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            discord_token: "token".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn rejects_blank_token() {
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_defaults() {
        let loud = Config {
            default_volume: 1.5,
            ..valid()
        };
        assert!(loud.validate().is_err());

        let fast = Config {
            default_speed: 3.0,
            ..valid()
        };
        assert!(fast.validate().is_err());

        let no_scan = Config {
            clear_scan_limit: 0,
            ..valid()
        };
        assert!(no_scan.validate().is_err());
    }

    #[test]
    fn summary_hides_token() {
        let config = Config {
            discord_token: "super-secret".to_string(),
            guild_id: Some(123),
            ..Config::default()
        };
        let summary = config.summary();
        assert!(!summary.contains("super-secret"));
        assert!(summary.contains("guild 123"));
        assert!(summary.contains("20% vol"));
    }
}
