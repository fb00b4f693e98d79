//! Bot configuration.
//!
//! Settings come from an optional TOML file and are then overlaid by
//! environment variables, so a deployment can keep the token out of the
//! file entirely.
//!
//! # Environment Variables
//!
//! - `DISCORD_TOKEN` -> bot_token
//! - `DISCORD_GUILD_IDS` or `DISCORD_GUILD_ID` (comma-separated) -> allowed_guilds
//! - `DISCORD_ADMIN_USERS` (comma-separated) -> admin_users
//! - `CALCBOT_ROLE_NAME` -> role_name
//! - `CALCBOT_PREFIX` -> command_prefix

use std::path::{Path, PathBuf};
use std::time::Duration;

use calcbot_core::Limits;
use serde::{Deserialize, Serialize};
use serenity::model::id::GuildId;
use tracing::warn;

use crate::error::{DiscordError, Result};

pub const DEFAULT_PREFIX: &str = "!";
pub const DEFAULT_ROLE_NAME: &str = "Gay";
pub const DEFAULT_MENU_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_COMPUTE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOG_FILE: &str = "discord.log";

/// Discord bot configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Discord bot token (required).
    pub bot_token: String,
    /// Prefix for text commands.
    pub command_prefix: String,
    /// The self-assignable role managed by `assign` and `remove`.
    pub role_name: String,
    /// Guilds that get the slash command registered directly. Global
    /// registration when unset.
    pub allowed_guilds: Option<Vec<String>>,
    /// Users allowed to run `logout`. Anyone may when unset.
    pub admin_users: Option<Vec<String>>,
    /// Seconds without activity before an open math menu stops responding.
    pub menu_timeout_secs: u64,
    /// Seconds a single math request may run before it is abandoned.
    pub compute_timeout_secs: u64,
    /// Highest derivative order accepted by the math menu.
    pub max_derivative_order: u32,
    /// Log file, truncated at startup.
    pub log_file: PathBuf,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            command_prefix: DEFAULT_PREFIX.to_string(),
            role_name: DEFAULT_ROLE_NAME.to_string(),
            allowed_guilds: None,
            admin_users: None,
            menu_timeout_secs: DEFAULT_MENU_TIMEOUT_SECS,
            compute_timeout_secs: DEFAULT_COMPUTE_TIMEOUT_SECS,
            max_derivative_order: Limits::default().max_derivative_order,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl BotConfig {
    /// Load from an optional file, overlay the process environment, validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| DiscordError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| DiscordError::ConfigParse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Overlay values found through `lookup` (normally `std::env::var`).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = lookup("DISCORD_TOKEN") {
            self.bot_token = token.trim().to_string();
        }

        if let Some(guilds) = lookup("DISCORD_GUILD_IDS").or_else(|| lookup("DISCORD_GUILD_ID")) {
            self.allowed_guilds = Some(parse_comma_separated(&guilds));
        }

        if let Some(admins) = lookup("DISCORD_ADMIN_USERS") {
            self.admin_users = Some(parse_comma_separated(&admins));
        }

        if let Some(role) = lookup("CALCBOT_ROLE_NAME") {
            self.role_name = role.trim().to_string();
        }

        if let Some(prefix) = lookup("CALCBOT_PREFIX") {
            self.command_prefix = prefix.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            return Err(DiscordError::MissingToken);
        }
        if self.command_prefix.is_empty() {
            return Err(DiscordError::invalid_config("command_prefix must not be empty"));
        }
        if self.role_name.trim().is_empty() {
            return Err(DiscordError::invalid_config("role_name must not be empty"));
        }
        if self.menu_timeout_secs == 0 {
            return Err(DiscordError::invalid_config(
                "menu_timeout_secs must be at least 1",
            ));
        }
        if self.compute_timeout_secs == 0 {
            return Err(DiscordError::invalid_config(
                "compute_timeout_secs must be at least 1",
            ));
        }
        if self.max_derivative_order == 0 {
            return Err(DiscordError::invalid_config(
                "max_derivative_order must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_derivative_order: self.max_derivative_order,
        }
    }

    pub fn menu_timeout(&self) -> Duration {
        Duration::from_secs(self.menu_timeout_secs)
    }

    pub fn compute_timeout(&self) -> Duration {
        Duration::from_secs(self.compute_timeout_secs)
    }

    /// Configured guild ids. Entries that are not snowflakes are skipped.
    pub fn guild_ids(&self) -> Vec<GuildId> {
        self.allowed_guilds
            .iter()
            .flatten()
            .filter_map(|raw| match raw.parse::<u64>() {
                Ok(id) if id != 0 => Some(GuildId::new(id)),
                _ => {
                    warn!(guild = %raw, "ignoring invalid guild id");
                    None
                }
            })
            .collect()
    }
}

/// Parse a comma-separated string into a Vec of trimmed, non-empty strings.
fn parse_comma_separated(s: &str) -> Vec<String> {
    s.split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}
