//! Calcbot Discord - Discord Bot Integration
//!
//! This crate connects the calculator core to Discord: prefix text
//! commands for greeting and self-assigning a role, and the `/math` slash
//! command with its select menu and operation forms.
//!
//! ## Configuration
//!
//! The bot uses [`BotConfig`] for configuration, loaded once at startup
//! from an optional TOML file overlaid by environment variables (see
//! [`config`]). Nothing in this crate reads the environment afterwards.

pub mod bot;
pub mod commands;
pub mod config;
pub mod error;
pub mod menu;
pub mod roles;
pub mod slash_commands;

pub use bot::DiscordBot;
pub use commands::TextCommand;
pub use config::BotConfig;
pub use error::{DiscordError, Result};
pub use menu::{FormId, MenuError, MenuSession, MenuStep};
pub use roles::{GuildRoles, RoleDirectory, RoleOutcome};

// Re-export serenity for convenience
pub use serenity;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        BotConfig, DiscordBot, DiscordError, MenuSession, Result, RoleDirectory, RoleOutcome,
        TextCommand,
    };
}
