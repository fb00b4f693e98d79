//! Error types for the Discord layer.

use miette::Diagnostic;
use serenity::model::error::Error as ModelError;
use thiserror::Error;

/// Result type alias for Discord operations.
pub type Result<T> = std::result::Result<T, DiscordError>;

/// Discord error types.
#[derive(Debug, Error, Diagnostic)]
pub enum DiscordError {
    /// The bot lacks the permission or role position for an action
    #[error("Missing permissions to {action}")]
    #[diagnostic(help("Move the bot's role above the role it manages and grant Manage Roles"))]
    MissingPermissions { action: String },

    /// Any other serenity failure
    #[error("Discord API error: {0}")]
    Serenity(#[from] serenity::Error),

    /// A component or modal id we did not issue
    #[error("Unrecognized component id: {custom_id}")]
    InvalidCustomId { custom_id: String },

    /// Guild-only command used elsewhere
    #[error("This command only works in a server")]
    NotInGuild,

    /// Bot token not provided by file or environment
    #[error("No Discord bot token configured")]
    #[diagnostic(help("Set DISCORD_TOKEN in the environment or a .env file, or bot_token in the config file"))]
    MissingToken,

    /// Configuration file could not be read
    #[error("Failed to read config file {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for `BotConfig`
    #[error("Invalid config file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// Configuration value out of range
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl DiscordError {
    /// Create a missing permissions error.
    pub fn missing_permissions(action: impl Into<String>) -> Self {
        Self::MissingPermissions {
            action: action.into(),
        }
    }

    /// Create an invalid custom id error.
    pub fn invalid_custom_id(custom_id: impl Into<String>) -> Self {
        Self::InvalidCustomId {
            custom_id: custom_id.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Classify a failed mutation: HTTP 403 and permission model errors
    /// become `MissingPermissions`, everything else stays a serenity error.
    pub fn from_mutation(action: impl Into<String>, err: serenity::Error) -> Self {
        if is_permission_error(&err) {
            Self::missing_permissions(action)
        } else {
            Self::Serenity(err)
        }
    }
}

fn is_permission_error(err: &serenity::Error) -> bool {
    match err {
        serenity::Error::Http(http) => http.status_code().is_some_and(|s| s.as_u16() == 403),
        serenity::Error::Model(ModelError::InvalidPermissions { .. }) => true,
        serenity::Error::Model(ModelError::Hierarchy) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_permission_errors_are_classified() {
        let err = DiscordError::from_mutation(
            "assign role",
            serenity::Error::Model(ModelError::Hierarchy),
        );
        assert!(matches!(err, DiscordError::MissingPermissions { .. }));
        assert_eq!(err.to_string(), "Missing permissions to assign role");

        let err = DiscordError::from_mutation(
            "assign role",
            serenity::Error::Other("gateway closed"),
        );
        assert!(matches!(err, DiscordError::Serenity(_)));
    }
}
