//! Gateway event handling.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::{
    client::{Context, EventHandler},
    model::{
        application::{Command, Interaction},
        channel::Message,
        gateway::Ready,
    },
    prelude::Mentionable,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::commands::{can_logout, greeting, TextCommand};
use crate::config::BotConfig;
use crate::error::DiscordError;
use crate::menu::{FormId, MenuSession};
use crate::roles::{assign_role, remove_role, GuildRoles, RoleOutcome};
use crate::slash_commands::{
    create_commands, handle_form_submit, handle_math_command, handle_menu_selection,
    MATH_COMMAND,
};

/// The calcbot event handler.
#[derive(Clone)]
pub struct DiscordBot {
    config: Arc<BotConfig>,
    shutdown: mpsc::Sender<()>,
}

impl DiscordBot {
    /// `shutdown` is signalled once when `logout` is accepted.
    pub fn new(config: BotConfig, shutdown: mpsc::Sender<()>) -> Self {
        Self {
            config: Arc::new(config),
            shutdown,
        }
    }

    async fn register_commands(&self, ctx: &Context) {
        let guilds = self.config.guild_ids();
        if guilds.is_empty() {
            match Command::set_global_commands(&ctx.http, create_commands()).await {
                Ok(cmds) => info!("Registered {} global commands", cmds.len()),
                Err(e) => error!("Failed to register global commands: {}", e),
            }
            return;
        }

        for guild_id in guilds {
            match guild_id.set_commands(&ctx.http, create_commands()).await {
                Ok(cmds) => info!(guild = %guild_id, "Registered {} guild commands", cmds.len()),
                Err(e) => error!(guild = %guild_id, "Failed to register guild commands: {}", e),
            }
        }
    }

    async fn handle_text_command(&self, ctx: &Context, msg: &Message, command: TextCommand) {
        let mention = msg.author.mention().to_string();
        let reply = match command {
            TextCommand::Hello => greeting(&mention),
            TextCommand::Assign | TextCommand::Remove => {
                self.role_command(ctx, msg, command, &mention).await
            }
            TextCommand::Logout => {
                if !can_logout(msg.author.id.get(), self.config.admin_users.as_deref()) {
                    warn!(user = %msg.author.id, "refused logout");
                    "You are not allowed to log me out.".to_string()
                } else {
                    info!(user = %msg.author.id, "logout requested");
                    self.say(ctx, msg, "Logging out!").await;
                    if let Err(e) = self.shutdown.send(()).await {
                        error!("Failed to signal shutdown: {}", e);
                    }
                    return;
                }
            }
        };
        self.say(ctx, msg, &reply).await;
    }

    async fn role_command(
        &self,
        ctx: &Context,
        msg: &Message,
        command: TextCommand,
        mention: &str,
    ) -> String {
        let Some(guild_id) = msg.guild_id else {
            return format!("{}.", DiscordError::NotInGuild);
        };

        let role = self.config.role_name.as_str();
        let directory = GuildRoles::new(ctx.http.clone(), guild_id, msg.author.id);
        let outcome = match command {
            TextCommand::Remove => remove_role(&directory, role).await,
            _ => assign_role(&directory, role).await,
        };

        match outcome {
            Ok(outcome) => {
                if outcome == RoleOutcome::MissingPermissions {
                    warn!(guild = %guild_id, role, "missing permissions for role change");
                }
                outcome.message(role, mention)
            }
            Err(e) => {
                error!(guild = %guild_id, user = %msg.author.id, %command, "role command failed: {}", e);
                "Something went wrong while updating your roles. Please try again later."
                    .to_string()
            }
        }
    }

    async fn say(&self, ctx: &Context, msg: &Message, content: &str) {
        if let Err(e) = msg.channel_id.say(&ctx.http, content).await {
            error!(channel = %msg.channel_id, "Failed to send message: {}", e);
        }
    }
}

#[async_trait]
impl EventHandler for DiscordBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("We have logged in as {}", ready.user.name);
        self.register_commands(&ctx).await;
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let Some(command) = TextCommand::parse(&msg.content, &self.config.command_prefix) else {
            return;
        };

        debug!(
            user = %msg.author.id,
            guild = ?msg.guild_id,
            %command,
            "text command"
        );
        self.handle_text_command(&ctx, &msg, command).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let result = match interaction {
            Interaction::Command(command) => {
                info!(
                    "Received slash command: {} from {}",
                    command.data.name, command.user.name
                );
                match command.data.name.as_str() {
                    MATH_COMMAND => {
                        handle_math_command(&ctx, &command, self.config.menu_timeout()).await
                    }
                    _ => {
                        warn!("Unknown command: {}", command.data.name);
                        Ok(())
                    }
                }
            }
            Interaction::Component(component) => {
                match MenuSession::from_custom_id(&component.data.custom_id) {
                    Some(session) => {
                        handle_menu_selection(
                            &ctx,
                            &component,
                            &session,
                            self.config.menu_timeout(),
                        )
                        .await
                    }
                    None => {
                        warn!("{}", DiscordError::invalid_custom_id(&component.data.custom_id));
                        Ok(())
                    }
                }
            }
            Interaction::Modal(modal) => match FormId::from_custom_id(&modal.data.custom_id) {
                Some(form) => {
                    handle_form_submit(
                        &ctx,
                        &modal,
                        &form,
                        &self.config.limits(),
                        self.config.compute_timeout(),
                    )
                    .await
                }
                None => {
                    warn!("{}", DiscordError::invalid_custom_id(&modal.data.custom_id));
                    Ok(())
                }
            },
            _ => Ok(()),
        };

        if let Err(e) = result {
            error!("Interaction failed: {:?}", e);
        }
    }
}
