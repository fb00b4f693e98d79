mod logging;

use std::path::PathBuf;

use calcbot_discord::serenity::{all::GatewayIntents, Client};
use calcbot_discord::{BotConfig, DiscordBot};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "calcbot")]
#[command(about = "Discord bot with role commands and a math menu")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Verbose terminal logging
    #[arg(long)]
    debug: bool,

    /// Log file path (overrides config)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .context_lines(3)
                .build(),
        )
    }))?;
    miette::set_panic_hook();
    let cli = Cli::parse();

    // Config names the log file, so it loads first. Its errors go
    // through the miette hook installed above.
    let config = BotConfig::load(cli.config.as_deref())?;
    let log_file = log_file_path(&cli, &config);
    let _guard = logging::init_tracing(cli.debug, &log_file)?;

    info!("Logging initialized. Logs are being written to: {:?}", log_file);
    if let Some(path) = &cli.config {
        info!("Loaded config from: {:?}", path);
    }

    run_bot(config).await
}

/// `--log-file` wins over the config file.
fn log_file_path(cli: &Cli, config: &BotConfig) -> PathBuf {
    cli.log_file
        .clone()
        .unwrap_or_else(|| config.log_file.clone())
}

async fn run_bot(config: BotConfig) -> Result<()> {
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS;

    let token = config.bot_token.clone();
    let bot = DiscordBot::new(config, shutdown_tx);
    let mut client = Client::builder(&token, intents)
        .event_handler(bot)
        .await
        .into_diagnostic()?;
    let shard_manager = client.shard_manager.clone();

    tokio::select! {
        result = client.start() => {
            match result {
                Ok(()) => info!("Discord client stopped normally"),
                Err(e) => {
                    error!("Discord client error: {}", e);
                    return Err(e).into_diagnostic();
                }
            }
        }
        _ = shutdown_rx.recv() => {
            info!("Received logout, shutting down");
            shard_manager.shutdown_all().await;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
            shard_manager.shutdown_all().await;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_log_file_precedence() {
        let config = BotConfig {
            log_file: PathBuf::from("logs/from-config.log"),
            ..BotConfig::default()
        };

        let cli = Cli::parse_from(["calcbot"]);
        assert_eq!(log_file_path(&cli, &config), PathBuf::from("logs/from-config.log"));

        let cli = Cli::parse_from(["calcbot", "--log-file", "cli.log", "--debug"]);
        assert_eq!(log_file_path(&cli, &config), PathBuf::from("cli.log"));
        assert!(cli.debug);

        let cli = Cli::parse_from(["calcbot"]);
        assert_eq!(
            log_file_path(&cli, &BotConfig::default()),
            PathBuf::from("discord.log")
        );
    }
}
