use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use relay_core::{ExchangeOrchestrator, HttpTransport, RelayConfig, SharedOrchestrator};
use relay_bot::logging::init_logging;
use relay_bot::{run, ConsoleGateway, DispatchSettings, Dispatcher, RunOutcome};
use tokio::io::BufReader;

#[derive(Parser, Debug, Clone)]
#[command(name = "relay-bot")]
#[command(about = "Relays chat messages to an AI backend and posts the replies")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file (defaults to ./relay.toml when present)
    #[arg(long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, env = "DEBUG", default_value = "false")]
    debug: bool,

    /// Prefix that addresses a message to the bot
    #[arg(long, env = "RELAY_PREFIX", default_value = "!")]
    prefix: String,

    /// Longest accepted message, in characters
    #[arg(long, env = "RELAY_MAX_MESSAGE_CHARS", default_value = "1000")]
    max_message_chars: usize,

    /// Author id the bot posts under; messages from it are ignored
    #[arg(long, env = "RELAY_BOT_ID", default_value = "relay-bot")]
    bot_id: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config =
        RelayConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    log::info!("Model: {} (max {} tokens)", config.model, config.max_tokens);
    log::info!(
        "History: {} turns, cooldown {}s, reasoning {}, web search {}",
        config.max_turns,
        config.cooldown_secs,
        config.reasoning_enabled,
        config.web_search_enabled
    );

    let transport = HttpTransport::new(&config).context("Failed to create HTTP transport")?;
    let orchestrator =
        SharedOrchestrator::new(ExchangeOrchestrator::new(config, Arc::new(transport)));
    let dispatcher = Dispatcher::new(
        orchestrator,
        DispatchSettings {
            prefix: cli.prefix,
            max_message_chars: cli.max_message_chars,
            self_id: cli.bot_id,
        },
    );

    let mut gateway =
        ConsoleGateway::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout());
    log::info!("Bot is now running. Press CTRL-C to exit.");

    tokio::select! {
        outcome = run(&mut gateway, &dispatcher) => {
            match outcome.context("Gateway failed")? {
                RunOutcome::Closed => log::info!("Input closed, exiting"),
                RunOutcome::Poisoned => anyhow::bail!("conversation memory corrupted"),
            }
        }
        _ = wait_for_ctrl_c() => {
            log::info!("Interrupted, exiting");
        }
    }

    Ok(())
}

/// Resolves on Ctrl-C. If the handler cannot be installed it never resolves,
/// so the bot keeps serving until its input closes.
async fn wait_for_ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
}
