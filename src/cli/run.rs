//! `run` subcommand: start the bot service.

use super::config::{default_config_path, TurnstileConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use turnstile::bot::TurnstileBot;
use turnstile::chat::telegram::TelegramClient;
use turnstile::chat::traits::UserId;
use turnstile::store::ConfigStore;

pub async fn execute(config_path: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let config = TurnstileConfig::load(&config_path)?;

    init_logging(&config.logging.level);
    info!(config = %config_path.display(), "Loaded configuration");

    if config.telegram.initial_owner == 0 {
        return Err("telegram.initial_owner is not set; edit the config file first".into());
    }

    let token = config.read_token()?;
    let client = TelegramClient::new(&token)?;
    let store = ConfigStore::open(&config.state.path, UserId(config.telegram.initial_owner))?;

    let mut bot = TurnstileBot::new(client, store);
    bot.run().await;
    Ok(())
}

fn init_logging(level: &str) {
    // RUST_LOG overrides the config file level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("turnstile={level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
