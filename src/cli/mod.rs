use clap::{Parser, Subcommand};

pub mod config;
pub mod init_config;
pub mod run;
pub mod version;

#[derive(Parser)]
#[command(name = "turnstile")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operator CLI for the Turnstile admission bot", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot service
    Run {
        /// Path to config file (default: ~/.local/share/turnstile/config.toml)
        #[arg(long)]
        config: Option<String>,
    },

    /// Write a default configuration file
    InitConfig {
        /// Where to write the config (default: ~/.local/share/turnstile/config.toml)
        #[arg(long)]
        path: Option<String>,
    },

    /// Display version information
    Version,
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Run { config } => run::execute(config).await,
        Commands::InitConfig { path } => init_config::execute(path),
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}
