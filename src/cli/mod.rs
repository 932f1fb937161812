//! Command-line interface: enough surface to start the orchestrator
//! and to dry-run-check configuration (`run`, `status`, `config show`).

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use crate::app::config::Settings;
use crate::app::orchestrator::App;
use crate::error::Result;

#[derive(Parser, Debug)]
#[command(name = "edgelord")]
#[command(version, about = "Arbitrage detection and execution engine for binary prediction markets", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the orchestrator (foreground).
    Run,
    /// Report whether the configured store and exchange are reachable.
    Status,
    /// Load and validate configuration, then print it.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the resolved configuration (secrets redacted).
    Show,
}

impl Cli {
    pub async fn dispatch(self) -> Result<()> {
        match self.command {
            Commands::Run => run(&self.config).await,
            Commands::Status => status(&self.config).await,
            Commands::Config { action: ConfigAction::Show } => config_show(&self.config),
        }
    }
}

async fn run(config_path: &PathBuf) -> Result<()> {
    let settings = Settings::load(config_path)?;
    settings.init_logging();
    info!(dry_run = settings.dry_run, "starting edgelord");
    let app = Arc::new(App::build(&settings).await?);
    let (_tx, rx) = watch::channel(false);
    app.run_with_shutdown(rx).await
}

async fn status(config_path: &PathBuf) -> Result<()> {
    let settings = Settings::load(config_path)?;
    let app = App::build(&settings).await?;
    println!("configuration: ok");
    println!("store: ok");
    drop(app);
    Ok(())
}

fn config_show(config_path: &PathBuf) -> Result<()> {
    let settings = Settings::load(config_path)?;
    let mut redacted = settings;
    redacted.wallet.private_key = redacted.wallet.private_key.map(|_| "***redacted***".to_string());
    println!("dry_run = {}", redacted.dry_run);
    println!("database_url = {:?}", redacted.database_url);
    println!("exchange.api_url = {}", redacted.exchange.api_url);
    println!("strategies.gabagool.enabled = {}", redacted.strategies.gabagool.enabled);
    println!("risk.max_exposure_usd = {}", redacted.risk.max_exposure_usd);
    Ok(())
}
