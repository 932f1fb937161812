use clap::Parser;
use edgelord_core::cli::Cli;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    tokio::select! {
        result = cli.dispatch() => {
            if let Err(e) = result {
                // `run` installs a tracing subscriber before this point;
                // `status`/`config` never do, so fall back to stderr
                // directly rather than silently dropping the event.
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }
}
