use std::sync::Arc;

use clap::Parser;
use tracing::info;

use intercept_core::SessionProvider;
use interceptd::{CommandHandler, LoggingConfig, RuleStore, SyncController};

/// Interceptd - request-interception rule daemon
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Database connection URL
    #[arg(long, default_value = "sqlite:./interceptd.db")]
    database_url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit JSON formatted logs
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    /// Optional log file path (logs to stdout when omitted)
    #[arg(long)]
    log_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let logging = LoggingConfig {
        level: args.log_level.clone(),
        json_format: args.json_logs,
        log_file: args.log_file.clone(),
        ..LoggingConfig::default()
    };
    interceptd::init_logging(&logging)?;

    let store = RuleStore::new(&args.database_url).await?;
    let provider = Arc::new(SessionProvider::new());
    let controller = SyncController::new(store, provider);
    controller.start().await?;

    let (handler, client) = CommandHandler::new(Arc::clone(&controller));
    tokio::spawn(handler.run());

    let snapshot = controller.snapshot().await;
    info!(
        "interceptd ready: {} rules loaded, enabled = {}",
        snapshot.rules.len(),
        snapshot.enabled
    );

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    drop(client);

    Ok(())
}
