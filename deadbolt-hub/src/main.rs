use std::path::PathBuf;
use std::sync::Arc;

use deadbolt_ble::BleTransport;
use deadbolt_hub::Hub;
use deadbolt_lock::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(clap::Parser)]
#[command(name = "deadbolt-hub")]
#[command(about = "Serve GET /api/unlock for a Deadbolt smart lock")]
#[command(version)]
struct Cli {
    /// Configuration file (default: $DEADBOLT_CONFIG, then deadbolt.json in
    /// the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli: Cli = clap::Parser::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = Config::load(cli.config.as_deref())?;

    let hub: Arc<Hub<BleTransport>> = Arc::new(Hub::new());
    tokio::spawn({
        let config = config.clone();
        let hub = Arc::clone(&hub);
        async move {
            if let Err(e) = deadbolt_hub::discover(config, hub).await {
                tracing::error!("lock discovery stopped: {e}");
            }
        }
    });

    deadbolt_hub::http::run_server(&config.listen_addr(), hub).await?;
    Ok(())
}
