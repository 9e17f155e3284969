//! Lock, unlock and inspect Deadbolt smart locks from the command line.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use deadbolt_ble::BleTransport;
use deadbolt_lock::{Config, Lock, Operation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PREFERENCES: &str = "LockSettingsPreferences.xml";

#[derive(Parser)]
#[command(name = "deadbolt-ctl")]
#[command(about = "Control a Deadbolt smart lock over BLE")]
#[command(version)]
struct Cli {
    /// Configuration file (default: $DEADBOLT_CONFIG, then deadbolt.json in
    /// the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lock the configured lock
    Lock,
    /// Unlock the configured lock
    Unlock,
    /// List locks in range
    Scan {
        /// Scan duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Decrypt a tshark export of a BLE capture with the offline key
    ///
    /// tshark -r btsnoop_hci.log -Y 'btatt.opcode == 0x12 || btatt.opcode == 0x1d'
    /// -Tfields -e frame.number -e btatt.opcode -e btatt.handle -e btatt.value
    DecodeCapture {
        /// Capture text export
        file: PathBuf,
    },
    /// Print the lock settings, offline key included, from the vendor app's
    /// preferences file
    DecryptPrefs {
        /// Preferences XML
        #[arg(default_value = DEFAULT_PREFERENCES)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Lock => operate(cli.config.as_deref(), Operation::Lock).await?,
        Commands::Unlock => operate(cli.config.as_deref(), Operation::Unlock).await?,
        Commands::Scan { duration } => scan(duration).await?,
        Commands::DecodeCapture { file } => decode_capture(cli.config.as_deref(), &file)?,
        Commands::DecryptPrefs { file } => decrypt_prefs(&file)?,
    }

    Ok(())
}

async fn operate(config: Option<&Path>, operation: Operation) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(config)?;
    let peripheral =
        deadbolt_ble::scan(config.lock_uuid.as_deref(), config.scan_timeout()).await?;

    let mut lock = Lock::new(Arc::new(BleTransport::new(peripheral)), config.lock_config()?);
    lock.run(operation).await?;
    println!("{operation}ed");
    Ok(())
}

async fn scan(duration: u64) -> Result<(), Box<dyn std::error::Error>> {
    println!("Scanning for locks ({duration} seconds)...");
    let locks = deadbolt_ble::list_locks(Duration::from_secs(duration)).await?;

    println!("\nFound {} locks:", locks.len());
    for lock in locks {
        println!("  {lock}");
    }
    Ok(())
}

fn decode_capture(config: Option<&Path>, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(config)?;
    let text = std::fs::read_to_string(file)?;
    for frame in deadbolt_proto::capture::decode_capture(&config.offline_key()?, &text) {
        println!("{frame}");
    }
    Ok(())
}

fn decrypt_prefs(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let xml = std::fs::read_to_string(file)?;
    print!("{}", deadbolt_proto::prefs::decrypt_preferences(&xml)?);
    Ok(())
}
