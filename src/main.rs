use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use wifi_ble_provisioner_lib::config::AppConfig;
use wifi_ble_provisioner_lib::core::bluetooth::constants::DEFAULT_OPERATION_TIMEOUT_SECS;
use wifi_ble_provisioner_lib::{commands, logging};

#[derive(Parser)]
#[command(name = "wifi-ble-provisioner")]
#[command(about = "Hands Wi-Fi credentials to a peripheral over Bluetooth LE")]
struct Cli {
    /// Config file; defaults to the platform config directory
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for provisioning peripherals
    Scan {
        /// Scan duration in seconds
        #[arg(short, long)]
        duration: Option<u64>,
    },
    /// Send Wi-Fi credentials and start the station
    Provision {
        /// Network name, 1 to 16 ASCII characters
        #[arg(short, long)]
        ssid: String,
        /// Network password, 1 to 16 ASCII characters
        #[arg(short, long)]
        password: String,
        /// Device id, address or name to connect to
        #[arg(short, long)]
        device: Option<String>,
        /// Seconds to wait for the peripheral to report back
        #[arg(short, long, default_value_t = DEFAULT_OPERATION_TIMEOUT_SECS)]
        wait: u64,
    },
    /// Stop the station
    Stop {
        /// Device id, address or name to connect to
        #[arg(short, long)]
        device: Option<String>,
        /// Seconds to wait for the peripheral to report back
        #[arg(short, long, default_value_t = DEFAULT_OPERATION_TIMEOUT_SECS)]
        wait: u64,
    },
    /// Query the station status
    Status {
        /// Device id, address or name to connect to
        #[arg(short, long)]
        device: Option<String>,
        /// Seconds to wait for the peripheral to report back
        #[arg(short, long, default_value_t = DEFAULT_OPERATION_TIMEOUT_SECS)]
        wait: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = logging::init(logging::level_for_verbosity(cli.verbose)) {
        eprintln!("Failed to initialise logging: {}", e);
    }

    let config_path = match cli.config {
        Some(path) => path,
        None => AppConfig::default_path()?,
    };
    let config = AppConfig::load_config(&config_path).await?;
    info!("Using config {:?}", config_path);

    match cli.command {
        Commands::Scan { duration } => commands::scan(config, duration).await,
        Commands::Provision {
            ssid,
            password,
            device,
            wait,
        } => commands::provision(config, device, ssid, password, wait).await,
        Commands::Stop { device, wait } => commands::stop(config, device, wait).await,
        Commands::Status { device, wait } => commands::status(config, device, wait).await,
    }
}
