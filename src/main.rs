//! MQTT Connection Bootstrapper - Main Entry Point

use clap::{Parser, Subcommand};
use mqtt_bootstrap::bootstrap;
use mqtt_bootstrap::config::{MqttConfig, DEFAULT_CONFIG_PATH};
use mqtt_bootstrap::observability::{init_logging, LogSettings};
use mqtt_bootstrap::transport::mqtt::OnConnectHandler;
use mqtt_bootstrap::InterruptOutcome;
use rumqttc::AsyncClient;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{error, info, warn, Level};

/// Connect to an MQTT broker and stay connected until interrupted
#[derive(Parser)]
#[command(name = "mqtt-bootstrap")]
#[command(about = "Bootstrap a persistent MQTT client connection")]
#[command(version)]
struct Cli {
    /// Configuration file path; without an extension .toml, .yaml, .yml
    /// and .json are tried in order
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Replace the configured base client id
    #[arg(long, env = "MQTT_CLIENT_ID")]
    client_id: Option<String>,

    /// Verbose logging (-v debug, -vv trace) unless LOG_LEVEL is set
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and wait for Ctrl-C
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(log_settings(cli.verbose));

    info!(
        "Starting MQTT bootstrapper v{}",
        env!("CARGO_PKG_VERSION")
    );

    let result = match cli.command {
        Commands::Run => run(&cli.config, cli.client_id.as_deref()).await,
        Commands::Config { show } => handle_config_command(&cli.config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn log_settings(verbose: u8) -> LogSettings {
    let mut settings = LogSettings::from_env();
    if std::env::var("LOG_LEVEL").is_err() {
        settings.level = match verbose {
            0 => settings.level,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        };
    }
    settings
}

async fn run(
    config_path: &Path,
    client_id_override: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let on_connect: OnConnectHandler = Arc::new(|_: &AsyncClient| {
        info!("MQTT session ready");
    });

    let mut session = bootstrap::initialize(config_path, client_id_override, on_connect).await?;
    info!(
        "Client {} is connected, press Ctrl-C to disconnect",
        session.client_id()
    );

    match session.wait().await {
        InterruptOutcome::Disconnected | InterruptOutcome::Cancelled => Ok(()),
        InterruptOutcome::DisconnectFailed(reason) => {
            warn!("Disconnect did not complete cleanly: {}", reason);
            Ok(())
        }
        InterruptOutcome::SignalFailed(reason) | InterruptOutcome::TaskFailed(reason) => {
            session.shutdown().await?;
            Err(reason.into())
        }
    }
}

fn handle_config_command(
    config_path: &Path,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = MqttConfig::load(config_path)?;
    info!("Configuration is valid");

    if show {
        println!("{}", toml::to_string_pretty(&config)?);
    }

    if config.brokers.is_empty() {
        warn!("No brokers configured; connecting will fail");
    }

    Ok(())
}
