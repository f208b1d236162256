//! WWCP node CLI
//!
//! ```sh
//! # Run a node with the default config (~/.config/wwcp/config.toml)
//! wwcp serve
//!
//! # Validate a config file
//! wwcp --config /etc/wwcp/config.toml check
//!
//! # Inspect identifiers and frames
//! wwcp parse evse "DE*GEF*E123*1"
//! wwcp decode-json '[2,"HUB",["CS1"],"42","Echo",{}]'
//! wwcp decode-binary 02000348554200...
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};

use wwcp::config::AppConfig;
use wwcp::domain::ids::{
    ChargingPoolId, ChargingStationId, ChargingStationOperatorId, Country, EMobilityAccountId,
    EMobilityProviderId, EvseId, OperatorIdFormat, ProviderIdFormat,
};
use wwcp::overlay::{BinaryMessage, JsonMessage, NetworkingNodeId};
use wwcp::server::{init_tracing, NodeHandle};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(
    name = "wwcp",
    version,
    about = "WWCP roaming network node",
    long_about = "Runs a WWCP overlay node exposing a roaming network, and inspects \
                  e-mobility identifiers and overlay frames.\n\n\
                  Default config: ~/.config/wwcp/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, global = true, env = "WWCP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the node until SIGINT/SIGTERM.
    Serve {
        /// Override the listen port.
        #[arg(long)]
        port: Option<u16>,

        /// Override the networking node id.
        #[arg(long)]
        node_id: Option<String>,

        /// Override the log level (trace, debug, info, warn, error).
        #[arg(short, long)]
        log_level: Option<String>,
    },
    /// Validate the configuration file and exit.
    Check,
    /// Parse an identifier and print its normalized forms.
    Parse {
        kind: IdKind,
        text: String,
    },
    /// Decode a JSON overlay message.
    DecodeJson { text: String },
    /// Decode a hex-encoded binary overlay message.
    DecodeBinary { hex: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum IdKind {
    Country,
    Operator,
    Pool,
    Station,
    Evse,
    Provider,
    Account,
    Node,
}

fn config_path(cli_path: Option<PathBuf>) -> PathBuf {
    cli_path.unwrap_or_else(wwcp::default_config_path)
}

#[tokio::main]
async fn main() -> CliResult {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            port,
            node_id,
            log_level,
        } => serve(config_path(cli.config), port, node_id, log_level).await,
        Command::Check => check(config_path(cli.config)),
        Command::Parse { kind, text } => parse(kind, &text),
        Command::DecodeJson { text } => {
            let message = JsonMessage::parse(&text)?;
            println!("{:#?}", message);
            Ok(())
        }
        Command::DecodeBinary { hex } => {
            let bytes = hex::decode(hex.trim())?;
            let message = BinaryMessage::decode(&bytes)?;
            println!("{:#?}", message);
            Ok(())
        }
    }
}

async fn serve(
    path: PathBuf,
    port: Option<u16>,
    node_id: Option<String>,
    log_level: Option<String>,
) -> CliResult {
    let loaded = AppConfig::load(&path);
    let mut config = loaded.as_ref().cloned().unwrap_or_default();
    if let Some(level) = log_level {
        config.logging.level = level;
    }
    init_tracing(&config.logging);
    match loaded {
        Ok(_) => info!("Configuration loaded from {}", path.display()),
        Err(e) => {
            error!("Failed to load config from {}: {}", path.display(), e);
            error!("Using default configuration.");
        }
    }

    if let Some(port) = port {
        info!("CLI override: port = {}", port);
        config.node.port = port;
    }
    if let Some(id) = node_id {
        info!("CLI override: node id = {}", id);
        config.node.id = id;
    }

    let handle = NodeHandle::start(config).await?;
    handle.install_signal_handler();
    info!("🚀 Press Ctrl+C to shutdown gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;
    Ok(())
}

fn check(path: PathBuf) -> CliResult {
    let config = AppConfig::load(&path)?;
    let rn = &config.roaming_network;
    let evses: usize = rn
        .operators
        .iter()
        .flat_map(|o| &o.pools)
        .flat_map(|p| &p.stations)
        .map(|s| s.evses.len())
        .sum();

    println!("✅ Configuration is valid");
    println!("   Config file     : {}", path.display());
    println!("   Node            : {} on {}", config.node.id, config.node.address());
    if let Some(uplink) = &config.node.uplink {
        println!("   Uplink          : {} at {}", uplink.node_id, uplink.url);
    }
    println!("   Roaming network : {} ({})", rn.id, rn.name);
    println!("   Operators       : {} ({} EVSEs)", rn.operators.len(), evses);
    println!("   Providers       : {}", rn.providers.len());
    println!("   Partners        : {}", rn.partners.len());
    println!("   Log level       : {}", config.logging.level);
    Ok(())
}

fn parse(kind: IdKind, text: &str) -> CliResult {
    match kind {
        IdKind::Country => {
            let country = Country::parse(text)?;
            println!("{} ({}, +{})", country.name(), country.alpha2(), country.telephone_code());
        }
        IdKind::Operator => {
            let id = ChargingStationOperatorId::parse(text)?;
            println!("{}", id);
            for format in [OperatorIdFormat::IsoStar, OperatorIdFormat::Iso, OperatorIdFormat::Din] {
                if let Some(s) = id.to_string_in(format) {
                    println!("   {:?}: {}", format, s);
                }
            }
        }
        IdKind::Pool => println!("{}", ChargingPoolId::parse(text)?),
        IdKind::Station => println!("{}", ChargingStationId::parse(text)?),
        IdKind::Evse => {
            let id = EvseId::parse(text)?;
            println!("{} (operator {}, suffix {})", id, id.operator_id(), id.suffix());
        }
        IdKind::Provider => {
            let id = EMobilityProviderId::parse(text)?;
            println!("{}", id);
            for format in ProviderIdFormat::ALL {
                println!("   {}: {}", format.as_str(), id.to_string_in(*format));
            }
        }
        IdKind::Account => {
            let id = EMobilityAccountId::parse(text)?;
            println!("{} (provider {})", id, id.provider_id());
            for format in ProviderIdFormat::ALL {
                if let Some(s) = id.to_string_in(*format) {
                    println!("   {}: {}", format.as_str(), s);
                }
            }
        }
        IdKind::Node => println!("{}", NetworkingNodeId::parse(text)?),
    }
    Ok(())
}
