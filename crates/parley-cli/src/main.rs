use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use parley_core::config::Config;
use parley_gateway::{GatewayState, Providers};

mod logging;

#[derive(Parser)]
#[command(
    name = "parley",
    about = "Voice conversation partner for language practice: speak, get a spoken reply",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Port to listen on (default: 8000)
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind (default: 0.0.0.0)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Show configuration summary and whether a gateway is answering
    Status,

    /// Diagnose common issues
    Doctor,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config
    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);

    let config = Config::load(&config_path)?;

    logging::init(&config.logging.clone().unwrap_or_default(), cli.verbose);

    match cli.command {
        Commands::Serve { port, bind } => serve(config, port, bind).await?,
        Commands::Status => status(&config, &config_path).await,
        Commands::Doctor => {
            if !doctor(&config, &config_path) {
                std::process::exit(1);
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
        },
    }

    Ok(())
}

async fn serve(config: Config, port: Option<u16>, bind: Option<String>) -> anyhow::Result<()> {
    let secrets = config.require_secrets()?;

    let port = port.unwrap_or_else(|| config.gateway_port());
    let bind = bind.unwrap_or_else(|| config.bind_addr());

    let (warnings, _) = config.validate();
    for warning in warnings {
        tracing::warn!("{warning}");
    }

    let providers = Providers::from_config(&config, &secrets);
    let state = GatewayState::new(Arc::new(config), providers)?;

    #[cfg(feature = "metrics")]
    let state = state.with_metrics(parley_gateway::metrics::install_prometheus_recorder()?);

    tracing::info!("Starting Parley gateway on {bind}:{port}");
    parley_gateway::start_gateway(Arc::new(state), &bind, port).await
}

async fn status(config: &Config, config_path: &std::path::Path) {
    let port = config.gateway_port();
    println!("Parley v{}", env!("CARGO_PKG_VERSION"));
    println!("Config: {}", config_path.display());
    println!("Static dir: {}", config.static_dir().display());
    println!("Gateway port: {port}");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build();
    let health = match client {
        Ok(client) => client
            .get(format!("http://127.0.0.1:{port}/health"))
            .send()
            .await
            .ok(),
        Err(_) => None,
    };

    match health {
        Some(resp) if resp.status().is_success() => {
            let body: serde_json::Value = resp.json().await.unwrap_or_default();
            println!(
                "Status: running (jobs pending: {})",
                body["jobs_pending"].as_u64().unwrap_or(0)
            );
        }
        _ => println!("Status: not running"),
    }
}

/// Print diagnostics; returns false if any check failed.
fn doctor(config: &Config, config_path: &std::path::Path) -> bool {
    println!("Parley doctor\n");

    if config_path.exists() {
        println!("  [ok]   config file {}", config_path.display());
    } else {
        println!(
            "  [info] no config file at {} (using defaults)",
            config_path.display()
        );
    }

    let (warnings, errors) = config.validate();
    for warning in &warnings {
        println!("  [warn] {warning}");
    }
    for error in &errors {
        println!("  [fail] {error}");
    }

    let output_dir = config.output_dir();
    let writable = std::fs::create_dir_all(&output_dir).is_ok()
        && tempfile::tempfile_in(&output_dir).is_ok();
    if writable {
        println!("  [ok]   output dir {} is writable", output_dir.display());
    } else {
        println!("  [fail] output dir {} is not writable", output_dir.display());
    }

    let upload_dir = config.upload_dir();
    if upload_dir.is_dir() {
        println!("  [ok]   upload dir {}", upload_dir.display());
    } else {
        println!(
            "  [warn] upload dir {} does not exist yet; it will be created",
            upload_dir.display()
        );
    }

    let healthy = errors.is_empty() && writable;
    println!();
    println!("{}", if healthy { "All checks passed." } else { "Some checks failed." });
    healthy
}
