use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use caching_proxy::config::{load_config, validate_config, ProxyConfig};
use caching_proxy::lifecycle;
use caching_proxy::observability::logging;

/// Caching HTTP forward proxy.
#[derive(Parser)]
#[command(name = "caching-proxy", version, about, long_about = None)]
struct Cli {
    /// Port to listen on.
    port: u16,

    /// TOML configuration file. The port argument overrides its bind port.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => ProxyConfig::default(),
    }
    .with_port(cli.port);

    if let Err(errors) = validate_config(&config) {
        for error in errors {
            eprintln!("Error: {}", error);
        }
        return ExitCode::FAILURE;
    }

    logging::init(&config.observability.log_level);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        "caching-proxy starting"
    );

    match lifecycle::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Proxy failed");
            ExitCode::FAILURE
        }
    }
}
