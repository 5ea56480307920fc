//! castrel-server: text/file messaging relay.
//!
//! Accepts TCP connections, registers each client under its claimed display
//! name, and routes broadcast/unicast/blockcast envelopes between them.

use castrel_server::config::ServerConfig;
use castrel_server::server::RelayServer;
use clap::Parser;
use std::path::Path;
use tracing::{error, info};

/// castrel-server — messaging relay
#[derive(Parser, Debug)]
#[command(name = "castrel-server", version, about = "castrel relay server")]
struct Cli {
    /// Listening port
    port: u16,

    /// Config file path
    #[arg(long, default_value = "~/.castrel/config.toml")]
    config: String,

    /// Maximum concurrent clients
    #[arg(long)]
    max_clients: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout stays clean for anything piping the server.
    use tracing_subscriber::EnvFilter;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cli.port,
        "starting castrel-server"
    );

    let config = match ServerConfig::load(Some(Path::new(&cli.config)), cli.port, cli.max_clients) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    let server = RelayServer::new(config);
    let listener = match server.bind().await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, "failed to start server");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run_until_signal(listener).await {
        error!(error = %e, "server error");
        std::process::exit(1);
    }

    info!("castrel-server stopped");
}
