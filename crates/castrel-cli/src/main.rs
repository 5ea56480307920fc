//! castrel — interactive client for the castrel relay.
//!
//! Connects under a chosen display name, prints incoming messages, writes
//! incoming files to disk, and drives outbound sends through a numeric menu.

mod menu;

use anyhow::Context;
use castrel_client::{Relay, RelayReceiver};
use castrel_core::Payload;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::warn;

/// castrel — relay client
#[derive(Parser, Debug)]
#[command(name = "castrel", version, about = "castrel relay client")]
struct Cli {
    /// Display name to claim on the relay
    name: String,

    /// Relay server port
    port: u16,

    /// Relay server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Directory for received files
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let relay = Relay::connect((cli.host.as_str(), cli.port), &cli.name)
        .await
        .with_context(|| format!("could not connect to {}:{}", cli.host, cli.port))?;
    println!("connected to {}:{} as {}", cli.host, cli.port, cli.name);

    let (sender, receiver) = relay.into_split();
    let recv_task = tokio::spawn(receive_loop(receiver, cli.out_dir.clone()));

    let result = menu::prompt_loop(sender).await;

    // The menu loop only returns once we are done sending; nothing more is
    // expected from the server either.
    recv_task.abort();
    result
}

/// Print incoming text messages and write incoming files to disk.
async fn receive_loop(mut receiver: RelayReceiver, out_dir: PathBuf) {
    loop {
        match receiver.recv().await {
            Ok(Some(envelope)) => render(envelope.payload, &out_dir).await,
            Ok(None) => {
                println!("server closed the connection");
                return;
            }
            Err(e) => {
                warn!(error = %e, "receive failed");
                return;
            }
        }
    }
}

async fn render(payload: Payload, out_dir: &Path) {
    match payload {
        Payload::Text(text) => println!("{text}"),
        Payload::File { name, bytes } => {
            // Incoming names are sender-controlled; keep only the final
            // component so a payload cannot land outside the output dir.
            let base = Path::new(&name)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "received.bin".to_string());
            let path = out_dir.join(base);
            match tokio::fs::write(&path, &bytes).await {
                Ok(()) => println!("received file {} ({} bytes)", path.display(), bytes.len()),
                Err(e) => eprintln!("could not write {}: {e}", path.display()),
            }
        }
    }
}
