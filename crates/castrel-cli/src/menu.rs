//! Numeric menu loop driving the relay sender.
//!
//! Mirrors the relay's four operations: broadcast, unicast, blockcast,
//! logout. Unicast and blockcast first prompt for the display name they
//! target or exclude; broadcast, unicast, and blockcast then choose between
//! a text line and a file path.

use anyhow::{Context, Result};
use castrel_client::RelaySender;
use castrel_core::{Envelope, Route};
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

/// Run the menu on stdin until logout or end of input.
pub async fn prompt_loop(sender: RelaySender) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    run_menu(sender, &mut lines).await
}

async fn run_menu<R>(mut sender: RelaySender, lines: &mut Lines<R>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        println!("Options 1.Broadcast 2.Unicast 3.Blockcast 4.Logout");
        let Some(choice) = lines.next_line().await? else {
            // End of input counts as a logout.
            sender.logout().await.context("failed to send logout")?;
            return Ok(());
        };

        let route = match choice.trim() {
            "1" => Route::Broadcast,
            "2" => {
                let Some(target) = prompt(lines, "Enter recipient name").await? else {
                    continue;
                };
                Route::Unicast { target }
            }
            "3" => {
                let Some(exclude) = prompt(lines, "Enter name to leave out").await? else {
                    continue;
                };
                Route::Blockcast { exclude }
            }
            "4" => {
                sender.logout().await.context("failed to send logout")?;
                println!("logged out");
                return Ok(());
            }
            _ => {
                println!("Invalid entry, choose 1-4");
                continue;
            }
        };

        let Some(envelope) = build_envelope(lines, route).await? else {
            continue;
        };
        sender.send(&envelope).await.context("failed to send")?;
    }
}

/// Prompt for the payload: a text line or a file path.
///
/// Returns `None` on an invalid sub-menu entry or an unreadable file, after
/// printing why; the caller re-prompts from the top.
async fn build_envelope<R>(lines: &mut Lines<R>, route: Route) -> Result<Option<Envelope>>
where
    R: AsyncBufRead + Unpin,
{
    println!("Operation type 1.Text 2.File");
    let Some(kind) = lines.next_line().await? else {
        return Ok(None);
    };

    match kind.trim() {
        "1" => {
            let Some(text) = prompt(lines, "Enter text").await? else {
                return Ok(None);
            };
            Ok(Some(Envelope::text(route, text)))
        }
        "2" => {
            let Some(path) = prompt(lines, "Enter file path").await? else {
                return Ok(None);
            };
            match Envelope::file_from_path(route, Path::new(&path)) {
                Ok(envelope) => Ok(Some(envelope)),
                Err(e) => {
                    println!("could not read {path}: {e}");
                    Ok(None)
                }
            }
        }
        _ => {
            println!("Invalid entry, choose 1 or 2");
            Ok(None)
        }
    }
}

/// Print a prompt and read one non-empty line.
async fn prompt<R>(lines: &mut Lines<R>, label: &str) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    println!("{label}:");
    let Some(line) = lines.next_line().await? else {
        return Ok(None);
    };
    let trimmed = line.trim();
    if trimmed.is_empty() {
        println!("Invalid entry, nothing entered");
        return Ok(None);
    }
    Ok(Some(trimmed.to_string()))
}
