pub mod commands;
pub mod keyboard;
pub mod render;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::{
    app::OracleApp,
    game::GameEvent,
    oracle::OracleEvent,
    vision::InputStatus,
};

pub use commands::{ConsoleCommand, HeadMove};
pub use keyboard::KeyboardBackend;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Drives a session from stdin until `quit` or end of input.
pub async fn run_console(app: Arc<OracleApp>, keyboard: KeyboardBackend) -> Result<()> {
    let token = CancellationToken::new();
    // Subscribed before start so the first SCANNING line is printed.
    let printers = vec![
        tokio::spawn(print_oracle_events(app.oracle().subscribe(), token.clone())),
        tokio::spawn(print_game_events(app.subscribe_game().await, token.clone())),
        tokio::spawn(print_input_status(app.input_status().await, token.clone())),
    ];

    if let Err(err) = app.start().await {
        token.cancel();
        return Err(err);
    }
    println!("{}", commands::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };
        if command == ConsoleCommand::Quit {
            break;
        }

        match commands::execute(command, &app, &keyboard).await {
            Ok(Some(output)) => println!("{output}"),
            Ok(None) => {}
            Err(err) => eprintln!("{err}"),
        }
    }

    app.shutdown().await;
    token.cancel();
    for printer in printers {
        let _ = printer.await;
    }
    Ok(())
}

async fn print_oracle_events(mut events: broadcast::Receiver<OracleEvent>, token: CancellationToken) {
    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    if let Some(line) = render::oracle_event(&event) {
                        println!("{line}");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log_warn!("console fell behind by {skipped} oracle events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = token.cancelled() => break,
        }
    }
}

async fn print_game_events(mut events: broadcast::Receiver<GameEvent>, token: CancellationToken) {
    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => println!("{}", render::game_event(&event)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log_warn!("console fell behind by {skipped} game events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = token.cancelled() => break,
        }
    }
}

async fn print_input_status(mut status: watch::Receiver<InputStatus>, token: CancellationToken) {
    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                match current {
                    InputStatus::Unavailable(reason) => println!("vision: Camera Denied ({reason})"),
                    other => println!("vision: {other}"),
                }
            }
            _ = token.cancelled() => break,
        }
    }
}
