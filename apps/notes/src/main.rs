use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use client_core::{Backend, GraphqlNotesClient, Intent, NoteSession, SessionEvent, SessionHandle};
use shared::domain::ClientId;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod ui;

use config::{load_settings, Overrides};
use ui::{parse_command, render, to_intent, Command, HELP};

#[derive(Parser, Debug)]
#[command(about = "Terminal client for a GraphQL-backed note list")]
struct Args {
    /// TOML settings file (defaults to ./notes.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    graphql_url: Option<String>,
    #[arg(long)]
    realtime_url: Option<String>,
    #[arg(long)]
    api_key: Option<String>,
}

impl From<Args> for Overrides {
    fn from(args: Args) -> Self {
        Self {
            config: args.config,
            graphql_url: args.graphql_url,
            realtime_url: args.realtime_url,
            api_key: args.api_key,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let overrides = Overrides::from(Args::parse());
    let settings = load_settings(&overrides)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let endpoints = settings.endpoints()?;
    info!(
        graphql_url = %endpoints.graphql_url,
        realtime_url = %endpoints.realtime_url,
        "connecting to notes backend"
    );
    let client = Arc::new(GraphqlNotesClient::new(endpoints, settings.api_key()));

    let (session, handle) = NoteSession::new(ClientId::generate(), Backend::shared(client));
    let session_task = tokio::spawn(session.run());
    let render_task = tokio::spawn(render_snapshots(handle.clone()));
    let notice_task = tokio::spawn(print_notices(handle.clone()));

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut quit_requested = false;
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!("failed to read stdin: {err}");
                break;
            }
        };

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        match &command {
            Command::Help => println!("{HELP}"),
            Command::List => println!("{}", render(&handle.snapshot())),
            _ => {}
        }

        let quit = command == Command::Quit;
        match to_intent(command, &handle.snapshot()) {
            Ok(Some(intent)) => {
                if !handle.send(intent).await {
                    warn!("note session is no longer running");
                    break;
                }
            }
            Ok(None) => {}
            Err(message) => println!("{message}"),
        }
        if quit {
            quit_requested = true;
            break;
        }
    }

    if !quit_requested {
        handle.send(Intent::Shutdown).await;
    }
    drop(handle);
    let final_state = session_task.await?;
    render_task.abort();
    notice_task.abort();
    info!(notes = final_state.notes.len(), "session closed");
    Ok(())
}

async fn render_snapshots(handle: SessionHandle) {
    let mut snapshots = handle.snapshots();
    drop(handle);
    while snapshots.changed().await.is_ok() {
        let view = snapshots.borrow_and_update().clone();
        println!("{}", render(&view));
    }
}

async fn print_notices(handle: SessionHandle) {
    let mut events = handle.subscribe_events();
    drop(handle);
    loop {
        match events.recv().await {
            Ok(SessionEvent::ValidationFailed(message)) => println!("{message}"),
            Ok(SessionEvent::LiveFeedClosed) => {
                println!("live updates stopped; other clients' notes will appear after restart")
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}
