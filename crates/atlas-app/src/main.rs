//! Atlas client binary: composition root.
//!
//! 1. Resolve and load configuration from TOML
//! 2. Build the HTTP transport, conversation session and job scheduler
//! 3. Seed the transcript from the server's history
//! 4. Read commands and utterances from stdin until EOF or /quit

mod cli;
mod commands;

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use atlas_chat::{
    ChartMount, ConversationSession, HttpTransport, JobScheduler, StatusLine, TranscriptEntry,
    Transport,
};
use atlas_core::AtlasConfig;

use cli::CliArgs;
use commands::{parse_command, Command, HELP};

fn print_entries(entries: &[TranscriptEntry]) {
    for entry in entries {
        println!("{}: {}", entry.message.role, entry.message.content);
        if let Some(rendered) = &entry.rendered {
            println!("  {}", rendered.to_html());
        }
    }
}

/// Charts can only be drawn once their container exists; this is where a
/// front end would hook in.
async fn chart_mount_loop(mut mounts: mpsc::UnboundedReceiver<ChartMount>) {
    while let Some(mount) = mounts.recv().await {
        tracing::info!(container = %mount.container_id, "Chart container attached, mounting");
    }
}

/// Returns `false` when the loop should stop.
async fn run_command(
    command: Command,
    session: &ConversationSession,
    scheduler: &JobScheduler,
) -> bool {
    match command {
        Command::Empty => {}
        Command::Say(text) => {
            let before = session.len();
            session.submit(&text).await;
            // The user entry was already echoed by the terminal.
            let transcript = session.transcript();
            print_entries(transcript.get(before + 1..).unwrap_or_default());
        }
        Command::Map(switch) => {
            let enabled = match switch {
                Some(enabled) => {
                    session.set_map_mode(enabled);
                    enabled
                }
                None => session.toggle_map_mode(),
            };
            println!("map mode {}", if enabled { "on" } else { "off" });
        }
        Command::Bbox(viewport) => session.set_viewport(viewport),
        Command::Tool { kind, address } => {
            session.update_attachments(|bundle| bundle.set_tool(&kind, &address));
            match session.attachments().service_reference() {
                Some(service) => println!("tool attached: {} {}", service.kind, service.address),
                None => println!("tool kind or address missing, nothing attached"),
            }
        }
        Command::ToolClear => session.update_attachments(|bundle| bundle.clear_tool()),
        Command::File(path) => match session.attach_file(&path).await {
            Ok(()) => {
                if let Some(file) = session.attachments().file() {
                    println!("file attached: {} ({} bytes)", file.name, file.bytes.len());
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Could not read attachment");
                println!("could not read {}: {}", path.display(), e);
            }
        },
        Command::FileClear => session.update_attachments(|bundle| bundle.set_file(None)),
        Command::Schedule { interval, query } => {
            if let Some(text) = scheduler.schedule(&query, &interval).await {
                println!("{text}");
            }
        }
        Command::Panel => {
            let open = session.toggle_chat_panel();
            println!("chat panel {}", if open { "open" } else { "closed" });
        }
        Command::Transcript => print_entries(&session.transcript()),
        Command::Status => println!("{}", session.status()),
        Command::Help => println!("{HELP}"),
        Command::Quit => return false,
    }
    true
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = AtlasConfig::load_or_default(&config_file);
    args.apply(&mut config);

    // Tracing. RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Atlas v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config.server)?);
    tracing::info!(
        base_url = %config.server.base_url,
        identity = %config.server.identity,
        "Transport ready"
    );

    let status = StatusLine::new();
    let (mount_tx, mount_rx) = mpsc::unbounded_channel();
    let session = ConversationSession::new(
        config.server.identity.clone(),
        Arc::clone(&transport),
        config.chat.clone(),
    )
    .with_status_line(status.clone())
    .with_chart_mounts(mount_tx);
    let scheduler = JobScheduler::new(transport, config.jobs.clone(), status);

    tokio::spawn(chart_mount_loop(mount_rx));

    session.load_history().await;
    print_entries(&session.transcript());
    println!("Connected as {}. Type /help for commands.", session.identity());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Ok(command) => {
                if !run_command(command, &session, &scheduler).await {
                    break;
                }
            }
            Err(e) => println!("{e}"),
        }
    }

    tracing::info!("Atlas shutting down");
    Ok(())
}
