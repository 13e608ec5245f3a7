use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use overlay_pomodoro::cue::{CuePlayer, NotificationCuePlayer, SilentCuePlayer};
use overlay_pomodoro::events::chat_command;
use overlay_pomodoro::pomodoro::{Phase, PomodoroConfig};
use overlay_pomodoro::render::{BroadcastSink, ConsoleSink, RenderSink};
use overlay_pomodoro::store::{FileStore, SharedStore};
use overlay_pomodoro::widget::{SystemClock, Widget};
use overlay_pomodoro::ws::websocket_server::{self, CommandSender, ServerContext};

const FRAME_BUFFER: usize = 64;

/// Pomodoro timer for stream overlays
#[derive(Parser, Debug)]
#[command(name = "overlay_pomodoro")]
#[command(version, about, long_about = None)]
struct Args {
    /// Widget field data (JSON object of settings)
    #[arg(short, long)]
    fields: Option<PathBuf>,

    /// Directory holding the persisted timer state
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Address for the overlay WebSocket server
    #[arg(long, default_value = "127.0.0.1:8765")]
    listen: SocketAddr,

    /// Log filter (e.g. "info", "overlay_pomodoro=debug")
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Do not read chat commands from stdin
    #[arg(long)]
    no_stdin: bool,
}

fn init_logging(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(ref log_file) = args.log_file {
        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory {}", parent.display()))?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .context("failed to open log file")?;

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}

/// Treat each stdin line as a chat message, like a local chat box.
async fn read_stdin_commands(config: Arc<PomodoroConfig>, commands: CommandSender) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match chat_command(&line, &config) {
                Some(command) => {
                    if commands.send(command).is_err() {
                        break;
                    }
                }
                None if !line.trim().is_empty() => {
                    info!(
                        "Unknown command {:?} (try {:?}, {:?} or {:?})",
                        line.trim(),
                        config.start_command(),
                        config.pause_command(),
                        config.reset_command()
                    );
                }
                None => {}
            },
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read stdin: {}", e);
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    let config = match args.fields {
        Some(ref path) => PomodoroConfig::load(path).unwrap_or_else(|e| {
            warn!(error = %e, "Unusable field data, using default settings");
            PomodoroConfig::default()
        }),
        None => PomodoroConfig::default(),
    };

    let store_root = args.state_dir.clone().unwrap_or_else(FileStore::default_root);
    let file_store = FileStore::new(store_root);

    info!("🍅 Overlay Pomodoro");
    info!(
        "Pomodoro settings: {}s work / {}s short break / {}s long break, long break after {} of {} sessions",
        config.duration_secs(Phase::Work),
        config.duration_secs(Phase::ShortBreak),
        config.duration_secs(Phase::LongBreak),
        config.sessions_for_long_break(),
        config.total_sessions()
    );
    info!("Persisting state in {}", file_store.root().display());

    let store: SharedStore = Arc::new(file_store);
    let broadcast_sink = BroadcastSink::new(FRAME_BUFFER);
    let frames = broadcast_sink.sender();
    let sinks: Vec<Box<dyn RenderSink>> =
        vec![Box::new(ConsoleSink::new()), Box::new(broadcast_sink)];
    let cues: Box<dyn CuePlayer> = if config.enable_sound() {
        Box::new(NotificationCuePlayer)
    } else {
        Box::new(SilentCuePlayer)
    };

    let shared_config = Arc::new(config.clone());
    let (command_tx, command_rx) = websocket_server::create_command_channel();

    let widget = Widget::load(config, store, SystemClock, sinks, cues).await;

    let context = ServerContext {
        config: Arc::clone(&shared_config),
        commands: command_tx.clone(),
        frames,
    };
    let listen = args.listen;
    tokio::spawn(async move {
        if let Err(e) = websocket_server::start_websocket_server(listen, context).await {
            error!("WebSocket server error: {}", e);
        }
    });

    if !args.no_stdin {
        tokio::spawn(read_stdin_commands(shared_config, command_tx.clone()));
    }

    // Keep one sender alive so stdin EOF does not stop the widget.
    let _command_tx = command_tx;

    widget
        .run(command_rx, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
