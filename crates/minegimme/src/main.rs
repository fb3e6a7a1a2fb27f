//! MineGimme operator console.
//!
//! Attaches one live session to a server, streams its console to stdout and
//! forwards operator input. The session is torn down on SIGINT/SIGTERM or
//! when stdin closes.

mod cli;
mod config;
mod operator;

use anyhow::Context;
use cli::CliArgs;
use config::{AppConfig, LoggingSettings};
use minegimme_session::files::{FileNode, HttpFileBackend};
use minegimme_session::{ServerSession, SessionEvent};
use operator::{OperatorCommand, HELP};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type Session = ServerSession<HttpFileBackend>;

// ============================================================================
// Logging Setup
// ============================================================================

/// Initialize logging. `RUST_LOG` takes precedence over the configured level.
fn setup_logging(config: &LoggingSettings) -> anyhow::Result<()> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if config.json_format {
        registry
            .with(fmt::layer().json().with_target(false).with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    info!("🔧 Logging initialized with level: {}", log_level);
    Ok(())
}

// ============================================================================
// Session Output
// ============================================================================

/// Prints session events until the session's event channel closes.
async fn print_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::Console(record)) => println!("{}", record.transcript_line()),
            Ok(SessionEvent::SnapshotReplaced(snapshot)) => {
                debug!("📊 {} is {} ({} {})", snapshot.name, snapshot.status, snapshot.server_type, snapshot.version);
            }
            Ok(SessionEvent::StatusChanged(status)) => info!("🚦 Server is now {}", status),
            Ok(SessionEvent::PlayersChanged(players)) => {
                info!("👥 {} player(s) online: {}", players.len(), players.join(", "));
            }
            Ok(SessionEvent::EulaRequired) => {
                warn!("📜 The server requires its EULA to be accepted before it can start");
            }
            Ok(SessionEvent::Error(message)) => error!("❌ Server error: {}", message),
            Ok(SessionEvent::FilesReplaced { entries }) => debug!("🌲 File mirror loaded ({} entries)", entries),
            Ok(SessionEvent::FilesChanged(changes)) => debug!("🌲 {} file change(s)", changes.len()),
            Ok(SessionEvent::LinkLost(_)) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Console output fell behind, skipped {} event(s)", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_listing(entries: &[&FileNode]) {
    for entry in entries {
        let size = entry.size.map(|s| s.to_string()).unwrap_or_default();
        let marker = if entry.is_dir() { "/" } else { "" };
        println!(
            "{:>12}  {:<20}  {}{}",
            size,
            entry.modified.as_deref().unwrap_or("-"),
            entry.name,
            marker
        );
    }
}

// ============================================================================
// Operator Commands
// ============================================================================

/// Runs one operator command. Returns `false` when the operator asked to quit.
async fn execute(session: &Session, command: OperatorCommand) -> anyhow::Result<bool> {
    match command {
        OperatorCommand::Start => session.start().await?,
        OperatorCommand::Stop => session.stop().await?,
        OperatorCommand::Restart => session.restart().await?,
        OperatorCommand::Status => {
            let status = session.status().read().await;
            if status.is_loading() {
                println!("(no server info received yet)");
            } else {
                let snapshot = status.snapshot();
                println!(
                    "{} [{}] {} {} | cpu {} | mem {} | players {} | uptime {} | tps {}",
                    snapshot.name,
                    snapshot.status,
                    snapshot.server_type,
                    snapshot.version,
                    snapshot.metrics.cpu,
                    snapshot.metrics.memory,
                    snapshot.metrics.player_count,
                    snapshot.metrics.uptime,
                    snapshot.metrics.tps
                );
            }
            if let Some(action) = status.pending_action() {
                println!("{} ...", action.flag_label());
            }
        }
        OperatorCommand::List(dir) => {
            let tree = session.tree().read().await;
            print_listing(&tree.list(&dir));
        }
        OperatorCommand::Cat(path) => {
            let node = session.tree().read().await.get(&path).cloned();
            let Some(node) = node else {
                anyhow::bail!("No such file: {}", path);
            };
            if !session.files().policy().is_text_editable(&node) {
                anyhow::bail!("{} is not a text file", path);
            }
            let buffer = session.files().open_read_only(&node).await?;
            println!("{}", buffer.content);
        }
        OperatorCommand::Filter(query) => {
            let console = session.console().read().await;
            for record in console.filter(&query) {
                println!("{}", record.transcript_line());
            }
        }
        OperatorCommand::Export(path) => {
            let transcript = session.console().read().await.export();
            tokio::fs::write(&path, transcript)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("💾 Console exported to {}", path.display());
        }
        OperatorCommand::Help => println!("{HELP}"),
        OperatorCommand::Quit => return Ok(false),
        OperatorCommand::Send(text) => session.command(&text).await?,
    }
    Ok(true)
}

async fn read_operator_input(session: &Session) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let command = match OperatorCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(usage) => {
                eprintln!("{usage}");
                continue;
            }
        };
        match execute(session, command).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => eprintln!("{e}"),
        }
    }
    Ok(())
}

// ============================================================================
// Teardown
// ============================================================================

/// Resolves with the name of the first termination signal received.
#[cfg(unix)]
async fn termination() -> anyhow::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
    })
}

#[cfg(not(unix))]
async fn termination() -> anyhow::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}

/// Runs the operator loop until stdin ends, `/quit`, or a termination signal,
/// then closes the session.
async fn run_until_teardown(session: &Session) {
    tokio::select! {
        received = termination() => match received {
            Ok(name) => info!("📡 Received {}", name),
            Err(e) => error!("Signal handling failed: {}", e),
        },
        result = read_operator_input(session) => {
            if let Err(e) = result {
                error!("Reading input failed: {}", e);
            }
        }
    }

    info!("🛑 Closing session...");
    session.close().await;
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let mut config = AppConfig::load_from_file(&args.config_path).await?;
    if let Some(server) = args.server {
        config.target.server = server;
    }
    if let Some(api_base) = args.api_base {
        config.session.api_base = api_base;
    }
    if let Some(log_level) = args.log_level {
        config.logging.level = log_level;
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;

    setup_logging(&config.logging)?;

    let token = args
        .token
        .or_else(|| config.target.token.clone())
        .context("No access token: pass --token or set MINEGIMME_TOKEN")?;

    info!("🚀 MineGimme console v{}", env!("CARGO_PKG_VERSION"));
    info!("📂 Config: {} | Server: {} | API: {}", args.config_path.display(), config.target.server, config.session.api_base);

    let session = ServerSession::with_http_backend(config.session.clone(), &config.target.server, &token)?;
    let printer = tokio::spawn(print_events(session.subscribe()));

    if let Err(e) = session.connect().await {
        warn!("⚠️ {} (retrying in the background)", e);
    }

    run_until_teardown(&session).await;
    printer.abort();
    info!("✅ Session closed");
    Ok(())
}
