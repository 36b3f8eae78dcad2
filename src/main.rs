//! Peruere
//!
//! Plays a looping video as the X11 desktop wallpaper: creates a borderless,
//! input-transparent window pinned below every other window and lets mpv
//! render into it.

mod config;
mod desktop;
mod player;
mod x11_async;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::process::{ExitCode, ExitStatus};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{Cli, Config};
use desktop::{Desktop, WallpaperWindow, WindowStatus};
use player::ipc::{Message, PlayerEvent};
use player::{Player, PlayerClient};

/// How long mpv gets to open its IPC socket
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long mpv gets to exit after `quit` before it is killed
const QUIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Why the main loop stopped
#[derive(Debug)]
enum ExitReason {
    Signal,
    PlayerShutdown,
    IpcClosed,
    PlayerExited(ExitStatus),
    WindowDestroyed,
}

impl ExitReason {
    /// Whether mpv is still expected to be running and must be told to quit
    fn needs_quit(&self) -> bool {
        matches!(self, ExitReason::Signal | ExitReason::WindowDestroyed)
    }
}

/// The exit status to report as an error, if mpv went away on its own and
/// did not exit successfully
fn player_failure(requested_quit: bool, status: Option<ExitStatus>) -> Option<ExitStatus> {
    match status {
        Some(status) if !requested_quit && !status.success() => Some(status),
        _ => None,
    }
}

async fn run(config: Config) -> Result<()> {
    let desktop = Desktop::connect(config.display.as_deref())
        .context("Failed to open X display")?;

    let argv: Vec<String> = std::env::args().collect();
    let mut window = WallpaperWindow::create(&desktop, config.window.geometry, &argv)?;

    let mut player = Player::spawn(&config.player, window.id())
        .context("Failed to initialize player")?;
    let (mut client, mut messages) = PlayerClient::connect(player.socket_path(), CONNECT_TIMEOUT)
        .await
        .context("Failed to initialize player")?;

    client.request_log_messages("info").await?;
    let load_request = client.loadfile(&config.file).await?;
    info!("Loading {:?}", config.file);

    window.map(&desktop, &config.window.name)?;

    let x11 = x11_async::X11EventStream::new(desktop.conn().clone())
        .context("Failed to initialize X11 event stream")?;

    // Handle SIGTERM and SIGINT
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let reason = loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
                break ExitReason::Signal;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
                break ExitReason::Signal;
            }
            status = player.wait() => {
                let status = status.context("Failed to wait for mpv")?;
                break ExitReason::PlayerExited(status);
            }
            msg = messages.recv() => {
                let Some(msg) = msg else {
                    break ExitReason::IpcClosed;
                };
                match msg {
                    Message::Reply { request_id, error, .. } => {
                        if error == player::SUCCESS {
                            debug!("mpv request {} succeeded", request_id);
                        } else if request_id == load_request {
                            bail!("mpv could not load {:?}: {}", config.file, error);
                        } else {
                            warn!("mpv request {} failed: {}", request_id, error);
                        }
                    }
                    Message::Event(PlayerEvent::Shutdown) => break ExitReason::PlayerShutdown,
                    Message::Event(PlayerEvent::EndFile { reason, error }) => {
                        if reason.as_deref() == Some("error") {
                            bail!(
                                "mpv failed to play {:?}: {}",
                                config.file,
                                error.unwrap_or_else(|| "unknown error".into())
                            );
                        }
                        debug!("Playback ended ({:?})", reason);
                    }
                    Message::Event(PlayerEvent::LogMessage { prefix, level, text }) => {
                        player::log_message(&prefix, &level, &text);
                    }
                    Message::Event(PlayerEvent::FileLoaded) => info!("Playing {:?}", config.file),
                    Message::Event(event) => debug!("mpv event: {:?}", event),
                }
            }
            event = x11.next_event() => {
                let event = event.context("Lost connection to X server")?;
                if window.handle_event(&event)? == WindowStatus::Destroyed {
                    break ExitReason::WindowDestroyed;
                }
            }
        }
    };
    info!("Shutting down: {:?}", reason);

    let requested_quit = reason.needs_quit();
    if requested_quit {
        if let Err(e) = client.quit().await {
            debug!("Failed to send quit to mpv: {}", e);
        }
    }
    let status = match reason {
        ExitReason::PlayerExited(status) => Some(status),
        _ => match tokio::time::timeout(QUIT_TIMEOUT, player.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                warn!("Failed to wait for mpv: {}", e);
                None
            }
            Err(_) => {
                warn!("mpv did not exit in time, killing it");
                None
            }
        },
    };
    if let Some(status) = status {
        debug!("mpv exited with {}", status);
    }

    // Release in reverse order of acquisition: event stream, player, window, display
    drop(x11);
    drop(player);
    drop(window);
    drop(desktop);

    if let Some(status) = player_failure(requested_quit, status) {
        bail!("mpv exited with {}", status);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "peruere=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Peruere");

    let cli = Cli::parse();
    let result = match Config::load(&cli) {
        Ok(config) => run(config).await,
        Err(e) => Err(e.context("Failed to load configuration")),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
