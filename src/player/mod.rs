//! Player Module
//!
//! Runs mpv as a child process rendering into the wallpaper window and talks
//! to it over its JSON IPC socket.

pub mod ipc;

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::config::PlayerConfig;
use crate::player::ipc::Message;

pub use ipc::SUCCESS;

/// Socket path for the mpv IPC server of this process
pub fn socket_path() -> PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .unwrap_or_else(|_| format!("/run/user/{}", unsafe { libc::getuid() }));
    PathBuf::from(runtime_dir).join(format!("peruere-{}.sock", std::process::id()))
}

/// Command line for an mpv instance drawing into window `wid`
pub fn mpv_args(config: &PlayerConfig, wid: u32, socket: &Path) -> Vec<String> {
    let yes_no = |flag: bool| if flag { "yes" } else { "no" };

    let mut args = vec![
        format!("--wid={}", wid),
        "--idle=yes".to_string(),
        "--no-terminal".to_string(),
        "--no-input-default-bindings".to_string(),
        "--no-osc".to_string(),
        format!("--input-ipc-server={}", socket.display()),
        format!("--loop-file={}", if config.loop_file { "inf" } else { "no" }),
        format!("--vo={}", config.vo),
        format!("--x11-bypass-compositor={}", yes_no(config.bypass_compositor)),
    ];
    if config.mute {
        args.push("--mute=yes".to_string());
    }
    if let Some(hwdec) = &config.hwdec {
        args.push(format!("--hwdec={}", hwdec));
    }
    args.extend(
        config
            .options
            .iter()
            .map(|option| format!("--{}", option.trim_start_matches('-'))),
    );
    args
}

/// A running mpv process
///
/// The process is killed and its IPC socket removed when this is dropped.
pub struct Player {
    child: Child,
    socket_path: PathBuf,
}

impl Player {
    /// Start mpv attached to window `wid`
    pub fn spawn(config: &PlayerConfig, wid: u32) -> Result<Self> {
        let socket_path = socket_path();
        // A stale socket from a crashed run with a recycled pid
        let _ = std::fs::remove_file(&socket_path);

        let args = mpv_args(config, wid, &socket_path);
        debug!("Starting {:?} {:?}", config.binary, args);

        let child = Command::new(&config.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {:?}", config.binary))?;

        info!("Started mpv (pid {:?}) for window {}", child.id(), wid);
        Ok(Self { child, socket_path })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Wait for the mpv process to exit
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        Ok(self.child.wait().await?)
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            debug!("Killing mpv");
            if let Err(e) = self.child.start_kill() {
                warn!("Failed to kill mpv: {}", e);
            }
        }
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Client side of the mpv IPC socket
///
/// Messages from mpv are read on a separate task and delivered through the
/// receiver returned by [`PlayerClient::connect`]. The receiver is closed when
/// the socket reaches end of stream; only mpv itself sends
/// [`ipc::PlayerEvent::Shutdown`].
pub struct PlayerClient {
    writer: OwnedWriteHalf,
    next_request_id: u64,
}

impl PlayerClient {
    /// Connect to `path`, retrying until `timeout` while mpv starts up
    pub async fn connect(path: &Path, timeout: Duration) -> Result<(Self, mpsc::Receiver<Message>)> {
        let deadline = Instant::now() + timeout;
        let stream = loop {
            match UnixStream::connect(path).await {
                Ok(stream) => break stream,
                Err(e) if Instant::now() < deadline => {
                    trace!("mpv IPC socket not ready: {}", e);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to connect to mpv IPC socket {:?}", path)
                    });
                }
            }
        };
        info!("Connected to mpv IPC socket {:?}", path);

        let (reader, writer) = stream.into_split();
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match Message::decode(&line) {
                        Ok(msg) => {
                            if tx.send(msg).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => warn!("Undecodable mpv message {:?}: {}", line, e),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        error!("mpv IPC read failed: {}", e);
                        break;
                    }
                }
            }
            debug!("mpv IPC socket closed");
        });

        Ok((
            Self {
                writer,
                next_request_id: 1,
            },
            rx,
        ))
    }

    /// Send a command, returning its request id
    pub async fn command(&mut self, args: &[&str]) -> Result<u64> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let line = ipc::Command::new(args, request_id).encode()?;
        self.writer
            .write_all(&line)
            .await
            .context("Failed to write to mpv IPC socket")?;
        trace!("Sent mpv command {} {:?}", request_id, args);
        Ok(request_id)
    }

    /// Forward mpv's log messages at `level` and above
    pub async fn request_log_messages(&mut self, level: &str) -> Result<u64> {
        self.command(&["request_log_messages", level]).await
    }

    /// Replace the playlist with `file` and start playing it
    pub async fn loadfile(&mut self, file: &Path) -> Result<u64> {
        let Some(file) = file.to_str() else {
            bail!("Media path {:?} is not valid UTF-8", file);
        };
        self.command(&["loadfile", file]).await
    }

    pub async fn quit(&mut self) -> Result<u64> {
        self.command(&["quit"]).await
    }
}

/// Re-emit an mpv log message through tracing
pub fn log_message(prefix: &str, level: &str, text: &str) {
    let text = text.trim_end();
    match level {
        "fatal" | "error" => error!(target: "mpv", "[{}] {}", prefix, text),
        "warn" => warn!(target: "mpv", "[{}] {}", prefix, text),
        "info" => info!(target: "mpv", "[{}] {}", prefix, text),
        "v" | "debug" => debug!(target: "mpv", "[{}] {}", prefix, text),
        _ => trace!(target: "mpv", "[{}] {}", prefix, text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::ipc::PlayerEvent;
    use tokio::net::UnixListener;

    #[test]
    fn test_mpv_args_defaults() {
        let args = mpv_args(&PlayerConfig::default(), 0x2a00001, Path::new("/run/user/1000/p.sock"));
        assert_eq!(
            args,
            vec![
                "--wid=44040193",
                "--idle=yes",
                "--no-terminal",
                "--no-input-default-bindings",
                "--no-osc",
                "--input-ipc-server=/run/user/1000/p.sock",
                "--loop-file=inf",
                "--vo=gpu",
                "--x11-bypass-compositor=yes",
            ]
        );
    }

    #[test]
    fn test_mpv_args_options() {
        let config = PlayerConfig {
            mute: true,
            hwdec: Some("vaapi".into()),
            loop_file: false,
            bypass_compositor: false,
            options: vec!["panscan=1.0".into(), "--speed=0.5".into()],
            ..PlayerConfig::default()
        };
        let args = mpv_args(&config, 7, Path::new("s.sock"));

        assert!(args.contains(&"--loop-file=no".to_string()));
        assert!(args.contains(&"--x11-bypass-compositor=no".to_string()));
        assert_eq!(
            &args[args.len() - 4..],
            &["--mute=yes", "--hwdec=vaapi", "--panscan=1.0", "--speed=0.5"]
        );
    }

    #[test]
    fn test_socket_path_is_per_process() {
        let path = socket_path();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert_eq!(name, format!("peruere-{}.sock", std::process::id()));
    }

    #[tokio::test]
    async fn test_client_talks_to_mpv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mpv.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut lines = BufReader::new(reader).lines();

            let first = lines.next_line().await.unwrap().unwrap();
            let second = lines.next_line().await.unwrap().unwrap();

            writer
                .write_all(b"{\"request_id\":1,\"error\":\"success\",\"data\":null}\n")
                .await
                .unwrap();
            writer.write_all(b"{\"event\":\"file-loaded\"}\n").await.unwrap();
            writer.write_all(b"garbage\n").await.unwrap();
            writer.write_all(b"{\"event\":\"idle\"}\n").await.unwrap();
            // Closing the socket ends the stream
            (first, second)
        });

        let (mut client, mut rx) = PlayerClient::connect(&path, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(client.request_log_messages("info").await.unwrap(), 1);
        assert_eq!(client.loadfile(Path::new("/tmp/rain.mp4")).await.unwrap(), 2);

        let (first, second) = server.await.unwrap();
        assert_eq!(first, r#"{"command":["request_log_messages","info"],"request_id":1}"#);
        assert_eq!(second, r#"{"command":["loadfile","/tmp/rain.mp4"],"request_id":2}"#);

        assert_eq!(
            rx.recv().await.unwrap(),
            Message::Reply {
                request_id: 1,
                error: SUCCESS.into(),
                data: serde_json::Value::Null,
            }
        );
        assert_eq!(rx.recv().await.unwrap(), Message::Event(PlayerEvent::FileLoaded));
        assert_eq!(rx.recv().await.unwrap(), Message::Event(PlayerEvent::Idle));
        // The socket closed without mpv announcing a shutdown
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_shutdown_event_then_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mpv.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"{\"event\":\"shutdown\"}\n").await.unwrap();
        });

        let (_client, mut rx) = PlayerClient::connect(&path, Duration::from_secs(1))
            .await
            .unwrap();
        server.await.unwrap();

        assert_eq!(rx.recv().await, Some(Message::Event(PlayerEvent::Shutdown)));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_connect_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.sock");
        let result = PlayerClient::connect(&path, Duration::from_millis(100)).await;
        assert!(result.is_err());
    }
}
