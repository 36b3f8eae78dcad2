//! X11 Async Event Stream
//!
//! Lets the tokio main loop wait for wallpaper-window events next to mpv and
//! signal handling. A blocking task sleeps in mio on the connection's socket
//! and wakes the loop when it becomes readable.

use std::io::ErrorKind;
use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use anyhow::{Context, Result};
use mio::{Events, Interest, Poll, Token, Waker};
use tokio::sync::Notify;
use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

const X11_READABLE: Token = Token(0);
const STOP: Token = Token(1);

/// Readiness-driven stream of X11 events
///
/// The polling task exits when this is dropped.
pub struct X11EventStream {
    conn: Arc<RustConnection>,
    readable: Arc<Notify>,
    stop: Waker,
}

impl X11EventStream {
    /// Must be called from within a tokio runtime.
    pub fn new(conn: Arc<RustConnection>) -> Result<Self> {
        let fd = conn.stream().as_raw_fd();
        let mut poll = Poll::new().context("Failed to create mio Poll")?;
        poll.registry()
            .register(&mut mio::unix::SourceFd(&fd), X11_READABLE, Interest::READABLE)
            .context("Failed to register X11 FD with mio")?;
        let stop = Waker::new(poll.registry(), STOP).context("Failed to create mio Waker")?;

        let readable = Arc::new(Notify::new());
        let task_readable = readable.clone();
        tokio::task::spawn_blocking(move || {
            let mut events = Events::with_capacity(2);
            loop {
                match poll.poll(&mut events, None) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!("X11 socket poll failed: {}", e);
                        // Let the main loop see the broken connection
                        task_readable.notify_one();
                        return;
                    }
                }

                for event in events.iter() {
                    match event.token() {
                        STOP => {
                            debug!("X11 event polling stopped");
                            return;
                        }
                        _ => task_readable.notify_one(),
                    }
                }
            }
        });

        Ok(Self {
            conn,
            readable,
            stop,
        })
    }

    /// Wait for the next event
    ///
    /// Events the connection already buffered (read while waiting for a
    /// reply) are returned without waiting on the socket. Fails when the
    /// connection to the X server is lost.
    pub async fn next_event(&self) -> Result<Event> {
        loop {
            if let Some(event) = self.conn.poll_for_event()? {
                return Ok(event);
            }
            self.readable.notified().await;
        }
    }
}

impl Drop for X11EventStream {
    fn drop(&mut self) {
        if let Err(e) = self.stop.wake() {
            warn!("Failed to stop X11 event polling: {}", e);
        }
    }
}
