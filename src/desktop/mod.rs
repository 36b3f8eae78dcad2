//! Desktop Module
//!
//! Manages the X11 display connection and the wallpaper window living on it.

pub mod ewmh;
pub mod window;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::protocol::shape;
use x11rb::protocol::xproto::Window;
use x11rb::rust_connection::RustConnection;

use crate::desktop::ewmh::Atoms;

pub use window::{WallpaperWindow, WindowStatus};

/// An open X11 display
///
/// The connection is closed when the last reference to it is dropped, so
/// windows created on it must be released first.
pub struct Desktop {
    /// X11 connection (Arc for sharing with the event stream)
    conn: Arc<RustConnection>,
    screen_num: usize,
    root: Window,
    atoms: Atoms,
    /// SHAPE extension is available (input pass-through)
    have_shape: bool,
}

impl Desktop {
    /// Connect to `display`, or to $DISPLAY when `None`
    pub fn connect(display: Option<&str>) -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(display)
            .context("Failed to connect to X server")?;

        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        info!("Connected to X server, screen {}, root window {}", screen_num, root);
        info!("Screen size: {}x{}", screen.width_in_pixels, screen.height_in_pixels);

        let atoms = Atoms::new(&conn).context("Failed to intern atoms")?;

        let have_shape = conn
            .extension_information(shape::X11_EXTENSION_NAME)?
            .is_some();
        if have_shape {
            debug!("SHAPE extension available");
        } else {
            warn!("SHAPE extension missing, the wallpaper window will swallow input");
        }

        Ok(Self {
            conn: Arc::new(conn),
            screen_num,
            root,
            atoms,
            have_shape,
        })
    }

    pub fn conn(&self) -> &Arc<RustConnection> {
        &self.conn
    }

    pub fn root(&self) -> Window {
        self.root
    }

    pub fn atoms(&self) -> &Atoms {
        &self.atoms
    }

    pub fn have_shape(&self) -> bool {
        self.have_shape
    }

    /// Flush queued requests to the server
    pub fn flush(&self) -> Result<()> {
        self.conn.flush()?;
        Ok(())
    }
}

impl Drop for Desktop {
    fn drop(&mut self) {
        debug!("Closing X11 connection (screen {})", self.screen_num);
    }
}
