//! Wallpaper window
//!
//! A borderless, override-redirect window that sits below every other window
//! and lets all pointer input through to whatever is underneath.

use anyhow::{bail, Context, Result};
use peruere_geometry::Geometry;
use std::sync::Arc;
use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::properties::WmHints;
use x11rb::protocol::shape::{ConnectionExt as ShapeExt, SK, SO};
use x11rb::protocol::xproto::*;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;
use x11rb::{COPY_DEPTH_FROM_PARENT, COPY_FROM_PARENT, NONE};

use crate::desktop::Desktop;

/// WM_CLASS of the wallpaper window (instance and class)
const WM_CLASS: &str = "peruere";

/// What an X event meant for the wallpaper window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStatus {
    /// Nothing to do
    Unchanged,
    /// Something got stacked below us and we lowered ourselves again
    Relowered,
    /// The window no longer exists
    Destroyed,
}

/// Wallpaper window owned by this process
///
/// The window is destroyed when this value is dropped.
pub struct WallpaperWindow {
    conn: Arc<RustConnection>,
    root: Window,
    window: Window,
    destroyed: bool,
}

impl WallpaperWindow {
    /// Create the window, set all desktop hints and push it to the bottom
    ///
    /// The window is left unmapped; call [`WallpaperWindow::map`] once the
    /// player is attached to it.
    pub fn create(desktop: &Desktop, geometry: Geometry, argv: &[String]) -> Result<Self> {
        let (x, y, width, height) = x11_geometry(geometry)?;
        let conn = desktop.conn().clone();
        let window = conn.generate_id()?;

        conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            window,
            desktop.root(),
            x,
            y,
            width,
            height,
            0,
            WindowClass::INPUT_OUTPUT,
            COPY_FROM_PARENT,
            &CreateWindowAux::new()
                .background_pixmap(u32::from(BackPixmap::PARENT_RELATIVE))
                .backing_store(BackingStore::ALWAYS)
                .override_redirect(1) // Bool32
                .event_mask(EventMask::STRUCTURE_NOTIFY),
        )
        .context("Failed to create wallpaper window")?;

        // From here on the guard destroys the window on any error
        let wallpaper = Self {
            conn,
            root: desktop.root(),
            window,
            destroyed: false,
        };
        info!("Created wallpaper window {} at {}", window, geometry);

        // Restacks of other top-level windows are only reported on the root
        wallpaper
            .conn
            .change_window_attributes(
                wallpaper.root,
                &ChangeWindowAttributesAux::new().event_mask(EventMask::SUBSTRUCTURE_NOTIFY),
            )
            .context("Failed to watch root window for restacking")?;

        wallpaper.set_hints(desktop, argv)?;
        wallpaper.lower()?;
        desktop.flush()?;

        Ok(wallpaper)
    }

    fn set_hints(&self, desktop: &Desktop, argv: &[String]) -> Result<()> {
        let conn = self.conn.as_ref();
        let atoms = desktop.atoms();

        atoms.set_desktop_type(conn, self.window)?;
        atoms.set_undecorated(conn, self.window)?;
        atoms.set_below_and_sticky(conn, self.window)?;

        // Never take keyboard focus
        let mut hints = WmHints::new();
        hints.input = Some(false);
        hints.set(conn, self.window)?;

        conn.change_property8(
            PropMode::REPLACE,
            self.window,
            AtomEnum::WM_COMMAND,
            AtomEnum::STRING,
            &null_terminated(argv),
        )?;
        conn.change_property8(
            PropMode::REPLACE,
            self.window,
            AtomEnum::WM_CLASS,
            AtomEnum::STRING,
            &null_terminated(&[WM_CLASS, WM_CLASS]),
        )?;

        if desktop.have_shape() {
            // Empty input region: clicks fall through to the desktop
            conn.shape_rectangles(
                SO::SET,
                SK::INPUT,
                ClipOrdering::UNSORTED,
                self.window,
                0,
                0,
                &[],
            )?;
        }

        debug!("Desktop hints set on window {}", self.window);
        Ok(())
    }

    pub fn id(&self) -> Window {
        self.window
    }

    /// Lower the window to the bottom of the stack
    pub fn lower(&self) -> Result<()> {
        self.conn.configure_window(
            self.window,
            &ConfigureWindowAux::new().stack_mode(StackMode::BELOW),
        )?;
        Ok(())
    }

    /// Map the window and give it its name
    pub fn map(&self, desktop: &Desktop, name: &str) -> Result<()> {
        self.conn.map_window(self.window)?;
        desktop.atoms().set_name(self.conn.as_ref(), self.window, name)?;
        self.conn.flush()?;
        info!("Mapped wallpaper window {} as {:?}", self.window, name);
        Ok(())
    }

    /// React to an X event
    pub fn handle_event(&mut self, event: &Event) -> Result<WindowStatus> {
        let status = restack_status(self.window, self.root, event);
        match status {
            WindowStatus::Relowered => {
                self.lower()?;
                self.conn.flush()?;
            }
            WindowStatus::Destroyed => {
                warn!("Wallpaper window {} was destroyed", self.window);
                self.destroyed = true;
            }
            WindowStatus::Unchanged => {
                if let Event::Error(e) = event {
                    warn!("X11 error: {:?}", e);
                }
            }
        }
        Ok(status)
    }
}

impl Drop for WallpaperWindow {
    fn drop(&mut self) {
        if self.destroyed {
            return;
        }
        debug!("Destroying wallpaper window {}", self.window);
        let result = self
            .conn
            .destroy_window(self.window)
            .map(|_| ())
            .and_then(|_| self.conn.flush());
        if let Err(e) = result {
            warn!("Failed to destroy wallpaper window {}: {}", self.window, e);
        }
    }
}

/// Convert a geometry to the 16-bit coordinates the X protocol uses
pub fn x11_geometry(geometry: Geometry) -> Result<(i16, i16, u16, u16)> {
    if geometry.width == 0 || geometry.height == 0 {
        bail!("Window geometry {} has a zero dimension", geometry);
    }

    let out_of_range = || format!("Window geometry {} does not fit the X11 protocol", geometry);
    Ok((
        i16::try_from(geometry.x).with_context(out_of_range)?,
        i16::try_from(geometry.y).with_context(out_of_range)?,
        u16::try_from(geometry.width).with_context(out_of_range)?,
        u16::try_from(geometry.height).with_context(out_of_range)?,
    ))
}

/// Decide whether `event` means the wallpaper `window` must be lowered again
///
/// Two cases put another window under the wallpaper: the wallpaper itself is
/// restacked so that it has a sibling below it, or another child of `root`
/// is moved to the bottom of the stack (reported through the root's
/// SubstructureNotify).
fn restack_status(window: Window, root: Window, event: &Event) -> WindowStatus {
    match event {
        Event::ConfigureNotify(e) if e.window == window => {
            if e.above_sibling == NONE {
                WindowStatus::Unchanged
            } else {
                debug!("Window {} stacked below wallpaper, lowering again", e.above_sibling);
                WindowStatus::Relowered
            }
        }
        Event::ConfigureNotify(e) if e.event == root && e.above_sibling == NONE => {
            debug!("Window {} moved to the bottom, lowering wallpaper again", e.window);
            WindowStatus::Relowered
        }
        Event::DestroyNotify(e) if e.window == window => WindowStatus::Destroyed,
        _ => WindowStatus::Unchanged,
    }
}

/// Encode strings as a list of NUL-terminated entries (WM_COMMAND, WM_CLASS)
fn null_terminated<S: AsRef<str>>(parts: &[S]) -> Vec<u8> {
    let mut data = Vec::new();
    for part in parts {
        data.extend_from_slice(part.as_ref().as_bytes());
        data.push(0);
    }
    data
}
