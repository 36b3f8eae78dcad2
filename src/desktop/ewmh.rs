//! EWMH (Extended Window Manager Hints) for the wallpaper window
//!
//! Tells window managers, panels and pagers that our window is part of the
//! desktop background: no decorations, below everything, on every workspace.

use anyhow::Result;
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::wrapper::ConnectionExt as _;

/// `_NET_WM_DESKTOP` value meaning "all desktops"
pub const ALL_DESKTOPS: u32 = 0xFFFF_FFFF;

/// Holds all interned atoms
#[derive(Debug)]
pub struct Atoms {
    pub net_wm_name: Atom,
    pub net_wm_desktop: Atom,
    pub net_wm_window_type: Atom,
    pub _net_wm_window_type_desktop: Atom,
    pub net_wm_state: Atom,
    pub _net_wm_state_below: Atom,
    pub _net_wm_state_sticky: Atom,
    // Legacy GNOME layer hint
    pub _win_layer: Atom,
    // MOTIF WM Hints (for decoration control)
    pub _motif_wm_hints: Atom,
    pub utf8_string: Atom,
}

impl Atoms {
    /// Intern all required atoms
    pub fn new<C: Connection>(conn: &C) -> Result<Self> {
        let intern = |name: &str| -> Result<Atom> {
            Ok(conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
        };

        let atoms = Self {
            net_wm_name: intern("_NET_WM_NAME")?,
            net_wm_desktop: intern("_NET_WM_DESKTOP")?,
            net_wm_window_type: intern("_NET_WM_WINDOW_TYPE")?,
            _net_wm_window_type_desktop: intern("_NET_WM_WINDOW_TYPE_DESKTOP")?,
            net_wm_state: intern("_NET_WM_STATE")?,
            _net_wm_state_below: intern("_NET_WM_STATE_BELOW")?,
            _net_wm_state_sticky: intern("_NET_WM_STATE_STICKY")?,
            _win_layer: intern("_WIN_LAYER")?,
            _motif_wm_hints: intern("_MOTIF_WM_HINTS")?,
            utf8_string: intern("UTF8_STRING")?,
        };
        debug!("Interned atoms: {:?}", atoms);
        Ok(atoms)
    }

    /// Mark the window as a desktop window (`_NET_WM_WINDOW_TYPE_DESKTOP`)
    pub fn set_desktop_type<C: Connection>(&self, conn: &C, window: Window) -> Result<()> {
        conn.change_property32(
            PropMode::REPLACE,
            window,
            self.net_wm_window_type,
            AtomEnum::ATOM,
            &[self._net_wm_window_type_desktop],
        )?;
        Ok(())
    }

    /// Ask for no decorations through `_MOTIF_WM_HINTS`
    pub fn set_undecorated<C: Connection>(&self, conn: &C, window: Window) -> Result<()> {
        let hints = MotifWmHints::undecorated();
        conn.change_property32(
            PropMode::REPLACE,
            window,
            self._motif_wm_hints,
            self._motif_wm_hints, // Type is the same as the atom
            &hints.to_property(),
        )?;
        Ok(())
    }

    /// Put the window on the bottom layer for WMs that honour `_WIN_LAYER`
    /// and `_NET_WM_STATE_BELOW`, and keep it on every workspace
    pub fn set_below_and_sticky<C: Connection>(&self, conn: &C, window: Window) -> Result<()> {
        // Layer 0 is WIN_LAYER_DESKTOP
        conn.change_property32(
            PropMode::APPEND,
            window,
            self._win_layer,
            AtomEnum::CARDINAL,
            &[0],
        )?;

        conn.change_property32(
            PropMode::APPEND,
            window,
            self.net_wm_state,
            AtomEnum::ATOM,
            &[self._net_wm_state_below, self._net_wm_state_sticky],
        )?;

        conn.change_property32(
            PropMode::REPLACE,
            window,
            self.net_wm_desktop,
            AtomEnum::CARDINAL,
            &[ALL_DESKTOPS],
        )?;
        Ok(())
    }

    /// Set WM_NAME and _NET_WM_NAME
    pub fn set_name<C: Connection>(&self, conn: &C, window: Window, name: &str) -> Result<()> {
        conn.change_property8(
            PropMode::REPLACE,
            window,
            AtomEnum::WM_NAME,
            AtomEnum::STRING,
            name.as_bytes(),
        )?;
        conn.change_property8(
            PropMode::REPLACE,
            window,
            self.net_wm_name,
            self.utf8_string,
            name.as_bytes(),
        )?;
        Ok(())
    }
}

/// MOTIF WM Hints structure
/// Based on MWM (Motif Window Manager) hints specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotifWmHints {
    pub flags: u32,        // MWM_HINTS_* flags
    pub functions: u32,    // MWM_FUNC_* bits
    pub decorations: u32,  // MWM_DECOR_* bits
    pub input_mode: u32,
    pub status: u32,
}

impl MotifWmHints {
    pub const MWM_HINTS_DECORATIONS: u32 = 1 << 1;

    /// Only the decorations field is meaningful, and it asks for none
    pub fn undecorated() -> Self {
        Self {
            flags: Self::MWM_HINTS_DECORATIONS,
            functions: 0,
            decorations: 0,
            input_mode: 0,
            status: 0,
        }
    }

    /// The five 32-bit values stored in the property
    pub fn to_property(self) -> [u32; 5] {
        [
            self.flags,
            self.functions,
            self.decorations,
            self.input_mode,
            self.status,
        ]
    }
}
