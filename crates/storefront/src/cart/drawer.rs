//! Cart drawer visibility state machine.
//!
//! ```text
//! Closed --open--> Opening --transition end--> Open
//!   ^                                           |
//!   +---transition end--- Closing <--close/Esc--+
//! ```
//!
//! The focus trap is only engaged in `Open`, after the opening transition
//! has finished.

use serde::{Deserialize, Serialize};

/// Where the drawer is in its open/close cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawerState {
    #[default]
    Closed,
    Opening,
    Open,
    Closing,
}

/// Keys the drawer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Escape,
    Other,
}

/// Inputs to the drawer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DrawerEvent {
    /// `toggleCart(open)`.
    Toggle { open: bool },
    /// The running open or close animation finished.
    TransitionEnd,
    KeyPress { key: Key },
}

impl DrawerState {
    /// The `isCartOpen` flag: true from the moment opening starts until
    /// closing starts.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Opening | Self::Open)
    }

    /// Whether keyboard focus is confined to the drawer.
    #[must_use]
    pub const fn focus_trapped(self) -> bool {
        matches!(self, Self::Open)
    }

    #[must_use]
    pub const fn apply(self, event: DrawerEvent) -> Self {
        match (self, event) {
            (Self::Closed | Self::Closing, DrawerEvent::Toggle { open: true }) => Self::Opening,
            (Self::Opening | Self::Open, DrawerEvent::Toggle { open: false })
            | (
                Self::Opening | Self::Open,
                DrawerEvent::KeyPress {
                    key: Key::Escape,
                },
            ) => Self::Closing,
            (Self::Opening, DrawerEvent::TransitionEnd) => Self::Open,
            (Self::Closing, DrawerEvent::TransitionEnd) => Self::Closed,
            (state, _) => state,
        }
    }
}
