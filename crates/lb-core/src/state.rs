//! Session lifecycle states

use std::fmt;

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Engine created, no surface yet
    Created,
    /// Surface sized and handed to the engine, not stepping
    SurfaceBound,
    /// Engine is stepping frames
    Running,
    /// Stepping suspended by the host or the user
    Paused,
    /// Surface was destroyed; the engine must not render
    SurfaceLost,
    /// Engine shut down, terminal
    Destroyed,
}

impl SessionState {
    /// States in which input, reset, fast-forward, ROM and snapshot
    /// requests are forwarded to the engine
    pub fn accepts_requests(self) -> bool {
        matches!(self, Self::SurfaceBound | Self::Running | Self::Paused)
    }

    /// States that accept a new surface size
    pub fn accepts_resize(self) -> bool {
        !matches!(self, Self::Destroyed)
    }

    pub fn is_destroyed(self) -> bool {
        self == Self::Destroyed
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "Created",
            Self::SurfaceBound => "SurfaceBound",
            Self::Running => "Running",
            Self::Paused => "Paused",
            Self::SurfaceLost => "SurfaceLost",
            Self::Destroyed => "Destroyed",
        };
        f.write_str(name)
    }
}
