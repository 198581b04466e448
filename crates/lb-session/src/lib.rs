//! Session layer of the lake-bridge emulation bridge
//!
//! [`Session`] is the lifecycle state machine that serializes host events
//! onto one engine. [`SessionRunner`] drives it from a dedicated thread,
//! fed by a [`BridgeHandle`] the host can clone onto any of its threads.

pub mod battery;
pub mod controller;
pub mod events;
pub mod input;
pub mod rom;
pub mod runner;
pub mod snapshot;
pub mod surface;

pub use battery::SaveStore;
pub use controller::{Session, SessionResult};
pub use events::{
    create_event_queue, BridgeHandle, EventReceiver, HostEvent, Notification, NotificationLevel,
};
pub use input::{InputRouter, TouchAction};
pub use rom::{ByteSource, FileByteSource, MemoryByteSource, RomLoader};
pub use runner::{FramePacer, RunnerHandle, SessionRunner};
pub use snapshot::{SnapshotController, SnapshotOutcome};
pub use surface::{SurfaceBinding, SurfaceChange};
