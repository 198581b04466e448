//! Engine boundary for the lake-bridge session bridge
//!
//! The native emulation engine sits behind the [`EmulationEngine`] trait.
//! [`EngineHandle`] owns exactly one engine for the lifetime of a session.
//! [`NullEngine`] is a headless in-process engine; [`RecordingEngine`]
//! records every forwarded call for tests.

pub mod engine;
pub mod handle;
pub mod null;
pub mod recording;
pub mod runtime;
pub mod types;

pub use engine::EmulationEngine;
pub use handle::EngineHandle;
pub use null::{synthetic_rom, CartridgeInfo, NullEngine};
pub use recording::{CallLog, EngineCall, RecordingEngine};
pub use types::{
    ButtonId, ButtonSet, InputState, PointerPosition, Region, RomImage, SnapshotDirection,
    SurfaceDescriptor,
};
