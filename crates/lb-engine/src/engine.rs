//! Emulation engine trait

use crate::types::{ButtonId, Region, RomImage};
use lb_core::{RomError, StateError};

/// A native real-time emulation engine.
///
/// Implementations are not assumed to be thread-safe: the bridge never
/// invokes two methods concurrently and never calls anything after
/// [`EmulationEngine::shutdown`].
pub trait EmulationEngine: Send {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Bind (or rebind) the render surface with the given size
    fn resize(&mut self, width: u32, height: u32);

    /// The surface is gone; stop rendering until the next resize
    fn release_surface(&mut self);

    /// Suspend stepping
    fn pause(&mut self);

    /// Resume stepping
    fn resume(&mut self);

    /// Soft reset of the loaded cartridge
    fn reset(&mut self);

    /// Run two frames per tick instead of one
    fn set_fast_forward(&mut self, enabled: bool);

    /// Level-triggered button state
    fn set_button(&mut self, button: ButtonId, pressed: bool);

    /// Pointer position in surface coordinates
    fn set_pointer(&mut self, x: f32, y: f32);

    /// Take ownership of a ROM image.
    ///
    /// A rejected image must leave any running cartridge untouched.
    fn load_rom(&mut self, rom: RomImage) -> Result<(), RomError>;

    /// Serialize emulation state into the engine's snapshot slot
    fn save_state(&mut self) -> Result<(), StateError>;

    /// Restore emulation state from the engine's snapshot slot
    fn load_state(&mut self) -> Result<(), StateError>;

    /// Emulate and present one frame
    fn run_frame(&mut self);

    /// Video timing of the loaded cartridge
    fn region(&self) -> Region {
        Region::Ntsc
    }

    /// Cartridge battery RAM, if the loaded board has any
    fn battery_save(&mut self) -> Option<Vec<u8>> {
        None
    }

    /// Restore cartridge battery RAM; returns false if the data was rejected
    fn battery_load(&mut self, _data: &[u8]) -> bool {
        false
    }

    /// Release every engine resource
    fn shutdown(&mut self);
}
