//! Ownership of a single engine instance
//!
//! The handle does not lock: the session controller serializes every call.
//! After [`EngineHandle::shutdown`] every forwarding method fails with
//! [`SessionError::SessionClosed`] instead of touching the freed engine.

use crate::engine::EmulationEngine;
use crate::runtime;
use crate::types::{ButtonId, Region, RomImage};
use lb_core::{Result, RomError, SessionError, StateError};
use tracing::{debug, info, trace, warn};

/// Result of a call that can only fail because the session is closed
type CallResult<T = ()> = std::result::Result<T, SessionError>;

/// Owner of one engine instance for the lifetime of a session
pub struct EngineHandle {
    /// `None` once shut down
    engine: Option<Box<dyn EmulationEngine>>,
    /// Whether a ROM has been accepted by the engine
    rom_loaded: bool,
    /// Region reported with the last accepted ROM
    region: Region,
    /// Forwarded call counter
    forwarded: u64,
}

impl EngineHandle {
    /// Create a handle around an engine.
    ///
    /// Fails with [`SessionError::NotInitialized`] before [`runtime::init`].
    pub fn create<E: EmulationEngine + 'static>(engine: E) -> CallResult<Self> {
        Self::from_boxed(Box::new(engine))
    }

    /// Create a handle around an already boxed engine
    pub fn from_boxed(engine: Box<dyn EmulationEngine>) -> CallResult<Self> {
        if !runtime::is_initialized() {
            return Err(SessionError::NotInitialized);
        }

        info!("Created engine '{}'", engine.name());
        Ok(Self {
            engine: Some(engine),
            rom_loaded: false,
            region: Region::default(),
            forwarded: 0,
        })
    }

    fn live(&mut self, op: &'static str) -> CallResult<&mut Box<dyn EmulationEngine>> {
        match self.engine.as_mut() {
            Some(engine) => {
                self.forwarded += 1;
                trace!("engine <- {}", op);
                Ok(engine)
            }
            None => {
                debug!("engine call '{}' after shutdown", op);
                Err(SessionError::SessionClosed)
            }
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) -> CallResult {
        self.live("resize")?.resize(width, height);
        Ok(())
    }

    pub fn release_surface(&mut self) -> CallResult {
        self.live("release_surface")?.release_surface();
        Ok(())
    }

    pub fn pause(&mut self) -> CallResult {
        self.live("pause")?.pause();
        Ok(())
    }

    pub fn resume(&mut self) -> CallResult {
        self.live("resume")?.resume();
        Ok(())
    }

    pub fn reset(&mut self) -> CallResult {
        self.live("reset")?.reset();
        Ok(())
    }

    pub fn set_fast_forward(&mut self, enabled: bool) -> CallResult {
        self.live("set_fast_forward")?.set_fast_forward(enabled);
        Ok(())
    }

    pub fn set_button(&mut self, button: ButtonId, pressed: bool) -> CallResult {
        self.live("set_button")?.set_button(button, pressed);
        Ok(())
    }

    pub fn set_pointer(&mut self, x: f32, y: f32) -> CallResult {
        self.live("set_pointer")?.set_pointer(x, y);
        Ok(())
    }

    pub fn run_frame(&mut self) -> CallResult {
        self.live("run_frame")?.run_frame();
        Ok(())
    }

    /// Hand a ROM image to the engine.
    ///
    /// On rejection the previously loaded ROM, if any, stays active. An
    /// empty image never reaches the engine.
    pub fn load_rom(&mut self, rom: RomImage) -> Result<Region> {
        if rom.is_empty() {
            return Err(RomError::Empty.into());
        }
        let engine = self.live("load_rom")?;
        engine.load_rom(rom)?;
        let region = engine.region();

        self.rom_loaded = true;
        self.region = region;
        Ok(region)
    }

    pub fn save_state(&mut self) -> Result<()> {
        let rom_loaded = self.rom_loaded;
        let engine = self.live("save_state")?;
        if !rom_loaded {
            return Err(StateError::NoActiveSession.into());
        }
        engine.save_state()?;
        Ok(())
    }

    pub fn load_state(&mut self) -> Result<()> {
        let rom_loaded = self.rom_loaded;
        let engine = self.live("load_state")?;
        if !rom_loaded {
            return Err(StateError::NoActiveSession.into());
        }
        engine.load_state()?;
        Ok(())
    }

    /// Battery RAM of the loaded cartridge
    pub fn battery_save(&mut self) -> CallResult<Option<Vec<u8>>> {
        if !self.rom_loaded {
            return Ok(None);
        }
        Ok(self.live("battery_save")?.battery_save())
    }

    pub fn battery_load(&mut self, data: &[u8]) -> CallResult<bool> {
        Ok(self.live("battery_load")?.battery_load(data))
    }

    /// Shut the engine down.
    ///
    /// Returns `true` only for the call that actually performed the
    /// shutdown; the engine sees `shutdown()` exactly once.
    pub fn shutdown(&mut self) -> bool {
        match self.engine.take() {
            Some(mut engine) => {
                engine.shutdown();
                self.forwarded += 1;
                info!(
                    "Engine '{}' shut down after {} forwarded calls",
                    engine.name(),
                    self.forwarded
                );
                true
            }
            None => false,
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.engine.is_none()
    }

    pub fn rom_loaded(&self) -> bool {
        self.rom_loaded
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn forwarded_calls(&self) -> u64 {
        self.forwarded
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if self.shutdown() {
            warn!("Engine handle dropped without an explicit shutdown");
        }
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("engine", &self.engine.as_ref().map(|e| e.name().to_string()))
            .field("rom_loaded", &self.rom_loaded)
            .field("region", &self.region)
            .field("forwarded", &self.forwarded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{EngineCall, RecordingEngine};
    use lb_core::{BridgeError, RomError};

    fn create_handle() -> (EngineHandle, crate::CallLog) {
        let _ = runtime::init();
        let (engine, log) = RecordingEngine::new();
        (EngineHandle::create(engine).unwrap(), log)
    }

    #[test]
    fn test_shutdown_exactly_once() {
        let (mut handle, log) = create_handle();

        assert!(handle.shutdown());
        assert!(!handle.shutdown());
        drop(handle);

        assert_eq!(log.count(|c| *c == EngineCall::Shutdown), 1);
    }

    #[test]
    fn test_calls_after_shutdown_fail() {
        let (mut handle, log) = create_handle();
        handle.shutdown();

        assert_eq!(handle.resize(256, 224), Err(SessionError::SessionClosed));
        assert_eq!(handle.set_button(ButtonId::A, true), Err(SessionError::SessionClosed));
        assert!(matches!(
            handle.save_state(),
            Err(BridgeError::Session(SessionError::SessionClosed))
        ));
        assert_eq!(log.last(), Some(EngineCall::Shutdown));
    }

    #[test]
    fn test_drop_shuts_down() {
        let (handle, log) = create_handle();
        drop(handle);
        assert_eq!(log.calls(), vec![EngineCall::Shutdown]);
    }

    #[test]
    fn test_state_requires_rom() {
        let (mut handle, log) = create_handle();

        assert!(matches!(
            handle.save_state(),
            Err(BridgeError::State(StateError::NoActiveSession))
        ));
        assert!(matches!(
            handle.load_state(),
            Err(BridgeError::State(StateError::NoActiveSession))
        ));
        assert_eq!(log.count(|c| *c == EngineCall::SaveState), 0);
    }

    #[test]
    fn test_empty_rom_not_forwarded() {
        let (mut handle, log) = create_handle();

        let err = handle.load_rom(RomImage::new(Vec::new(), "empty.sfc")).unwrap_err();
        assert!(matches!(err, BridgeError::Rom(RomError::Empty)));
        assert!(!handle.rom_loaded());
        assert_eq!(log.count(|c| matches!(c, EngineCall::LoadRom { .. })), 0);
    }

    #[test]
    fn test_rejected_rom_keeps_previous() {
        let _ = runtime::init();
        let (engine, log) = RecordingEngine::new();
        let mut handle = EngineHandle::create(engine.with_min_rom_size(16)).unwrap();

        handle.load_rom(RomImage::new(vec![1; 32], "good.sfc")).unwrap();
        let err = handle.load_rom(RomImage::new(vec![1; 4], "bad.sfc")).unwrap_err();
        assert!(matches!(err, BridgeError::Rom(RomError::Invalid(_))));
        assert!(handle.rom_loaded());

        handle.save_state().unwrap();
        assert_eq!(log.count(|c| *c == EngineCall::SaveState), 1);
    }
}
