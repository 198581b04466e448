//! Recording engine for testing the session state machine
//!
//! Every call the bridge forwards is appended to a shared [`CallLog`].

use crate::engine::EmulationEngine;
use crate::types::{ButtonId, Region, RomImage};
use lb_core::{RomError, StateError};
use parking_lot::Mutex;
use std::sync::Arc;

/// One forwarded engine call
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Resize { width: u32, height: u32 },
    ReleaseSurface,
    Pause,
    Resume,
    Reset,
    SetFastForward(bool),
    SetButton(ButtonId, bool),
    SetPointer { x: f32, y: f32 },
    LoadRom { source: String, len: usize },
    SaveState,
    LoadState,
    RunFrame,
    BatterySave,
    BatteryLoad(usize),
    Shutdown,
}

/// Shared, ordered log of forwarded calls
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<EngineCall>>>,
}

impl CallLog {
    fn push(&self, call: EngineCall) {
        self.calls.lock().push(call);
    }

    /// Snapshot of every call so far
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    /// Calls other than `RunFrame`
    pub fn control_calls(&self) -> Vec<EngineCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| **c != EngineCall::RunFrame)
            .cloned()
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    pub fn contains(&self, call: &EngineCall) -> bool {
        self.calls.lock().contains(call)
    }

    pub fn last(&self) -> Option<EngineCall> {
        self.calls.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

/// Engine that records calls and answers with configurable outcomes
#[derive(Debug)]
pub struct RecordingEngine {
    log: CallLog,
    min_rom_size: usize,
    region: Region,
    battery: Option<Vec<u8>>,
    save_failure: Option<String>,
    rom_loaded: bool,
}

impl RecordingEngine {
    /// Create an engine and the log it writes to
    pub fn new() -> (Self, CallLog) {
        let log = CallLog::default();
        let engine = Self {
            log: log.clone(),
            min_rom_size: 1,
            region: Region::Ntsc,
            battery: None,
            save_failure: None,
            rom_loaded: false,
        };
        (engine, log)
    }

    /// Reject ROM images shorter than `size` as invalid
    pub fn with_min_rom_size(mut self, size: usize) -> Self {
        self.min_rom_size = size;
        self
    }

    /// Report this region for every accepted ROM
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    /// Expose battery RAM once a ROM is loaded
    pub fn with_battery(mut self, sram: Vec<u8>) -> Self {
        self.battery = Some(sram);
        self
    }

    /// Fail every save/load with a serialization error
    pub fn with_state_failure(mut self, message: impl Into<String>) -> Self {
        self.save_failure = Some(message.into());
        self
    }
}

impl EmulationEngine for RecordingEngine {
    fn name(&self) -> &str {
        "recording"
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.log.push(EngineCall::Resize { width, height });
    }

    fn release_surface(&mut self) {
        self.log.push(EngineCall::ReleaseSurface);
    }

    fn pause(&mut self) {
        self.log.push(EngineCall::Pause);
    }

    fn resume(&mut self) {
        self.log.push(EngineCall::Resume);
    }

    fn reset(&mut self) {
        self.log.push(EngineCall::Reset);
    }

    fn set_fast_forward(&mut self, enabled: bool) {
        self.log.push(EngineCall::SetFastForward(enabled));
    }

    fn set_button(&mut self, button: ButtonId, pressed: bool) {
        self.log.push(EngineCall::SetButton(button, pressed));
    }

    fn set_pointer(&mut self, x: f32, y: f32) {
        self.log.push(EngineCall::SetPointer { x, y });
    }

    fn load_rom(&mut self, rom: RomImage) -> Result<(), RomError> {
        self.log.push(EngineCall::LoadRom {
            source: rom.source().to_string(),
            len: rom.len(),
        });
        if rom.len() < self.min_rom_size {
            return Err(RomError::Invalid(format!("{} bytes", rom.len())));
        }
        self.rom_loaded = true;
        Ok(())
    }

    fn save_state(&mut self) -> Result<(), StateError> {
        self.log.push(EngineCall::SaveState);
        match &self.save_failure {
            Some(message) => Err(StateError::SerializationFailed(message.clone())),
            None => Ok(()),
        }
    }

    fn load_state(&mut self) -> Result<(), StateError> {
        self.log.push(EngineCall::LoadState);
        match &self.save_failure {
            Some(message) => Err(StateError::SerializationFailed(message.clone())),
            None => Ok(()),
        }
    }

    fn run_frame(&mut self) {
        self.log.push(EngineCall::RunFrame);
    }

    fn region(&self) -> Region {
        self.region
    }

    fn battery_save(&mut self) -> Option<Vec<u8>> {
        self.log.push(EngineCall::BatterySave);
        if self.rom_loaded {
            self.battery.clone()
        } else {
            None
        }
    }

    fn battery_load(&mut self, data: &[u8]) -> bool {
        self.log.push(EngineCall::BatteryLoad(data.len()));
        match self.battery.as_mut() {
            Some(sram) if sram.len() == data.len() => {
                sram.copy_from_slice(data);
                true
            }
            _ => false,
        }
    }

    fn shutdown(&mut self) {
        self.log.push(EngineCall::Shutdown);
    }
}
