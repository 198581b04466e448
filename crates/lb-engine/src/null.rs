//! Null engine for headless hosting
//!
//! Validates cartridge headers and keeps frame, input and battery state so
//! a host can be exercised end to end without the native library. Nothing
//! is rendered.

use crate::engine::EmulationEngine;
use crate::types::{ButtonId, ButtonSet, PointerPosition, Region, RomImage};
use lb_core::{RomError, StateError};
use serde::{Deserialize, Serialize};

/// Smallest image that can hold a header: one 32 KiB bank
const MIN_ROM_SIZE: usize = 0x8000;

/// Internal header offsets for LoROM and HiROM boards
const LOROM_HEADER: usize = 0x7FC0;
const HIROM_HEADER: usize = 0xFFC0;

/// Header field offsets, relative to the header start
const TITLE_LEN: usize = 21;
const SRAM_SIZE_OFFSET: usize = 0x18;
const COUNTRY_OFFSET: usize = 0x19;
const COMPLEMENT_OFFSET: usize = 0x1C;
const CHECKSUM_OFFSET: usize = 0x1E;

/// Largest battery RAM a board may declare (128 KiB)
const MAX_SRAM_SHIFT: u8 = 7;

/// Cartridge facts parsed from the internal header
#[derive(Debug, Clone)]
pub struct CartridgeInfo {
    pub title: String,
    pub region: Region,
    pub hirom: bool,
    pub sram_size: usize,
    pub size: usize,
}

impl CartridgeInfo {
    /// Locate and parse the internal header.
    ///
    /// A header whose checksum and complement agree wins; without one the
    /// LoROM location is assumed.
    pub fn parse(data: &[u8]) -> Result<Self, RomError> {
        if data.len() < MIN_ROM_SIZE {
            return Err(RomError::Invalid(format!(
                "{} bytes is smaller than one 32 KiB bank",
                data.len()
            )));
        }

        let checksum_ok = |base: usize| {
            data.len() >= base + 0x20 && {
                let complement = u16::from_le_bytes([
                    data[base + COMPLEMENT_OFFSET],
                    data[base + COMPLEMENT_OFFSET + 1],
                ]);
                let checksum = u16::from_le_bytes([
                    data[base + CHECKSUM_OFFSET],
                    data[base + CHECKSUM_OFFSET + 1],
                ]);
                checksum ^ complement == 0xFFFF
            }
        };

        let (base, hirom) = if checksum_ok(LOROM_HEADER) {
            (LOROM_HEADER, false)
        } else if checksum_ok(HIROM_HEADER) {
            (HIROM_HEADER, true)
        } else {
            (LOROM_HEADER, false)
        };

        let title = data[base..base + TITLE_LEN]
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { ' ' })
            .collect::<String>()
            .trim()
            .to_string();

        let region = match data[base + COUNTRY_OFFSET] {
            0x02..=0x0C | 0x11 => Region::Pal,
            _ => Region::Ntsc,
        };

        let sram_shift = data[base + SRAM_SIZE_OFFSET];
        let sram_size = if sram_shift == 0 || sram_shift > MAX_SRAM_SHIFT {
            0
        } else {
            1024 << sram_shift
        };

        Ok(Self {
            title,
            region,
            hirom,
            sram_size,
            size: data.len(),
        })
    }
}

#[derive(Debug)]
struct Cartridge {
    info: CartridgeInfo,
    _data: Vec<u8>,
    sram: Vec<u8>,
}

/// Serialized form of the null engine's emulation state
#[derive(Debug, Serialize, Deserialize)]
struct NullSnapshot {
    title: String,
    frame_count: u64,
    buttons: u16,
    sram: Vec<u8>,
}

/// Headless engine
#[derive(Debug, Default)]
pub struct NullEngine {
    surface: Option<(u32, u32)>,
    paused: bool,
    fast_forward: bool,
    buttons: ButtonSet,
    pointer: Option<PointerPosition>,
    cartridge: Option<Cartridge>,
    frame_count: u64,
    snapshot: Option<Vec<u8>>,
    shut_down: bool,
}

impl NullEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn buttons(&self) -> ButtonSet {
        self.buttons
    }

    pub fn cartridge(&self) -> Option<&CartridgeInfo> {
        self.cartridge.as_ref().map(|c| &c.info)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl EmulationEngine for NullEngine {
    fn name(&self) -> &str {
        "null"
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.surface = Some((width, height));
    }

    fn release_surface(&mut self) {
        self.surface = None;
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn reset(&mut self) {
        if self.cartridge.is_some() {
            self.frame_count = 0;
        }
    }

    fn set_fast_forward(&mut self, enabled: bool) {
        self.fast_forward = enabled;
    }

    fn set_button(&mut self, button: ButtonId, pressed: bool) {
        self.buttons.set(button.flag(), pressed);
    }

    fn set_pointer(&mut self, x: f32, y: f32) {
        self.pointer = Some(PointerPosition { x, y });
    }

    fn load_rom(&mut self, rom: RomImage) -> Result<(), RomError> {
        let info = CartridgeInfo::parse(rom.data())?;
        tracing::info!(
            "Null engine loaded '{}' ({} KiB, {:?}, {})",
            info.title,
            info.size / 1024,
            info.region,
            if info.hirom { "HiROM" } else { "LoROM" }
        );

        let (data, _source) = rom.into_parts();
        self.cartridge = Some(Cartridge {
            sram: vec![0; info.sram_size],
            info,
            _data: data,
        });
        self.frame_count = 0;
        self.snapshot = None;
        Ok(())
    }

    fn save_state(&mut self) -> Result<(), StateError> {
        let cart = self.cartridge.as_ref().ok_or(StateError::NoActiveSession)?;
        let snapshot = NullSnapshot {
            title: cart.info.title.clone(),
            frame_count: self.frame_count,
            buttons: self.buttons.bits(),
            sram: cart.sram.clone(),
        };
        let blob = serde_json::to_vec(&snapshot)
            .map_err(|e| StateError::SerializationFailed(e.to_string()))?;
        self.snapshot = Some(blob);
        Ok(())
    }

    fn load_state(&mut self) -> Result<(), StateError> {
        let cart = self.cartridge.as_mut().ok_or(StateError::NoActiveSession)?;
        let blob = self.snapshot.as_ref().ok_or_else(|| {
            StateError::IoFailed(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no saved state",
            ))
        })?;
        let snapshot: NullSnapshot = serde_json::from_slice(blob)
            .map_err(|e| StateError::SerializationFailed(e.to_string()))?;
        if snapshot.title != cart.info.title {
            return Err(StateError::SerializationFailed(format!(
                "state belongs to '{}'",
                snapshot.title
            )));
        }

        self.frame_count = snapshot.frame_count;
        self.buttons = ButtonSet::from_bits_truncate(snapshot.buttons);
        cart.sram = snapshot.sram;
        Ok(())
    }

    fn run_frame(&mut self) {
        if self.cartridge.is_some() && self.surface.is_some() && !self.paused {
            self.frame_count += 1;
        }
    }

    fn region(&self) -> Region {
        self.cartridge
            .as_ref()
            .map(|c| c.info.region)
            .unwrap_or_default()
    }

    fn battery_save(&mut self) -> Option<Vec<u8>> {
        self.cartridge
            .as_ref()
            .filter(|c| !c.sram.is_empty())
            .map(|c| c.sram.clone())
    }

    fn battery_load(&mut self, data: &[u8]) -> bool {
        match self.cartridge.as_mut() {
            Some(cart) if cart.sram.len() == data.len() => {
                cart.sram.copy_from_slice(data);
                true
            }
            _ => false,
        }
    }

    fn shutdown(&mut self) {
        self.cartridge = None;
        self.surface = None;
        self.shut_down = true;
    }
}

/// Build a minimal LoROM image with a valid internal header
pub fn synthetic_rom(size: usize, title: &str, country: u8, sram_shift: u8) -> Vec<u8> {
    let mut data = vec![0u8; size.max(MIN_ROM_SIZE)];
    let base = LOROM_HEADER;
    for (i, b) in title.bytes().take(TITLE_LEN).enumerate() {
        data[base + i] = b;
    }
    for i in title.len().min(TITLE_LEN)..TITLE_LEN {
        data[base + i] = b' ';
    }
    data[base + SRAM_SIZE_OFFSET] = sram_shift;
    data[base + COUNTRY_OFFSET] = country;
    let checksum: u16 = 0x1234;
    data[base + COMPLEMENT_OFFSET..base + COMPLEMENT_OFFSET + 2]
        .copy_from_slice(&(!checksum).to_le_bytes());
    data[base + CHECKSUM_OFFSET..base + CHECKSUM_OFFSET + 2]
        .copy_from_slice(&checksum.to_le_bytes());
    data
}
