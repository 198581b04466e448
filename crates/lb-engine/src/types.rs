//! Value types shared across the engine boundary

use bitflags::bitflags;
use std::fmt;
use std::time::Duration;

bitflags! {
    /// Controller button flags, in joypad serial order
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ButtonSet: u16 {
        const B      = 1 << 0;
        const Y      = 1 << 1;
        const SELECT = 1 << 2;
        const START  = 1 << 3;
        const UP     = 1 << 4;
        const DOWN   = 1 << 5;
        const LEFT   = 1 << 6;
        const RIGHT  = 1 << 7;
        const A      = 1 << 8;
        const X      = 1 << 9;
        const L      = 1 << 10;
        const R      = 1 << 11;
    }
}

impl Default for ButtonSet {
    fn default() -> Self {
        Self::empty()
    }
}

/// On-screen button, numbered the way the host lays out its widgets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonId {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
    A = 4,
    B = 5,
    X = 6,
    Y = 7,
    L = 8,
    R = 9,
    Select = 10,
    Start = 11,
}

impl ButtonId {
    pub const ALL: [ButtonId; 12] = [
        ButtonId::Up,
        ButtonId::Down,
        ButtonId::Left,
        ButtonId::Right,
        ButtonId::A,
        ButtonId::B,
        ButtonId::X,
        ButtonId::Y,
        ButtonId::L,
        ButtonId::R,
        ButtonId::Select,
        ButtonId::Start,
    ];

    /// Map a host button index (0..=11) to a button
    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i))
            .copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Flag for this button in the joypad serial word
    pub fn flag(self) -> ButtonSet {
        match self {
            Self::Up => ButtonSet::UP,
            Self::Down => ButtonSet::DOWN,
            Self::Left => ButtonSet::LEFT,
            Self::Right => ButtonSet::RIGHT,
            Self::A => ButtonSet::A,
            Self::B => ButtonSet::B,
            Self::X => ButtonSet::X,
            Self::Y => ButtonSet::Y,
            Self::L => ButtonSet::L,
            Self::R => ButtonSet::R,
            Self::Select => ButtonSet::SELECT,
            Self::Start => ButtonSet::START,
        }
    }

    /// Bit position in the joypad serial word
    pub fn serial_bit(self) -> u8 {
        self.flag().bits().trailing_zeros() as u8
    }
}

/// Last reported pointer position in surface coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerPosition {
    pub x: f32,
    pub y: f32,
}

/// Input state as last forwarded to the engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputState {
    /// Pressed buttons
    pub buttons: ButtonSet,
    /// Last pointer coordinates, if any touch was seen
    pub pointer: Option<PointerPosition>,
    /// A touch is currently down
    pub pointer_active: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pressed(&self, button: ButtonId) -> bool {
        self.buttons.contains(button.flag())
    }

    pub fn set_button(&mut self, button: ButtonId, pressed: bool) {
        self.buttons.set(button.flag(), pressed);
    }
}

/// Renderable surface as known to the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceDescriptor {
    pub width: u32,
    pub height: u32,
    pub valid: bool,
}

impl SurfaceDescriptor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            valid: true,
        }
    }

    pub fn invalid() -> Self {
        Self::default()
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Video timing of the loaded cartridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    #[default]
    Ntsc,
    Pal,
}

impl Region {
    pub fn frames_per_second(self) -> u32 {
        match self {
            Self::Ntsc => 60,
            Self::Pal => 50,
        }
    }

    pub fn frame_duration(self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.frames_per_second() as u64)
    }
}

/// Direction of a snapshot request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotDirection {
    Save,
    Load,
}

impl fmt::Display for SnapshotDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Save => f.write_str("save"),
            Self::Load => f.write_str("load"),
        }
    }
}

/// A fully materialized ROM image.
///
/// Not `Clone`: the image moves from the loader into the engine.
pub struct RomImage {
    data: Vec<u8>,
    source: String,
}

impl RomImage {
    pub fn new(data: Vec<u8>, source: impl Into<String>) -> Self {
        Self {
            data,
            source: source.into(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_parts(self) -> (Vec<u8>, String) {
        (self.data, self.source)
    }
}

impl fmt::Debug for RomImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RomImage")
            .field("source", &self.source)
            .field("len", &self.data.len())
            .finish()
    }
}
