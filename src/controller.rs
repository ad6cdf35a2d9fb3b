//! Controller implementation
//!
//! The NES has two controller ports, read serially through $4016/$4017. Each
//! port walks a 24-step sequence: eight button bits, eleven open-bus zeros,
//! a signature bit at step 19, then zeros until it wraps. A 1 -> 0 transition
//! on bit 0 of a $4016 write restarts both sequences.
//!
//! Port 2 can also carry a light gun, which reports whether a white pixel is
//! under the pointer and whether the trigger is held.

use crate::savestate::StrobeSnapshot;

/// Buttons per controller
pub const BUTTON_COUNT: usize = 8;

/// Length of the serial read sequence
pub const STROBE_SEQUENCE_LENGTH: u8 = 24;

/// Sequence step that always reads back as 1
pub const SIGNATURE_STEP: u8 = 19;

/// Pixel value the light gun treats as "lit"
pub const WHITE_PIXEL: u32 = 0xFF_FFFF;

/// Half-width of the square the light gun scans around the pointer
pub const LIGHT_GUN_RADIUS: i32 = 4;

/// Light gun "white pixel seen" bit
pub const LIGHT_SENSED: u8 = 0x08;

/// Light gun trigger bit
pub const TRIGGER_PULLED: u8 = 0x10;

const FRAME_WIDTH: i32 = 256;
const FRAME_HEIGHT: i32 = 240;

/// Button indices within a controller's pressed-state array
pub mod button {
    pub const A: usize = 0;
    pub const B: usize = 1;
    pub const SELECT: usize = 2;
    pub const START: usize = 3;
    pub const UP: usize = 4;
    pub const DOWN: usize = 5;
    pub const LEFT: usize = 6;
    pub const RIGHT: usize = 7;
}

/// Host-side input state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputState {
    /// Pressed state of controller 1
    pub state1: [bool; BUTTON_COUNT],

    /// Pressed state of controller 2
    pub state2: [bool; BUTTON_COUNT],

    /// Light gun trigger held
    pub pointer_pressed: bool,

    /// Light gun position in frame-buffer pixels
    pub pointer_x: i32,
    pub pointer_y: i32,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a button state. `port` is 1 or 2; anything else is ignored.
    pub fn set_button_pressed(&mut self, port: u8, button: usize, pressed: bool) {
        let state = match port {
            1 => &mut self.state1,
            2 => &mut self.state2,
            _ => return,
        };
        if let Some(slot) = state.get_mut(button) {
            *slot = pressed;
        }
    }

    pub fn press_pointer(&mut self, x: i32, y: i32) {
        self.pointer_x = x;
        self.pointer_y = y;
        self.pointer_pressed = true;
    }

    pub fn release_pointer(&mut self) {
        self.pointer_pressed = false;
    }
}

/// Serial read position of one controller port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StrobeReader {
    state: u8,
}

impl StrobeReader {
    /// Read the next bit of the sequence
    pub fn read(&mut self, buttons: &[bool; BUTTON_COUNT]) -> u8 {
        let value = match self.state {
            0..=7 => buttons[self.state as usize] as u8,
            SIGNATURE_STEP => 1,
            _ => 0,
        };

        self.state += 1;
        if self.state == STROBE_SEQUENCE_LENGTH {
            self.state = 0;
        }

        value
    }

    #[inline]
    pub fn state(&self) -> u8 {
        self.state
    }

    pub fn set_state(&mut self, state: u8) {
        self.state = state % STROBE_SEQUENCE_LENGTH;
    }

    pub fn reset(&mut self) {
        self.state = 0;
    }
}

/// Strobe latch shared by both controller ports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Joypads {
    pub joy1: StrobeReader,
    pub joy2: StrobeReader,
    last_write: u8,
}

impl Joypads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Handle a write to $4016
    pub fn write_strobe(&mut self, value: u8) {
        if (value & 1) == 0 && (self.last_write & 1) == 1 {
            self.joy1.reset();
            self.joy2.reset();
        }
        self.last_write = value;
    }

    /// Handle a read from $4016
    pub fn read_joy1(&mut self, input: &InputState) -> u8 {
        self.joy1.read(&input.state1)
    }

    /// Handle a read from $4017, folding in the light gun when its trigger is held
    pub fn read_joy2(&mut self, input: &InputState, frame_buffer: &[u32]) -> u8 {
        let value = self.joy2.read(&input.state2);
        if input.pointer_pressed {
            value | light_gun_bits(input, frame_buffer)
        } else {
            value
        }
    }

    pub fn last_write(&self) -> u8 {
        self.last_write
    }

    pub fn snapshot(&self) -> StrobeSnapshot {
        StrobeSnapshot {
            joy1_strobe_state: self.joy1.state(),
            joy2_strobe_state: self.joy2.state(),
            joypad_last_write: self.last_write,
        }
    }

    pub fn restore(&mut self, snapshot: &StrobeSnapshot) {
        self.joy1.set_state(snapshot.joy1_strobe_state);
        self.joy2.set_state(snapshot.joy2_strobe_state);
        self.last_write = snapshot.joypad_last_write;
    }
}

/// Light gun bits for the current pointer position. The window is clamped to
/// the visible frame and is `LIGHT_GUN_RADIUS` pixels on each side of the pointer.
pub fn light_gun_bits(input: &InputState, frame_buffer: &[u32]) -> u8 {
    let sx = (input.pointer_x - LIGHT_GUN_RADIUS).max(0);
    let ex = (input.pointer_x + LIGHT_GUN_RADIUS).min(FRAME_WIDTH);
    let sy = (input.pointer_y - LIGHT_GUN_RADIUS).max(0);
    let ey = (input.pointer_y + LIGHT_GUN_RADIUS).min(FRAME_HEIGHT);

    let lit = (sy..ey).any(|y| {
        (sx..ex).any(|x| frame_buffer.get(((y << 8) + x) as usize) == Some(&WHITE_PIXEL))
    });

    let mut bits = if lit { LIGHT_SENSED } else { 0 };
    if input.pointer_pressed {
        bits |= TRIGGER_PULLED;
    }
    bits
}
