use super::{DISPLAY_X, DISPLAY_Y, Display};
use crate::u4;

/// The display collaborator: a 64x32 monochrome pixel grid.
///
/// The machine only toggles abstract pixels; rendering (and any fade
/// effects) belongs to the implementation.
pub trait Screen {
    fn get_pixel(&self, x: usize, y: usize) -> bool;
    fn set_pixel(&mut self, x: usize, y: usize, on: bool);

    /// Turn every pixel off.
    fn clear(&mut self);

    /// Mark the contents as changed so the next render picks them up.
    fn request_refresh(&mut self);
}

/// The keypad collaborator: 16 hexadecimal keys.
pub trait Keypad {
    fn is_pressed(&self, key: u4) -> bool;

    /// The lowest-numbered key currently pressed, if any.
    fn first_pressed(&self) -> Option<u4> {
        (0..16).map(u4::new).find(|&key| self.is_pressed(key))
    }
}

/// The audio collaborator: a single tone that is either on or off.
pub trait Audio {
    fn set_tone_active(&mut self, active: bool);
}

/// Stock [`Screen`] implementation: a plain pixel grid plus a dirty flag.
pub struct FrameBuffer {
    pixels: Display<bool>,
    dirty: bool,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            pixels: [[false; DISPLAY_X]; DISPLAY_Y],
            dirty: true,
        }
    }

    /// The full pixel grid, for renderers that redraw everything at once.
    pub fn pixels(&self) -> &Display<bool> {
        &self.pixels
    }

    /// Returns whether a refresh was requested since the last call,
    /// and resets the flag.
    pub fn take_refresh(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Screen for FrameBuffer {
    fn get_pixel(&self, x: usize, y: usize) -> bool {
        self.pixels[y][x]
    }

    fn set_pixel(&mut self, x: usize, y: usize, on: bool) {
        self.pixels[y][x] = on;
    }

    fn clear(&mut self) {
        self.pixels = [[false; DISPLAY_X]; DISPLAY_Y];
    }

    fn request_refresh(&mut self) {
        self.dirty = true;
    }
}

/// Stock [`Keypad`] implementation backed by a boolean per key.
#[derive(Default)]
pub struct KeypadState {
    keys: [bool; 16],
}

impl KeypadState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.keys[key] = pressed;
    }

    pub fn keys(&self) -> &[bool; 16] {
        &self.keys
    }
}

impl Keypad for KeypadState {
    fn is_pressed(&self, key: u4) -> bool {
        self.keys[key]
    }
}

/// [`Audio`] implementation for frontends without sound output.
#[derive(Default)]
pub struct NullAudio;

impl Audio for NullAudio {
    fn set_tone_active(&mut self, _active: bool) {}
}
