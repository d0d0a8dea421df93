//! Latched movement input
//!
//! Two independent held flags driven entirely by key-down transitions: one
//! key of a pair asserts the flag, its partner clears it, and key releases
//! are never consulted. Repeated key-downs simply re-assert the same value.

/// The four keys the loop cares about, already mapped from whatever the
/// windowing collaborator delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchKey {
    Up,
    Down,
    Left,
    Right,
}

/// The two held flags. `Up`/`Down` drive `up`, `Left`/`Right` drive `left`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatchedInput {
    pub up: bool,
    pub left: bool,
}

impl LatchedInput {
    pub fn key_down(&mut self, key: LatchKey) {
        match key {
            LatchKey::Up => self.up = true,
            LatchKey::Down => self.up = false,
            LatchKey::Left => self.left = true,
            LatchKey::Right => self.left = false,
        }
    }
}

/// The scroll position fed to the simulation step, advanced one unit per
/// frame and per axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollOffsets {
    pub x: i32,
    pub y: i32,
}

impl ScrollOffsets {
    /// One frame of drift: a held `left` pulls the horizontal offset down,
    /// a held `up` pushes the vertical offset up, and each axis drifts the
    /// opposite way while its latch is clear.
    pub fn advance(&mut self, input: LatchedInput) {
        if input.left {
            self.x = self.x.wrapping_sub(1);
        } else {
            self.x = self.x.wrapping_add(1);
        }
        if input.up {
            self.y = self.y.wrapping_add(1);
        } else {
            self.y = self.y.wrapping_sub(1);
        }
    }
}
