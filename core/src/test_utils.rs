//! Test doubles shared across unit tests

use std::cell::Cell;

use crate::device::{AudioDevice, AudioError, LockedBuffer, PlaybackCursor};

/// In-memory looping buffer with a scriptable cursor and failure injection.
///
/// The play cursor optionally advances by `advance_per_poll` on every
/// snapshot, standing in for the time that passes between frames.
#[derive(Debug)]
pub struct FakeRingDevice {
    pub ring: Vec<u8>,
    pub play_cursor: Cell<u32>,
    pub write_lead: u32,
    pub advance_per_poll: u32,
    pub playing: bool,
    pub fail_cursor: bool,
    pub fail_lock: bool,
    pub fail_play: bool,
    pub locks: u32,
    pub unlocks: u32,
}

impl FakeRingDevice {
    pub fn new(buffer_size: u32) -> Self {
        Self {
            ring: vec![0xCD; buffer_size as usize],
            play_cursor: Cell::new(0),
            write_lead: 0,
            advance_per_poll: 0,
            playing: false,
            fail_cursor: false,
            fail_lock: false,
            fail_play: false,
            locks: 0,
            unlocks: 0,
        }
    }
}

impl AudioDevice for FakeRingDevice {
    fn buffer_size(&self) -> u32 {
        self.ring.len() as u32
    }

    fn cursor(&self) -> Result<PlaybackCursor, AudioError> {
        if self.fail_cursor {
            return Err(AudioError::CursorQueryFailed);
        }
        let size = self.buffer_size();
        let play = self.play_cursor.get() % size;
        self.play_cursor.set((play + self.advance_per_poll) % size);
        Ok(PlaybackCursor {
            play,
            write: (play + self.write_lead) % size,
        })
    }

    fn lock(&mut self, offset: u32, len: u32) -> Result<LockedBuffer, AudioError> {
        let size = self.buffer_size();
        if self.fail_lock || offset >= size || len > size {
            return Err(AudioError::LockFailed { offset, len });
        }
        self.locks += 1;
        Ok(LockedBuffer::split(offset, len, size))
    }

    fn unlock(&mut self, mut locked: LockedBuffer) -> Result<(), AudioError> {
        self.unlocks += 1;
        for region in locked.regions_mut() {
            let start = region.offset as usize;
            self.ring[start..start + region.data.len()].copy_from_slice(&region.data);
        }
        Ok(())
    }

    fn play_looping(&mut self) -> Result<(), AudioError> {
        if self.fail_play {
            return Err(AudioError::DeviceUnavailable("play refused".into()));
        }
        self.playing = true;
        Ok(())
    }
}
