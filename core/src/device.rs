//! Audio device abstraction
//!
//! The frame loop never talks to audio hardware directly. A platform adapter
//! implements [`AudioDevice`] over the real backend and is injected at
//! startup; tests inject an in-memory ring instead.
//!
//! Locking follows the shape of looping hardware buffers: a lock request for
//! a byte window hands back up to two contiguous regions - one starting at
//! the requested offset, and a second starting at byte 0 when the window
//! wraps past the end of the ring. The split is not hidden from callers
//! because handling zero, one, or two regions correctly is part of the
//! writer's contract.

use thiserror::Error;

/// Errors on the audio path.
///
/// Every variant is survivable: `DeviceUnavailable` downgrades the session to
/// silent video, the other two skip audio for a single frame. None of them
/// stop the loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    /// The output device could not be created or has gone away.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),
    /// Reading the hardware play/write cursor failed this frame.
    #[error("cursor query failed")]
    CursorQueryFailed,
    /// Locking the requested window of the ring buffer failed this frame.
    #[error("failed to lock {len} bytes at offset {offset}")]
    LockFailed { offset: u32, len: u32 },
}

/// Snapshot of the hardware cursors, in bytes from the start of the ring.
///
/// `play` is where playback has actually sounded through; `write` leads it by
/// however much the hardware has already queued. The snapshot is not a lock -
/// the writer stays safe by only ever writing ahead of `play` by a bounded,
/// recomputed-every-frame margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackCursor {
    pub play: u32,
    pub write: u32,
}

/// One contiguous writable region of a locked window.
///
/// Bytes are staged here and committed back into the ring on unlock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedRegion {
    /// Byte offset of this region within the ring buffer.
    pub offset: u32,
    /// Staged bytes; zeroed at lock time, committed on unlock.
    pub data: Vec<u8>,
}

impl LockedRegion {
    fn new(offset: u32, len: u32) -> Self {
        Self {
            offset,
            data: vec![0; len as usize],
        }
    }
}

/// A locked window of the ring buffer, split at the wrap boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedBuffer {
    /// Region starting at the locked offset, running at most to the end of
    /// the ring.
    pub first: LockedRegion,
    /// Region starting at byte 0; present only when the window wraps.
    pub second: Option<LockedRegion>,
}

impl LockedBuffer {
    /// Split the window `[offset, offset + len)` (mod `buffer_size`) into its
    /// writable regions.
    ///
    /// `offset` must be inside the ring and `len` must not exceed the ring;
    /// devices validate both before constructing a lock.
    pub fn split(offset: u32, len: u32, buffer_size: u32) -> Self {
        debug_assert!(offset < buffer_size);
        debug_assert!(len <= buffer_size);

        let first_len = len.min(buffer_size - offset);
        let second_len = len - first_len;
        Self {
            first: LockedRegion::new(offset, first_len),
            second: (second_len > 0).then(|| LockedRegion::new(0, second_len)),
        }
    }

    /// Total number of bytes this lock covers.
    pub fn len(&self) -> usize {
        self.first.data.len() + self.second.as_ref().map_or(0, |r| r.data.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The regions in write order: first, then the wrapped remainder.
    pub fn regions_mut(&mut self) -> impl Iterator<Item = &mut LockedRegion> {
        std::iter::once(&mut self.first).chain(self.second.as_mut())
    }
}

/// A looping hardware (or emulated) audio buffer.
///
/// The buffer plays continuously and wraps; the core writes ahead of the
/// reported play cursor through lock/unlock windows. Implementations must
/// treat every call as immediate pass/fail - the loop never retries within a
/// frame.
pub trait AudioDevice {
    /// Size of the ring in bytes.
    fn buffer_size(&self) -> u32;

    /// Snapshot the current play/write cursors.
    fn cursor(&self) -> Result<PlaybackCursor, AudioError>;

    /// Acquire write access to `[offset, offset + len)` (mod buffer size).
    fn lock(&mut self, offset: u32, len: u32) -> Result<LockedBuffer, AudioError>;

    /// Commit the staged regions back into the ring.
    ///
    /// Must accept partially filled regions; the writer always unlocks, even
    /// when it could not fill the whole window.
    fn unlock(&mut self, locked: LockedBuffer) -> Result<(), AudioError>;

    /// Start (or keep) looping playback.
    fn play_looping(&mut self) -> Result<(), AudioError>;
}
