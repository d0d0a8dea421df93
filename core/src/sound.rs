//! Ring-buffer cursor math and the sample writer
//!
//! [`SoundOutput`] tracks how far this process has written into the looping
//! buffer as a running count of stereo frames. Each frame the loop asks
//! [`SoundOutput::writable_span`] for the byte window between the end of our
//! last write and the point playback will reach once the configured latency
//! elapses, then [`fill_sound_buffer`] commits freshly generated samples into
//! exactly that window.

use crate::device::{AudioDevice, AudioError};

/// Output is a single interleaved stereo stream.
pub const CHANNELS: u32 = 2;

/// 16-bit signed samples.
pub const BYTES_PER_CHANNEL: u32 = (i16::BITS / 8) as u32;

/// Running state of the audio writer plus the fixed stream format.
///
/// By convention the ring holds exactly one second of audio
/// (`buffer_size == samples_per_second * bytes_per_sample`); the latency math
/// relies on the buffer being comfortably larger than the latency window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundOutput {
    /// Stream rate in stereo frames per second.
    pub samples_per_second: u32,
    /// Bytes per stereo frame (channels x bytes per channel).
    pub bytes_per_sample: u32,
    /// Ring size in bytes.
    pub buffer_size: u32,
    /// Monotonic count of stereo frames written since stream start. Wraps
    /// implicitly through the modulo against `buffer_size`.
    pub running_sample_index: u32,
    /// How many frames of look-ahead to keep written beyond the play cursor.
    pub latency_sample_count: u32,
}

/// The byte window the writer may fill this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritableSpan {
    /// First byte after the last one we wrote, i.e. where the lock starts.
    pub byte_to_lock: u32,
    /// Window length; wraps past the buffer end when
    /// `byte_to_lock > target cursor`.
    pub bytes_to_write: u32,
}

impl WritableSpan {
    /// Whole stereo frames this span holds.
    pub fn sample_count(&self, bytes_per_sample: u32) -> u32 {
        self.bytes_to_write / bytes_per_sample
    }
}

impl SoundOutput {
    /// A one-second stereo 16-bit ring at `samples_per_second`, with the
    /// default latency window of a fifteenth of a second.
    pub fn new(samples_per_second: u32) -> Self {
        let bytes_per_sample = CHANNELS * BYTES_PER_CHANNEL;
        Self {
            samples_per_second,
            bytes_per_sample,
            buffer_size: samples_per_second * bytes_per_sample,
            running_sample_index: 0,
            latency_sample_count: samples_per_second / 15,
        }
    }

    /// Override the latency window, in stereo frames.
    pub fn with_latency(mut self, latency_sample_count: u32) -> Self {
        self.latency_sample_count = latency_sample_count;
        self
    }

    /// Compute the writable window given a hardware play cursor.
    ///
    /// The lock starts right after the last byte we produced; it is safe to
    /// reuse because the hardware never plays audio we have not written. The
    /// target is the point playback reaches once the latency window elapses;
    /// writing up to (not past) it keeps samples ready ahead of the cursor.
    pub fn writable_span(&self, play_cursor: u32) -> WritableSpan {
        let byte_to_lock =
            self.running_sample_index.wrapping_mul(self.bytes_per_sample) % self.buffer_size;

        let target_cursor =
            (play_cursor + self.latency_sample_count * self.bytes_per_sample) % self.buffer_size;

        let bytes_to_write = if byte_to_lock > target_cursor {
            (self.buffer_size - byte_to_lock) + target_cursor
        } else {
            target_cursor - byte_to_lock
        };

        WritableSpan {
            byte_to_lock,
            bytes_to_write,
        }
    }
}

/// Transient scratch for one frame of generated samples.
///
/// Interleaved 16-bit stereo, allocated once at the maximum single-frame
/// write and re-trimmed each iteration; contents never carry over between
/// frames.
#[derive(Debug)]
pub struct SampleBuffer {
    samples: Vec<i16>,
    samples_per_second: u32,
    sample_count: usize,
}

impl SampleBuffer {
    /// Allocate scratch for up to `max_frames` stereo frames.
    pub fn with_capacity(max_frames: usize, samples_per_second: u32) -> Self {
        Self {
            samples: vec![0; max_frames * CHANNELS as usize],
            samples_per_second,
            sample_count: 0,
        }
    }

    /// Begin a fresh frame expecting exactly `sample_count` stereo frames.
    ///
    /// The active window is zeroed so a frame with no audio to write stays
    /// silent even if the simulation leaves it untouched.
    pub fn reset(&mut self, sample_count: usize) {
        let len = sample_count * CHANNELS as usize;
        assert!(
            len <= self.samples.len(),
            "sample_count {} exceeds scratch capacity {}",
            sample_count,
            self.samples.len() / CHANNELS as usize,
        );
        self.sample_count = sample_count;
        self.samples[..len].fill(0);
    }

    /// Stereo frames expected this iteration.
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn samples_per_second(&self) -> u32 {
        self.samples_per_second
    }

    /// The active interleaved window: `sample_count * 2` values, L R L R ...
    pub fn frames(&self) -> &[i16] {
        &self.samples[..self.sample_count * CHANNELS as usize]
    }

    pub fn frames_mut(&mut self) -> &mut [i16] {
        &mut self.samples[..self.sample_count * CHANNELS as usize]
    }
}

/// Commit one frame of generated samples into the ring.
///
/// Locks exactly the window described by `span`, copies interleaved frames
/// into region 1 then region 2 in source order, advances
/// `running_sample_index` by one per stereo frame copied (wrapped or not),
/// and unlocks unconditionally - a partially filled window must still be
/// released so the hardware is never starved of the lock.
///
/// Returns the number of stereo frames committed.
pub fn fill_sound_buffer<D: AudioDevice>(
    device: &mut D,
    output: &mut SoundOutput,
    span: WritableSpan,
    source: &SampleBuffer,
) -> Result<u32, AudioError> {
    let mut locked = device.lock(span.byte_to_lock, span.bytes_to_write)?;

    let frame_bytes = output.bytes_per_sample as usize;
    let src: &[u8] = bytemuck::cast_slice(source.frames());

    let mut consumed = 0usize;
    let mut frames_written = 0u32;
    for region in locked.regions_mut() {
        // whole frames only; the regions are frame-aligned by construction
        let available = (src.len() - consumed).min(region.data.len());
        let take = available - available % frame_bytes;
        region.data[..take].copy_from_slice(&src[consumed..consumed + take]);
        consumed += take;
        frames_written += (take / frame_bytes) as u32;
    }

    output.running_sample_index = output.running_sample_index.wrapping_add(frames_written);

    device.unlock(locked)?;
    Ok(frames_written)
}

/// Zero the entire ring.
///
/// Run once at startup, before looping playback begins, so the hardware never
/// plays whatever the buffer held before the first real frame.
pub fn clear_sound_buffer<D: AudioDevice>(device: &mut D) -> Result<(), AudioError> {
    let mut locked = device.lock(0, device.buffer_size())?;
    for region in locked.regions_mut() {
        region.data.fill(0);
    }
    device.unlock(locked)
}
