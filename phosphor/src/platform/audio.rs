//! cpal-backed looping ring device
//!
//! Emulates the lockable secondary buffer the core writes to: one second of
//! interleaved i16 stereo bytes lives behind a mutex, and the cpal stream
//! callback consumes it round-robin while an atomic tracks how far playback
//! has gone. The callback emits equilibrium until [`AudioDevice::play_looping`]
//! is called, so the ring can be primed with silence first.
//!
//! The mutex is only ever contended for the duration of a memcpy: the frame
//! loop holds it while committing an unlock, the callback holds it while
//! draining one chunk.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use tracing::{error, info};

use phosphor_core::device::{AudioDevice, AudioError, LockedBuffer, PlaybackCursor};

struct RingShared {
    bytes: Mutex<Box<[u8]>>,
    /// Byte position the callback has consumed up to, mod ring size.
    play_cursor: AtomicU32,
    /// Ring bytes drained by the most recent callback chunk; the write
    /// cursor leads the play cursor by this much.
    last_chunk: AtomicU32,
    playing: AtomicBool,
    failed: AtomicBool,
}

/// A looping audio ring over the default cpal output device.
pub struct CpalRingDevice {
    shared: Arc<RingShared>,
    buffer_size: u32,
    _stream: cpal::Stream,
}

impl CpalRingDevice {
    /// Open the default output device as a stereo 16-bit ring of
    /// `buffer_size` bytes at `samples_per_second`.
    ///
    /// Any failure maps to [`AudioError::DeviceUnavailable`]; callers are
    /// expected to continue without audio.
    pub fn new(samples_per_second: u32, buffer_size: u32) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceUnavailable("no output device".into()))?;

        let sample_format = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?
            .sample_format();

        let config = cpal::StreamConfig {
            channels: 2,
            sample_rate: cpal::SampleRate(samples_per_second),
            buffer_size: cpal::BufferSize::Default,
        };

        let shared = Arc::new(RingShared {
            bytes: Mutex::new(vec![0u8; buffer_size as usize].into_boxed_slice()),
            play_cursor: AtomicU32::new(0),
            last_chunk: AtomicU32::new(0),
            playing: AtomicBool::new(false),
            failed: AtomicBool::new(false),
        });

        let stream = match sample_format {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &config, shared.clone(), buffer_size)?
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &config, shared.clone(), buffer_size)?
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &config, shared.clone(), buffer_size)?
            }
            other => {
                return Err(AudioError::DeviceUnavailable(format!(
                    "unsupported sample format {other:?}"
                )));
            }
        };

        info!(
            "audio output: 2 channels, {} Hz, {} byte ring",
            samples_per_second, buffer_size
        );

        Ok(Self {
            shared,
            buffer_size,
            _stream: stream,
        })
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    shared: Arc<RingShared>,
    buffer_size: u32,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample + FromSample<i16>,
{
    let callback_shared = shared.clone();
    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if !callback_shared.playing.load(Ordering::Acquire) {
                    data.fill(T::EQUILIBRIUM);
                    return;
                }
                let Ok(ring) = callback_shared.bytes.lock() else {
                    data.fill(T::EQUILIBRIUM);
                    return;
                };
                let size = buffer_size as usize;
                let mut pos = callback_shared.play_cursor.load(Ordering::Acquire) as usize;
                for sample in data.iter_mut() {
                    let value = i16::from_ne_bytes([ring[pos], ring[pos + 1]]);
                    *sample = T::from_sample(value);
                    pos = (pos + 2) % size;
                }
                drop(ring);
                callback_shared
                    .last_chunk
                    .store((data.len() * 2) as u32 % buffer_size, Ordering::Relaxed);
                callback_shared
                    .play_cursor
                    .store(pos as u32, Ordering::Release);
            },
            move |err| {
                error!("audio stream error: {err}");
                shared.failed.store(true, Ordering::Release);
            },
            None,
        )
        .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

    // The stream starts immediately but stays at equilibrium until
    // play_looping flips the flag.
    stream
        .play()
        .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

    Ok(stream)
}

impl AudioDevice for CpalRingDevice {
    fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    fn cursor(&self) -> Result<PlaybackCursor, AudioError> {
        if self.shared.failed.load(Ordering::Acquire) {
            return Err(AudioError::CursorQueryFailed);
        }
        let play = self.shared.play_cursor.load(Ordering::Acquire);
        let lead = self.shared.last_chunk.load(Ordering::Relaxed);
        Ok(PlaybackCursor {
            play,
            write: (play + lead) % self.buffer_size,
        })
    }

    fn lock(&mut self, offset: u32, len: u32) -> Result<LockedBuffer, AudioError> {
        if offset >= self.buffer_size || len > self.buffer_size {
            return Err(AudioError::LockFailed { offset, len });
        }
        Ok(LockedBuffer::split(offset, len, self.buffer_size))
    }

    fn unlock(&mut self, mut locked: LockedBuffer) -> Result<(), AudioError> {
        let mut ring = self
            .shared
            .bytes
            .lock()
            .map_err(|_| AudioError::DeviceUnavailable("audio thread panicked".into()))?;
        for region in locked.regions_mut() {
            let start = region.offset as usize;
            ring[start..start + region.data.len()].copy_from_slice(&region.data);
        }
        Ok(())
    }

    fn play_looping(&mut self) -> Result<(), AudioError> {
        if self.shared.failed.load(Ordering::Acquire) {
            return Err(AudioError::DeviceUnavailable("stream failed".into()));
        }
        self.shared.playing.store(true, Ordering::Release);
        Ok(())
    }
}
