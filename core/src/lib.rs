//! Phosphor core - frame-cycle orchestration with ring-buffer audio
//!
//! This crate couples three time-sensitive streams into one per-frame cycle:
//! input sampling, a simulation/render step, and a continuously looping
//! hardware audio ring buffer. The hard part is the audio side: every frame
//! the loop computes which region of the circular buffer is safe to overwrite
//! without racing the hardware's playback cursor, and commits exactly that
//! many freshly generated samples.
//!
//! # Architecture
//!
//! - [`FrameLoop`] - the per-frame cycle (events, simulation, audio, present)
//! - [`SoundOutput`] - running write position and the cursor math that turns a
//!   hardware play cursor into a writable byte span
//! - [`AudioDevice`] - capability-injected looping buffer backend; platform
//!   adapters implement it, the core never touches hardware directly
//! - [`PixelSurface`] - the CPU pixel buffer handed to the simulation step and
//!   blitted by the presentation sink

pub mod device;
pub mod frame;
pub mod input;
pub mod sound;
pub mod surface;
#[cfg(test)]
pub mod test_utils;

// Re-export the loop and its collaborator traits
pub use frame::{
    ControlEvent, EventPump, FrameLoop, LoopState, PresentError, PresentationSink, Simulation,
};

// Re-export audio types
pub use device::{AudioDevice, AudioError, LockedBuffer, LockedRegion, PlaybackCursor};
pub use sound::{SampleBuffer, SoundOutput, WritableSpan, clear_sound_buffer, fill_sound_buffer};

// Re-export surface and input types
pub use input::{LatchKey, LatchedInput, ScrollOffsets};
pub use surface::{BYTES_PER_PIXEL, PixelSurface, SurfaceError};
