//! The per-frame cycle
//!
//! One iteration: drain events, snapshot the audio cursor, run the
//! simulation step once, commit whatever samples the cursor allowed, present
//! the pixel surface, advance the scroll offsets. Everything is synchronous
//! and non-blocking - the loop never waits on input, the audio device, or
//! presentation, and audio failures degrade to a silent frame rather than
//! stalling video.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::device::AudioDevice;
use crate::input::{LatchKey, LatchedInput, ScrollOffsets};
use crate::sound::{SampleBuffer, SoundOutput, clear_sound_buffer, fill_sound_buffer};
use crate::surface::PixelSurface;

/// Events delivered by the windowing collaborator, already reduced to what
/// the loop consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    KeyDown(LatchKey),
    Resized { width: u32, height: u32 },
    CloseRequested,
}

/// Non-blocking event drain. Implementations append whatever is pending and
/// return immediately.
pub trait EventPump {
    fn poll_events(&mut self, out: &mut Vec<ControlEvent>);
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresentError {
    /// The window is gone; there is nothing left to present to.
    #[error("presentation target closed")]
    TargetClosed,
    /// The blit itself failed; the target may recover next frame.
    #[error("blit failed: {0}")]
    Blit(String),
}

/// Blits a finished pixel buffer to the visible surface, stretching to the
/// current client area if the dimensions differ.
pub trait PresentationSink {
    fn present(&mut self, surface: &PixelSurface) -> Result<(), PresentError>;
}

/// The opaque simulation/render callback.
///
/// Must fill every pixel of the surface (row-major, pitch-respecting) and
/// exactly `audio.sample_count()` interleaved stereo frames. Side effects
/// only; it is never handed an error and never returns one.
pub trait Simulation {
    fn update(
        &mut self,
        surface: &mut PixelSurface,
        audio: &mut SampleBuffer,
        offset_x: i32,
        offset_y: i32,
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    /// Terminal; reached on a close/quit signal or a vanished present target.
    Stopped,
}

/// Owns every piece of per-frame state and drives the cycle.
///
/// The audio device is optional: with `None` the loop runs silent video-only,
/// and a device that fails during startup is dropped to the same mode.
pub struct FrameLoop<D: AudioDevice> {
    sound: SoundOutput,
    device: Option<D>,
    surface: PixelSurface,
    samples: SampleBuffer,
    input: LatchedInput,
    offsets: ScrollOffsets,
    state: LoopState,
    events: Vec<ControlEvent>,
}

impl<D: AudioDevice> FrameLoop<D> {
    pub fn new(surface: PixelSurface, sound: SoundOutput, device: Option<D>) -> Self {
        if let Some(device) = &device {
            debug_assert_eq!(device.buffer_size(), sound.buffer_size);
        }
        let max_frames = (sound.buffer_size / sound.bytes_per_sample) as usize;
        let samples = SampleBuffer::with_capacity(max_frames, sound.samples_per_second);
        Self {
            sound,
            device,
            surface,
            samples,
            input: LatchedInput::default(),
            offsets: ScrollOffsets::default(),
            state: LoopState::Running,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn offsets(&self) -> ScrollOffsets {
        self.offsets
    }

    pub fn input(&self) -> LatchedInput {
        self.input
    }

    pub fn surface(&self) -> &PixelSurface {
        &self.surface
    }

    pub fn sound(&self) -> &SoundOutput {
        &self.sound
    }

    pub fn device(&self) -> Option<&D> {
        self.device.as_ref()
    }

    pub fn device_mut(&mut self) -> Option<&mut D> {
        self.device.as_mut()
    }

    /// Prime the ring with silence and start looping playback.
    ///
    /// Any failure here disables audio for the rest of the session; the
    /// visual loop is unaffected.
    pub fn start(&mut self) {
        let Some(device) = self.device.as_mut() else {
            info!("no audio device, running video-only");
            return;
        };
        let primed = clear_sound_buffer(device).and_then(|()| device.play_looping());
        if let Err(err) = primed {
            warn!("disabling audio: {err}");
            self.device = None;
        }
    }

    /// Run the cycle until a stop signal arrives.
    pub fn run<W, S>(&mut self, window: &mut W, sim: &mut S)
    where
        W: EventPump + PresentationSink,
        S: Simulation,
    {
        self.start();
        while self.state == LoopState::Running {
            self.step(window, sim);
        }
        info!("frame loop stopped");
    }

    /// One full iteration of the cycle.
    ///
    /// A stop signal observed while draining events still lets the current
    /// iteration finish; the loop exits on the next check.
    pub fn step<W, S>(&mut self, window: &mut W, sim: &mut S)
    where
        W: EventPump + PresentationSink,
        S: Simulation,
    {
        let mut events = std::mem::take(&mut self.events);
        window.poll_events(&mut events);
        for event in events.drain(..) {
            self.handle_event(event);
        }
        self.events = events;

        // One cursor snapshot per frame decides whether audio happens at all;
        // a failed read skips the audio path and is re-evaluated next frame.
        let span = match self.device.as_ref().map(AudioDevice::cursor) {
            Some(Ok(cursor)) => Some(self.sound.writable_span(cursor.play)),
            Some(Err(err)) => {
                debug!("skipping audio this frame: {err}");
                None
            }
            None => None,
        };

        let sample_count = span.map_or(0, |s| s.sample_count(self.sound.bytes_per_sample));
        self.samples.reset(sample_count as usize);

        sim.update(
            &mut self.surface,
            &mut self.samples,
            self.offsets.x,
            self.offsets.y,
        );

        if let (Some(span), Some(device)) = (span, self.device.as_mut())
            && let Err(err) = fill_sound_buffer(device, &mut self.sound, span, &self.samples)
        {
            debug!("audio write skipped: {err}");
        }

        // The frame presents even when audio was skipped entirely.
        match window.present(&self.surface) {
            Ok(()) => {}
            Err(PresentError::TargetClosed) => {
                info!("presentation target closed");
                self.state = LoopState::Stopped;
            }
            Err(err) => warn!("present failed: {err}"),
        }

        self.offsets.advance(self.input);
    }

    fn handle_event(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::KeyDown(key) => self.input.key_down(key),
            ControlEvent::Resized { width, height } => {
                if let Err(err) = self.surface.resize(width, height) {
                    warn!("ignoring resize: {err}");
                }
            }
            ControlEvent::CloseRequested => {
                self.state = LoopState::Stopped;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::test_utils::FakeRingDevice;

    /// Plays back a scripted batch of events per frame, then requests close.
    struct ScriptedWindow {
        script: VecDeque<Vec<ControlEvent>>,
        presents: u32,
        close_present: bool,
    }

    impl ScriptedWindow {
        fn with_frames(frames: usize) -> Self {
            Self {
                script: (0..frames).map(|_| Vec::new()).collect(),
                presents: 0,
                close_present: false,
            }
        }

        fn scripted(script: Vec<Vec<ControlEvent>>) -> Self {
            Self {
                script: script.into(),
                presents: 0,
                close_present: false,
            }
        }
    }

    impl EventPump for ScriptedWindow {
        fn poll_events(&mut self, out: &mut Vec<ControlEvent>) {
            match self.script.pop_front() {
                Some(batch) => out.extend(batch),
                None => out.push(ControlEvent::CloseRequested),
            }
        }
    }

    impl PresentationSink for ScriptedWindow {
        fn present(&mut self, _surface: &PixelSurface) -> Result<(), PresentError> {
            self.presents += 1;
            if self.close_present {
                return Err(PresentError::TargetClosed);
            }
            Ok(())
        }
    }

    /// Records what it was asked to produce and fills both streams.
    #[derive(Default)]
    struct RecordingSim {
        calls: Vec<(usize, i32, i32)>,
    }

    impl Simulation for RecordingSim {
        fn update(
            &mut self,
            surface: &mut PixelSurface,
            audio: &mut SampleBuffer,
            offset_x: i32,
            offset_y: i32,
        ) {
            self.calls.push((audio.sample_count(), offset_x, offset_y));
            let shade = self.calls.len() as u32;
            for row in surface.rows_mut() {
                row.fill(shade);
            }
            for sample in audio.frames_mut() {
                *sample = 7;
            }
        }
    }

    fn test_loop(device: Option<FakeRingDevice>) -> FrameLoop<FakeRingDevice> {
        let surface = PixelSurface::new(8, 8).unwrap();
        // tiny ring: 1000 frames/sec, 4000 bytes, latency 1000/15 = 66 frames
        let sound = SoundOutput::new(1_000);
        FrameLoop::new(surface, sound, device)
    }

    #[test]
    fn close_event_stops_the_loop() {
        let mut frame_loop = test_loop(Some(FakeRingDevice::new(4_000)));
        let mut window = ScriptedWindow::with_frames(3);
        let mut sim = RecordingSim::default();

        frame_loop.run(&mut window, &mut sim);

        assert_eq!(frame_loop.state(), LoopState::Stopped);
        // 3 scripted frames plus the close-delivering one, which still
        // finishes its iteration
        assert_eq!(sim.calls.len(), 4);
        assert_eq!(window.presents, 4);
    }

    #[test]
    fn startup_primes_ring_with_silence_and_plays() {
        let mut frame_loop = test_loop(Some(FakeRingDevice::new(4_000)));
        frame_loop.start();

        let device = frame_loop.device().expect("device survives start");
        assert!(device.playing);
        assert!(device.ring.iter().all(|&b| b == 0));
    }

    #[test]
    fn startup_failure_downgrades_to_silent() {
        let mut device = FakeRingDevice::new(4_000);
        device.fail_play = true;
        let mut frame_loop = test_loop(Some(device));
        frame_loop.start();

        assert!(frame_loop.device().is_none());
        assert_eq!(frame_loop.state(), LoopState::Running);
    }

    #[test]
    fn first_frame_writes_one_latency_window() {
        let mut frame_loop = test_loop(Some(FakeRingDevice::new(4_000)));
        let mut window = ScriptedWindow::with_frames(1);
        let mut sim = RecordingSim::default();

        frame_loop.start();
        frame_loop.step(&mut window, &mut sim);

        // play cursor 0, running index 0: writable up to the latency target
        let latency = frame_loop.sound().latency_sample_count;
        assert_eq!(sim.calls[0].0, latency as usize);
        assert_eq!(frame_loop.sound().running_sample_index, latency);

        // committed samples actually landed in the ring
        let ring_sample = |ring: &[u8], index: usize| {
            i16::from_ne_bytes([ring[index * 2], ring[index * 2 + 1]])
        };
        let device = frame_loop.device().unwrap();
        assert_eq!(ring_sample(&device.ring, 0), 7);
        assert_eq!(ring_sample(&device.ring, (latency as usize * 2) - 1), 7);
        assert_eq!(ring_sample(&device.ring, latency as usize * 2), 0);
    }

    #[test]
    fn caught_up_writer_produces_empty_frames_until_cursor_moves() {
        let device = FakeRingDevice::new(4_000);
        let mut frame_loop = test_loop(Some(device));
        let mut window = ScriptedWindow::with_frames(2);
        let mut sim = RecordingSim::default();

        frame_loop.start();
        frame_loop.step(&mut window, &mut sim);
        frame_loop.step(&mut window, &mut sim);

        // second frame: cursor has not moved, nothing more is writable
        assert_eq!(sim.calls[1].0, 0);

        // once the cursor advances, the writer tops back up to the target
        frame_loop.device_mut().unwrap().play_cursor.set(400);
        frame_loop.step(&mut window, &mut sim);
        assert_eq!(sim.calls[2].0, 100);
    }

    #[test]
    fn cursor_failure_skips_audio_but_presents() {
        let mut device = FakeRingDevice::new(4_000);
        device.fail_cursor = true;
        let mut frame_loop = test_loop(Some(device));
        let mut window = ScriptedWindow::with_frames(1);
        let mut sim = RecordingSim::default();

        frame_loop.start();
        frame_loop.step(&mut window, &mut sim);

        assert_eq!(sim.calls[0].0, 0);
        assert_eq!(window.presents, 1);
        assert_eq!(frame_loop.sound().running_sample_index, 0);
        assert_eq!(frame_loop.device().unwrap().locks, 1); // startup clear only
        assert_eq!(frame_loop.state(), LoopState::Running);
    }

    #[test]
    fn cursor_failure_is_reevaluated_next_frame() {
        let mut device = FakeRingDevice::new(4_000);
        device.fail_cursor = true;
        let mut frame_loop = test_loop(Some(device));
        let mut window = ScriptedWindow::with_frames(2);
        let mut sim = RecordingSim::default();

        frame_loop.start();
        frame_loop.step(&mut window, &mut sim);
        frame_loop.device_mut().unwrap().fail_cursor = false;
        frame_loop.step(&mut window, &mut sim);

        let latency = frame_loop.sound().latency_sample_count;
        assert_eq!(sim.calls[1].0, latency as usize);
    }

    #[test]
    fn lock_failure_skips_write_but_loop_survives() {
        let mut frame_loop = test_loop(Some(FakeRingDevice::new(4_000)));
        let mut window = ScriptedWindow::with_frames(1);
        let mut sim = RecordingSim::default();

        frame_loop.start();
        frame_loop.device_mut().unwrap().fail_lock = true;
        frame_loop.step(&mut window, &mut sim);

        assert_eq!(frame_loop.sound().running_sample_index, 0);
        assert_eq!(window.presents, 1);
        assert_eq!(frame_loop.state(), LoopState::Running);
    }

    #[test]
    fn missing_device_runs_video_only() {
        let mut frame_loop = test_loop(None);
        let mut window = ScriptedWindow::with_frames(2);
        let mut sim = RecordingSim::default();

        frame_loop.run(&mut window, &mut sim);

        assert!(sim.calls.iter().all(|&(count, _, _)| count == 0));
        assert_eq!(window.presents, 3);
    }

    #[test]
    fn held_latch_scrolls_offsets_frame_by_frame() {
        let mut frame_loop = test_loop(None);
        let mut window = ScriptedWindow::scripted(vec![
            vec![ControlEvent::KeyDown(LatchKey::Left)],
            vec![],
            vec![],
        ]);
        let mut sim = RecordingSim::default();

        frame_loop.run(&mut window, &mut sim);

        // the offsets passed to the simulation lag one frame behind the drift
        let xs: Vec<i32> = sim.calls.iter().map(|&(_, x, _)| x).collect();
        assert_eq!(xs, vec![0, -1, -2, -3]);
        // up was never held, so the vertical offset drifted down each frame
        let ys: Vec<i32> = sim.calls.iter().map(|&(_, _, y)| y).collect();
        assert_eq!(ys, vec![0, -1, -2, -3]);
    }

    #[test]
    fn resize_event_recreates_surface() {
        let mut frame_loop = test_loop(None);
        let mut window = ScriptedWindow::scripted(vec![vec![ControlEvent::Resized {
            width: 16,
            height: 4,
        }]]);
        let mut sim = RecordingSim::default();

        frame_loop.step(&mut window, &mut sim);

        assert_eq!(frame_loop.surface().width(), 16);
        assert_eq!(frame_loop.surface().height(), 4);
        // the freshly allocated surface was still filled and presented
        assert!(frame_loop.surface().pixels().iter().all(|&p| p == 1));
    }

    #[test]
    fn invalid_resize_keeps_surface_and_loop_alive() {
        let mut frame_loop = test_loop(None);
        let mut window = ScriptedWindow::scripted(vec![vec![ControlEvent::Resized {
            width: 0,
            height: 0,
        }]]);
        let mut sim = RecordingSim::default();

        frame_loop.step(&mut window, &mut sim);

        assert_eq!(frame_loop.surface().width(), 8);
        assert_eq!(frame_loop.state(), LoopState::Running);
    }

    #[test]
    fn closed_present_target_stops_the_loop() {
        let mut frame_loop = test_loop(None);
        let mut window = ScriptedWindow::with_frames(10);
        window.close_present = true;
        let mut sim = RecordingSim::default();

        frame_loop.run(&mut window, &mut sim);

        assert_eq!(frame_loop.state(), LoopState::Stopped);
        assert_eq!(sim.calls.len(), 1);
    }
}
