//! The demo simulation: a scrolling color gradient and a steady sine tone
//!
//! Fills every pixel each frame (blue ramps with x, green with y, both
//! sliding with the scroll offsets) and produces exactly the requested
//! number of stereo frames of a phase-continuous sine wave.

use std::f32::consts::TAU;

use phosphor_core::frame::Simulation;
use phosphor_core::sound::SampleBuffer;
use phosphor_core::surface::PixelSurface;

pub struct GradientScroller {
    tone_hz: f32,
    tone_volume: f32,
    phase: f32,
}

impl GradientScroller {
    pub fn new(tone_hz: f32) -> Self {
        Self {
            tone_hz,
            tone_volume: 3_000.0,
            phase: 0.0,
        }
    }
}

impl Simulation for GradientScroller {
    fn update(
        &mut self,
        surface: &mut PixelSurface,
        audio: &mut SampleBuffer,
        offset_x: i32,
        offset_y: i32,
    ) {
        for (y, row) in surface.rows_mut().enumerate() {
            let green = (y as i32).wrapping_add(offset_y) as u8;
            for (x, pixel) in row.iter_mut().enumerate() {
                let blue = (x as i32).wrapping_add(offset_x) as u8;
                *pixel = u32::from(green) << 8 | u32::from(blue);
            }
        }

        // phase carries over between frames so the tone never clicks
        let step = TAU * self.tone_hz / audio.samples_per_second() as f32;
        for frame in audio.frames_mut().chunks_exact_mut(2) {
            let value = (self.phase.sin() * self.tone_volume) as i16;
            frame[0] = value;
            frame[1] = value;
            self.phase = (self.phase + step) % TAU;
        }
    }
}
