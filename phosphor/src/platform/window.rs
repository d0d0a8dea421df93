//! minifb window adapter
//!
//! One window serves as both collaborators of the frame loop: the event pump
//! (polled key-down edges, close detection) and the presentation sink (the
//! backbuffer blit, stretched to the client area by minifb). The backbuffer
//! keeps its own fixed dimensions; the window scales it on present.

use anyhow::Context;
use minifb::{Key, KeyRepeat, ScaleMode, Window, WindowOptions};

use phosphor_core::frame::{ControlEvent, EventPump, PresentError, PresentationSink};
use phosphor_core::input::LatchKey;
use phosphor_core::surface::{BYTES_PER_PIXEL, PixelSurface};

pub struct DesktopWindow {
    window: Window,
    staging: Vec<u32>,
}

impl DesktopWindow {
    pub fn new(title: &str, width: usize, height: usize) -> anyhow::Result<Self> {
        let options = WindowOptions {
            resize: true,
            scale_mode: ScaleMode::Stretch,
            ..WindowOptions::default()
        };
        let window =
            Window::new(title, width, height, options).context("failed to create window")?;
        Ok(Self {
            window,
            staging: Vec::new(),
        })
    }
}

impl EventPump for DesktopWindow {
    fn poll_events(&mut self, out: &mut Vec<ControlEvent>) {
        if !self.window.is_open() || self.window.is_key_down(Key::Escape) {
            out.push(ControlEvent::CloseRequested);
            return;
        }
        // key-down edges only; releases are deliberately not reported
        for key in self.window.get_keys_pressed(KeyRepeat::Yes) {
            let mapped = match key {
                Key::W => LatchKey::Up,
                Key::A => LatchKey::Left,
                Key::S => LatchKey::Down,
                Key::D => LatchKey::Right,
                _ => continue,
            };
            out.push(ControlEvent::KeyDown(mapped));
        }
    }
}

impl PresentationSink for DesktopWindow {
    fn present(&mut self, surface: &PixelSurface) -> Result<(), PresentError> {
        if !self.window.is_open() {
            return Err(PresentError::TargetClosed);
        }

        let width = surface.width() as usize;
        let height = surface.height() as usize;

        // minifb wants a dense pixel slice; a padded pitch needs a row copy
        if surface.pitch() == surface.width() * BYTES_PER_PIXEL {
            self.window
                .update_with_buffer(surface.pixels(), width, height)
        } else {
            self.staging.clear();
            for y in 0..surface.height() {
                self.staging.extend_from_slice(surface.row(y));
            }
            self.window.update_with_buffer(&self.staging, width, height)
        }
        .map_err(|err| PresentError::Blit(err.to_string()))
    }
}
