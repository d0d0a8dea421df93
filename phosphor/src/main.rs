//! Phosphor - a scrolling gradient with latency-compensated streaming audio
//!
//! Opens a window, starts a looping stereo ring buffer on the default audio
//! device, and runs the frame cycle: W/A latch the scroll direction up/left,
//! S/D latch it back down/right, Escape or closing the window exits.
//!
//! The loop survives a missing or failing audio device and keeps rendering
//! video; set `RUST_LOG=debug` to watch per-frame audio decisions.

mod demo;
mod platform;

use anyhow::Result;
use clap::Parser;
use tracing::warn;

use phosphor_core::{FrameLoop, PixelSurface, SoundOutput};

use crate::demo::GradientScroller;
use crate::platform::{CpalRingDevice, DesktopWindow};

#[derive(Debug, Parser)]
#[command(name = "phosphor", about = "Scrolling gradient with streaming ring-buffer audio")]
struct Args {
    /// Backbuffer width in pixels
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Backbuffer height in pixels
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Audio sample rate in Hz
    #[arg(long, default_value_t = 48_000)]
    sample_rate: u32,

    /// Audio write-ahead in sample frames (default: a fifteenth of a second)
    #[arg(long)]
    latency_frames: Option<u32>,

    /// Demo tone frequency in Hz
    #[arg(long, default_value_t = 256.0)]
    tone_hz: f32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut sound = SoundOutput::new(args.sample_rate);
    if let Some(latency) = args.latency_frames {
        sound = sound.with_latency(latency);
    }

    // Total audio absence is survivable; the loop runs video-only.
    let device = match CpalRingDevice::new(sound.samples_per_second, sound.buffer_size) {
        Ok(device) => Some(device),
        Err(err) => {
            warn!("continuing without audio: {err}");
            None
        }
    };

    let surface = PixelSurface::new(args.width, args.height)?;
    let mut window = DesktopWindow::new("Phosphor", args.width as usize, args.height as usize)?;
    let mut sim = GradientScroller::new(args.tone_hz);

    let mut frame_loop = FrameLoop::new(surface, sound, device);
    frame_loop.run(&mut window, &mut sim);

    Ok(())
}
