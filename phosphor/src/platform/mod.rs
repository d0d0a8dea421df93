//! Hardware adapters for the frame loop's collaborator traits

pub mod audio;
pub mod window;

pub use audio::CpalRingDevice;
pub use window::DesktopWindow;
