//! Subsystem implementations
//!
//! - `sim`: all four subsystems simulated in-process, with an event journal
//! - `still`: image files as a one-frame decode source
//! - `gst`: GStreamer demux and decode (feature `video`)
//! - `videocore`: dispmanx, EGL and OpenVG on a Raspberry Pi (feature `videocore`)

pub mod sim;
pub mod still;

#[cfg(feature = "video")]
pub mod gst;

#[cfg(feature = "videocore")]
pub mod videocore;
