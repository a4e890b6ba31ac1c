//! framecast: composite one decoded video frame onto a hardware overlay
//!
//! - `display`: compositor session with one committed overlay element
//! - `gpu`: display binding, config selection, surface and context
//! - `video`: demux/decode pipeline with a bounded receive retry
//! - `frame`: GPU image creation, pixel upload and draw
//! - `orchestrator`: the full acquire, present and teardown sequence
//! - `backend`: subsystem implementations (simulation, still images,
//!   GStreamer, VideoCore)

pub mod macros;

pub mod backend;
pub mod config;
pub mod display;
pub mod frame;
pub mod gpu;
pub mod orchestrator;
pub mod platform;
pub mod resource;
pub mod video;
