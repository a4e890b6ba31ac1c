//! Media demux/decode access
//!
//! - `pipeline`: `DecodePipeline`, one source, one decoder and the decode loop
//!   that turns container packets into a single decoded frame
//! - `retry`: the bounded polling budget for decoders that need more input
//!
//! # Architecture
//!
//! The decode layer itself (ffmpeg-shaped: input format, container context,
//! packets, codec context, frames) sits behind the [`DecodeLayer`] trait. Its
//! handle types are associated types, so a backend can carry real library
//! objects rather than integers:
//! 1. `find_input_format` resolves a short name ("v4l2", "png", ...)
//! 2. `open_input` opens the container on a path or device
//! 3. `read_packet` / `select_stream` / `open_decoder` set up decoding
//! 4. `send_packet` and `receive_frame` run the decode loop; `NotReady` from
//!    `receive_frame` is the only retryable failure

mod pipeline;
mod retry;

pub use pipeline::{DecodePipeline, DecodeSettings, DecodeStats};
pub use retry::{RetryBudget, RetryPolicy};

use common::{DecodeError, PixelFormat, StreamInfo};

/// Parameters of a demuxed stream, enough to open a decoder for it.
pub trait StreamParams {
    fn info(&self) -> StreamInfo;
}

/// Read access to a decoded frame's first plane.
pub trait FrameData {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn format(&self) -> PixelFormat;
    fn data(&self) -> &[u8];
    /// Bytes per row, padding included.
    fn stride(&self) -> usize;
}

/// Media decode layer (ffmpeg-shaped).
pub trait DecodeLayer {
    type Format;
    type Source;
    type Packet;
    type Stream: StreamParams;
    type Decoder;
    type Frame: FrameData;

    /// Process-wide library registration. Called once per orchestrator.
    fn initialize(&self) -> Result<(), DecodeError> {
        Ok(())
    }

    fn deinitialize(&self) {}

    fn find_input_format(&self, short_name: &str) -> Result<Self::Format, DecodeError>;

    fn open_input(&self, path: &str, format: &Self::Format) -> Result<Self::Source, DecodeError>;

    fn close_input(&self, source: Self::Source) -> Result<(), DecodeError>;

    /// Next packet of any stream, or `EndOfStream`.
    fn read_packet(&self, source: &mut Self::Source) -> Result<Self::Packet, DecodeError>;

    /// Index of the stream a packet belongs to.
    fn packet_stream(&self, packet: &Self::Packet) -> usize;

    fn free_packet(&self, packet: Self::Packet);

    fn select_stream(&self, source: &Self::Source, index: usize)
    -> Result<Self::Stream, DecodeError>;

    fn open_decoder(&self, stream: &Self::Stream) -> Result<Self::Decoder, DecodeError>;

    fn free_decoder(&self, decoder: Self::Decoder);

    fn send_packet(
        &self,
        decoder: &mut Self::Decoder,
        packet: &Self::Packet,
    ) -> Result<(), DecodeError>;

    /// Signal end of input so the decoder flushes what it buffered.
    fn send_eof(&self, decoder: &mut Self::Decoder) -> Result<(), DecodeError>;

    fn receive_frame(&self, decoder: &mut Self::Decoder) -> Result<Self::Frame, DecodeError>;

    fn free_frame(&self, frame: Self::Frame);
}
