use common::{DecodeError, PixelFormat, Step, StreamInfo};

use super::{Event, ResourceKind, Shared};
use crate::platform::Library;
use crate::video::{DecodeLayer, FrameData, StreamParams};

/// Codecs the simulated decoder can open.
const DECODERS: [&str; 2] = ["rawvideo", "mjpeg"];

#[derive(Clone)]
pub struct SimDecode {
    core: Shared,
}

impl SimDecode {
    pub(super) fn new(core: Shared) -> Self {
        Self { core }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimFormat(pub String);

#[derive(Debug)]
pub struct SimSource {
    id: u32,
    remaining: u32,
    read: usize,
}

#[derive(Debug)]
pub struct SimPacket {
    id: u32,
    stream: usize,
}

#[derive(Debug, Clone)]
pub struct SimStream(pub StreamInfo);

impl StreamParams for SimStream {
    fn info(&self) -> StreamInfo {
        self.0.clone()
    }
}

#[derive(Debug)]
pub struct SimDecoder {
    id: u32,
    size: (u32, u32),
    received: u32,
    emitted: u32,
    eof: bool,
}

/// A decoded frame; also usable on its own as upload input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimFrame {
    /// Journal id, 0 for frames made outside the decoder.
    pub id: u32,
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl SimFrame {
    /// A tightly packed single-colour frame.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let format = PixelFormat::Srgbx8888;
        let pixel = format.pack_rgba(rgba);
        let pixels = width as usize * height as usize;
        Self {
            id: 0,
            width,
            height,
            stride: width as usize * format.bytes_per_pixel(),
            format,
            data: pixel.repeat(pixels),
        }
    }
}

impl FrameData for SimFrame {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl DecodeLayer for SimDecode {
    type Format = SimFormat;
    type Source = SimSource;
    type Packet = SimPacket;
    type Stream = SimStream;
    type Decoder = SimDecoder;
    type Frame = SimFrame;

    fn initialize(&self) -> Result<(), DecodeError> {
        let mut core = self.core.borrow_mut();
        core.journal.record(Event::Init(Library::Decode));
        Ok(())
    }

    fn deinitialize(&self) {
        let mut core = self.core.borrow_mut();
        core.journal.record(Event::Deinit(Library::Decode));
    }

    fn find_input_format(&self, short_name: &str) -> Result<SimFormat, DecodeError> {
        let mut core = self.core.borrow_mut();
        if core.inject(Step::FormatResolve)
            || !core.settings.formats.iter().any(|f| f == short_name)
        {
            return Err(DecodeError::UnknownFormat(short_name.to_string()));
        }
        Ok(SimFormat(short_name.to_string()))
    }

    fn open_input(&self, path: &str, _format: &SimFormat) -> Result<SimSource, DecodeError> {
        let mut core = self.core.borrow_mut();
        if core.inject(Step::SourceOpen) || !core.settings.sources.iter().any(|s| s == path) {
            return Err(DecodeError::SourceOpen {
                path: path.to_string(),
                reason: "No such file or directory".to_string(),
            });
        }
        Ok(SimSource {
            id: core.journal.acquire(ResourceKind::Source),
            remaining: core.settings.stream_packets,
            read: 0,
        })
    }

    fn close_input(&self, source: SimSource) -> Result<(), DecodeError> {
        let mut core = self.core.borrow_mut();
        if !core.release(ResourceKind::Source, source.id) {
            return Err(DecodeError::ReadFailed("close failed".to_string()));
        }
        Ok(())
    }

    fn read_packet(&self, source: &mut SimSource) -> Result<SimPacket, DecodeError> {
        let mut core = self.core.borrow_mut();
        if core.inject(Step::PacketRead) {
            return Err(DecodeError::ReadFailed("Input/output error".to_string()));
        }
        if source.remaining == 0 {
            return Err(DecodeError::EndOfStream);
        }
        if !core.settings.packet_interval.is_zero() {
            std::thread::sleep(core.settings.packet_interval);
        }
        source.remaining -= 1;
        let pattern = &core.settings.stream_pattern;
        let stream = match pattern.len() {
            0 => 0,
            len => pattern[source.read % len],
        };
        source.read += 1;
        Ok(SimPacket {
            id: core.journal.acquire(ResourceKind::Packet),
            stream,
        })
    }

    fn packet_stream(&self, packet: &SimPacket) -> usize {
        packet.stream
    }

    fn free_packet(&self, packet: SimPacket) {
        let mut core = self.core.borrow_mut();
        core.journal.release(ResourceKind::Packet, packet.id);
    }

    fn select_stream(&self, _source: &SimSource, index: usize) -> Result<SimStream, DecodeError> {
        let mut core = self.core.borrow_mut();
        if core.inject(Step::StreamSelect)
            || (index != 0 && !core.settings.stream_pattern.contains(&index))
        {
            return Err(DecodeError::NoSuchStream(index));
        }
        let (width, height) = core.settings.frame_size;
        Ok(SimStream(StreamInfo {
            index,
            codec: core.settings.codec.clone(),
            width,
            height,
        }))
    }

    fn open_decoder(&self, stream: &SimStream) -> Result<SimDecoder, DecodeError> {
        let mut core = self.core.borrow_mut();
        if core.inject(Step::DecoderOpen) {
            return Err(DecodeError::DecoderOpenFailed("Cannot allocate memory".to_string()));
        }
        if !DECODERS.contains(&stream.0.codec.as_str()) {
            return Err(DecodeError::UnsupportedCodec(stream.0.codec.clone()));
        }
        Ok(SimDecoder {
            id: core.journal.acquire(ResourceKind::Decoder),
            size: (stream.0.width, stream.0.height),
            received: 0,
            emitted: 0,
            eof: false,
        })
    }

    fn free_decoder(&self, decoder: SimDecoder) {
        let mut core = self.core.borrow_mut();
        core.journal.release(ResourceKind::Decoder, decoder.id);
    }

    fn send_packet(&self, decoder: &mut SimDecoder, packet: &SimPacket) -> Result<(), DecodeError> {
        let mut core = self.core.borrow_mut();
        if !core.journal.is_live(ResourceKind::Packet, packet.id) {
            core.journal.violation("send of a freed packet");
        }
        if core.inject(Step::PacketSend) {
            return Err(DecodeError::SendRejected("Invalid data found".to_string()));
        }
        if decoder.eof {
            return Err(DecodeError::SendRejected("decoder is draining".to_string()));
        }
        decoder.received += 1;
        core.journal.record(Event::PacketSent);
        Ok(())
    }

    fn send_eof(&self, decoder: &mut SimDecoder) -> Result<(), DecodeError> {
        let mut core = self.core.borrow_mut();
        decoder.eof = true;
        core.journal.record(Event::Eof);
        Ok(())
    }

    fn receive_frame(&self, decoder: &mut SimDecoder) -> Result<SimFrame, DecodeError> {
        let mut core = self.core.borrow_mut();
        if core.inject(Step::FrameReceive) {
            return Err(DecodeError::DecodeFailed("Invalid data found".to_string()));
        }
        let depth = core.settings.priming_depth;
        if decoder.received >= depth * (decoder.emitted + 1) {
            decoder.emitted += 1;
            let (width, height) = decoder.size;
            let mut frame = SimFrame::solid(width, height, [0x80, 0x80, 0x80, 0xff]);
            frame.id = core.journal.acquire(ResourceKind::Frame);
            return Ok(frame);
        }
        if decoder.eof {
            return Err(DecodeError::EndOfStream);
        }
        Err(DecodeError::NotReady)
    }

    fn free_frame(&self, frame: SimFrame) {
        if frame.id != 0 {
            let mut core = self.core.borrow_mut();
            core.journal.release(ResourceKind::Frame, frame.id);
        }
    }
}
