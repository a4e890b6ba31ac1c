//! GStreamer decode layer
//!
//! Maps the packet/frame model onto two pipelines:
//!
//! - demux: `<source> ! parsebin ! appsink`, whose samples are the packets
//!   of the first elementary stream and whose preroll caps describe it
//! - decode: `appsrc ! decodebin ! videoconvert ! appsink`, fed one sample
//!   at a time; an app-sink with no sample ready is `NotReady`

use std::sync::OnceLock;

use anyhow::{Context, Result};
use common::{DecodeError, PixelFormat, StreamInfo};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;

use crate::video::{DecodeLayer, FrameData, StreamParams};

/// How long opening or reading the source may block.
const SOURCE_TIMEOUT: gst::ClockTime = gst::ClockTime::from_seconds(5);

/// Decoder output caps format matching [`PixelFormat::Srgbx8888`] in memory.
#[cfg(target_endian = "little")]
const RAW_FORMAT: &str = "xBGR";
#[cfg(target_endian = "big")]
const RAW_FORMAT: &str = "RGBx";

/// Initialize GStreamer (idempotent, safe to call multiple times)
pub fn initialize_gstreamer() -> Result<(), String> {
    static GSTREAMER_INITIALIZED: OnceLock<Result<(), String>> = OnceLock::new();

    GSTREAMER_INITIALIZED
        .get_or_init(|| {
            gst::init().map_err(|e| e.to_string())?;
            log::info!("GStreamer initialized");
            Ok(())
        })
        .clone()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GstDecode;

/// Source element for a short format name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GstFormat {
    factory: &'static str,
    location_property: &'static str,
}

pub struct GstSource {
    pipeline: gst::Pipeline,
    sink: gst_app::AppSink,
    caps: gst::Caps,
}

pub struct GstPacket(gst::Sample);

#[derive(Debug, Clone)]
pub struct GstStream {
    info: StreamInfo,
    caps: gst::Caps,
}

impl StreamParams for GstStream {
    fn info(&self) -> StreamInfo {
        self.info.clone()
    }
}

pub struct GstDecoder {
    pipeline: gst::Pipeline,
    src: gst_app::AppSrc,
    sink: gst_app::AppSink,
}

pub struct GstFrame {
    info: gst_video::VideoInfo,
    map: gst::MappedBuffer<gst::buffer::Readable>,
}

impl FrameData for GstFrame {
    fn width(&self) -> u32 {
        self.info.width()
    }

    fn height(&self) -> u32 {
        self.info.height()
    }

    fn format(&self) -> PixelFormat {
        PixelFormat::Srgbx8888
    }

    fn data(&self) -> &[u8] {
        self.map.as_slice()
    }

    fn stride(&self) -> usize {
        self.info.stride()[0].max(0) as usize
    }
}

fn launch(description: &str) -> Result<(gst::Pipeline, gst_app::AppSink)> {
    log::debug!("GStreamer pipeline: {}", description);
    let pipeline = gst::parse::launch(description)
        .context("Failed to create GStreamer pipeline")?
        .dynamic_cast::<gst::Pipeline>()
        .map_err(|_| anyhow::anyhow!("Pipeline is not a gst::Pipeline"))?;

    let sink = pipeline
        .by_name("sink")
        .context("Failed to get appsink from pipeline")?
        .dynamic_cast::<gst_app::AppSink>()
        .map_err(|_| anyhow::anyhow!("sink is not an AppSink"))?;
    sink.set_property("sync", false);

    Ok((pipeline, sink))
}

/// First error message waiting on the pipeline's bus.
fn bus_error(pipeline: &gst::Pipeline) -> Option<String> {
    let bus = pipeline.bus()?;
    while let Some(msg) = bus.pop() {
        if let gst::MessageView::Error(err) = msg.view() {
            return Some(format!("{} (debug: {:?})", err.error(), err.debug()));
        }
    }
    None
}

fn shut_down(pipeline: &gst::Pipeline) {
    if let Err(e) = pipeline.set_state(gst::State::Null) {
        log::warn!("Failed to stop GStreamer pipeline: {}", e);
    }
}

/// Whether any registered decoder accepts `caps`. Raw video needs none.
fn has_decoder(caps: &gst::Caps) -> bool {
    let raw = caps
        .structure(0)
        .is_some_and(|s| s.name().as_str() == "video/x-raw");
    raw || gst::ElementFactory::factories_with_type(
        gst::ElementFactoryType::DECODER,
        gst::Rank::MARGINAL,
    )
    .iter()
    .any(|factory| factory.can_sink_any_caps(caps))
}

impl DecodeLayer for GstDecode {
    type Format = GstFormat;
    type Source = GstSource;
    type Packet = GstPacket;
    type Stream = GstStream;
    type Decoder = GstDecoder;
    type Frame = GstFrame;

    fn initialize(&self) -> Result<(), DecodeError> {
        initialize_gstreamer().map_err(DecodeError::DecoderOpenFailed)
    }

    fn find_input_format(&self, short_name: &str) -> Result<GstFormat, DecodeError> {
        let format = match short_name {
            "v4l2" => GstFormat {
                factory: "v4l2src",
                location_property: "device",
            },
            "file" | "image2" | "mov" | "matroska" | "mpegts" => GstFormat {
                factory: "filesrc",
                location_property: "location",
            },
            _ => return Err(DecodeError::UnknownFormat(short_name.to_string())),
        };
        if gst::ElementFactory::find(format.factory).is_none() {
            return Err(DecodeError::UnknownFormat(short_name.to_string()));
        }
        Ok(format)
    }

    fn open_input(&self, path: &str, format: &GstFormat) -> Result<GstSource, DecodeError> {
        let open_error = |reason: String| DecodeError::SourceOpen {
            path: path.to_string(),
            reason,
        };

        let description = format!(
            "{} {}=\"{}\" ! parsebin ! appsink name=sink",
            format.factory,
            format.location_property,
            path.replace('"', "\\\"")
        );
        let (pipeline, sink) = launch(&description).map_err(|e| open_error(format!("{:#}", e)))?;

        if let Err(e) = pipeline.set_state(gst::State::Playing) {
            let reason = bus_error(&pipeline).unwrap_or_else(|| e.to_string());
            shut_down(&pipeline);
            return Err(open_error(reason));
        }

        let caps = sink
            .try_pull_preroll(SOURCE_TIMEOUT)
            .and_then(|sample| sample.caps_owned());
        match caps {
            Some(caps) => Ok(GstSource {
                pipeline,
                sink,
                caps,
            }),
            None => {
                let reason = bus_error(&pipeline).unwrap_or_else(|| "no stream found".to_string());
                shut_down(&pipeline);
                Err(open_error(reason))
            }
        }
    }

    fn close_input(&self, source: GstSource) -> Result<(), DecodeError> {
        shut_down(&source.pipeline);
        Ok(())
    }

    fn read_packet(&self, source: &mut GstSource) -> Result<GstPacket, DecodeError> {
        match source.sink.try_pull_sample(SOURCE_TIMEOUT) {
            Some(sample) => Ok(GstPacket(sample)),
            None if source.sink.is_eos() => Err(DecodeError::EndOfStream),
            None => Err(DecodeError::ReadFailed(
                bus_error(&source.pipeline).unwrap_or_else(|| "timed out".to_string()),
            )),
        }
    }

    fn packet_stream(&self, _packet: &GstPacket) -> usize {
        0
    }

    fn free_packet(&self, _packet: GstPacket) {}

    fn select_stream(&self, source: &GstSource, index: usize) -> Result<GstStream, DecodeError> {
        if index != 0 {
            return Err(DecodeError::NoSuchStream(index));
        }
        let structure = source
            .caps
            .structure(0)
            .ok_or(DecodeError::NoSuchStream(index))?;
        let dimension = |field: &str| {
            structure
                .get::<i32>(field)
                .ok()
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(0)
        };
        Ok(GstStream {
            info: StreamInfo {
                index,
                codec: structure.name().to_string(),
                width: dimension("width"),
                height: dimension("height"),
            },
            caps: source.caps.clone(),
        })
    }

    fn open_decoder(&self, stream: &GstStream) -> Result<GstDecoder, DecodeError> {
        if !has_decoder(&stream.caps) {
            return Err(DecodeError::UnsupportedCodec(stream.info.codec.clone()));
        }

        let description = format!(
            "appsrc name=src format=time ! decodebin ! videoconvert ! video/x-raw,format={} ! appsink name=sink",
            RAW_FORMAT
        );
        let (pipeline, sink) =
            launch(&description).map_err(|e| DecodeError::DecoderOpenFailed(format!("{:#}", e)))?;
        let src = pipeline
            .by_name("src")
            .and_then(|element| element.dynamic_cast::<gst_app::AppSrc>().ok())
            .ok_or_else(|| DecodeError::DecoderOpenFailed("src is not an AppSrc".to_string()))?;
        src.set_caps(Some(&stream.caps));

        if let Err(e) = pipeline.set_state(gst::State::Playing) {
            shut_down(&pipeline);
            return Err(DecodeError::DecoderOpenFailed(e.to_string()));
        }
        Ok(GstDecoder {
            pipeline,
            src,
            sink,
        })
    }

    fn free_decoder(&self, decoder: GstDecoder) {
        shut_down(&decoder.pipeline);
    }

    fn send_packet(&self, decoder: &mut GstDecoder, packet: &GstPacket) -> Result<(), DecodeError> {
        decoder
            .src
            .push_sample(&packet.0)
            .map(|_| ())
            .map_err(|e| DecodeError::SendRejected(format!("{:?}", e)))
    }

    fn send_eof(&self, decoder: &mut GstDecoder) -> Result<(), DecodeError> {
        decoder
            .src
            .end_of_stream()
            .map(|_| ())
            .map_err(|e| DecodeError::SendRejected(format!("{:?}", e)))
    }

    fn receive_frame(&self, decoder: &mut GstDecoder) -> Result<GstFrame, DecodeError> {
        if let Some(error) = bus_error(&decoder.pipeline) {
            return Err(DecodeError::DecodeFailed(error));
        }
        let Some(sample) = decoder.sink.try_pull_sample(gst::ClockTime::ZERO) else {
            return Err(if decoder.sink.is_eos() {
                DecodeError::EndOfStream
            } else {
                DecodeError::NotReady
            });
        };

        let caps = sample
            .caps()
            .ok_or_else(|| DecodeError::DecodeFailed("sample without caps".to_string()))?;
        let info = gst_video::VideoInfo::from_caps(caps)
            .map_err(|e| DecodeError::DecodeFailed(e.to_string()))?;
        let buffer = sample
            .buffer_owned()
            .ok_or_else(|| DecodeError::DecodeFailed("sample without buffer".to_string()))?;
        let map = buffer
            .into_mapped_buffer_readable()
            .map_err(|_| DecodeError::DecodeFailed("failed to map buffer".to_string()))?;
        Ok(GstFrame { info, map })
    }

    fn free_frame(&self, _frame: GstFrame) {}
}
