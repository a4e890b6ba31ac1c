//! Demux/decode chain for a single frame
//!
//! This module owns the input source, the decoder bound to the elected stream
//! and the decode loop that polls the decoder until a frame comes out.

use common::{DecodeError, PipelineError, StreamInfo, Step, StepExt};
use serde::{Deserialize, Serialize};

use super::{DecodeLayer, RetryBudget, RetryPolicy, StreamParams};
use crate::resource::ResourceHandle;

/// Which source to open and how long to wait for its first frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeSettings {
    /// Input format short name, e.g. "v4l2".
    pub format: String,
    pub path: String,
    pub stream: usize,
    pub retry: RetryPolicy,
}

impl Default for DecodeSettings {
    fn default() -> Self {
        Self {
            format: "v4l2".to_string(),
            path: "/dev/video0".to_string(),
            stream: 0,
            retry: RetryPolicy::default(),
        }
    }
}

/// Counters of one decode loop run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeStats {
    /// Receive-frame calls, the successful one included.
    pub attempts: u32,
    /// Packets handed to the decoder since it was opened.
    pub packets_sent: u32,
}

/// An open source with a decoder on one of its streams.
pub struct DecodePipeline<'a, D: DecodeLayer> {
    decode: &'a D,
    stream: StreamInfo,
    stream_index: usize,
    retry: RetryPolicy,
    drained: bool,
    packets_sent: u32,
    // Field order is release order.
    frame: Option<ResourceHandle<'a, D::Frame, DecodeError>>,
    decoder: ResourceHandle<'a, D::Decoder, DecodeError>,
    source: ResourceHandle<'a, D::Source, DecodeError>,
}

impl<'a, D: DecodeLayer> DecodePipeline<'a, D> {
    /// Open the source, elect the stream and prime its decoder with the first
    /// packet.
    pub fn open(decode: &'a D, settings: &DecodeSettings) -> Result<Self, PipelineError> {
        let format = decode
            .find_input_format(&settings.format)
            .at(Step::FormatResolve)?;

        let source = decode
            .open_input(&settings.path, &format)
            .at(Step::SourceOpen)?;
        let mut source = ResourceHandle::new("input source", source, move |source| {
            decode.close_input(source)
        });

        let first = decode.read_packet(source.get_mut()).at(Step::PacketRead)?;
        let first = packet_handle(decode, first);

        let stream = decode
            .select_stream(source.get(), settings.stream)
            .at(Step::StreamSelect)?;
        let info = stream.info();
        log::info!(
            "Input {}, from '{}': {}",
            settings.format,
            settings.path,
            info
        );

        let decoder = decode.open_decoder(&stream).at(Step::DecoderOpen)?;
        let mut decoder = ResourceHandle::new("decoder", decoder, move |decoder| {
            decode.free_decoder(decoder);
            Ok(())
        });

        let mut packets_sent = 0;
        if decode.packet_stream(first.get()) == settings.stream {
            decode
                .send_packet(decoder.get_mut(), first.get())
                .at(Step::PacketSend)?;
            packets_sent += 1;
        }
        crate::log_and_continue!(first.release(), "free packet");

        Ok(Self {
            decode,
            stream: info,
            stream_index: settings.stream,
            retry: settings.retry,
            drained: false,
            packets_sent,
            frame: None,
            decoder,
            source,
        })
    }

    pub fn stream(&self) -> &StreamInfo {
        &self.stream
    }

    /// Poll the decoder until it yields a frame or the retry budget is spent.
    ///
    /// Each `NotReady` is answered with one fresh packet from the elected
    /// stream. Once the source runs dry the decoder is told so once and
    /// polled until it flushes.
    pub fn next_frame(&mut self) -> Result<DecodeStats, PipelineError> {
        // A previous frame goes back before the decoder fills a new one.
        self.frame = None;
        let sent_before = self.packets_sent;
        let mut budget = self.retry.start();

        loop {
            if !budget.try_attempt() {
                return Err(DecodeError::RetryExhausted {
                    attempts: budget.attempts(),
                })
                .at(Step::FrameReceive);
            }

            match self.decode.receive_frame(self.decoder.get_mut()) {
                Ok(frame) => {
                    let decode = self.decode;
                    self.frame = Some(ResourceHandle::new("frame", frame, move |frame| {
                        decode.free_frame(frame);
                        Ok(())
                    }));
                    let stats = DecodeStats {
                        attempts: budget.attempts(),
                        packets_sent: self.packets_sent,
                    };
                    log::info!(
                        "Decoded frame after {} attempt(s), {} new packet(s)",
                        stats.attempts,
                        self.packets_sent - sent_before
                    );
                    return Ok(stats);
                }
                Err(e) if e.is_retryable() => {
                    log::debug!("Couldn't get frame, trying again: {}", e);
                    self.feed(&budget)?;
                    budget.pause();
                }
                Err(e) => return Err(e).at(Step::FrameReceive),
            }
        }
    }

    /// The frame produced by the last successful [`Self::next_frame`].
    pub fn frame(&self) -> Option<&D::Frame> {
        self.frame.as_ref().map(|frame| frame.get())
    }

    /// Free the frame, then the decoder, then close the source.
    pub fn close(self) -> Result<(), DecodeError> {
        let Self {
            frame,
            decoder,
            source,
            ..
        } = self;
        let freed = frame.map_or(Ok(()), ResourceHandle::release);
        let decoder = decoder.release();
        let closed = source.release();
        freed.and(decoder).and(closed)
    }

    /// Send the next packet of the elected stream, or end of stream.
    ///
    /// Packets of other streams are skipped; the budget's deadline is checked
    /// after each one.
    fn feed(&mut self, budget: &RetryBudget) -> Result<(), PipelineError> {
        if self.drained {
            return Ok(());
        }
        let decode = self.decode;
        loop {
            match decode.read_packet(self.source.get_mut()) {
                Ok(packet) => {
                    let packet = packet_handle(decode, packet);
                    if decode.packet_stream(packet.get()) != self.stream_index {
                        if budget.expired() {
                            log::debug!("Deadline passed while skipping foreign packets");
                            return Err(DecodeError::RetryExhausted {
                                attempts: budget.attempts(),
                            })
                            .at(Step::FrameReceive);
                        }
                        continue;
                    }
                    decode
                        .send_packet(self.decoder.get_mut(), packet.get())
                        .at(Step::PacketSend)?;
                    self.packets_sent += 1;
                    return Ok(());
                }
                Err(DecodeError::EndOfStream) => {
                    log::debug!("Source exhausted, draining decoder");
                    decode
                        .send_eof(self.decoder.get_mut())
                        .at(Step::PacketSend)?;
                    self.drained = true;
                    return Ok(());
                }
                Err(e) => return Err(e).at(Step::PacketRead),
            }
        }
    }
}

fn packet_handle<D: DecodeLayer>(
    decode: &D,
    packet: D::Packet,
) -> ResourceHandle<'_, D::Packet, DecodeError> {
    ResourceHandle::new("packet", packet, move |packet| {
        decode.free_packet(packet);
        Ok(())
    })
}
