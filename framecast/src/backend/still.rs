//! Still-image decode source
//!
//! Treats an image file as a one-packet, one-frame stream. The container
//! "demux" only reads the header; pixels are decoded when the decoder is
//! polled, like a single-frame MJPEG capture.

use std::io::Cursor;

use common::{DecodeError, PixelFormat, StreamInfo};
use image::{ImageFormat, ImageReader};

use crate::video::{DecodeLayer, FrameData, StreamParams};

/// Image files as a decode layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct StillDecode;

/// Input format; `None` probes the file contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StillFormat(Option<ImageFormat>);

pub struct StillSource {
    bytes: Vec<u8>,
    format: ImageFormat,
    size: (u32, u32),
    read: bool,
}

pub struct StillPacket(Vec<u8>);

#[derive(Debug, Clone)]
pub struct StillStream {
    info: StreamInfo,
    format: ImageFormat,
}

impl StreamParams for StillStream {
    fn info(&self) -> StreamInfo {
        self.info.clone()
    }
}

pub struct StillDecoder {
    format: ImageFormat,
    pending: Option<Vec<u8>>,
    eof: bool,
}

#[derive(Debug, Clone)]
pub struct StillFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl FrameData for StillFrame {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> PixelFormat {
        PixelFormat::Srgbx8888
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn stride(&self) -> usize {
        self.width as usize * PixelFormat::Srgbx8888.bytes_per_pixel()
    }
}

fn codec_name(format: ImageFormat) -> String {
    format
        .extensions_str()
        .first()
        .map_or_else(|| format!("{:?}", format).to_lowercase(), |ext| ext.to_string())
}

impl DecodeLayer for StillDecode {
    type Format = StillFormat;
    type Source = StillSource;
    type Packet = StillPacket;
    type Stream = StillStream;
    type Decoder = StillDecoder;
    type Frame = StillFrame;

    fn find_input_format(&self, short_name: &str) -> Result<StillFormat, DecodeError> {
        match short_name {
            "image2" => Ok(StillFormat(None)),
            "png" => Ok(StillFormat(Some(ImageFormat::Png))),
            "jpeg" | "jpg" | "mjpeg" => Ok(StillFormat(Some(ImageFormat::Jpeg))),
            "bmp" => Ok(StillFormat(Some(ImageFormat::Bmp))),
            _ => Err(DecodeError::UnknownFormat(short_name.to_string())),
        }
    }

    fn open_input(&self, path: &str, format: &StillFormat) -> Result<StillSource, DecodeError> {
        let open_error = |reason: String| DecodeError::SourceOpen {
            path: path.to_string(),
            reason,
        };

        let bytes = std::fs::read(path).map_err(|e| open_error(e.to_string()))?;
        let reader = match format.0 {
            Some(format) => ImageReader::with_format(Cursor::new(&bytes), format),
            None => ImageReader::new(Cursor::new(&bytes))
                .with_guessed_format()
                .map_err(|e| open_error(e.to_string()))?,
        };
        let format = reader
            .format()
            .ok_or_else(|| open_error("unrecognized image format".to_string()))?;
        let size = reader
            .into_dimensions()
            .map_err(|e| open_error(e.to_string()))?;
        log::debug!("Opened {} ({:?}, {}x{})", path, format, size.0, size.1);

        Ok(StillSource {
            bytes,
            format,
            size,
            read: false,
        })
    }

    fn close_input(&self, _source: StillSource) -> Result<(), DecodeError> {
        Ok(())
    }

    fn read_packet(&self, source: &mut StillSource) -> Result<StillPacket, DecodeError> {
        if source.read {
            return Err(DecodeError::EndOfStream);
        }
        source.read = true;
        Ok(StillPacket(std::mem::take(&mut source.bytes)))
    }

    fn packet_stream(&self, _packet: &StillPacket) -> usize {
        0
    }

    fn free_packet(&self, _packet: StillPacket) {}

    fn select_stream(&self, source: &StillSource, index: usize) -> Result<StillStream, DecodeError> {
        if index != 0 {
            return Err(DecodeError::NoSuchStream(index));
        }
        Ok(StillStream {
            info: StreamInfo {
                index,
                codec: codec_name(source.format),
                width: source.size.0,
                height: source.size.1,
            },
            format: source.format,
        })
    }

    fn open_decoder(&self, stream: &StillStream) -> Result<StillDecoder, DecodeError> {
        if !stream.format.reading_enabled() {
            return Err(DecodeError::UnsupportedCodec(stream.info.codec.clone()));
        }
        Ok(StillDecoder {
            format: stream.format,
            pending: None,
            eof: false,
        })
    }

    fn free_decoder(&self, _decoder: StillDecoder) {}

    fn send_packet(
        &self,
        decoder: &mut StillDecoder,
        packet: &StillPacket,
    ) -> Result<(), DecodeError> {
        if decoder.eof || decoder.pending.is_some() {
            return Err(DecodeError::SendRejected(
                "decoder already holds a picture".to_string(),
            ));
        }
        decoder.pending = Some(packet.0.clone());
        Ok(())
    }

    fn send_eof(&self, decoder: &mut StillDecoder) -> Result<(), DecodeError> {
        decoder.eof = true;
        Ok(())
    }

    fn receive_frame(&self, decoder: &mut StillDecoder) -> Result<StillFrame, DecodeError> {
        let Some(bytes) = decoder.pending.take() else {
            return Err(if decoder.eof {
                DecodeError::EndOfStream
            } else {
                DecodeError::NotReady
            });
        };

        let picture = image::load_from_memory_with_format(&bytes, decoder.format)
            .map_err(|e| DecodeError::DecodeFailed(e.to_string()))?
            .to_rgba8();
        let (width, height) = picture.dimensions();
        let data = picture
            .pixels()
            .flat_map(|pixel| PixelFormat::Srgbx8888.pack_rgba(pixel.0))
            .collect();
        Ok(StillFrame {
            width,
            height,
            data,
        })
    }

    fn free_frame(&self, _frame: StillFrame) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::{DecodePipeline, DecodeSettings, RetryPolicy};
    use common::{ErrorKind, Step};
    use image::{Rgba, RgbaImage};

    fn write_png(dir: &tempfile::TempDir, width: u32, height: u32) -> String {
        let path = dir.path().join("frame.png");
        RgbaImage::from_pixel(width, height, Rgba([0x11, 0x22, 0x33, 0xff]))
            .save(&path)
            .unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_png_decodes_to_one_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(&dir, 8, 4);
        let settings = DecodeSettings {
            format: "image2".to_string(),
            path,
            stream: 0,
            retry: RetryPolicy::attempts(3),
        };

        let mut pipeline = DecodePipeline::open(&StillDecode, &settings).unwrap();
        assert_eq!(pipeline.stream().codec, "png");
        assert_eq!((pipeline.stream().width, pipeline.stream().height), (8, 4));

        let stats = pipeline.next_frame().unwrap();
        assert_eq!(stats.attempts, 1);
        let frame = pipeline.frame().unwrap();
        assert_eq!(frame.stride(), 32);
        assert_eq!(frame.data().len(), 8 * 4 * 4);
        let first = u32::from_ne_bytes(frame.data()[..4].try_into().unwrap());
        assert_eq!(first, 0x112233ff);
        pipeline.close().unwrap();
    }

    #[test]
    fn test_second_frame_is_end_of_stream() {
        let dir = tempfile::tempdir().unwrap();
        let settings = DecodeSettings {
            format: "png".to_string(),
            path: write_png(&dir, 2, 2),
            stream: 0,
            retry: RetryPolicy::attempts(3),
        };
        let mut pipeline = DecodePipeline::open(&StillDecode, &settings).unwrap();
        pipeline.next_frame().unwrap();
        let err = pipeline.next_frame().unwrap_err();
        assert_eq!(err.source, DecodeError::EndOfStream.into());
    }

    #[test]
    fn test_missing_file() {
        let settings = DecodeSettings {
            format: "png".to_string(),
            path: "/nonexistent/frame.png".to_string(),
            ..DecodeSettings::default()
        };
        let err = DecodePipeline::open(&StillDecode, &settings).err().unwrap();
        assert_eq!(err.step, Step::SourceOpen);
        assert_eq!(err.kind(), ErrorKind::TerminalIoFailure);
    }

    #[test]
    fn test_unknown_format_name() {
        assert_eq!(
            StillDecode.find_input_format("v4l2"),
            Err(DecodeError::UnknownFormat("v4l2".to_string()))
        );
    }
}
