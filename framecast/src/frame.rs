//! Frame composition - GPU image sized to a decoded frame, upload and draw
use common::{DrawError, ImageHandle, ImageQuality, PipelineError, PixelFormat, Rect, Step, StepExt};

use crate::gpu::Current;
use crate::resource::ResourceHandle;
use crate::video::FrameData;

/// Image/drawing layer (OpenVG-shaped).
///
/// Upload, draw and clear act on whatever surface is current; callers hold a
/// [`Current`] token while issuing them.
pub trait DrawingLayer {
    fn initialize(&self) -> Result<(), DrawError> {
        Ok(())
    }

    fn deinitialize(&self) {}

    /// `quality` is an [`ImageQuality::bitfield`].
    fn create_image(
        &self,
        format: PixelFormat,
        width: u32,
        height: u32,
        quality: u32,
    ) -> Result<ImageHandle, DrawError>;

    /// Copy `size` pixels from `data` into the image at `origin`.
    fn image_sub_data(
        &self,
        image: ImageHandle,
        data: &[u8],
        stride: usize,
        format: PixelFormat,
        origin: (i32, i32),
        size: (u32, u32),
    );

    /// Draw with the identity image-to-surface transform.
    fn draw_image(&self, image: ImageHandle);

    fn destroy_image(&self, image: ImageHandle) -> Result<(), DrawError>;

    /// Fill `area` of the current surface. Channels are in 0.0..=1.0.
    fn clear(&self, area: Rect, color: [f32; 4]);
}

/// How the GPU image is created and what goes under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSettings {
    pub format: PixelFormat,
    pub quality: Vec<ImageQuality>,
    /// Surface colour painted before the frame is drawn.
    pub clear: Option<(u8, u8, u8, u8)>,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            format: PixelFormat::Srgbx8888,
            quality: vec![ImageQuality::Nonantialiased],
            clear: None,
        }
    }
}

/// One GPU image holding one decoded frame.
pub struct FrameCompositor<'a, V: DrawingLayer> {
    drawing: &'a V,
    format: PixelFormat,
    width: u32,
    height: u32,
    uploaded: bool,
    image: ResourceHandle<'a, ImageHandle, DrawError>,
}

impl<'a, V: DrawingLayer> FrameCompositor<'a, V> {
    /// Create an image of exactly `width` x `height`.
    pub fn create(
        drawing: &'a V,
        _current: &Current<'_>,
        settings: &ImageSettings,
        width: u32,
        height: u32,
    ) -> Result<Self, PipelineError> {
        let quality = ImageQuality::bitfield(&settings.quality);
        let image = drawing
            .create_image(settings.format, width, height, quality)
            .at(Step::ImageCreate)?;
        log::debug!(
            "Created {} image {}x{} (quality {:#x})",
            settings.format,
            width,
            height,
            quality
        );
        Ok(Self {
            drawing,
            format: settings.format,
            width,
            height,
            uploaded: false,
            image: ResourceHandle::new("image", image, move |image| {
                drawing.destroy_image(image)
            }),
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn image(&self) -> ImageHandle {
        *self.image.get()
    }

    /// Paint the whole current surface with one colour.
    pub fn clear(&self, current: &Current<'_>, (r, g, b, a): (u8, u8, u8, u8)) {
        let (width, height) = current.size();
        let color = [r, g, b, a].map(|c| f32::from(c) / 255.0);
        self.drawing.clear(Rect::new(0, 0, width, height), color);
    }

    /// Copy a decoded frame into the image.
    ///
    /// The frame must match the image's size and format exactly, and its
    /// buffer must cover every row at the given stride.
    pub fn upload<F: FrameData>(
        &mut self,
        _current: &Current<'_>,
        frame: &F,
    ) -> Result<(), PipelineError> {
        self.check_frame(frame).at(Step::ImageUpload)?;
        self.drawing.image_sub_data(
            self.image(),
            frame.data(),
            frame.stride(),
            self.format,
            (0, 0),
            (self.width, self.height),
        );
        self.uploaded = true;
        Ok(())
    }

    pub fn draw(&self, _current: &Current<'_>) -> Result<(), PipelineError> {
        if !self.uploaded {
            debug_assert!(false, "draw before upload");
            return Err(PipelineError::sequencing(
                Step::ImageDraw,
                "draw before upload",
            ));
        }
        self.drawing.draw_image(self.image());
        Ok(())
    }

    pub fn destroy(self) -> Result<(), DrawError> {
        self.image.release()
    }

    fn check_frame<F: FrameData>(&self, frame: &F) -> Result<(), DrawError> {
        if frame.format() != self.format {
            return Err(DrawError::FormatMismatch {
                image: self.format,
                frame: frame.format(),
            });
        }
        let frame_size = (frame.width(), frame.height());
        if frame_size != (self.width, self.height) {
            return Err(DrawError::DimensionMismatch {
                image: (self.width, self.height),
                frame: frame_size,
            });
        }

        let row = self.width as usize * self.format.bytes_per_pixel();
        let needed = self
            .format
            .buffer_len(self.width, self.height, frame.stride())
            .unwrap_or(usize::MAX);
        let got = frame.data().len();
        if frame.stride() < row || got < needed {
            return Err(DrawError::BufferTooSmall {
                needed: needed.max(row),
                got,
            });
        }
        Ok(())
    }
}

/// Parse hex color string to RGBA
pub fn parse_hex_color(color: &str) -> Option<(u8, u8, u8, u8)> {
    let color = color.trim_start_matches('#');

    if !color.is_ascii() || (color.len() != 6 && color.len() != 8) {
        return None;
    }

    let r = u8::from_str_radix(&color[0..2], 16).ok()?;
    let g = u8::from_str_radix(&color[2..4], 16).ok()?;
    let b = u8::from_str_radix(&color[4..6], 16).ok()?;
    let a = if color.len() == 8 {
        u8::from_str_radix(&color[6..8], 16).ok()?
    } else {
        255
    };

    Some((r, g, b, a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::sim::{Event, SimFrame, SimSettings, SimWorld};
    use crate::gpu::{GraphicsSettings, RenderContext};
    use common::{ErrorKind, GraphicsAttributes, NativeWindowDescriptor};

    fn with_current(test: impl FnOnce(&SimWorld, &Current<'_>)) {
        let world = SimWorld::new(SimSettings::default());
        let element = world.core_mut().commit_test_element();
        let window = NativeWindowDescriptor::new(element, 1024, 768);
        let mut render = RenderContext::bind(&world.graphics, &GraphicsSettings::default()).unwrap();
        render.select_config(&GraphicsAttributes::default()).unwrap();
        render.create_window_surface(&window).unwrap();
        render.create_context().unwrap();
        render.make_current().unwrap();
        let current = render.current().unwrap();
        test(&world, &current);
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FF5733"), Some((255, 87, 51, 255)));
        assert_eq!(parse_hex_color("FF5733"), Some((255, 87, 51, 255)));
        assert_eq!(parse_hex_color("#FF573380"), Some((255, 87, 51, 128)));
        assert_eq!(parse_hex_color("000000"), Some((0, 0, 0, 255)));
        assert_eq!(parse_hex_color("FFFFFF"), Some((255, 255, 255, 255)));
        assert_eq!(parse_hex_color("invalid"), None);
        assert_eq!(parse_hex_color("ééé"), None);
    }

    #[test]
    fn test_upload_and_draw() {
        with_current(|world, current| {
            let mut image = FrameCompositor::create(
                &world.drawing,
                current,
                &ImageSettings::default(),
                640,
                480,
            )
            .unwrap();
            image.clear(current, (255, 255, 255, 255));
            image.upload(current, &SimFrame::solid(640, 480, [10, 20, 30, 255])).unwrap();
            image.draw(current).unwrap();
            image.destroy().unwrap();

            let events = world.core().journal.events();
            let upload = events.iter().position(|e| *e == Event::Upload).unwrap();
            let draw = events.iter().position(|e| *e == Event::Draw).unwrap();
            assert!(upload < draw);
            assert!(world.core().journal.violations().is_empty());
        });
    }

    #[test]
    fn test_dimension_mismatch_fails_fast() {
        with_current(|world, current| {
            let mut image = FrameCompositor::create(
                &world.drawing,
                current,
                &ImageSettings::default(),
                640,
                480,
            )
            .unwrap();
            let err = image
                .upload(current, &SimFrame::solid(320, 240, [0, 0, 0, 255]))
                .unwrap_err();
            assert_eq!(err.step, Step::ImageUpload);
            assert_eq!(
                err.source,
                DrawError::DimensionMismatch {
                    image: (640, 480),
                    frame: (320, 240)
                }
                .into()
            );
            assert!(!world.core().journal.events().contains(&Event::Upload));
        });
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        with_current(|world, current| {
            let mut image = FrameCompositor::create(
                &world.drawing,
                current,
                &ImageSettings::default(),
                4,
                4,
            )
            .unwrap();
            let mut frame = SimFrame::solid(4, 4, [0, 0, 0, 255]);
            frame.data.truncate(16 * 3);
            let err = image.upload(current, &frame).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::SequencingViolation);
            assert_eq!(
                err.source,
                DrawError::BufferTooSmall { needed: 64, got: 48 }.into()
            );
        });
    }
}
