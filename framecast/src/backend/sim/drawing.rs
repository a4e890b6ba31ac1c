use common::{DrawError, ImageHandle, PixelFormat, Rect, Step};

use super::{Event, ResourceKind, Shared};
use crate::frame::DrawingLayer;
use crate::platform::Library;

#[derive(Clone)]
pub struct SimDrawing {
    core: Shared,
}

impl SimDrawing {
    pub(super) fn new(core: Shared) -> Self {
        Self { core }
    }
}

impl DrawingLayer for SimDrawing {
    fn initialize(&self) -> Result<(), DrawError> {
        let mut core = self.core.borrow_mut();
        core.journal.record(Event::Init(Library::Drawing));
        Ok(())
    }

    fn deinitialize(&self) {
        let mut core = self.core.borrow_mut();
        core.journal.record(Event::Deinit(Library::Drawing));
    }

    fn create_image(
        &self,
        _format: PixelFormat,
        width: u32,
        height: u32,
        _quality: u32,
    ) -> Result<ImageHandle, DrawError> {
        let mut core = self.core.borrow_mut();
        core.require_current("image create");
        if core.inject(Step::ImageCreate) {
            return Err(DrawError::ImageCreateFailed(
                "VG_OUT_OF_MEMORY_ERROR".to_string(),
            ));
        }
        if width == 0 || height == 0 {
            return Err(DrawError::ImageCreateFailed(
                "VG_ILLEGAL_ARGUMENT_ERROR".to_string(),
            ));
        }
        let image = core.journal.acquire(ResourceKind::Image);
        core.images.insert(image, (width, height));
        Ok(ImageHandle(image))
    }

    fn image_sub_data(
        &self,
        image: ImageHandle,
        data: &[u8],
        stride: usize,
        format: PixelFormat,
        _origin: (i32, i32),
        (width, height): (u32, u32),
    ) {
        let mut core = self.core.borrow_mut();
        core.require_current("image upload");
        let fits = core
            .images
            .get(&image.0)
            .is_some_and(|(w, h)| width <= *w && height <= *h);
        if !fits {
            core.journal.violation("upload outside the image");
            return;
        }
        let needed = format.buffer_len(width, height, stride).unwrap_or(usize::MAX);
        if data.len() < needed {
            core.journal.violation("upload reads past the pixel buffer");
            return;
        }
        core.journal.record(Event::Upload);
    }

    fn draw_image(&self, image: ImageHandle) {
        let mut core = self.core.borrow_mut();
        core.require_current("image draw");
        if !core.images.contains_key(&image.0) {
            core.journal.violation("draw of a destroyed image");
            return;
        }
        core.journal.record(Event::Draw);
    }

    fn destroy_image(&self, image: ImageHandle) -> Result<(), DrawError> {
        let mut core = self.core.borrow_mut();
        core.require_current("image destroy");
        if !core.release(ResourceKind::Image, image.0) {
            return Err(DrawError::ImageDestroyFailed(
                "VG_BAD_HANDLE_ERROR".to_string(),
            ));
        }
        core.images.remove(&image.0);
        Ok(())
    }

    fn clear(&self, area: Rect, _color: [f32; 4]) {
        let mut core = self.core.borrow_mut();
        core.require_current("clear");
        core.journal.record(Event::Clear(area));
    }
}
