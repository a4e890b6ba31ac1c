//! VideoCore backend: dispmanx compositor, EGL and OpenVG
//!
//! Thin safe wrappers over [`ffi`]. Every native handle crosses the trait
//! seam as an integer newtype; pointers (EGL) travel as `usize`.

mod ffi;

use std::ffi::c_void;
use std::ptr;

use common::{
    ClientApi, CompositorError, ConfigHandle, ContextHandle, DisplayHandle, DrawError,
    ElementHandle, ElementSpec, GraphicsAttributes, GraphicsDisplay, GraphicsError, ImageHandle,
    NativeDisplay, NativeWindowDescriptor, PixelFormat, Rect, SurfaceHandle, UpdateHandle,
};

use crate::display::Compositor;
use crate::frame::DrawingLayer;
use crate::gpu::{ConfigCandidate, GraphicsLayer};

fn vc_rect(x: i32, y: i32, width: i32, height: i32) -> ffi::VC_RECT_T {
    ffi::VC_RECT_T {
        x,
        y,
        width,
        height,
    }
}

fn egl_error() -> String {
    // SAFETY: reads thread-local error state only.
    ffi::egl_error_name(unsafe { ffi::eglGetError() })
}

/// Pending OpenVG error, if any.
fn vg_error() -> Option<String> {
    // SAFETY: reads context error state only.
    let code = unsafe { ffi::vgGetError() };
    (code != ffi::VG_NO_ERROR).then(|| ffi::vg_error_name(code))
}

fn vg_format(format: PixelFormat) -> ffi::VGImageFormat {
    match format {
        PixelFormat::Srgbx8888 => ffi::VG_sRGBX_8888,
    }
}

fn egl_display(display: GraphicsDisplay) -> ffi::EGLDisplay {
    display.0 as ffi::EGLDisplay
}

/// dispmanx through `bcm_host`.
#[derive(Debug, Clone, Copy, Default)]
pub struct VcCompositor;

impl Compositor for VcCompositor {
    fn initialize(&self) -> Result<(), CompositorError> {
        // SAFETY: no preconditions; paired with bcm_host_deinit.
        unsafe { ffi::bcm_host_init() };
        Ok(())
    }

    fn deinitialize(&self) {
        // SAFETY: called once after every handle was released.
        unsafe { ffi::bcm_host_deinit() };
    }

    fn display_size(&self, display: u32) -> Result<(u32, u32), CompositorError> {
        let number = u16::try_from(display).map_err(|_| CompositorError::DisplaySize { display })?;
        let (mut width, mut height) = (0u32, 0u32);
        // SAFETY: both out-pointers are valid for the call.
        let result = unsafe { ffi::graphics_get_display_size(number, &mut width, &mut height) };
        if result < 0 {
            return Err(CompositorError::DisplaySize { display });
        }
        Ok((width, height))
    }

    fn open_display(&self, display: u32) -> Result<DisplayHandle, CompositorError> {
        // SAFETY: takes a plain integer; failure is reported as a null handle.
        let handle = unsafe { ffi::vc_dispmanx_display_open(display) };
        if handle == ffi::DISPMANX_NO_HANDLE {
            return Err(CompositorError::DisplayUnavailable { display });
        }
        Ok(DisplayHandle(handle))
    }

    fn close_display(&self, display: DisplayHandle) -> Result<(), CompositorError> {
        // SAFETY: `display` came from vc_dispmanx_display_open and is closed once.
        if unsafe { ffi::vc_dispmanx_display_close(display.0) } != 0 {
            return Err(CompositorError::DisplayClose { display: display.0 });
        }
        Ok(())
    }

    fn update_start(&self, priority: i32) -> Result<UpdateHandle, CompositorError> {
        // SAFETY: takes a plain integer; failure is reported as a null handle.
        let handle = unsafe { ffi::vc_dispmanx_update_start(priority) };
        if handle == ffi::DISPMANX_NO_HANDLE {
            return Err(CompositorError::TransactionStart);
        }
        Ok(UpdateHandle(handle))
    }

    fn element_add(
        &self,
        update: UpdateHandle,
        display: DisplayHandle,
        spec: &ElementSpec,
    ) -> Result<ElementHandle, CompositorError> {
        let Rect {
            x,
            y,
            width,
            height,
        } = spec.dest;
        let dest = vc_rect(x, y, width, height);
        let src = vc_rect(spec.src.x, spec.src.y, spec.src.width, spec.src.height);
        // SAFETY: the rectangles outlive the call; null alpha and clamp select
        // the defaults.
        let handle = unsafe {
            ffi::vc_dispmanx_element_add(
                update.0,
                display.0,
                spec.layer,
                &dest,
                spec.source.raw(),
                &src,
                0,
                ptr::null_mut(),
                ptr::null_mut(),
                0,
            )
        };
        if handle == ffi::DISPMANX_NO_HANDLE {
            return Err(CompositorError::ElementAdd);
        }
        Ok(ElementHandle(handle))
    }

    fn element_remove(
        &self,
        update: UpdateHandle,
        element: ElementHandle,
    ) -> Result<(), CompositorError> {
        // SAFETY: both handles are open; the update has not been submitted yet.
        if unsafe { ffi::vc_dispmanx_element_remove(update.0, element.0) } != 0 {
            return Err(CompositorError::ElementRemove);
        }
        Ok(())
    }

    fn update_submit_sync(&self, update: UpdateHandle) -> Result<(), CompositorError> {
        // SAFETY: `update` is open and is consumed by this call.
        if unsafe { ffi::vc_dispmanx_update_submit_sync(update.0) } != 0 {
            return Err(CompositorError::TransactionSubmit);
        }
        Ok(())
    }

    fn update_abandon(&self, update: UpdateHandle) {
        // dispmanx has no way to discard an update; an update whose changes
        // all failed is empty, so submitting it is a no-op.
        crate::log_and_continue!(self.update_submit_sync(update), "flush abandoned update");
    }
}

/// EGL through `brcmEGL`.
#[derive(Debug, Clone, Copy, Default)]
pub struct VcGraphics;

impl VcGraphics {
    fn config_attribute(
        display: ffi::EGLDisplay,
        config: ffi::EGLConfig,
        attribute: ffi::EGLint,
    ) -> Result<u8, GraphicsError> {
        let mut value = 0;
        // SAFETY: `config` came from eglChooseConfig on this display.
        if unsafe { ffi::eglGetConfigAttrib(display, config, attribute, &mut value) }
            == ffi::EGL_FALSE
        {
            return Err(GraphicsError::Initialize(egl_error()));
        }
        Ok(u8::try_from(value).unwrap_or(u8::MAX))
    }
}

impl GraphicsLayer for VcGraphics {
    fn get_display(&self, native: NativeDisplay) -> Result<GraphicsDisplay, GraphicsError> {
        let native = match native {
            NativeDisplay::Default => ffi::EGL_DEFAULT_DISPLAY,
        };
        // SAFETY: EGL_DEFAULT_DISPLAY is always a valid native display.
        let display = unsafe { ffi::eglGetDisplay(native) };
        if display == ffi::EGL_NO_DISPLAY {
            return Err(GraphicsError::DisplayBind(egl_error()));
        }
        Ok(GraphicsDisplay(display as usize))
    }

    fn initialize(&self, display: GraphicsDisplay) -> Result<String, GraphicsError> {
        let (mut major, mut minor) = (0, 0);
        // SAFETY: `display` came from eglGetDisplay; both out-pointers are valid.
        if unsafe { ffi::eglInitialize(egl_display(display), &mut major, &mut minor) }
            == ffi::EGL_FALSE
        {
            return Err(GraphicsError::Initialize(egl_error()));
        }
        Ok(format!("{}.{}", major, minor))
    }

    fn bind_api(&self, api: ClientApi) -> Result<(), GraphicsError> {
        let api = match api {
            ClientApi::OpenVg => ffi::EGL_OPENVG_API,
            ClientApi::OpenGlEs => ffi::EGL_OPENGL_ES_API,
        };
        // SAFETY: takes an enum value; invalid ones are reported through eglGetError.
        if unsafe { ffi::eglBindAPI(api) } == ffi::EGL_FALSE {
            return Err(GraphicsError::ApiBind(egl_error()));
        }
        Ok(())
    }

    fn choose_configs(
        &self,
        display: GraphicsDisplay,
        wanted: &GraphicsAttributes,
    ) -> Result<Vec<ConfigCandidate>, GraphicsError> {
        let display = egl_display(display);
        let attribs = [
            ffi::EGL_RED_SIZE,
            i32::from(wanted.red),
            ffi::EGL_GREEN_SIZE,
            i32::from(wanted.green),
            ffi::EGL_BLUE_SIZE,
            i32::from(wanted.blue),
            ffi::EGL_ALPHA_SIZE,
            i32::from(wanted.alpha),
            ffi::EGL_LUMINANCE_SIZE,
            wanted.luminance.map_or(ffi::EGL_DONT_CARE, i32::from),
            ffi::EGL_SAMPLES,
            i32::from(wanted.samples),
            ffi::EGL_NONE,
        ];

        let mut count = 0;
        // SAFETY: a null config array only counts the matches.
        if unsafe {
            ffi::eglChooseConfig(display, attribs.as_ptr(), ptr::null_mut(), 0, &mut count)
        } == ffi::EGL_FALSE
        {
            return Err(GraphicsError::Initialize(egl_error()));
        }
        let mut configs: Vec<ffi::EGLConfig> = vec![ptr::null_mut(); count.max(0) as usize];
        // SAFETY: `configs` has room for `count` entries; `attribs` ends with EGL_NONE.
        if unsafe {
            ffi::eglChooseConfig(
                display,
                attribs.as_ptr(),
                configs.as_mut_ptr(),
                count,
                &mut count,
            )
        } == ffi::EGL_FALSE
        {
            return Err(GraphicsError::Initialize(egl_error()));
        }
        configs.truncate(count.max(0) as usize);

        configs
            .into_iter()
            .map(|config| -> Result<ConfigCandidate, GraphicsError> {
                Ok(ConfigCandidate {
                    handle: ConfigHandle(config as usize),
                    attributes: GraphicsAttributes {
                        red: Self::config_attribute(display, config, ffi::EGL_RED_SIZE)?,
                        green: Self::config_attribute(display, config, ffi::EGL_GREEN_SIZE)?,
                        blue: Self::config_attribute(display, config, ffi::EGL_BLUE_SIZE)?,
                        alpha: Self::config_attribute(display, config, ffi::EGL_ALPHA_SIZE)?,
                        luminance: Some(Self::config_attribute(
                            display,
                            config,
                            ffi::EGL_LUMINANCE_SIZE,
                        )?),
                        samples: Self::config_attribute(display, config, ffi::EGL_SAMPLES)?,
                    },
                })
            })
            .collect()
    }

    fn create_window_surface(
        &self,
        display: GraphicsDisplay,
        config: ConfigHandle,
        window: &NativeWindowDescriptor,
    ) -> Result<SurfaceHandle, GraphicsError> {
        // SAFETY: NativeWindowDescriptor is laid out as EGL_DISPMANX_WINDOW_T
        // and the caller keeps it alive for the surface's lifetime.
        let surface = unsafe {
            ffi::eglCreateWindowSurface(
                egl_display(display),
                config.0 as ffi::EGLConfig,
                window as *const NativeWindowDescriptor as *mut c_void,
                ptr::null(),
            )
        };
        if surface == ffi::EGL_NO_SURFACE {
            return Err(GraphicsError::SurfaceCreate(egl_error()));
        }
        Ok(SurfaceHandle(surface as usize))
    }

    fn destroy_surface(
        &self,
        display: GraphicsDisplay,
        surface: SurfaceHandle,
    ) -> Result<(), GraphicsError> {
        // SAFETY: `surface` was created on `display` and is no longer current.
        if unsafe { ffi::eglDestroySurface(egl_display(display), surface.0 as ffi::EGLSurface) }
            == ffi::EGL_FALSE
        {
            return Err(GraphicsError::Release(egl_error()));
        }
        Ok(())
    }

    fn create_context(
        &self,
        display: GraphicsDisplay,
        config: ConfigHandle,
    ) -> Result<ContextHandle, GraphicsError> {
        // SAFETY: `config` came from eglChooseConfig on `display`; null attributes
        // select the defaults.
        let context = unsafe {
            ffi::eglCreateContext(
                egl_display(display),
                config.0 as ffi::EGLConfig,
                ffi::EGL_NO_CONTEXT,
                ptr::null(),
            )
        };
        if context == ffi::EGL_NO_CONTEXT {
            return Err(GraphicsError::ContextCreate(egl_error()));
        }
        Ok(ContextHandle(context as usize))
    }

    fn destroy_context(
        &self,
        display: GraphicsDisplay,
        context: ContextHandle,
    ) -> Result<(), GraphicsError> {
        // SAFETY: `context` was created on `display` and is no longer current.
        if unsafe { ffi::eglDestroyContext(egl_display(display), context.0 as ffi::EGLContext) }
            == ffi::EGL_FALSE
        {
            return Err(GraphicsError::Release(egl_error()));
        }
        Ok(())
    }

    fn make_current(
        &self,
        display: GraphicsDisplay,
        binding: Option<(SurfaceHandle, ContextHandle)>,
    ) -> Result<(), GraphicsError> {
        let (surface, context) = match binding {
            Some((surface, context)) => (
                surface.0 as ffi::EGLSurface,
                context.0 as ffi::EGLContext,
            ),
            None => (ffi::EGL_NO_SURFACE, ffi::EGL_NO_CONTEXT),
        };
        // SAFETY: the surface and context are live on `display`, or both are the
        // EGL_NO_* values that release the binding.
        if unsafe { ffi::eglMakeCurrent(egl_display(display), surface, surface, context) }
            == ffi::EGL_FALSE
        {
            return Err(GraphicsError::MakeCurrentFailed(egl_error()));
        }
        Ok(())
    }

    fn swap_buffers(
        &self,
        display: GraphicsDisplay,
        surface: SurfaceHandle,
    ) -> Result<(), GraphicsError> {
        // SAFETY: `surface` is live and current on this thread.
        if unsafe { ffi::eglSwapBuffers(egl_display(display), surface.0 as ffi::EGLSurface) }
            == ffi::EGL_FALSE
        {
            return Err(GraphicsError::SwapFailed(egl_error()));
        }
        Ok(())
    }

    fn terminate(&self, display: GraphicsDisplay) -> Result<(), GraphicsError> {
        // SAFETY: every surface and context on `display` was released first.
        if unsafe { ffi::eglTerminate(egl_display(display)) } == ffi::EGL_FALSE {
            return Err(GraphicsError::Terminate(egl_error()));
        }
        Ok(())
    }
}

/// OpenVG through `brcmOpenVG`. Every call needs a current context.
#[derive(Debug, Clone, Copy, Default)]
pub struct VcDrawing;

impl DrawingLayer for VcDrawing {
    fn create_image(
        &self,
        format: PixelFormat,
        width: u32,
        height: u32,
        quality: u32,
    ) -> Result<ImageHandle, DrawError> {
        let invalid = || DrawError::ImageCreateFailed("VG_ILLEGAL_ARGUMENT_ERROR".to_string());
        let width = i32::try_from(width).map_err(|_| invalid())?;
        let height = i32::try_from(height).map_err(|_| invalid())?;
        // SAFETY: a context is current; bad sizes are reported as VG_INVALID_HANDLE.
        let image = unsafe { ffi::vgCreateImage(vg_format(format), width, height, quality) };
        if image == ffi::VG_INVALID_HANDLE {
            return Err(DrawError::ImageCreateFailed(
                vg_error().unwrap_or_else(|| "VG_INVALID_HANDLE".to_string()),
            ));
        }
        Ok(ImageHandle(image))
    }

    fn image_sub_data(
        &self,
        image: ImageHandle,
        data: &[u8],
        stride: usize,
        format: PixelFormat,
        (x, y): (i32, i32),
        (width, height): (u32, u32),
    ) {
        let (Ok(stride), Ok(width), Ok(height)) = (
            i32::try_from(stride),
            i32::try_from(width),
            i32::try_from(height),
        ) else {
            log::warn!("Upload of {}x{} exceeds OpenVG limits", width, height);
            return;
        };
        // SAFETY: the caller checked `data` covers `height` rows of `stride`.
        unsafe {
            ffi::vgImageSubData(
                image.0,
                data.as_ptr().cast(),
                stride,
                vg_format(format),
                x,
                y,
                width,
                height,
            );
        }
        if let Some(error) = vg_error() {
            log::warn!("Image upload failed: {}", error);
        }
    }

    fn draw_image(&self, image: ImageHandle) {
        // SAFETY: `image` is live and a context is current.
        unsafe { ffi::vgDrawImage(image.0) };
        if let Some(error) = vg_error() {
            log::warn!("Image draw failed: {}", error);
        }
    }

    fn destroy_image(&self, image: ImageHandle) -> Result<(), DrawError> {
        // SAFETY: `image` is live and destroyed once.
        unsafe { ffi::vgDestroyImage(image.0) };
        match vg_error() {
            Some(error) => Err(DrawError::ImageDestroyFailed(error)),
            None => Ok(()),
        }
    }

    fn clear(&self, area: Rect, color: [f32; 4]) {
        // SAFETY: `color` holds the four values the parameter takes.
        unsafe {
            ffi::vgSetfv(ffi::VG_CLEAR_COLOR, 4, color.as_ptr());
            ffi::vgClear(area.x, area.y, area.width, area.height);
        }
    }
}
