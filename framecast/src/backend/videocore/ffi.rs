//! Raw bindings to the Raspberry Pi VideoCore userland libraries.
//!
//! Libraries: /opt/vc/lib/libbcm_host.so, libbrcmEGL.so, libbrcmOpenVG.so
//! Headers: /opt/vc/include (bcm_host.h, EGL/egl.h, VG/openvg.h)

#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(dead_code)]

use std::ffi::{c_int, c_void};

// =============================================================================
// bcm_host / dispmanx
// =============================================================================

pub type DISPMANX_DISPLAY_HANDLE_T = u32;
pub type DISPMANX_UPDATE_HANDLE_T = u32;
pub type DISPMANX_ELEMENT_HANDLE_T = u32;
pub type DISPMANX_RESOURCE_HANDLE_T = u32;

/// Returned by every dispmanx constructor on failure.
pub const DISPMANX_NO_HANDLE: u32 = 0;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct VC_RECT_T {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[link(name = "bcm_host")]
unsafe extern "C" {
    pub fn bcm_host_init();
    pub fn bcm_host_deinit();

    /// Returns a negative value on failure.
    pub fn graphics_get_display_size(display_number: u16, width: *mut u32, height: *mut u32)
    -> i32;

    pub fn vc_dispmanx_display_open(device: u32) -> DISPMANX_DISPLAY_HANDLE_T;
    pub fn vc_dispmanx_display_close(display: DISPMANX_DISPLAY_HANDLE_T) -> c_int;

    pub fn vc_dispmanx_update_start(priority: i32) -> DISPMANX_UPDATE_HANDLE_T;
    pub fn vc_dispmanx_update_submit_sync(update: DISPMANX_UPDATE_HANDLE_T) -> c_int;

    /// `alpha` and `clamp` may be null for an opaque, unclamped element.
    pub fn vc_dispmanx_element_add(
        update: DISPMANX_UPDATE_HANDLE_T,
        display: DISPMANX_DISPLAY_HANDLE_T,
        layer: i32,
        dest_rect: *const VC_RECT_T,
        src: DISPMANX_RESOURCE_HANDLE_T,
        src_rect: *const VC_RECT_T,
        protection: u32,
        alpha: *mut c_void,
        clamp: *mut c_void,
        transform: c_int,
    ) -> DISPMANX_ELEMENT_HANDLE_T;

    pub fn vc_dispmanx_element_remove(
        update: DISPMANX_UPDATE_HANDLE_T,
        element: DISPMANX_ELEMENT_HANDLE_T,
    ) -> c_int;
}

// =============================================================================
// EGL
// =============================================================================

pub type EGLBoolean = u32;
pub type EGLint = i32;
pub type EGLenum = u32;
pub type EGLDisplay = *mut c_void;
pub type EGLConfig = *mut c_void;
pub type EGLSurface = *mut c_void;
pub type EGLContext = *mut c_void;
pub type EGLNativeDisplayType = *mut c_void;
pub type EGLNativeWindowType = *mut c_void;

pub const EGL_FALSE: EGLBoolean = 0;
pub const EGL_TRUE: EGLBoolean = 1;
pub const EGL_DEFAULT_DISPLAY: EGLNativeDisplayType = std::ptr::null_mut();
pub const EGL_NO_DISPLAY: EGLDisplay = std::ptr::null_mut();
pub const EGL_NO_SURFACE: EGLSurface = std::ptr::null_mut();
pub const EGL_NO_CONTEXT: EGLContext = std::ptr::null_mut();

pub const EGL_SUCCESS: EGLint = 0x3000;
pub const EGL_NOT_INITIALIZED: EGLint = 0x3001;
pub const EGL_BAD_ACCESS: EGLint = 0x3002;
pub const EGL_BAD_ALLOC: EGLint = 0x3003;
pub const EGL_BAD_ATTRIBUTE: EGLint = 0x3004;
pub const EGL_BAD_CONFIG: EGLint = 0x3005;
pub const EGL_BAD_CONTEXT: EGLint = 0x3006;
pub const EGL_BAD_CURRENT_SURFACE: EGLint = 0x3007;
pub const EGL_BAD_DISPLAY: EGLint = 0x3008;
pub const EGL_BAD_MATCH: EGLint = 0x3009;
pub const EGL_BAD_NATIVE_PIXMAP: EGLint = 0x300A;
pub const EGL_BAD_NATIVE_WINDOW: EGLint = 0x300B;
pub const EGL_BAD_PARAMETER: EGLint = 0x300C;
pub const EGL_BAD_SURFACE: EGLint = 0x300D;
pub const EGL_CONTEXT_LOST: EGLint = 0x300E;

pub const EGL_ALPHA_SIZE: EGLint = 0x3021;
pub const EGL_BLUE_SIZE: EGLint = 0x3022;
pub const EGL_GREEN_SIZE: EGLint = 0x3023;
pub const EGL_RED_SIZE: EGLint = 0x3024;
pub const EGL_SAMPLES: EGLint = 0x3031;
pub const EGL_NONE: EGLint = 0x3038;
pub const EGL_LUMINANCE_SIZE: EGLint = 0x303D;
pub const EGL_DONT_CARE: EGLint = -1;

pub const EGL_OPENGL_ES_API: EGLenum = 0x30A0;
pub const EGL_OPENVG_API: EGLenum = 0x30A1;

#[link(name = "brcmEGL")]
unsafe extern "C" {
    pub fn eglGetError() -> EGLint;
    pub fn eglGetDisplay(display_id: EGLNativeDisplayType) -> EGLDisplay;
    pub fn eglInitialize(dpy: EGLDisplay, major: *mut EGLint, minor: *mut EGLint) -> EGLBoolean;
    pub fn eglTerminate(dpy: EGLDisplay) -> EGLBoolean;
    pub fn eglBindAPI(api: EGLenum) -> EGLBoolean;

    pub fn eglChooseConfig(
        dpy: EGLDisplay,
        attrib_list: *const EGLint,
        configs: *mut EGLConfig,
        config_size: EGLint,
        num_config: *mut EGLint,
    ) -> EGLBoolean;

    pub fn eglGetConfigAttrib(
        dpy: EGLDisplay,
        config: EGLConfig,
        attribute: EGLint,
        value: *mut EGLint,
    ) -> EGLBoolean;

    pub fn eglCreateWindowSurface(
        dpy: EGLDisplay,
        config: EGLConfig,
        win: EGLNativeWindowType,
        attrib_list: *const EGLint,
    ) -> EGLSurface;
    pub fn eglDestroySurface(dpy: EGLDisplay, surface: EGLSurface) -> EGLBoolean;

    pub fn eglCreateContext(
        dpy: EGLDisplay,
        config: EGLConfig,
        share_context: EGLContext,
        attrib_list: *const EGLint,
    ) -> EGLContext;
    pub fn eglDestroyContext(dpy: EGLDisplay, ctx: EGLContext) -> EGLBoolean;

    pub fn eglMakeCurrent(
        dpy: EGLDisplay,
        draw: EGLSurface,
        read: EGLSurface,
        ctx: EGLContext,
    ) -> EGLBoolean;
    pub fn eglSwapBuffers(dpy: EGLDisplay, surface: EGLSurface) -> EGLBoolean;
}

// The VideoCore EGL and OpenVG libraries resolve GLES symbols at load time.
#[link(name = "brcmGLESv2")]
unsafe extern "C" {}

/// Symbolic name of an EGL error code.
pub fn egl_error_name(code: EGLint) -> String {
    let name = match code {
        EGL_SUCCESS => "EGL_SUCCESS",
        EGL_NOT_INITIALIZED => "EGL_NOT_INITIALIZED",
        EGL_BAD_ACCESS => "EGL_BAD_ACCESS",
        EGL_BAD_ALLOC => "EGL_BAD_ALLOC",
        EGL_BAD_ATTRIBUTE => "EGL_BAD_ATTRIBUTE",
        EGL_BAD_CONFIG => "EGL_BAD_CONFIG",
        EGL_BAD_CONTEXT => "EGL_BAD_CONTEXT",
        EGL_BAD_CURRENT_SURFACE => "EGL_BAD_CURRENT_SURFACE",
        EGL_BAD_DISPLAY => "EGL_BAD_DISPLAY",
        EGL_BAD_MATCH => "EGL_BAD_MATCH",
        EGL_BAD_NATIVE_PIXMAP => "EGL_BAD_NATIVE_PIXMAP",
        EGL_BAD_NATIVE_WINDOW => "EGL_BAD_NATIVE_WINDOW",
        EGL_BAD_PARAMETER => "EGL_BAD_PARAMETER",
        EGL_BAD_SURFACE => "EGL_BAD_SURFACE",
        EGL_CONTEXT_LOST => "EGL_CONTEXT_LOST",
        other => return format!("EGL error 0x{:04X}", other),
    };
    name.to_string()
}

// =============================================================================
// OpenVG
// =============================================================================

pub type VGImage = u32;
pub type VGint = i32;
pub type VGfloat = f32;
pub type VGbitfield = u32;
pub type VGErrorCode = i32;
pub type VGImageFormat = i32;
pub type VGParamType = i32;

pub const VG_INVALID_HANDLE: VGImage = 0;

pub const VG_NO_ERROR: VGErrorCode = 0;
pub const VG_BAD_HANDLE_ERROR: VGErrorCode = 0x1000;
pub const VG_ILLEGAL_ARGUMENT_ERROR: VGErrorCode = 0x1001;
pub const VG_OUT_OF_MEMORY_ERROR: VGErrorCode = 0x1002;
pub const VG_PATH_CAPABILITY_ERROR: VGErrorCode = 0x1003;
pub const VG_UNSUPPORTED_IMAGE_FORMAT_ERROR: VGErrorCode = 0x1004;
pub const VG_UNSUPPORTED_PATH_FORMAT_ERROR: VGErrorCode = 0x1005;
pub const VG_IMAGE_IN_USE_ERROR: VGErrorCode = 0x1006;
pub const VG_NO_CONTEXT_ERROR: VGErrorCode = 0x1007;

pub const VG_sRGBX_8888: VGImageFormat = 0;

pub const VG_CLEAR_COLOR: VGParamType = 0x1121;

#[link(name = "brcmOpenVG")]
unsafe extern "C" {
    pub fn vgGetError() -> VGErrorCode;

    pub fn vgCreateImage(
        format: VGImageFormat,
        width: VGint,
        height: VGint,
        allowed_quality: VGbitfield,
    ) -> VGImage;
    pub fn vgDestroyImage(image: VGImage);

    pub fn vgImageSubData(
        image: VGImage,
        data: *const c_void,
        data_stride: VGint,
        data_format: VGImageFormat,
        x: VGint,
        y: VGint,
        width: VGint,
        height: VGint,
    );
    pub fn vgDrawImage(image: VGImage);

    pub fn vgSetfv(param_type: VGParamType, count: VGint, values: *const VGfloat);
    pub fn vgClear(x: VGint, y: VGint, width: VGint, height: VGint);
}

/// Symbolic name of an OpenVG error code.
pub fn vg_error_name(code: VGErrorCode) -> String {
    let name = match code {
        VG_NO_ERROR => "VG_NO_ERROR",
        VG_BAD_HANDLE_ERROR => "VG_BAD_HANDLE_ERROR",
        VG_ILLEGAL_ARGUMENT_ERROR => "VG_ILLEGAL_ARGUMENT_ERROR",
        VG_OUT_OF_MEMORY_ERROR => "VG_OUT_OF_MEMORY_ERROR",
        VG_PATH_CAPABILITY_ERROR => "VG_PATH_CAPABILITY_ERROR",
        VG_UNSUPPORTED_IMAGE_FORMAT_ERROR => "VG_UNSUPPORTED_IMAGE_FORMAT_ERROR",
        VG_UNSUPPORTED_PATH_FORMAT_ERROR => "VG_UNSUPPORTED_PATH_FORMAT_ERROR",
        VG_IMAGE_IN_USE_ERROR => "VG_IMAGE_IN_USE_ERROR",
        VG_NO_CONTEXT_ERROR => "VG_NO_CONTEXT_ERROR",
        other => return format!("VG error 0x{:04X}", other),
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names() {
        assert_eq!(egl_error_name(EGL_BAD_DISPLAY), "EGL_BAD_DISPLAY");
        assert_eq!(egl_error_name(0x3100), "EGL error 0x3100");
        assert_eq!(vg_error_name(VG_BAD_HANDLE_ERROR), "VG_BAD_HANDLE_ERROR");
    }

    #[test]
    fn test_rect_layout() {
        assert_eq!(std::mem::size_of::<VC_RECT_T>(), 16);
    }
}
