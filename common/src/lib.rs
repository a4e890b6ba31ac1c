//! Common types and utilities for framecast.
//!
//! This crate defines the vocabulary shared by the pipeline core and every
//! subsystem backend: native handle newtypes, rectangles in pixel and
//! fixed-point space, the native-window descriptor handed from the compositor
//! to the GPU layer, drawing formats, the pipeline [`Step`] sequence and the
//! error taxonomy.
//!
//! Everything here is plain data. Types that end up in a [`RunReport`] are
//! serializable so the CLI can print the outcome of a run as JSON.
//!
//! # Examples
//!
//! ```
//! use common::{FixedRect, Rect};
//!
//! // Full-screen source rectangle for a 1024x768 overlay plane
//! let src = FixedRect::from_pixels(Rect::new(0, 0, 1024, 768)).unwrap();
//! assert_eq!(src.width, 1024 << 16);
//! assert_eq!(src.to_pixels(), Rect::new(0, 0, 1024, 768));
//! ```

mod error;

pub use error::{
    CompositorError, DecodeError, DrawError, ErrorKind, GraphicsError, PipelineError, StepExt,
    SubsystemError,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of fractional bits in compositor source rectangles.
pub const FIXED_POINT_SHIFT: u32 = 16;

/// Display index of the main LCD on the compositor.
pub const MAIN_DISPLAY: u32 = 0;

/// An integer rectangle in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering a whole display of the given size.
    pub fn full_screen(width: u32, height: u32) -> Option<Self> {
        Some(Self::new(
            0,
            0,
            i32::try_from(width).ok()?,
            i32::try_from(height).ok()?,
        ))
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// A rectangle in compositor fixed-point space (pixels << 16).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixedRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl FixedRect {
    /// Scale a pixel rectangle into fixed-point space.
    ///
    /// Returns `None` when any coordinate does not fit after scaling.
    pub fn from_pixels(rect: Rect) -> Option<Self> {
        let scale = 1i32 << FIXED_POINT_SHIFT;
        Some(Self {
            x: rect.x.checked_mul(scale)?,
            y: rect.y.checked_mul(scale)?,
            width: rect.width.checked_mul(scale)?,
            height: rect.height.checked_mul(scale)?,
        })
    }

    /// Integer pixel part of every coordinate.
    pub fn to_pixels(&self) -> Rect {
        Rect::new(
            self.x >> FIXED_POINT_SHIFT,
            self.y >> FIXED_POINT_SHIFT,
            self.width >> FIXED_POINT_SHIFT,
            self.height >> FIXED_POINT_SHIFT,
        )
    }
}

/// Opened compositor display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayHandle(pub u32);

/// In-flight compositor update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UpdateHandle(pub u32);

/// Hardware overlay plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ElementHandle(pub u32);

/// Pixel source backing an overlay element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SourceResource {
    /// No backing pixels; the plane is only an attachment point for GPU output.
    #[default]
    None,
    Resource(u32),
}

impl SourceResource {
    pub fn raw(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Resource(handle) => handle,
        }
    }
}

/// Content protection requested for an overlay element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Protection {
    #[default]
    None,
}

/// Everything needed to place one overlay element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSpec {
    pub layer: i32,
    pub dest: Rect,
    pub source: SourceResource,
    pub src: FixedRect,
    pub protection: Protection,
}

/// The value a GPU layer consumes to create a window surface on an overlay
/// element.
///
/// Layout matches `EGL_DISPMANX_WINDOW_T` so a reference to it can be passed
/// straight through as the native window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(C)]
pub struct NativeWindowDescriptor {
    pub element: ElementHandle,
    pub width: i32,
    pub height: i32,
}

impl NativeWindowDescriptor {
    pub fn new(element: ElementHandle, width: i32, height: i32) -> Self {
        Self {
            element,
            width,
            height,
        }
    }
}

/// Native display the GPU layer binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NativeDisplay {
    #[default]
    Default,
}

/// Client rendering API bound on the GPU display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClientApi {
    #[default]
    OpenVg,
    OpenGlEs,
}

/// Bound GPU display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphicsDisplay(pub usize);

/// Selected framebuffer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigHandle(pub usize);

/// Rendering surface on a native window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceHandle(pub usize);

/// Rendering context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextHandle(pub usize);

/// GPU-visible image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageHandle(pub u32);

/// Framebuffer attributes requested from (or offered by) the GPU layer.
///
/// `luminance: None` means "don't care" when used as a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphicsAttributes {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
    pub luminance: Option<u8>,
    pub samples: u8,
}

impl Default for GraphicsAttributes {
    fn default() -> Self {
        Self {
            red: 8,
            green: 8,
            blue: 8,
            alpha: 8,
            luminance: None,
            samples: 1,
        }
    }
}

impl GraphicsAttributes {
    /// Whether an offered configuration satisfies this request exactly.
    pub fn matches(&self, offered: &GraphicsAttributes) -> bool {
        self.red == offered.red
            && self.green == offered.green
            && self.blue == offered.blue
            && self.alpha == offered.alpha
            && self.samples == offered.samples
            && self
                .luminance
                .is_none_or(|wanted| offered.luminance == Some(wanted))
    }
}

impl fmt::Display for GraphicsAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "R{}G{}B{}A{}",
            self.red, self.green, self.blue, self.alpha
        )?;
        if let Some(luminance) = self.luminance {
            write!(f, "L{}", luminance)?;
        }
        write!(f, " x{}", self.samples)
    }
}

/// Pixel format of decoded frames and GPU images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 32-bit sRGB, 8 bits per channel, padding byte instead of alpha.
    #[default]
    Srgbx8888,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Srgbx8888 => 4,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "srgbx8888" => Some(Self::Srgbx8888),
            _ => None,
        }
    }

    /// Pack one RGBA pixel into this format's in-memory byte order.
    ///
    /// Pixels are 32-bit words in native endianness with red in the most
    /// significant byte. Alpha is replaced by the padding byte.
    pub fn pack_rgba(self, [r, g, b, _a]: [u8; 4]) -> [u8; 4] {
        match self {
            Self::Srgbx8888 => u32::from_be_bytes([r, g, b, 0xff]).to_ne_bytes(),
        }
    }

    /// Bytes needed for `height` rows of `stride` bytes, the last one `width`
    /// pixels wide.
    pub fn buffer_len(self, width: u32, height: u32, stride: usize) -> Option<usize> {
        let row = (width as usize).checked_mul(self.bytes_per_pixel())?;
        if height == 0 {
            return Some(0);
        }
        stride
            .checked_mul(height as usize - 1)?
            .checked_add(row)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Srgbx8888 => write!(f, "srgbx8888"),
        }
    }
}

/// Image quality hints for GPU image creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageQuality {
    Nonantialiased,
    Faster,
    Better,
}

impl ImageQuality {
    pub fn bit(self) -> u32 {
        match self {
            Self::Nonantialiased => 1 << 0,
            Self::Faster => 1 << 1,
            Self::Better => 1 << 2,
        }
    }

    /// Combine a set of hints into the drawing layer's bitfield.
    pub fn bitfield(qualities: &[ImageQuality]) -> u32 {
        qualities.iter().fold(0, |bits, q| bits | q.bit())
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "nonantialiased" => Some(Self::Nonantialiased),
            "faster" => Some(Self::Faster),
            "better" => Some(Self::Better),
            _ => None,
        }
    }
}

/// One step of the compositing pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    PlatformInit,
    DisplayOpen,
    DisplaySize,
    TransactionStart,
    ElementAdd,
    TransactionSubmit,
    GraphicsBind,
    ConfigSelect,
    SurfaceCreate,
    ContextCreate,
    MakeCurrent,
    FormatResolve,
    SourceOpen,
    PacketRead,
    StreamSelect,
    DecoderOpen,
    PacketSend,
    FrameReceive,
    ImageCreate,
    ImageUpload,
    ImageDraw,
    Present,
    Teardown,
}

impl Step {
    /// Every step of a run, in order.
    pub const ALL: [Step; 23] = [
        Step::PlatformInit,
        Step::DisplayOpen,
        Step::DisplaySize,
        Step::TransactionStart,
        Step::ElementAdd,
        Step::TransactionSubmit,
        Step::GraphicsBind,
        Step::ConfigSelect,
        Step::SurfaceCreate,
        Step::ContextCreate,
        Step::MakeCurrent,
        Step::FormatResolve,
        Step::SourceOpen,
        Step::PacketRead,
        Step::StreamSelect,
        Step::DecoderOpen,
        Step::PacketSend,
        Step::FrameReceive,
        Step::ImageCreate,
        Step::ImageUpload,
        Step::ImageDraw,
        Step::Present,
        Step::Teardown,
    ];

    /// Steps that leave a resource behind which must later be released.
    pub fn acquires(self) -> bool {
        matches!(
            self,
            Step::DisplayOpen
                | Step::TransactionStart
                | Step::ElementAdd
                | Step::GraphicsBind
                | Step::SurfaceCreate
                | Step::ContextCreate
                | Step::MakeCurrent
                | Step::SourceOpen
                | Step::PacketRead
                | Step::DecoderOpen
                | Step::FrameReceive
                | Step::ImageCreate
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Step::PlatformInit => "platform-init",
            Step::DisplayOpen => "display-open",
            Step::DisplaySize => "display-size",
            Step::TransactionStart => "transaction-start",
            Step::ElementAdd => "element-add",
            Step::TransactionSubmit => "transaction-submit",
            Step::GraphicsBind => "graphics-bind",
            Step::ConfigSelect => "config-select",
            Step::SurfaceCreate => "surface-create",
            Step::ContextCreate => "context-create",
            Step::MakeCurrent => "make-current",
            Step::FormatResolve => "format-resolve",
            Step::SourceOpen => "source-open",
            Step::PacketRead => "packet-read",
            Step::StreamSelect => "stream-select",
            Step::DecoderOpen => "decoder-open",
            Step::PacketSend => "packet-send",
            Step::FrameReceive => "frame-receive",
            Step::ImageCreate => "image-create",
            Step::ImageUpload => "image-upload",
            Step::ImageDraw => "image-draw",
            Step::Present => "present",
            Step::Teardown => "teardown",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.name() == name)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stream elected for decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub index: usize,
    pub codec: String,
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for StreamInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stream #{}: {} {}x{}",
            self.index, self.codec, self.width, self.height
        )
    }
}

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub display_size: (u32, u32),
    pub element: ElementSpec,
    pub graphics_version: String,
    pub config: GraphicsAttributes,
    pub stream: StreamInfo,
    pub frame_size: (u32, u32),
    pub decode_attempts: u32,
    pub packets_sent: u32,
    pub presents: u32,
}
