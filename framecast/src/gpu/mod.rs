/// GPU context layer access (EGL-shaped)
///
/// - `config`: exact-match framebuffer configuration selection
/// - `context`: `RenderContext`, the display binding, surface and context
///   for one native window
pub mod config;
pub mod context;

pub use config::{ConfigCandidate, GraphicsConfig, select_config};
pub use context::{Current, GraphicsSettings, RenderContext};

use common::{
    ClientApi, ConfigHandle, ContextHandle, GraphicsAttributes, GraphicsDisplay, GraphicsError,
    NativeDisplay, NativeWindowDescriptor, SurfaceHandle,
};

/// GPU context layer bound to native windows.
pub trait GraphicsLayer {
    fn get_display(&self, native: NativeDisplay) -> Result<GraphicsDisplay, GraphicsError>;

    /// Capability handshake. Returns the implementation's "major.minor" version.
    fn initialize(&self, display: GraphicsDisplay) -> Result<String, GraphicsError>;

    fn bind_api(&self, api: ClientApi) -> Result<(), GraphicsError>;

    /// Configurations the implementation offers for the requested attributes.
    fn choose_configs(
        &self,
        display: GraphicsDisplay,
        wanted: &GraphicsAttributes,
    ) -> Result<Vec<ConfigCandidate>, GraphicsError>;

    /// The window must stay valid for as long as the surface exists.
    fn create_window_surface(
        &self,
        display: GraphicsDisplay,
        config: ConfigHandle,
        window: &NativeWindowDescriptor,
    ) -> Result<SurfaceHandle, GraphicsError>;

    fn destroy_surface(
        &self,
        display: GraphicsDisplay,
        surface: SurfaceHandle,
    ) -> Result<(), GraphicsError>;

    fn create_context(
        &self,
        display: GraphicsDisplay,
        config: ConfigHandle,
    ) -> Result<ContextHandle, GraphicsError>;

    fn destroy_context(
        &self,
        display: GraphicsDisplay,
        context: ContextHandle,
    ) -> Result<(), GraphicsError>;

    /// Bind (or with `None`, unbind) a surface and context on the calling thread.
    fn make_current(
        &self,
        display: GraphicsDisplay,
        binding: Option<(SurfaceHandle, ContextHandle)>,
    ) -> Result<(), GraphicsError>;

    fn swap_buffers(
        &self,
        display: GraphicsDisplay,
        surface: SurfaceHandle,
    ) -> Result<(), GraphicsError>;

    fn terminate(&self, display: GraphicsDisplay) -> Result<(), GraphicsError>;
}
