use common::{
    ClientApi, ConfigHandle, ContextHandle, GraphicsAttributes, GraphicsDisplay, GraphicsError,
    NativeDisplay, NativeWindowDescriptor, Step, SurfaceHandle,
};

use super::{Event, ResourceKind, Shared};
use crate::gpu::{ConfigCandidate, GraphicsLayer};

/// Version string reported by `initialize`.
const VERSION: &str = "1.4";

#[derive(Clone)]
pub struct SimGraphics {
    core: Shared,
}

impl SimGraphics {
    pub(super) fn new(core: Shared) -> Self {
        Self { core }
    }

    fn check_display(&self, display: GraphicsDisplay) -> Result<(), GraphicsError> {
        let mut core = self.core.borrow_mut();
        if core.journal.is_live(ResourceKind::GraphicsDisplay, id(display.0)) {
            Ok(())
        } else {
            core.journal.violation("call on an unbound GPU display");
            Err(GraphicsError::DisplayBind("EGL_BAD_DISPLAY".to_string()))
        }
    }
}

fn id(handle: usize) -> u32 {
    u32::try_from(handle).unwrap_or(u32::MAX)
}

impl GraphicsLayer for SimGraphics {
    fn get_display(&self, _native: NativeDisplay) -> Result<GraphicsDisplay, GraphicsError> {
        let mut core = self.core.borrow_mut();
        if core.inject(Step::GraphicsBind) {
            return Err(GraphicsError::DisplayBind("EGL_BAD_DISPLAY".to_string()));
        }
        let display = core.journal.acquire(ResourceKind::GraphicsDisplay);
        Ok(GraphicsDisplay(display as usize))
    }

    fn initialize(&self, display: GraphicsDisplay) -> Result<String, GraphicsError> {
        self.check_display(display)?;
        Ok(VERSION.to_string())
    }

    fn bind_api(&self, _api: ClientApi) -> Result<(), GraphicsError> {
        Ok(())
    }

    fn choose_configs(
        &self,
        display: GraphicsDisplay,
        _wanted: &GraphicsAttributes,
    ) -> Result<Vec<ConfigCandidate>, GraphicsError> {
        self.check_display(display)?;
        let mut core = self.core.borrow_mut();
        if core.inject(Step::ConfigSelect) {
            return Ok(Vec::new());
        }
        Ok(core
            .settings
            .configs
            .iter()
            .enumerate()
            .map(|(index, attributes)| ConfigCandidate {
                handle: ConfigHandle(index + 1),
                attributes: *attributes,
            })
            .collect())
    }

    fn create_window_surface(
        &self,
        display: GraphicsDisplay,
        config: ConfigHandle,
        window: &NativeWindowDescriptor,
    ) -> Result<SurfaceHandle, GraphicsError> {
        self.check_display(display)?;
        let mut core = self.core.borrow_mut();
        if core.inject(Step::SurfaceCreate) {
            return Err(GraphicsError::SurfaceCreate("EGL_BAD_ALLOC".to_string()));
        }
        if config.0 == 0 || config.0 > core.settings.configs.len() {
            return Err(GraphicsError::SurfaceCreate("EGL_BAD_CONFIG".to_string()));
        }
        let element = window.element.0;
        if !core.committed.contains_key(&element) {
            core.journal.violation(format!(
                "surface created on uncommitted element {}",
                element
            ));
            return Err(GraphicsError::SurfaceCreate(
                "EGL_BAD_NATIVE_WINDOW".to_string(),
            ));
        }
        let surface = core.journal.acquire(ResourceKind::Surface);
        core.surfaces.insert(surface, element);
        Ok(SurfaceHandle(surface as usize))
    }

    fn destroy_surface(
        &self,
        display: GraphicsDisplay,
        surface: SurfaceHandle,
    ) -> Result<(), GraphicsError> {
        self.check_display(display)?;
        let mut core = self.core.borrow_mut();
        let surface = id(surface.0);
        if core.current.is_some_and(|(s, _, _)| s == surface) {
            core.journal.violation("current surface destroyed");
        }
        if !core.release(ResourceKind::Surface, surface) {
            return Err(GraphicsError::Release("EGL_BAD_SURFACE".to_string()));
        }
        core.surfaces.remove(&surface);
        Ok(())
    }

    fn create_context(
        &self,
        display: GraphicsDisplay,
        config: ConfigHandle,
    ) -> Result<ContextHandle, GraphicsError> {
        self.check_display(display)?;
        let mut core = self.core.borrow_mut();
        if core.inject(Step::ContextCreate) {
            return Err(GraphicsError::ContextCreate("EGL_BAD_ALLOC".to_string()));
        }
        if config.0 == 0 || config.0 > core.settings.configs.len() {
            return Err(GraphicsError::ContextCreate("EGL_BAD_CONFIG".to_string()));
        }
        let context = core.journal.acquire(ResourceKind::Context);
        Ok(ContextHandle(context as usize))
    }

    fn destroy_context(
        &self,
        display: GraphicsDisplay,
        context: ContextHandle,
    ) -> Result<(), GraphicsError> {
        self.check_display(display)?;
        let mut core = self.core.borrow_mut();
        let context = id(context.0);
        if core.current.is_some_and(|(_, c, _)| c == context) {
            core.journal.violation("current context destroyed");
        }
        if !core.release(ResourceKind::Context, context) {
            return Err(GraphicsError::Release("EGL_BAD_CONTEXT".to_string()));
        }
        Ok(())
    }

    fn make_current(
        &self,
        display: GraphicsDisplay,
        binding: Option<(SurfaceHandle, ContextHandle)>,
    ) -> Result<(), GraphicsError> {
        self.check_display(display)?;
        let mut core = self.core.borrow_mut();
        match binding {
            Some((surface, context)) => {
                if core.inject(Step::MakeCurrent) {
                    return Err(GraphicsError::MakeCurrentFailed("EGL_BAD_MATCH".to_string()));
                }
                let (surface, context) = (id(surface.0), id(context.0));
                if !core.journal.is_live(ResourceKind::Surface, surface)
                    || !core.journal.is_live(ResourceKind::Context, context)
                {
                    core.journal.violation("make-current on a dead surface or context");
                    return Err(GraphicsError::MakeCurrentFailed(
                        "EGL_BAD_MATCH".to_string(),
                    ));
                }
                if let Some((_, _, previous)) = core.current.take() {
                    core.journal.release(ResourceKind::CurrentBinding, previous);
                }
                let binding = core.journal.acquire(ResourceKind::CurrentBinding);
                core.current = Some((surface, context, binding));
            }
            None => {
                if let Some((_, _, binding)) = core.current.take() {
                    core.journal.release(ResourceKind::CurrentBinding, binding);
                }
            }
        }
        Ok(())
    }

    fn swap_buffers(
        &self,
        display: GraphicsDisplay,
        surface: SurfaceHandle,
    ) -> Result<(), GraphicsError> {
        self.check_display(display)?;
        let mut core = self.core.borrow_mut();
        if core.inject(Step::Present) {
            return Err(GraphicsError::SwapFailed("EGL_BAD_SURFACE".to_string()));
        }
        if !core.current.is_some_and(|(s, _, _)| s == id(surface.0)) {
            core.journal.violation("swap of a surface that is not current");
            return Err(GraphicsError::SwapFailed("EGL_BAD_SURFACE".to_string()));
        }
        core.journal.record(Event::Present);
        Ok(())
    }

    fn terminate(&self, display: GraphicsDisplay) -> Result<(), GraphicsError> {
        let mut core = self.core.borrow_mut();
        if !core.journal.live_of(ResourceKind::Surface).is_empty()
            || !core.journal.live_of(ResourceKind::Context).is_empty()
        {
            core.journal
                .violation("GPU display terminated with a live surface or context");
        }
        if !core.release(ResourceKind::GraphicsDisplay, id(display.0)) {
            return Err(GraphicsError::Terminate("EGL_BAD_DISPLAY".to_string()));
        }
        Ok(())
    }
}
