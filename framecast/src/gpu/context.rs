/// Rendering context management - GPU display binding, surface and context
use std::marker::PhantomData;

use common::{
    ClientApi, ContextHandle, GraphicsAttributes, GraphicsDisplay, GraphicsError, NativeDisplay,
    NativeWindowDescriptor, PipelineError, Step, StepExt, SurfaceHandle,
};

use super::{GraphicsConfig, GraphicsLayer, select_config};
use crate::resource::ResourceHandle;

/// What to bind and which framebuffer to ask for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GraphicsSettings {
    pub native: NativeDisplay,
    pub api: ClientApi,
    pub attributes: GraphicsAttributes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenderState {
    Bound,
    Configured,
    Current,
}

/// Proof that a surface and context are current on this thread.
///
/// Drawing calls take a `&Current` so they cannot run before
/// [`RenderContext::make_current`].
#[derive(Debug)]
pub struct Current<'r> {
    surface: SurfaceHandle,
    width: i32,
    height: i32,
    _context: PhantomData<&'r ()>,
}

impl Current<'_> {
    pub fn surface(&self) -> SurfaceHandle {
        self.surface
    }

    /// Size of the native window behind the current surface.
    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }
}

/// GPU display binding plus one window surface and one context.
///
/// Walks Bound → Configured → (surface ∧ context) → Current → present*.
/// Calls made out of that order are programming errors: they assert in debug
/// builds and return a sequencing error otherwise.
pub struct RenderContext<'a, 'w, G: GraphicsLayer> {
    gfx: &'a G,
    state: RenderState,
    version: String,
    config: Option<GraphicsConfig>,
    window: Option<&'w NativeWindowDescriptor>,
    presents: u32,
    // Field order is release order.
    current: Option<ResourceHandle<'a, (), GraphicsError>>,
    context: Option<ResourceHandle<'a, ContextHandle, GraphicsError>>,
    surface: Option<ResourceHandle<'a, SurfaceHandle, GraphicsError>>,
    display: ResourceHandle<'a, GraphicsDisplay, GraphicsError>,
}

impl<'a, 'w, G: GraphicsLayer> RenderContext<'a, 'w, G> {
    /// Bind and initialize the GPU display, then bind the client API.
    pub fn bind(gfx: &'a G, settings: &GraphicsSettings) -> Result<Self, PipelineError> {
        let display = gfx.get_display(settings.native).at(Step::GraphicsBind)?;
        let display = ResourceHandle::new("graphics display", display, move |display| {
            gfx.terminate(display)
        });

        let version = gfx.initialize(*display.get()).at(Step::GraphicsBind)?;
        log::info!("EGL version: {}", version);
        gfx.bind_api(settings.api).at(Step::GraphicsBind)?;

        Ok(Self {
            gfx,
            state: RenderState::Bound,
            version,
            config: None,
            window: None,
            presents: 0,
            current: None,
            context: None,
            surface: None,
            display,
        })
    }

    pub fn select_config(
        &mut self,
        wanted: &GraphicsAttributes,
    ) -> Result<GraphicsConfig, PipelineError> {
        ensure(
            Step::ConfigSelect,
            self.state == RenderState::Bound,
            "config already selected",
        )?;

        let candidates = self
            .gfx
            .choose_configs(*self.display.get(), wanted)
            .at(Step::ConfigSelect)?;
        let config = select_config(&candidates, wanted).at(Step::ConfigSelect)?;
        log::debug!(
            "Selected config {:?} ({}) out of {} candidate(s)",
            config.handle(),
            config.attributes(),
            candidates.len()
        );

        self.config = Some(config);
        self.state = RenderState::Configured;
        Ok(config)
    }

    /// Create the window surface. `window` must outlive this context.
    pub fn create_window_surface(
        &mut self,
        window: &'w NativeWindowDescriptor,
    ) -> Result<SurfaceHandle, PipelineError> {
        let config = self.configured(Step::SurfaceCreate)?;
        ensure(
            Step::SurfaceCreate,
            self.surface.is_none(),
            "surface already created",
        )?;

        let display = *self.display.get();
        let gfx = self.gfx;
        let surface = gfx
            .create_window_surface(display, config.handle(), window)
            .at(Step::SurfaceCreate)?;
        self.surface = Some(ResourceHandle::new("surface", surface, move |surface| {
            gfx.destroy_surface(display, surface)
        }));
        self.window = Some(window);
        log::debug!(
            "Created window surface {}x{} on element {:?}",
            window.width,
            window.height,
            window.element
        );
        Ok(surface)
    }

    pub fn create_context(&mut self) -> Result<ContextHandle, PipelineError> {
        let config = self.configured(Step::ContextCreate)?;
        ensure(
            Step::ContextCreate,
            self.context.is_none(),
            "context already created",
        )?;

        let display = *self.display.get();
        let gfx = self.gfx;
        let context = gfx
            .create_context(display, config.handle())
            .at(Step::ContextCreate)?;
        self.context = Some(ResourceHandle::new("context", context, move |context| {
            gfx.destroy_context(display, context)
        }));
        Ok(context)
    }

    /// Bind surface and context to the calling thread.
    pub fn make_current(&mut self) -> Result<(), PipelineError> {
        let (Some(surface), Some(context)) = (&self.surface, &self.context) else {
            return Err(sequencing(
                Step::MakeCurrent,
                "make-current needs both a surface and a context",
            ));
        };
        ensure(
            Step::MakeCurrent,
            self.state == RenderState::Configured,
            "already current",
        )?;

        let display = *self.display.get();
        let gfx = self.gfx;
        gfx.make_current(display, Some((*surface.get(), *context.get())))
            .at(Step::MakeCurrent)?;
        self.current = Some(ResourceHandle::new("current binding", (), move |()| {
            gfx.make_current(display, None)
        }));
        self.state = RenderState::Current;
        Ok(())
    }

    /// Proof of a current binding, for drawing calls.
    pub fn current(&self) -> Result<Current<'_>, PipelineError> {
        ensure(
            Step::ImageUpload,
            self.state == RenderState::Current,
            "drawing before make-current",
        )?;
        let (surface, window) = match (&self.surface, self.window) {
            (Some(surface), Some(window)) => (*surface.get(), window),
            _ => return Err(sequencing(Step::ImageUpload, "no surface")),
        };
        Ok(Current {
            surface,
            width: window.width,
            height: window.height,
            _context: PhantomData,
        })
    }

    /// Swap the back buffer onto the overlay.
    pub fn present(&mut self) -> Result<(), PipelineError> {
        ensure(
            Step::Present,
            self.state == RenderState::Current,
            "present before make-current",
        )?;
        let surface = match &self.surface {
            Some(surface) => *surface.get(),
            None => return Err(sequencing(Step::Present, "no surface")),
        };
        self.gfx
            .swap_buffers(*self.display.get(), surface)
            .at(Step::Present)?;
        self.presents += 1;
        Ok(())
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn config(&self) -> Option<&GraphicsConfig> {
        self.config.as_ref()
    }

    pub fn presents(&self) -> u32 {
        self.presents
    }

    /// Unbind, destroy context and surface, then terminate the display.
    pub fn terminate(self) -> Result<(), GraphicsError> {
        let Self {
            current,
            context,
            surface,
            display,
            ..
        } = self;
        let unbound = current.map_or(Ok(()), ResourceHandle::release);
        let context = context.map_or(Ok(()), ResourceHandle::release);
        let surface = surface.map_or(Ok(()), ResourceHandle::release);
        let terminated = display.release();
        unbound.and(context).and(surface).and(terminated)
    }

    fn configured(&self, step: Step) -> Result<GraphicsConfig, PipelineError> {
        match (self.state, self.config) {
            (RenderState::Configured, Some(config)) => Ok(config),
            _ => Err(sequencing(step, "no configuration selected")),
        }
    }
}

fn sequencing(step: Step, detail: &str) -> PipelineError {
    debug_assert!(false, "{step}: {detail}");
    PipelineError::sequencing(step, detail)
}

fn ensure(step: Step, ok: bool, detail: &str) -> Result<(), PipelineError> {
    if ok { Ok(()) } else { Err(sequencing(step, detail)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::sim::{ResourceKind, SimSettings, SimWorld};
    use common::{ElementHandle, ErrorKind};

    fn committed_window(world: &SimWorld) -> NativeWindowDescriptor {
        let element = world.core_mut().commit_test_element();
        NativeWindowDescriptor::new(element, 1024, 768)
    }

    #[test]
    fn test_full_bring_up_and_terminate() {
        let world = SimWorld::new(SimSettings::default());
        let window = committed_window(&world);

        let mut render = RenderContext::bind(&world.graphics, &GraphicsSettings::default()).unwrap();
        assert_eq!(render.version(), "1.4");
        render.select_config(&GraphicsAttributes::default()).unwrap();
        render.create_window_surface(&window).unwrap();
        render.create_context().unwrap();
        render.make_current().unwrap();
        assert_eq!(render.current().unwrap().size(), (1024, 768));
        render.present().unwrap();
        assert_eq!(render.presents(), 1);
        render.terminate().unwrap();

        let core = world.core();
        assert_eq!(core.journal.presents(), 1);
        assert_eq!(
            core.journal.live(),
            vec![(ResourceKind::Element, window.element.0)]
        );
        assert!(core.journal.violations().is_empty());
    }

    #[test]
    fn test_drop_releases_in_reverse_order() {
        let world = SimWorld::new(SimSettings::default());
        let window = committed_window(&world);
        {
            let mut render =
                RenderContext::bind(&world.graphics, &GraphicsSettings::default()).unwrap();
            render.select_config(&GraphicsAttributes::default()).unwrap();
            render.create_window_surface(&window).unwrap();
            render.create_context().unwrap();
            render.make_current().unwrap();
        }
        let released: Vec<ResourceKind> = world
            .core()
            .journal
            .releases()
            .into_iter()
            .map(|(kind, _)| kind)
            .collect();
        assert_eq!(
            released,
            vec![
                ResourceKind::CurrentBinding,
                ResourceKind::Context,
                ResourceKind::Surface,
                ResourceKind::GraphicsDisplay,
            ]
        );
    }

    #[test]
    fn test_surface_on_uncommitted_element_is_rejected() {
        let world = SimWorld::new(SimSettings::default());
        let window = NativeWindowDescriptor::new(ElementHandle(99), 1024, 768);
        let mut render = RenderContext::bind(&world.graphics, &GraphicsSettings::default()).unwrap();
        render.select_config(&GraphicsAttributes::default()).unwrap();
        let err = render.create_window_surface(&window).unwrap_err();
        assert_eq!(err.step, Step::SurfaceCreate);
    }

    #[test]
    fn test_no_matching_config() {
        let world = SimWorld::new(SimSettings {
            configs: vec![GraphicsAttributes {
                red: 5,
                green: 6,
                blue: 5,
                alpha: 0,
                luminance: Some(0),
                samples: 1,
            }],
            ..SimSettings::default()
        });
        let mut render = RenderContext::bind(&world.graphics, &GraphicsSettings::default()).unwrap();
        let err = render
            .select_config(&GraphicsAttributes::default())
            .unwrap_err();
        assert_eq!(err.step, Step::ConfigSelect);
        assert_eq!(err.kind(), ErrorKind::NegotiationFailure);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "present before make-current"))]
    fn test_present_before_make_current_is_a_sequencing_violation() {
        let world = SimWorld::new(SimSettings::default());
        let mut render = RenderContext::bind(&world.graphics, &GraphicsSettings::default()).unwrap();
        render.select_config(&GraphicsAttributes::default()).unwrap();
        let err = render.present().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SequencingViolation);
    }
}
