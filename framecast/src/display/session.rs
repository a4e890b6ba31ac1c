use std::marker::PhantomData;

use common::{
    CompositorError, DisplayHandle, ElementHandle, ElementSpec, FixedRect,
    NativeWindowDescriptor, PipelineError, Protection, Rect, SourceResource, Step, StepExt,
    UpdateHandle,
};

use super::Compositor;
use crate::resource::ResourceHandle;

/// Where and how the overlay plane is placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplaySettings {
    pub index: u32,
    pub layer: i32,
    pub priority: i32,
    /// Destination rectangle; the whole screen when unset.
    pub dest: Option<Rect>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            index: common::MAIN_DISPLAY,
            layer: 1,
            priority: 0,
            dest: None,
        }
    }
}

/// A compositor update that is either submitted once or abandoned on drop.
pub struct UpdateTransaction<'a, C: Compositor> {
    compositor: &'a C,
    handle: ResourceHandle<'a, UpdateHandle, CompositorError>,
}

impl<'a, C: Compositor> UpdateTransaction<'a, C> {
    pub fn begin(compositor: &'a C, priority: i32) -> Result<Self, CompositorError> {
        let update = compositor.update_start(priority)?;
        let handle = ResourceHandle::new("update", update, move |update| {
            log::warn!("Abandoning unsubmitted display update");
            compositor.update_abandon(update);
            Ok(())
        });
        Ok(Self { compositor, handle })
    }

    pub fn add_element(
        &self,
        display: DisplayHandle,
        spec: &ElementSpec,
    ) -> Result<ElementHandle, CompositorError> {
        self.compositor.element_add(*self.handle.get(), display, spec)
    }

    pub fn remove_element(&self, element: ElementHandle) -> Result<(), CompositorError> {
        self.compositor.element_remove(*self.handle.get(), element)
    }

    /// Apply every queued change. Blocks until the compositor has applied it.
    pub fn submit(self) -> Result<(), CompositorError> {
        let update = self.handle.disarm();
        self.compositor.update_submit_sync(update)
    }
}

/// An open display carrying exactly one committed overlay element.
///
/// Only [`DisplaySession::establish`] creates a session, and it returns only
/// after the element's update was submitted, so a session's window
/// descriptor always refers to a committed element.
pub struct DisplaySession<'a, C: Compositor> {
    index: u32,
    size: (u32, u32),
    spec: ElementSpec,
    // Field order is release order.
    element: ResourceHandle<'a, ElementHandle, CompositorError>,
    display: ResourceHandle<'a, DisplayHandle, CompositorError>,
    _compositor: PhantomData<&'a C>,
}

impl<'a, C: Compositor> DisplaySession<'a, C> {
    /// Open the display and commit one overlay element on it.
    pub fn establish(compositor: &'a C, settings: &DisplaySettings) -> Result<Self, PipelineError> {
        let index = settings.index;
        let display = compositor.open_display(index).at(Step::DisplayOpen)?;
        let display = ResourceHandle::new("display", display, move |display| {
            compositor.close_display(display)
        });

        let size = compositor.display_size(index).at(Step::DisplaySize)?;
        log::info!("Display size: {} {}", size.0, size.1);

        let dest = match settings.dest {
            Some(dest) => dest,
            None => Rect::full_screen(size.0, size.1)
                .ok_or(CompositorError::DisplaySize { display: index })
                .at(Step::DisplaySize)?,
        };
        let src_pixels = Rect::new(0, 0, dest.width, dest.height);
        let src = FixedRect::from_pixels(src_pixels)
            .ok_or(CompositorError::SourceRectOverflow(src_pixels))
            .at(Step::ElementAdd)?;
        let spec = ElementSpec {
            layer: settings.layer,
            dest,
            source: SourceResource::None,
            src,
            protection: Protection::None,
        };

        let update = UpdateTransaction::begin(compositor, settings.priority)
            .at(Step::TransactionStart)?;
        let element = update
            .add_element(*display.get(), &spec)
            .at(Step::ElementAdd)?;
        let priority = settings.priority;
        let element = ResourceHandle::new("overlay element", element, move |element| {
            remove_element(compositor, priority, element)
        });
        log::debug!("Added overlay element on layer {} at {}", spec.layer, dest);

        update.submit().at(Step::TransactionSubmit)?;
        log::info!("Overlay element committed on display {}", index);

        Ok(Self {
            index,
            size,
            spec,
            element,
            display,
            _compositor: PhantomData,
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn element_spec(&self) -> &ElementSpec {
        &self.spec
    }

    pub fn element(&self) -> ElementHandle {
        *self.element.get()
    }

    /// Native window for the GPU layer, sized to the plane's destination.
    pub fn window_descriptor(&self) -> NativeWindowDescriptor {
        NativeWindowDescriptor::new(self.element(), self.spec.dest.width, self.spec.dest.height)
    }

    /// Remove the element, then close the display, reporting the first failure.
    pub fn close(self) -> Result<(), CompositorError> {
        let Self {
            element, display, ..
        } = self;
        let removed = element.release();
        let closed = display.release();
        removed.and(closed)
    }
}

fn remove_element<C: Compositor>(
    compositor: &C,
    priority: i32,
    element: ElementHandle,
) -> Result<(), CompositorError> {
    let update = UpdateTransaction::begin(compositor, priority)?;
    update.remove_element(element)?;
    update.submit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::sim::{Event, ResourceKind, SimSettings, SimWorld};

    #[test]
    fn test_establish_commits_full_screen_element() {
        let world = SimWorld::new(SimSettings::default());
        let session =
            DisplaySession::establish(&world.compositor, &DisplaySettings::default()).unwrap();

        assert_eq!(session.size(), (1024, 768));
        let spec = session.element_spec();
        assert_eq!(spec.layer, 1);
        assert_eq!(spec.dest, Rect::new(0, 0, 1024, 768));
        assert_eq!(spec.src.width, 1024 << 16);
        assert_eq!(spec.src.height, 768 << 16);
        assert!(world.core().is_committed(session.element()));

        let window = session.window_descriptor();
        assert_eq!((window.width, window.height), (1024, 768));
        assert_eq!(window.element, session.element());

        session.close().unwrap();
        assert!(world.core().journal.live().is_empty());
    }

    #[test]
    fn test_explicit_destination() {
        let world = SimWorld::new(SimSettings::default());
        let settings = DisplaySettings {
            dest: Some(Rect::new(100, 50, 640, 480)),
            layer: 3,
            ..DisplaySettings::default()
        };
        let session = DisplaySession::establish(&world.compositor, &settings).unwrap();
        assert_eq!(session.element_spec().src.to_pixels(), Rect::new(0, 0, 640, 480));
        assert_eq!(session.window_descriptor().width, 640);
    }

    #[test]
    fn test_element_add_failure_abandons_update() {
        let world = SimWorld::new(SimSettings {
            fail_at: Some(Step::ElementAdd),
            ..SimSettings::default()
        });
        let err = DisplaySession::establish(&world.compositor, &DisplaySettings::default())
            .err()
            .unwrap();
        assert_eq!(err.step, Step::ElementAdd);

        let core = world.core();
        assert!(core.journal.live().is_empty());
        assert!(core.journal.events().contains(&Event::Abandoned(ResourceKind::Update)));
    }

    #[test]
    fn test_unopenable_display() {
        let world = SimWorld::new(SimSettings::default());
        let settings = DisplaySettings {
            index: 5,
            ..DisplaySettings::default()
        };
        let err = DisplaySession::establish(&world.compositor, &settings)
            .err()
            .unwrap();
        assert_eq!(err.step, Step::DisplayOpen);
        assert_eq!(
            err.source,
            CompositorError::DisplayUnavailable { display: 5 }.into()
        );
    }
}
