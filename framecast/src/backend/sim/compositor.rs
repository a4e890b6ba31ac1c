use common::{CompositorError, DisplayHandle, ElementHandle, ElementSpec, Step, UpdateHandle};

use super::{Event, PendingOp, ResourceKind, Shared};
use crate::display::Compositor;
use crate::platform::Library;

#[derive(Clone)]
pub struct SimCompositor {
    core: Shared,
}

impl SimCompositor {
    pub(super) fn new(core: Shared) -> Self {
        Self { core }
    }
}

impl Compositor for SimCompositor {
    fn initialize(&self) -> Result<(), CompositorError> {
        let mut core = self.core.borrow_mut();
        if core.inject(Step::PlatformInit) {
            return Err(CompositorError::DisplayUnavailable {
                display: common::MAIN_DISPLAY,
            });
        }
        core.journal.record(Event::Init(Library::Compositor));
        Ok(())
    }

    fn deinitialize(&self) {
        let mut core = self.core.borrow_mut();
        core.journal.record(Event::Deinit(Library::Compositor));
    }

    fn display_size(&self, display: u32) -> Result<(u32, u32), CompositorError> {
        let mut core = self.core.borrow_mut();
        if core.inject(Step::DisplaySize) || display >= core.settings.displays {
            return Err(CompositorError::DisplaySize { display });
        }
        Ok(core.settings.display_size)
    }

    fn open_display(&self, display: u32) -> Result<DisplayHandle, CompositorError> {
        let mut core = self.core.borrow_mut();
        if core.inject(Step::DisplayOpen) || display >= core.settings.displays {
            return Err(CompositorError::DisplayUnavailable { display });
        }
        Ok(DisplayHandle(core.journal.acquire(ResourceKind::Display)))
    }

    fn close_display(&self, display: DisplayHandle) -> Result<(), CompositorError> {
        let mut core = self.core.borrow_mut();
        if core.committed.values().any(|d| *d == display.0) {
            core.journal
                .violation(format!("display {} closed with elements on it", display.0));
        }
        if !core.release(ResourceKind::Display, display.0) {
            return Err(CompositorError::DisplayClose { display: display.0 });
        }
        Ok(())
    }

    fn update_start(&self, _priority: i32) -> Result<UpdateHandle, CompositorError> {
        let mut core = self.core.borrow_mut();
        if core.inject(Step::TransactionStart) {
            return Err(CompositorError::TransactionStart);
        }
        let id = core.journal.acquire(ResourceKind::Update);
        core.updates.insert(id, Vec::new());
        Ok(UpdateHandle(id))
    }

    fn element_add(
        &self,
        update: UpdateHandle,
        display: DisplayHandle,
        spec: &ElementSpec,
    ) -> Result<ElementHandle, CompositorError> {
        let mut core = self.core.borrow_mut();
        if !core.updates.contains_key(&update.0)
            || !core.journal.is_live(ResourceKind::Display, display.0)
        {
            core.journal
                .violation("element added outside an open update or display");
            return Err(CompositorError::ElementAdd);
        }
        if core.inject(Step::ElementAdd) || spec.dest.width <= 0 || spec.dest.height <= 0 {
            return Err(CompositorError::ElementAdd);
        }
        let element = core.journal.acquire(ResourceKind::Element);
        if let Some(ops) = core.updates.get_mut(&update.0) {
            ops.push(PendingOp::Add {
                element,
                display: display.0,
            });
        }
        Ok(ElementHandle(element))
    }

    fn element_remove(
        &self,
        update: UpdateHandle,
        element: ElementHandle,
    ) -> Result<(), CompositorError> {
        let mut core = self.core.borrow_mut();
        if !core.committed.contains_key(&element.0) {
            return Err(CompositorError::ElementRemove);
        }
        if !core.updates.contains_key(&update.0) {
            core.journal.violation("element removed outside an open update");
            return Err(CompositorError::ElementRemove);
        }
        if let Some(ops) = core.updates.get_mut(&update.0) {
            ops.push(PendingOp::Remove { element: element.0 });
        }
        Ok(())
    }

    fn update_submit_sync(&self, update: UpdateHandle) -> Result<(), CompositorError> {
        let mut core = self.core.borrow_mut();
        let Some(ops) = core.updates.remove(&update.0) else {
            core.journal.violation("submit of an unknown update");
            return Err(CompositorError::TransactionSubmit);
        };
        core.journal.release(ResourceKind::Update, update.0);

        if core.inject(Step::TransactionSubmit) {
            // Nothing in a failed update takes effect.
            for op in ops {
                if let PendingOp::Add { element, .. } = op {
                    core.journal.release(ResourceKind::Element, element);
                }
            }
            return Err(CompositorError::TransactionSubmit);
        }

        for op in ops {
            match op {
                PendingOp::Add { element, display } => {
                    core.committed.insert(element, display);
                }
                PendingOp::Remove { element } => {
                    if core.surfaces.values().any(|e| *e == element) {
                        core.journal
                            .violation(format!("element {} removed under a live surface", element));
                    }
                    core.committed.remove(&element);
                    core.journal.release(ResourceKind::Element, element);
                }
            }
        }
        Ok(())
    }

    fn update_abandon(&self, update: UpdateHandle) {
        let mut core = self.core.borrow_mut();
        if let Some(ops) = core.updates.remove(&update.0) {
            for op in ops {
                if let PendingOp::Add { element, .. } = op {
                    core.journal.release(ResourceKind::Element, element);
                }
            }
            core.journal.release(ResourceKind::Update, update.0);
            core.journal.record(Event::Abandoned(ResourceKind::Update));
        }
    }
}
