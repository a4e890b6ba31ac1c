//! Display compositor access
//!
//! - `session`: `DisplaySession`, one display with one committed overlay plane
//!
//! The compositor itself is an external subsystem reached through the
//! [`Compositor`] trait. Handles are plain integers; ownership lives in
//! [`crate::resource::ResourceHandle`]s held by the session.

mod session;

pub use session::{DisplaySession, DisplaySettings, UpdateTransaction};

use common::{CompositorError, DisplayHandle, ElementHandle, ElementSpec, UpdateHandle};

/// Hardware display compositor (dispmanx-shaped).
pub trait Compositor {
    /// Process-wide library initialization. Called once per orchestrator.
    fn initialize(&self) -> Result<(), CompositorError> {
        Ok(())
    }

    fn deinitialize(&self) {}

    fn display_size(&self, display: u32) -> Result<(u32, u32), CompositorError>;

    fn open_display(&self, display: u32) -> Result<DisplayHandle, CompositorError>;

    fn close_display(&self, display: DisplayHandle) -> Result<(), CompositorError>;

    fn update_start(&self, priority: i32) -> Result<UpdateHandle, CompositorError>;

    fn element_add(
        &self,
        update: UpdateHandle,
        display: DisplayHandle,
        spec: &ElementSpec,
    ) -> Result<ElementHandle, CompositorError>;

    fn element_remove(
        &self,
        update: UpdateHandle,
        element: ElementHandle,
    ) -> Result<(), CompositorError>;

    /// Apply the update and block until the hardware has taken it.
    ///
    /// The update handle is spent afterwards, whether or not this succeeds.
    fn update_submit_sync(&self, update: UpdateHandle) -> Result<(), CompositorError>;

    /// Drop an update that will never be submitted.
    fn update_abandon(&self, update: UpdateHandle);
}
