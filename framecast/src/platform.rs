//! Process-wide native library initialization
use common::{PipelineError, Step, SubsystemError};

use crate::display::Compositor;
use crate::frame::DrawingLayer;
use crate::gpu::GraphicsLayer;
use crate::orchestrator::Subsystems;
use crate::video::DecodeLayer;

/// A library with global init/deinit calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Library {
    Compositor,
    Decode,
    Drawing,
}

impl Library {
    /// Initialization order. Deinitialization runs the other way round.
    pub const ORDER: [Library; 3] = [Library::Compositor, Library::Decode, Library::Drawing];
}

/// Libraries initialized so far.
///
/// The guard does not own the subsystems, so whoever owns both must call
/// [`PlatformGuard::release`]; the orchestrator does so when dropped.
#[derive(Debug, Default)]
pub struct PlatformGuard {
    initialized: Vec<Library>,
}

impl PlatformGuard {
    /// Initialize every library, rolling back the ones already done if one
    /// fails.
    pub fn initialize<C, G, D, V>(subsystems: &Subsystems<C, G, D, V>) -> Result<Self, PipelineError>
    where
        C: Compositor,
        G: GraphicsLayer,
        D: DecodeLayer,
        V: DrawingLayer,
    {
        let mut guard = Self::default();
        for library in Library::ORDER {
            let result: Result<(), SubsystemError> = match library {
                Library::Compositor => subsystems.compositor.initialize().map_err(Into::into),
                Library::Decode => subsystems.decode.initialize().map_err(Into::into),
                Library::Drawing => subsystems.drawing.initialize().map_err(Into::into),
            };
            if let Err(e) = result {
                guard.release(subsystems);
                return Err(PipelineError::new(Step::PlatformInit, e));
            }
            log::debug!("Initialized {:?} library", library);
            guard.initialized.push(library);
        }
        log::info!("Platform initialized");
        Ok(guard)
    }

    pub fn libraries(&self) -> &[Library] {
        &self.initialized
    }

    /// Deinitialize in reverse order. Safe to call more than once.
    pub fn release<C, G, D, V>(&mut self, subsystems: &Subsystems<C, G, D, V>)
    where
        C: Compositor,
        G: GraphicsLayer,
        D: DecodeLayer,
        V: DrawingLayer,
    {
        while let Some(library) = self.initialized.pop() {
            match library {
                Library::Compositor => subsystems.compositor.deinitialize(),
                Library::Decode => subsystems.decode.deinitialize(),
                Library::Drawing => subsystems.drawing.deinitialize(),
            }
            log::debug!("Deinitialized {:?} library", library);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::sim::{Event, SimSettings, SimWorld};

    #[test]
    fn test_init_and_release_order() {
        let world = SimWorld::new(SimSettings::default());
        let subsystems = world.subsystems();
        let mut guard = PlatformGuard::initialize(&subsystems).unwrap();
        assert_eq!(guard.libraries(), &Library::ORDER);
        guard.release(&subsystems);
        guard.release(&subsystems);

        let events = world.core().journal.events();
        assert_eq!(
            events,
            vec![
                Event::Init(Library::Compositor),
                Event::Init(Library::Decode),
                Event::Init(Library::Drawing),
                Event::Deinit(Library::Drawing),
                Event::Deinit(Library::Decode),
                Event::Deinit(Library::Compositor),
            ]
        );
    }

    #[test]
    fn test_failed_init_rolls_back() {
        let world = SimWorld::new(SimSettings {
            fail_at: Some(Step::PlatformInit),
            ..SimSettings::default()
        });
        let subsystems = world.subsystems();
        let err = PlatformGuard::initialize(&subsystems).unwrap_err();
        assert_eq!(err.step, Step::PlatformInit);
        assert!(
            !world
                .core()
                .journal
                .events()
                .iter()
                .any(|e| matches!(e, Event::Init(_)))
        );
    }
}
