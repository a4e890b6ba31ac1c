//! Pipeline orchestration
//!
//! Sequences the display session, render context, decode pipeline and frame
//! compositor into one run:
//!
//! ```text
//! display open → size → update start → element add → submit
//!   → gpu bind → config → surface (on the element) → context → make current
//!   → format → source open → packet → stream → decoder → send → receive*
//!   → image create → upload → draw → present
//! ```
//!
//! Every acquired resource lives in a local declared in acquisition order, so
//! an early return on any failure releases everything acquired so far in
//! exact reverse order. The first failure is the one reported.

use common::{PipelineError, RunReport, Step};

use crate::display::{Compositor, DisplaySession, DisplaySettings};
use crate::frame::{DrawingLayer, FrameCompositor, ImageSettings};
use crate::gpu::{GraphicsLayer, GraphicsSettings, RenderContext};
use crate::platform::PlatformGuard;
use crate::video::{DecodeLayer, DecodePipeline, DecodeSettings, FrameData};

/// The four native subsystems a run drives.
#[derive(Debug, Clone)]
pub struct Subsystems<C, G, D, V> {
    pub compositor: C,
    pub graphics: G,
    pub decode: D,
    pub drawing: V,
}

/// Settings for every stage of a run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PipelineSettings {
    pub display: DisplaySettings,
    pub graphics: GraphicsSettings,
    pub decode: DecodeSettings,
    pub image: ImageSettings,
}

/// Owns the subsystems and their process-wide initialization.
pub struct PipelineOrchestrator<C, G, D, V>
where
    C: Compositor,
    G: GraphicsLayer,
    D: DecodeLayer,
    V: DrawingLayer,
{
    settings: PipelineSettings,
    platform: PlatformGuard,
    subsystems: Subsystems<C, G, D, V>,
}

impl<C, G, D, V> PipelineOrchestrator<C, G, D, V>
where
    C: Compositor,
    G: GraphicsLayer,
    D: DecodeLayer,
    V: DrawingLayer,
{
    /// Initialize the native libraries. They stay initialized until the
    /// orchestrator is dropped.
    pub fn new(
        subsystems: Subsystems<C, G, D, V>,
        settings: PipelineSettings,
    ) -> Result<Self, PipelineError> {
        let platform = PlatformGuard::initialize(&subsystems).inspect_err(|e| {
            log::error!("{}", e);
        })?;
        Ok(Self {
            settings,
            platform,
            subsystems,
        })
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn subsystems(&self) -> &Subsystems<C, G, D, V> {
        &self.subsystems
    }

    /// Composite one frame and tear everything down again.
    pub fn run(&self) -> Result<RunReport, PipelineError> {
        self.run_with_hold(|_| {})
    }

    /// Like [`Self::run`], calling `hold` once the frame is on screen and
    /// before anything is released.
    pub fn run_with_hold(
        &self,
        hold: impl FnOnce(&RunReport),
    ) -> Result<RunReport, PipelineError> {
        let result = self.compose(hold);
        match &result {
            Ok(report) => log::info!(
                "Presented {}x{} frame on a {}x{} display",
                report.frame_size.0,
                report.frame_size.1,
                report.display_size.0,
                report.display_size.1
            ),
            Err(e) => log::error!("{}", e),
        }
        result
    }

    fn compose(&self, hold: impl FnOnce(&RunReport)) -> Result<RunReport, PipelineError> {
        let Subsystems {
            compositor,
            graphics,
            decode,
            drawing,
        } = &self.subsystems;
        let settings = &self.settings;

        let session = DisplaySession::establish(compositor, &settings.display)?;
        let window = session.window_descriptor();

        let mut render = RenderContext::bind(graphics, &settings.graphics)?;
        let config = render.select_config(&settings.graphics.attributes)?;
        render.create_window_surface(&window)?;
        render.create_context()?;
        render.make_current()?;

        let mut decoder = DecodePipeline::open(decode, &settings.decode)?;
        let stats = decoder.next_frame()?;
        let frame = decoder
            .frame()
            .ok_or_else(|| PipelineError::sequencing(Step::FrameReceive, "no frame decoded"))?;

        let current = render.current()?;
        let mut image = FrameCompositor::create(
            drawing,
            &current,
            &settings.image,
            frame.width(),
            frame.height(),
        )?;
        if let Some(color) = settings.image.clear {
            image.clear(&current, color);
        }
        image.upload(&current, frame)?;
        image.draw(&current)?;
        render.present()?;

        let report = RunReport {
            display_size: session.size(),
            element: *session.element_spec(),
            graphics_version: render.version().to_string(),
            config: *config.attributes(),
            stream: decoder.stream().clone(),
            frame_size: image.size(),
            decode_attempts: stats.attempts,
            packets_sent: stats.packets_sent,
            presents: render.presents(),
        };
        hold(&report);

        let mut first = None;
        crate::keep_first_error!(first, image.destroy(), Step::Teardown);
        crate::keep_first_error!(first, decoder.close(), Step::Teardown);
        crate::keep_first_error!(first, render.terminate(), Step::Teardown);
        crate::keep_first_error!(first, session.close(), Step::Teardown);
        match first {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}

impl<C, G, D, V> Drop for PipelineOrchestrator<C, G, D, V>
where
    C: Compositor,
    G: GraphicsLayer,
    D: DecodeLayer,
    V: DrawingLayer,
{
    fn drop(&mut self) {
        self.platform.release(&self.subsystems);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::sim::{ResourceKind, SimSettings, SimWorld};
    use crate::video::RetryPolicy;
    use std::cell::Cell;

    fn settings() -> PipelineSettings {
        PipelineSettings {
            decode: DecodeSettings {
                retry: RetryPolicy::attempts(8),
                ..DecodeSettings::default()
            },
            ..PipelineSettings::default()
        }
    }

    #[test]
    fn test_run_reports_and_releases_everything() {
        let world = SimWorld::new(SimSettings::default());
        let orchestrator = PipelineOrchestrator::new(world.subsystems(), settings()).unwrap();
        let report = orchestrator.run().unwrap();
        assert_eq!(report.display_size, (1024, 768));
        assert_eq!(report.frame_size, (640, 480));
        assert_eq!(report.presents, 1);
        assert!(world.core().journal.live().is_empty());
        assert!(world.core().journal.violations().is_empty());
    }

    #[test]
    fn test_hold_runs_while_frame_is_on_screen() {
        let world = SimWorld::new(SimSettings::default());
        let orchestrator = PipelineOrchestrator::new(world.subsystems(), settings()).unwrap();
        let live_during_hold = Cell::new(0);
        orchestrator
            .run_with_hold(|report| {
                assert_eq!(report.presents, 1);
                live_during_hold.set(world.core().journal.live().len());
            })
            .unwrap();
        // element, display, graphics display, surface, context, binding,
        // source, decoder, frame, image
        assert_eq!(live_during_hold.get(), 10);
        assert!(world.core().journal.live().is_empty());
    }

    #[test]
    fn test_teardown_failure_is_reported() {
        let world = SimWorld::new(SimSettings::default());
        let orchestrator = PipelineOrchestrator::new(world.subsystems(), settings()).unwrap();
        world.core_mut().fail_release(ResourceKind::Image);
        let err = orchestrator.run().unwrap_err();
        assert_eq!(err.step, Step::Teardown);
        assert_eq!(world.core().journal.live().len(), 1);
    }

    #[test]
    fn test_clear_colour_is_painted_first() {
        use crate::backend::sim::Event;

        let world = SimWorld::new(SimSettings::default());
        let mut settings = settings();
        settings.image.clear = Some((255, 255, 255, 255));
        let orchestrator = PipelineOrchestrator::new(world.subsystems(), settings).unwrap();
        orchestrator.run().unwrap();

        let events = world.core().journal.events();
        let clear = events.iter().position(|e| matches!(e, Event::Clear(_))).unwrap();
        let draw = events.iter().position(|e| *e == Event::Draw).unwrap();
        assert!(clear < draw);
    }
}
