/// Failure at every pipeline step must unwind exactly what was acquired,
/// last acquired first, and leave nothing live.
use common::{ErrorKind, Step};
use framecast::backend::sim::{ResourceKind, SimSettings, SimWorld};
use framecast::orchestrator::{PipelineOrchestrator, PipelineSettings};
use framecast::video::{DecodeSettings, RetryPolicy};

/// Steps whose simulated call can be made to fail during a run.
const INJECTABLE: [Step; 19] = [
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
    Step::Present,
];

fn run_failing_at(step: Step) -> (SimWorld, common::PipelineError) {
    let world = SimWorld::new(SimSettings {
        fail_at: Some(step),
        priming_depth: 2,
        ..SimSettings::default()
    });
    let settings = PipelineSettings {
        decode: DecodeSettings {
            retry: RetryPolicy::attempts(8),
            ..DecodeSettings::default()
        },
        ..PipelineSettings::default()
    };
    let err = {
        let orchestrator = PipelineOrchestrator::new(world.subsystems(), settings).unwrap();
        orchestrator.run().unwrap_err()
    };
    (world, err)
}

#[test]
fn test_every_acquiring_step_is_covered() {
    for step in Step::ALL {
        if step.acquires() {
            assert!(INJECTABLE.contains(&step), "{} cannot be injected", step);
        }
    }
}

#[test]
fn test_failure_is_reported_at_its_step() {
    for step in INJECTABLE {
        let (_world, err) = run_failing_at(step);
        assert_eq!(err.step, step, "fault at {} reported at {}", step, err.step);
        assert_ne!(err.kind(), ErrorKind::TransientNotReady);
    }
}

#[test]
fn test_unwind_is_reverse_acquisition() {
    for step in INJECTABLE {
        let (world, _err) = run_failing_at(step);
        let core = world.core();

        let (live, released) = core
            .journal
            .unwind_after(step)
            .unwrap_or_else(|| panic!("fault at {} never fired", step));
        let mut expected = live.clone();
        expected.reverse();

        assert_eq!(released, expected, "unwind after {}", step);
        assert!(
            core.journal.live().is_empty(),
            "leaked after {}: {:?}",
            step,
            core.journal.live()
        );
        assert!(
            core.journal.violations().is_empty(),
            "violations after {}: {:?}",
            step,
            core.journal.violations()
        );
    }
}

#[test]
fn test_nothing_is_presented_after_an_earlier_failure() {
    for step in INJECTABLE.into_iter().filter(|s| *s < Step::Present) {
        let (world, _err) = run_failing_at(step);
        assert_eq!(world.core().journal.presents(), 0, "presented after {}", step);
    }
}

#[test]
fn test_failed_submit_leaves_no_surface() {
    let (world, err) = run_failing_at(Step::TransactionSubmit);
    assert_eq!(err.step, Step::TransactionSubmit);
    let core = world.core();
    assert!(core.journal.acquired(ResourceKind::GraphicsDisplay).is_empty());
    assert!(core.journal.acquired(ResourceKind::Surface).is_empty());
}

#[test]
fn test_present_failure_releases_image_while_current() {
    let (world, err) = run_failing_at(Step::Present);
    assert_eq!(err.step, Step::Present);

    let core = world.core();
    let releases: Vec<_> = core.journal.releases().into_iter().map(|(k, _)| k).collect();
    let image = releases
        .iter()
        .position(|k| *k == ResourceKind::Image)
        .unwrap();
    let binding = releases
        .iter()
        .position(|k| *k == ResourceKind::CurrentBinding)
        .unwrap();
    assert!(image < binding);
}
