/// End-to-end runs of the pipeline against the simulated subsystems
use common::{ErrorKind, FixedRect, GraphicsAttributes, GraphicsError, Rect, Step, SubsystemError};
use framecast::backend::sim::{Event, ResourceKind, SimSettings, SimWorld};
use framecast::backend::still::StillDecode;
use framecast::orchestrator::{PipelineOrchestrator, PipelineSettings, Subsystems};
use framecast::video::{DecodeSettings, RetryPolicy};

fn settings() -> PipelineSettings {
    PipelineSettings {
        decode: DecodeSettings {
            retry: RetryPolicy::attempts(8),
            ..DecodeSettings::default()
        },
        ..PipelineSettings::default()
    }
}

fn kinds(entries: &[(ResourceKind, u32)]) -> Vec<ResourceKind> {
    entries.iter().map(|(kind, _)| *kind).collect()
}

#[test]
fn test_full_screen_overlay_presents_once() {
    let world = SimWorld::new(SimSettings::default());
    let orchestrator = PipelineOrchestrator::new(world.subsystems(), settings()).unwrap();
    let report = orchestrator.run().unwrap();

    assert_eq!(report.display_size, (1024, 768));
    assert_eq!(report.element.layer, 1);
    assert_eq!(report.element.dest, Rect::new(0, 0, 1024, 768));
    assert_eq!(
        report.element.src,
        FixedRect::from_pixels(Rect::new(0, 0, 1024, 768)).unwrap()
    );
    assert_eq!(report.element.src.width, 1024 << 16);
    assert_eq!(report.frame_size, (640, 480));
    assert_eq!(report.stream.codec, "rawvideo");
    assert_eq!(report.graphics_version, "1.4");
    assert_eq!(report.presents, 1);

    let core = world.core();
    assert_eq!(core.journal.presents(), 1);
    assert!(core.journal.live().is_empty());
    assert!(core.journal.violations().is_empty());
}

#[test]
fn test_acquisition_order_is_mirrored_on_release() {
    let world = SimWorld::new(SimSettings::default());
    let orchestrator = PipelineOrchestrator::new(world.subsystems(), settings()).unwrap();
    orchestrator.run().unwrap();

    let events = world.core().journal.events();
    let held = |kind: &ResourceKind| !matches!(kind, ResourceKind::Update | ResourceKind::Packet);
    let acquired: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            Event::Acquire { kind, .. } if held(kind) => Some(*kind),
            _ => None,
        })
        .collect();
    let mut released: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            Event::Release { kind, .. } if held(kind) => Some(*kind),
            _ => None,
        })
        .collect();
    released.reverse();

    assert_eq!(
        acquired,
        vec![
            ResourceKind::Display,
            ResourceKind::Element,
            ResourceKind::GraphicsDisplay,
            ResourceKind::Surface,
            ResourceKind::Context,
            ResourceKind::CurrentBinding,
            ResourceKind::Source,
            ResourceKind::Decoder,
            ResourceKind::Frame,
            ResourceKind::Image,
        ]
    );
    assert_eq!(released, acquired);
}

#[test]
fn test_frame_is_drawn_before_present() {
    let world = SimWorld::new(SimSettings::default());
    let orchestrator = PipelineOrchestrator::new(world.subsystems(), settings()).unwrap();
    orchestrator.run().unwrap();

    let events = world.core().journal.events();
    let position = |wanted: Event| events.iter().position(|e| *e == wanted).unwrap();
    assert!(position(Event::Upload) < position(Event::Draw));
    assert!(position(Event::Draw) < position(Event::Present));
}

#[test]
fn test_no_matching_config_leaves_nothing_behind() {
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
    let orchestrator = PipelineOrchestrator::new(world.subsystems(), settings()).unwrap();
    let err = orchestrator.run().unwrap_err();

    assert_eq!(err.step, Step::ConfigSelect);
    assert_eq!(err.kind(), ErrorKind::NegotiationFailure);
    assert_eq!(
        err.source,
        SubsystemError::from(GraphicsError::NoMatchingConfig)
    );

    let core = world.core();
    assert!(core.journal.acquired(ResourceKind::Surface).is_empty());
    assert!(core.journal.acquired(ResourceKind::Context).is_empty());
    assert!(core.journal.live().is_empty());
    assert!(core.journal.violations().is_empty());
}

#[test]
fn test_ambiguous_config_is_rejected() {
    let world = SimWorld::new(SimSettings {
        configs: vec![
            GraphicsAttributes {
                luminance: Some(0),
                ..GraphicsAttributes::default()
            };
            2
        ],
        ..SimSettings::default()
    });
    let orchestrator = PipelineOrchestrator::new(world.subsystems(), settings()).unwrap();
    let err = orchestrator.run().unwrap_err();

    assert_eq!(err.step, Step::ConfigSelect);
    assert_eq!(
        err.source,
        SubsystemError::from(GraphicsError::AmbiguousConfig { count: 2 })
    );
    assert!(world.core().journal.live().is_empty());
}

#[test]
fn test_source_open_failure_unwinds_display_and_gpu() {
    let world = SimWorld::new(SimSettings::default());
    let mut settings = settings();
    settings.decode.path = "/dev/video9".to_string();
    let orchestrator = PipelineOrchestrator::new(world.subsystems(), settings).unwrap();
    let err = orchestrator.run().unwrap_err();

    assert_eq!(err.step, Step::SourceOpen);
    assert_eq!(err.kind(), ErrorKind::TerminalIoFailure);

    let core = world.core();
    for kind in [
        ResourceKind::Source,
        ResourceKind::Packet,
        ResourceKind::Decoder,
        ResourceKind::Frame,
        ResourceKind::Image,
    ] {
        assert!(core.journal.acquired(kind).is_empty(), "{} acquired", kind);
    }

    let released: Vec<_> = kinds(&core.journal.releases())
        .into_iter()
        .filter(|kind| *kind != ResourceKind::Update)
        .collect();
    assert_eq!(
        released,
        vec![
            ResourceKind::CurrentBinding,
            ResourceKind::Context,
            ResourceKind::Surface,
            ResourceKind::GraphicsDisplay,
            ResourceKind::Element,
            ResourceKind::Display,
        ]
    );
    assert!(core.journal.live().is_empty());
    assert_eq!(core.journal.presents(), 0);
}

#[test]
fn test_priming_depth_sets_attempts() {
    for depth in 1..=4 {
        let world = SimWorld::new(SimSettings {
            priming_depth: depth,
            ..SimSettings::default()
        });
        let orchestrator = PipelineOrchestrator::new(world.subsystems(), settings()).unwrap();
        let report = orchestrator.run().unwrap();
        assert_eq!(report.decode_attempts, depth);
        assert_eq!(report.packets_sent, depth);
    }
}

#[test]
fn test_retry_exhaustion_is_reported_at_frame_receive() {
    let world = SimWorld::new(SimSettings {
        priming_depth: 5,
        ..SimSettings::default()
    });
    let mut settings = settings();
    settings.decode.retry = RetryPolicy::attempts(3);
    let orchestrator = PipelineOrchestrator::new(world.subsystems(), settings).unwrap();
    let err = orchestrator.run().unwrap_err();

    assert_eq!(err.step, Step::FrameReceive);
    assert_eq!(err.kind(), ErrorKind::TerminalIoFailure);
    assert!(world.core().journal.live().is_empty());
}

#[test]
fn test_platform_init_failure() {
    let world = SimWorld::new(SimSettings {
        fail_at: Some(Step::PlatformInit),
        ..SimSettings::default()
    });
    let err = PipelineOrchestrator::new(world.subsystems(), settings())
        .err()
        .unwrap();
    assert_eq!(err.step, Step::PlatformInit);
    assert_eq!(err.kind(), ErrorKind::EnvironmentUnavailable);
    assert!(
        !world
            .core()
            .journal
            .events()
            .iter()
            .any(|e| matches!(e, Event::Init(_)))
    );
}

#[test]
fn test_libraries_are_deinitialized_on_drop() {
    let world = SimWorld::new(SimSettings::default());
    {
        let orchestrator = PipelineOrchestrator::new(world.subsystems(), settings()).unwrap();
        orchestrator.run().unwrap();
    }
    let events = world.core().journal.events();
    let inits = events.iter().filter(|e| matches!(e, Event::Init(_))).count();
    let deinits = events.iter().filter(|e| matches!(e, Event::Deinit(_))).count();
    assert_eq!(inits, 3);
    assert_eq!(deinits, 3);
    assert!(matches!(events.last(), Some(Event::Deinit(_))));
}

#[test]
fn test_still_image_on_simulated_display() {
    use image::{Rgba, RgbaImage};

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    RgbaImage::from_pixel(32, 24, Rgba([0, 0, 255, 255]))
        .save(&path)
        .unwrap();

    let world = SimWorld::new(SimSettings::default());
    let subsystems = Subsystems {
        compositor: world.compositor.clone(),
        graphics: world.graphics.clone(),
        decode: StillDecode,
        drawing: world.drawing.clone(),
    };
    let settings = PipelineSettings {
        decode: DecodeSettings {
            format: "image2".to_string(),
            path: path.to_string_lossy().into_owned(),
            stream: 0,
            retry: RetryPolicy::attempts(4),
        },
        ..PipelineSettings::default()
    };
    let orchestrator = PipelineOrchestrator::new(subsystems, settings).unwrap();
    let report = orchestrator.run().unwrap();

    assert_eq!(report.frame_size, (32, 24));
    assert_eq!(report.stream.codec, "png");
    assert_eq!(report.decode_attempts, 1);
    assert_eq!(report.presents, 1);
    assert!(world.core().journal.live().is_empty());
}

#[test]
fn test_report_serializes_to_json() {
    let world = SimWorld::new(SimSettings::default());
    let orchestrator = PipelineOrchestrator::new(world.subsystems(), settings()).unwrap();
    let report = orchestrator.run().unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["display_size"], serde_json::json!([1024, 768]));
    assert_eq!(json["stream"]["codec"], "rawvideo");
    assert_eq!(json["presents"], 1);
}

#[test]
fn test_interleaved_streams_only_feed_the_elected_one() {
    let world = SimWorld::new(SimSettings {
        priming_depth: 2,
        stream_pattern: vec![0, 1],
        ..SimSettings::default()
    });
    let orchestrator = PipelineOrchestrator::new(world.subsystems(), settings()).unwrap();
    let report = orchestrator.run().unwrap();

    assert_eq!(report.decode_attempts, 2);
    assert_eq!(report.packets_sent, 2);
    let core = world.core();
    assert_eq!(core.journal.acquired(ResourceKind::Packet).len(), 3);
    assert!(core.journal.live().is_empty());
}
