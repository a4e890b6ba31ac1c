use std::fs;
use std::time::Duration;

use common::Rect;
use framecast::backend::sim::{Event, SimSettings, SimWorld};
use framecast::config::Config;
use framecast::orchestrator::PipelineOrchestrator;

const OVERLAY_CONFIG: &str = r##"
[general]
log_level = "debug"

[display]
layer = 3
dest = { x = 64, y = 48, width = 320, height = 240 }

[decode]
format = "v4l2"
path = "/dev/video2"
max_attempts = 6
deadline_ms = 0
poll_interval_ms = 0

[image]
clear_color = "#101010"
"##;

#[test]
fn test_config_file_drives_a_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, OVERLAY_CONFIG).unwrap();

    let config = Config::load_from_path(&path).unwrap();
    let settings = config.pipeline_settings().unwrap();
    assert_eq!(settings.decode.path, "/dev/video2");
    assert_eq!(settings.decode.retry.max_attempts, Some(6));
    assert_eq!(settings.decode.retry.deadline, None);
    assert_eq!(settings.decode.retry.poll_interval, Duration::ZERO);
    assert_eq!(settings.image.clear, Some((0x10, 0x10, 0x10, 0xff)));

    let world = SimWorld::new(SimSettings {
        sources: vec!["/dev/video2".to_string()],
        ..SimSettings::default()
    });
    let orchestrator = PipelineOrchestrator::new(world.subsystems(), settings).unwrap();
    let report = orchestrator.run().unwrap();

    assert_eq!(report.element.layer, 3);
    assert_eq!(report.element.dest, Rect::new(64, 48, 320, 240));
    assert_eq!(report.presents, 1);

    let core = world.core();
    assert!(
        core.journal
            .events()
            .iter()
            .any(|e| matches!(e, Event::Clear(_)))
    );
    assert!(core.journal.live().is_empty());
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from_path(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.display.layer, 1);
    assert_eq!(config.decode.backend, "sim");
    assert_eq!(config.decode.path, "/dev/video0");
    assert_eq!(config.image.format, "srgbx8888");
    assert!(config.image.clear_color.is_none());
}

#[test]
fn test_invalid_value_is_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[graphics]\napi = \"vulkan\"\n").unwrap();

    let err = Config::load_from_path(&path).unwrap_err();
    assert!(err.to_string().contains("vulkan"), "{}", err);
}

#[test]
fn test_malformed_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[decode\npath = ").unwrap();

    let err = Config::load_from_path(&path).unwrap_err();
    assert!(err.to_string().contains("config.toml"), "{}", err);
}
