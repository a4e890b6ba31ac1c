use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use common::{PipelineError, RunReport, Step};

use framecast::backend::sim::{SimSettings, SimWorld};
use framecast::backend::still::StillDecode;
use framecast::config::Config;
use framecast::display::Compositor;
use framecast::frame::{DrawingLayer, parse_hex_color};
use framecast::gpu::GraphicsLayer;
use framecast::orchestrator::{PipelineOrchestrator, PipelineSettings, Subsystems};
use framecast::video::DecodeLayer;

#[derive(Parser)]
#[command(name = "framecast")]
#[command(about = "Composite one decoded video frame onto a display overlay", long_about = None)]
#[command(version)]
struct Cli {
    /// Capture device or file to decode
    source: Option<String>,

    /// Config file (default: ~/.config/framecast/config.toml)
    #[arg(long, env = "FRAMECAST_CONFIG")]
    config: Option<PathBuf>,

    /// Compositor, GPU and drawing backend
    #[arg(long, value_enum, default_value = "sim")]
    backend: Backend,

    /// Decode backend (overrides decode.backend)
    #[arg(long, value_enum)]
    decoder: Option<Decoder>,

    /// Input format short name, e.g. v4l2, png, image2
    #[arg(short, long)]
    format: Option<String>,

    /// Stream index to decode
    #[arg(long)]
    stream: Option<usize>,

    /// Display index
    #[arg(long)]
    display: Option<u32>,

    /// Overlay layer
    #[arg(long)]
    layer: Option<i32>,

    /// Receive attempts before giving up (0 = unbounded)
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Receive deadline in milliseconds (0 = none)
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Clear the window to this colour before drawing (e.g. #000000)
    #[arg(long)]
    clear: Option<String>,

    /// Keep the frame on screen until Enter is pressed
    #[arg(long)]
    hold: bool,

    /// Print the run report (or the error) as JSON
    #[arg(long)]
    json: bool,

    /// Simulated display size, WxH
    #[arg(long, value_parser = parse_size, default_value = "1024x768")]
    sim_display: (u32, u32),

    /// Simulated frame size, WxH
    #[arg(long, value_parser = parse_size, default_value = "640x480")]
    sim_frame: (u32, u32),

    /// Packets the simulated decoder needs per frame
    #[arg(long, default_value = "1")]
    sim_priming: u32,

    /// Make the simulated call for this step fail (e.g. config-select)
    #[arg(long, value_parser = parse_step)]
    sim_fail_at: Option<Step>,

    /// Paths the simulated decoder can open; any other source fails at
    /// source-open
    #[arg(long = "sim-source", value_name = "PATH", default_value = "/dev/video0")]
    sim_sources: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    Sim,
    Videocore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Decoder {
    Sim,
    Still,
    Gst,
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .split_once('x')
        .ok_or_else(|| format!("expected WxH, got {}", value))?;
    let width = width.parse().map_err(|e| format!("width: {}", e))?;
    let height = height.parse().map_err(|e| format!("height: {}", e))?;
    Ok((width, height))
}

fn parse_step(value: &str) -> Result<Step, String> {
    Step::from_name(value).ok_or_else(|| {
        let names: Vec<_> = Step::ALL.iter().map(|s| s.name()).collect();
        format!("unknown step {} (expected one of: {})", value, names.join(", "))
    })
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => Config::load_from_path(path),
            None => Config::load(),
        }
    }

    /// Apply command-line overrides on top of the file configuration.
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(ref source) = self.source {
            config.decode.path = source.clone();
        }
        if let Some(decoder) = self.decoder {
            config.decode.backend = match decoder {
                Decoder::Sim => "sim",
                Decoder::Still => "still",
                Decoder::Gst => "gst",
            }
            .to_string();
        }
        if let Some(ref format) = self.format {
            config.decode.format = format.clone();
        }
        if let Some(stream) = self.stream {
            config.decode.stream = stream;
        }
        if let Some(display) = self.display {
            config.display.index = display;
        }
        if let Some(layer) = self.layer {
            config.display.layer = layer;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.decode.max_attempts = max_attempts;
        }
        if let Some(deadline_ms) = self.deadline_ms {
            config.decode.deadline_ms = deadline_ms;
        }
        if let Some(ref clear) = self.clear {
            parse_hex_color(clear).with_context(|| format!("Invalid clear color: {}", clear))?;
            config.image.clear_color = Some(clear.clone());
        }
        config.validate()
    }

    fn sim_settings(&self) -> SimSettings {
        SimSettings {
            display_size: self.sim_display,
            frame_size: self.sim_frame,
            priming_depth: self.sim_priming,
            sources: self.sim_sources.clone(),
            fail_at: self.sim_fail_at,
            ..SimSettings::default()
        }
    }
}

fn wait_for_enter(report: &RunReport) {
    println!(
        "Showing {}x{} frame on layer {}. Press Enter to exit.",
        report.frame_size.0, report.frame_size.1, report.element.layer
    );
    let mut line = String::new();
    if let Err(e) = std::io::stdin().lock().read_line(&mut line) {
        log::warn!("Failed to read stdin: {}", e);
    }
}

fn run<C, G, D, V>(
    subsystems: Subsystems<C, G, D, V>,
    settings: PipelineSettings,
    hold: bool,
) -> Result<RunReport, PipelineError>
where
    C: Compositor,
    G: GraphicsLayer,
    D: DecodeLayer,
    V: DrawingLayer,
{
    let orchestrator = PipelineOrchestrator::new(subsystems, settings)?;
    orchestrator.run_with_hold(|report| {
        if hold {
            wait_for_enter(report);
        }
    })
}

/// Pick the decode layer and run with the given display-side subsystems.
fn run_with_decoder<C, G, V>(
    compositor: C,
    graphics: G,
    drawing: V,
    decoder: &str,
    world: &SimWorld,
    settings: PipelineSettings,
    hold: bool,
) -> Result<Result<RunReport, PipelineError>>
where
    C: Compositor,
    G: GraphicsLayer,
    V: DrawingLayer,
{
    let outcome = match decoder {
        "still" => run(
            Subsystems {
                compositor,
                graphics,
                decode: StillDecode,
                drawing,
            },
            settings,
            hold,
        ),
        #[cfg(feature = "video")]
        "gst" => run(
            Subsystems {
                compositor,
                graphics,
                decode: framecast::backend::gst::GstDecode,
                drawing,
            },
            settings,
            hold,
        ),
        #[cfg(not(feature = "video"))]
        "gst" => anyhow::bail!("The gst decoder needs the `video` feature"),
        _ => run(
            Subsystems {
                compositor,
                graphics,
                decode: world.decode.clone(),
                drawing,
            },
            settings,
            hold,
        ),
    };
    Ok(outcome)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = cli.load_config()?;
    cli.apply(&mut config)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.general.log_level.as_str()),
    )
    .init();

    log::info!("Starting framecast v{}", env!("CARGO_PKG_VERSION"));

    let settings = config.pipeline_settings()?;
    log::info!(
        "Source: {} ({}, stream {}) via {}",
        settings.decode.path,
        settings.decode.format,
        settings.decode.stream,
        config.decode.backend
    );
    if let Some(deadline) = settings.decode.retry.deadline {
        log::debug!("Receive deadline: {:?}", deadline);
    }

    let world = SimWorld::new(cli.sim_settings());
    let outcome = match cli.backend {
        Backend::Sim => run_with_decoder(
            world.compositor.clone(),
            world.graphics.clone(),
            world.drawing.clone(),
            &config.decode.backend,
            &world,
            settings,
            cli.hold,
        )?,
        #[cfg(feature = "videocore")]
        Backend::Videocore => {
            use framecast::backend::videocore::{VcCompositor, VcDrawing, VcGraphics};
            run_with_decoder(
                VcCompositor,
                VcGraphics,
                VcDrawing,
                &config.decode.backend,
                &world,
                settings,
                cli.hold,
            )?
        }
        #[cfg(not(feature = "videocore"))]
        Backend::Videocore => anyhow::bail!("The videocore backend needs the `videocore` feature"),
    };

    if cli.backend == Backend::Sim {
        let core = world.core();
        let live = core.journal.live();
        let violations = core.journal.violations();
        log::info!(
            "sim: {} resources still live, {} ordering violations",
            live.len(),
            violations.len()
        );
        for violation in violations {
            log::warn!("sim: {}", violation);
        }
    }

    match outcome {
        Ok(report) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "Presented {}x{} frame from {} ({} decode attempts)",
                    report.frame_size.0, report.frame_size.1, report.stream, report.decode_attempts
                );
            }
            Ok(())
        }
        Err(e) => {
            if cli.json {
                let error = serde_json::json!({
                    "step": e.step,
                    "kind": e.kind(),
                    "message": e.to_string(),
                    "error": e,
                });
                println!("{}", serde_json::to_string_pretty(&error)?);
            } else {
                eprintln!("Error: {}", e);
            }
            std::process::exit(1);
        }
    }
}
